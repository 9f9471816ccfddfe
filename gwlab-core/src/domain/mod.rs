//! Domain types for GWLab

pub mod ids;
pub mod reading;
pub mod timestamp;
pub mod well;

pub use ids::WellId;
pub use reading::{
    GroundwaterReading, Observation, UsageReading, WaterQualityReading, WeatherReading,
};
pub use timestamp::parse_timestamp;
pub use well::Well;
