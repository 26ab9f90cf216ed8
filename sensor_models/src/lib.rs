//! `sensor_models`: Planar geometry, range-bearing observation model, sensor parameters.

pub mod geometry;
pub mod observation;
pub mod sensor;

pub use geometry::{from_polar_relative, to_polar_rate_relative, to_polar_relative, wrap_angle};
pub use observation::{ObservationModel, RangeBearingObservation};
pub use sensor::RangeBearingParams;
