//! Shared data model, URL construction and configuration for the station map.

pub mod config;
pub mod platform;
pub mod protocol;
pub mod source_url;
pub mod viewport;

pub use protocol::{ClusterId, FeatureKind, MarkerKind, StationDetail, StationFeature};
pub use viewport::{CameraTarget, LngLat, Viewport};
