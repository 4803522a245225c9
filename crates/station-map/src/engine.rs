//! The seam between the map core and whatever renders the map.
//!
//! The engine owns tiles, projection, gestures and clustering.  The core only
//! needs the operations below; everything else stays on the engine's side.

use futures_util::future::BoxFuture;
use thiserror::Error;

use station_proto::{CameraTarget, ClusterId, StationFeature, Viewport};

/// A point on the rendered map surface, in engine units (pixels, cells, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPoint {
    pub x: u16,
    pub y: u16,
}

impl ScreenPoint {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("cluster {0} is not part of the current source data")]
    UnknownCluster(ClusterId),
    #[error("cluster lookup failed: {0}")]
    Lookup(String),
    #[error("feed fetch failed: {0}")]
    Feed(String),
}

pub trait MapEngine: Send + Sync {
    /// Current visible bounds and zoom.
    fn bounds(&self) -> Viewport;

    /// Rendered features under a screen point, topmost first.
    fn hit_test(&self, point: ScreenPoint) -> Vec<StationFeature>;

    /// Smooth camera transition.
    fn ease_to(&self, target: CameraTarget);

    /// Replace the content of a live source with the data at `url`.
    fn set_source_data(&self, source_id: &str, url: &str);

    /// Minimal zoom at which the cluster's children stop being merged.
    fn cluster_expansion_zoom(&self, cluster_id: ClusterId)
        -> BoxFuture<'static, Result<f64, EngineError>>;
}
