//! Viewport snapshot and camera types shared by the map core and the engine.

use serde::{Deserialize, Serialize};

/// A longitude/latitude pair in degrees (GeoJSON axis order).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lng, p.lat]
    }
}

/// Immutable snapshot of the visible map rectangle plus zoom.
///
/// Produced from the engine's bounds query on every move event and never
/// mutated afterwards. The engine guarantees `sw <= ne` component-wise; this
/// type does not reorder corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub sw_lng: f64,
    pub sw_lat: f64,
    pub ne_lng: f64,
    pub ne_lat: f64,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(sw: LngLat, ne: LngLat, zoom: f64) -> Self {
        Self {
            sw_lng: sw.lng,
            sw_lat: sw.lat,
            ne_lng: ne.lng,
            ne_lat: ne.lat,
            zoom,
        }
    }

    pub fn sw(&self) -> LngLat {
        LngLat::new(self.sw_lng, self.sw_lat)
    }

    pub fn ne(&self) -> LngLat {
        LngLat::new(self.ne_lng, self.ne_lat)
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.sw_lng + self.ne_lng) / 2.0,
            (self.sw_lat + self.ne_lat) / 2.0,
        )
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: LngLat) -> bool {
        p.lng >= self.sw_lng && p.lng <= self.ne_lng && p.lat >= self.sw_lat && p.lat <= self.ne_lat
    }

    pub fn width(&self) -> f64 {
        self.ne_lng - self.sw_lng
    }

    pub fn height(&self) -> f64 {
        self.ne_lat - self.sw_lat
    }
}

/// Destination of an ease-to camera transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraTarget {
    pub center: LngLat,
    pub zoom: f64,
}

impl CameraTarget {
    pub fn new(center: LngLat, zoom: f64) -> Self {
        Self { center, zoom }
    }
}
