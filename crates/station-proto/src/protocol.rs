use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::viewport::LngLat;

/// Opaque cluster token assigned by the clustering engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u64);

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rendered point from the live feed.
#[derive(Debug, Clone, PartialEq)]
pub struct StationFeature {
    pub coordinates: LngLat,
    pub kind: FeatureKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    /// Aggregate of nearby stations, expandable on click.
    Cluster {
        cluster_id: ClusterId,
        point_count: u32,
    },
    /// A single station, identified by its beacon name.
    Station {
        beacon_name: String,
        ev_dc_fast_num: Option<u32>,
    },
}

/// How a feature is drawn.  Stations without DC fast chargers get the muted
/// marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Cluster,
    FastCharger,
    Standard,
}

impl StationFeature {
    pub fn cluster(coordinates: LngLat, cluster_id: ClusterId, point_count: u32) -> Self {
        Self {
            coordinates,
            kind: FeatureKind::Cluster {
                cluster_id,
                point_count,
            },
        }
    }

    pub fn station(coordinates: LngLat, beacon_name: impl Into<String>) -> Self {
        Self {
            coordinates,
            kind: FeatureKind::Station {
                beacon_name: beacon_name.into(),
                ev_dc_fast_num: None,
            },
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self.kind, FeatureKind::Cluster { .. })
    }

    pub fn beacon_name(&self) -> Option<&str> {
        match &self.kind {
            FeatureKind::Station { beacon_name, .. } => Some(beacon_name),
            FeatureKind::Cluster { .. } => None,
        }
    }

    pub fn marker(&self) -> MarkerKind {
        match &self.kind {
            FeatureKind::Cluster { .. } => MarkerKind::Cluster,
            FeatureKind::Station {
                ev_dc_fast_num: Some(_),
                ..
            } => MarkerKind::FastCharger,
            FeatureKind::Station { .. } => MarkerKind::Standard,
        }
    }
}

/// Full attributes of one station, fetched lazily by beacon name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationDetail {
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub street_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
}

impl StationDetail {
    /// True when the payload carries nothing worth showing.
    pub fn is_empty(&self) -> bool {
        [
            &self.station_name,
            &self.street_address,
            &self.city,
            &self.state,
            &self.zip,
        ]
        .iter()
        .all(|f| f.as_deref().map_or(true, |s| s.trim().is_empty()))
    }

    /// Popup text: name, street address, then "city, state zip".
    pub fn display_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(name) = non_empty(&self.station_name) {
            lines.push(name.to_string());
        }
        if let Some(street) = non_empty(&self.street_address) {
            lines.push(street.to_string());
        }

        let region: Vec<&str> = [&self.state, &self.zip]
            .into_iter()
            .filter_map(non_empty)
            .collect();
        let locality = match (non_empty(&self.city), region.is_empty()) {
            (Some(city), false) => format!("{}, {}", city, region.join(" ")),
            (Some(city), true) => city.to_string(),
            (None, _) => region.join(" "),
        };
        if !locality.is_empty() {
            lines.push(locality);
        }
        lines
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ── GeoJSON wire format ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<WireFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFeature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    pub geometry: PointGeometry,
    #[serde(default)]
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type", default = "point_type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacon_name: Option<String>,
    #[serde(default)]
    pub ev_dc_fast_num: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cluster: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<ClusterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_count: Option<u32>,
    /// Zoom at which the cluster separates, when the feed precomputes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion_zoom: Option<f64>,
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn point_type() -> String {
    "Point".to_string()
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("cluster feature without cluster_id")]
    MissingClusterId,
    #[error("station feature without beacon_name")]
    MissingBeaconName,
    #[error("non-finite coordinates {0:?}")]
    BadCoordinates([f64; 2]),
}

impl FeatureCollection {
    pub fn new(features: Vec<WireFeature>) -> Self {
        Self {
            kind: feature_collection_type(),
            features,
        }
    }

    /// Convert every usable feature; rejected features are logged and skipped.
    pub fn into_station_features(self) -> Vec<StationFeature> {
        self.features
            .into_iter()
            .filter_map(|wire| match StationFeature::try_from(wire) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::warn!("skipping feed feature: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl WireFeature {
    pub fn point(coordinates: LngLat, properties: FeatureProperties) -> Self {
        Self {
            kind: feature_type(),
            geometry: PointGeometry {
                kind: point_type(),
                coordinates: coordinates.into(),
            },
            properties,
        }
    }
}

impl TryFrom<WireFeature> for StationFeature {
    type Error = FeatureError;

    fn try_from(wire: WireFeature) -> Result<Self, Self::Error> {
        let [lng, lat] = wire.geometry.coordinates;
        if !lng.is_finite() || !lat.is_finite() {
            return Err(FeatureError::BadCoordinates([lng, lat]));
        }
        let props = wire.properties;
        let kind = if props.cluster {
            FeatureKind::Cluster {
                cluster_id: props.cluster_id.ok_or(FeatureError::MissingClusterId)?,
                point_count: props.point_count.unwrap_or(0),
            }
        } else {
            FeatureKind::Station {
                beacon_name: props
                    .beacon_name
                    .filter(|b| !b.is_empty())
                    .ok_or(FeatureError::MissingBeaconName)?,
                ev_dc_fast_num: props.ev_dc_fast_num,
            }
        };
        Ok(Self {
            coordinates: LngLat::new(lng, lat),
            kind,
        })
    }
}
