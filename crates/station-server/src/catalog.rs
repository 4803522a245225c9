//! Station catalog loaded from TOML.
//!
//! ```toml
//! [[stations]]
//! beacon_name = "beacon-42"
//! station_name = "Main St Charger"
//! street_address = "100 SW Main St"
//! city = "Portland"
//! state = "OR"
//! zip = "97204"
//! longitude = -122.676
//! latitude = 45.515
//! ev_dc_fast_num = 2
//!
//! # Pre-aggregated group, served as a GeoJSON cluster feature.
//! [[clusters]]
//! cluster_id = 1
//! longitude = -122.675
//! latitude = 45.52
//! point_count = 5
//! expansion_zoom = 15.0
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use station_proto::protocol::{FeatureCollection, FeatureProperties, WireFeature};
use station_proto::{ClusterId, LngLat, StationDetail, Viewport};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    stations: Vec<CatalogStation>,
    #[serde(default)]
    clusters: Vec<CatalogCluster>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogStation {
    pub beacon_name: String,
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
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub ev_dc_fast_num: Option<u32>,
}

impl CatalogStation {
    pub fn position(&self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }

    pub fn detail(&self) -> StationDetail {
        StationDetail {
            station_name: self.station_name.clone(),
            street_address: self.street_address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip: self.zip.clone(),
        }
    }

    fn feature(&self) -> WireFeature {
        WireFeature::point(
            self.position(),
            FeatureProperties {
                beacon_name: Some(self.beacon_name.clone()),
                ev_dc_fast_num: self.ev_dc_fast_num,
                ..Default::default()
            },
        )
    }
}

/// A cluster as the upstream clustering source would report it.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogCluster {
    pub cluster_id: u64,
    pub longitude: f64,
    pub latitude: f64,
    pub point_count: u32,
    #[serde(default)]
    pub expansion_zoom: Option<f64>,
}

impl CatalogCluster {
    pub fn position(&self) -> LngLat {
        LngLat::new(self.longitude, self.latitude)
    }

    fn feature(&self) -> WireFeature {
        WireFeature::point(
            self.position(),
            FeatureProperties {
                cluster: true,
                cluster_id: Some(ClusterId(self.cluster_id)),
                point_count: Some(self.point_count),
                expansion_zoom: self.expansion_zoom,
                ..Default::default()
            },
        )
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    stations: Vec<CatalogStation>,
    clusters: Vec<CatalogCluster>,
    by_beacon: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(stations: Vec<CatalogStation>, clusters: Vec<CatalogCluster>) -> Self {
        let by_beacon = stations
            .iter()
            .enumerate()
            .map(|(i, s)| (s.beacon_name.clone(), i))
            .collect();
        Self {
            stations,
            clusters,
            by_beacon,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing catalog {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Ok(Self::new(file.stations, file.clusters))
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, beacon_name: &str) -> Option<&CatalogStation> {
        self.by_beacon.get(beacon_name).map(|&i| &self.stations[i])
    }

    /// Every station and cluster inside `bounds` (edges included), stations
    /// first, each in catalog order.
    pub fn within(&self, bounds: &Viewport) -> FeatureCollection {
        let stations = self
            .stations
            .iter()
            .filter(|s| bounds.contains(s.position()))
            .map(CatalogStation::feature);
        let clusters = self
            .clusters
            .iter()
            .filter(|c| bounds.contains(c.position()))
            .map(CatalogCluster::feature);
        FeatureCollection::new(stations.chain(clusters).collect())
    }
}
