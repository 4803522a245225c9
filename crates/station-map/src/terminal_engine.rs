//! TerminalEngine — a `MapEngine` drawn in character cells.
//!
//! The camera is a center plus a zoom level; bounds are derived with an
//! equirectangular approximation scaled by the cosine of the center latitude,
//! which is close enough to web-mercator at city scale.  One cell is treated
//! as 8x16 pixels of a 256 pixel tile.
//!
//! Every camera change is reported to the core as `MapEvent::ViewportChanged`
//! and bumps the redraw revision.  Feed data is fetched when the core commits
//! a new URL; a response for a URL that has since been replaced is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use station_proto::config::MapConfig;
use station_proto::protocol::FeatureCollection;
use station_proto::{CameraTarget, ClusterId, LngLat, StationFeature, Viewport};

use crate::core::MapEvent;
use crate::engine::{EngineError, MapEngine, ScreenPoint};

const TILE_PX: f64 = 256.0;
const CELL_PX_X: f64 = 8.0;
const CELL_PX_Y: f64 = 16.0;
const MAX_LAT: f64 = 85.0;

/// Cells within this distance of a click count as hit.
const HIT_RADIUS: f64 = 1.0;

/// Read-only copy of what the map currently shows.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub viewport: Viewport,
    pub features: Vec<StationFeature>,
    /// Last feed fetch failure, cleared by the next good fetch.
    pub feed_error: Option<String>,
}

#[derive(Debug)]
struct EngineState {
    center: LngLat,
    zoom: f64,
    cols: u16,
    rows: u16,
    features: Vec<StationFeature>,
    /// `expansion_zoom` per cluster from the last good fetch.
    expansions: HashMap<ClusterId, Option<f64>>,
    /// Sequence of the most recent fetch; older fetches are discarded.
    fetch_seq: u64,
    feed_error: Option<String>,
}

impl EngineState {
    fn viewport(&self) -> Viewport {
        let degrees_per_px = 360.0 / (TILE_PX * 2f64.powf(self.zoom));
        let half_w = f64::from(self.cols) * CELL_PX_X * degrees_per_px / 2.0;
        let half_h = f64::from(self.rows) * CELL_PX_Y * degrees_per_px
            * self.center.lat.to_radians().cos()
            / 2.0;
        Viewport::new(
            LngLat::new(self.center.lng - half_w, self.center.lat - half_h),
            LngLat::new(self.center.lng + half_w, self.center.lat + half_h),
            self.zoom,
        )
    }

    /// Fractional cell position of a point, relative to the map area.
    fn project(&self, p: LngLat) -> (f64, f64) {
        let v = self.viewport();
        let x = (p.lng - v.sw_lng) / v.width() * f64::from(self.cols);
        let y = (v.ne_lat - p.lat) / v.height() * f64::from(self.rows);
        (x, y)
    }

    /// Geographic position of the center of a cell.
    fn unproject(&self, point: ScreenPoint) -> LngLat {
        let v = self.viewport();
        let fx = (f64::from(point.x) + 0.5) / f64::from(self.cols.max(1));
        let fy = (f64::from(point.y) + 0.5) / f64::from(self.rows.max(1));
        LngLat::new(v.sw_lng + fx * v.width(), v.ne_lat - fy * v.height())
    }
}

pub struct TerminalEngine {
    state: Arc<Mutex<EngineState>>,
    client: reqwest::Client,
    source_id: String,
    min_zoom: f64,
    max_zoom: f64,
    /// Fallback when a cluster carries no `expansion_zoom`.
    cluster_max_zoom: f64,
    events: mpsc::Sender<MapEvent>,
    revision: Arc<watch::Sender<u64>>,
}

fn lock(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TerminalEngine {
    pub fn new(
        config: &MapConfig,
        source_id: impl Into<String>,
        client: reqwest::Client,
        events: mpsc::Sender<MapEvent>,
    ) -> Self {
        let (revision, _) = watch::channel(0u64);
        Self {
            state: Arc::new(Mutex::new(EngineState {
                center: LngLat::new(config.initial_longitude, config.initial_latitude),
                zoom: config.initial_zoom,
                cols: 80,
                rows: 24,
                features: Vec::new(),
                expansions: HashMap::new(),
                fetch_seq: 0,
                feed_error: None,
            })),
            client,
            source_id: source_id.into(),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            cluster_max_zoom: config.cluster_max_zoom,
            events,
            revision: Arc::new(revision),
        }
    }

    /// Bumped whenever the camera moves or new feed data lands.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let st = lock(&self.state);
        EngineSnapshot {
            viewport: st.viewport(),
            features: st.features.clone(),
            feed_error: st.feed_error.clone(),
        }
    }

    /// Fractional cell position of `p` in the current view.
    pub fn project(&self, p: LngLat) -> (f64, f64) {
        lock(&self.state).project(p)
    }

    /// Track the size of the map area.  A size change moves the bounds.
    pub fn resize(&self, cols: u16, rows: u16) {
        let (cols, rows) = (cols.max(1), rows.max(1));
        {
            let mut st = lock(&self.state);
            if st.cols == cols && st.rows == rows {
                return;
            }
            st.cols = cols;
            st.rows = rows;
        }
        self.camera_changed();
    }

    /// Move the camera by whole cells.
    pub fn pan(&self, dx: i32, dy: i32) {
        {
            let mut st = lock(&self.state);
            let v = st.viewport();
            let step_lng = v.width() / f64::from(st.cols);
            let step_lat = v.height() / f64::from(st.rows);
            st.center.lng = wrap_lng(st.center.lng + f64::from(dx) * step_lng);
            st.center.lat = (st.center.lat - f64::from(dy) * step_lat).clamp(-MAX_LAT, MAX_LAT);
        }
        self.camera_changed();
    }

    pub fn zoom_by(&self, delta: f64) {
        {
            let mut st = lock(&self.state);
            let zoom = (st.zoom + delta).clamp(self.min_zoom, self.max_zoom);
            if zoom == st.zoom {
                return;
            }
            st.zoom = zoom;
        }
        self.camera_changed();
    }

    /// The cell at the middle of the map area.
    pub fn center_point(&self) -> ScreenPoint {
        let st = lock(&self.state);
        ScreenPoint::new(st.cols / 2, st.rows / 2)
    }

    pub fn screen_to_lnglat(&self, point: ScreenPoint) -> LngLat {
        lock(&self.state).unproject(point)
    }

    /// Whether a click at `point` would land on a feature.
    pub fn is_interactive(&self, point: ScreenPoint) -> bool {
        !self.hit_test(point).is_empty()
    }

    fn camera_changed(&self) {
        let viewport = lock(&self.state).viewport();
        self.revision.send_modify(|r| *r += 1);
        // Never block the caller; the core may be the one moving the camera.
        if let Err(e) = self.events.try_send(MapEvent::ViewportChanged(viewport)) {
            debug!("engine: viewport event not delivered: {}", e);
        }
    }
}

fn wrap_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

impl MapEngine for TerminalEngine {
    fn bounds(&self) -> Viewport {
        lock(&self.state).viewport()
    }

    fn hit_test(&self, point: ScreenPoint) -> Vec<StationFeature> {
        let st = lock(&self.state);
        let (px, py) = (f64::from(point.x) + 0.5, f64::from(point.y) + 0.5);

        let mut hits: Vec<(f64, &StationFeature)> = st
            .features
            .iter()
            .filter_map(|f| {
                let (x, y) = st.project(f.coordinates);
                let d = (x - px).abs().max((y - py).abs());
                (d <= HIT_RADIUS + 0.5).then_some((d, f))
            })
            .collect();
        // Clusters draw above stations.
        hits.sort_by(|(da, a), (db, b)| {
            b.is_cluster()
                .cmp(&a.is_cluster())
                .then(da.total_cmp(db))
        });
        hits.into_iter().map(|(_, f)| f.clone()).collect()
    }

    fn ease_to(&self, target: CameraTarget) {
        {
            let mut st = lock(&self.state);
            st.center = LngLat::new(
                wrap_lng(target.center.lng),
                target.center.lat.clamp(-MAX_LAT, MAX_LAT),
            );
            st.zoom = target.zoom.clamp(self.min_zoom, self.max_zoom);
        }
        self.camera_changed();
    }

    fn set_source_data(&self, source_id: &str, url: &str) {
        if source_id != self.source_id {
            warn!("engine: no source named {:?}", source_id);
            return;
        }
        let seq = {
            let mut st = lock(&self.state);
            st.fetch_seq += 1;
            st.fetch_seq
        };

        let client = self.client.clone();
        let url = url.to_string();
        let state = Arc::clone(&self.state);
        let revision = Arc::clone(&self.revision);
        tokio::spawn(async move {
            let result = fetch_feed(&client, &url).await;
            if apply_fetch(&state, seq, result) {
                revision.send_modify(|r| *r += 1);
            }
        });
    }

    fn cluster_expansion_zoom(
        &self,
        cluster_id: ClusterId,
    ) -> BoxFuture<'static, Result<f64, EngineError>> {
        let result = match lock(&self.state).expansions.get(&cluster_id) {
            Some(Some(zoom)) => Ok(*zoom),
            Some(None) => Ok((self.cluster_max_zoom + 1.0).min(self.max_zoom)),
            None => Err(EngineError::UnknownCluster(cluster_id)),
        };
        futures_util::future::ready(result).boxed()
    }
}

async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<FeatureCollection, EngineError> {
    debug!("engine: GET {}", url);
    let response = client
        .get(url)
        .header("Accept", "application/geo+json, application/json")
        .send()
        .await
        .map_err(|e| EngineError::Feed(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::Feed(format!("HTTP {}", status.as_u16())));
    }
    response
        .json::<FeatureCollection>()
        .await
        .map_err(|e| EngineError::Feed(e.to_string()))
}

/// Install a finished fetch.  Returns `true` when the map content changed.
fn apply_fetch(
    state: &Mutex<EngineState>,
    seq: u64,
    result: Result<FeatureCollection, EngineError>,
) -> bool {
    let mut st = lock(state);
    if seq != st.fetch_seq {
        debug!("engine: dropping feed response #{} (current #{})", seq, st.fetch_seq);
        return false;
    }
    match result {
        Ok(collection) => {
            st.expansions = collection
                .features
                .iter()
                .filter(|f| f.properties.cluster)
                .filter_map(|f| {
                    f.properties
                        .cluster_id
                        .map(|id| (id, f.properties.expansion_zoom))
                })
                .collect();
            st.features = collection.into_station_features();
            st.feed_error = None;
            info!("engine: feed loaded, {} features", st.features.len());
        }
        Err(e) => {
            // Last good features stay on screen.
            warn!("engine: {}", e);
            st.feed_error = Some(e.to_string());
        }
    }
    true
}
