#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use station_map::detail::{DetailError, DetailSource, StationDetailLoader};
use station_map::{EngineError, MapBroadcast, MapCore, MapEngine, MapEvent, ScreenPoint};
use station_proto::config::Config;
use station_proto::{CameraTarget, ClusterId, LngLat, StationDetail, StationFeature, Viewport};

pub const BASE: &str = "http://feed.test";

/// Scripted engine that records every call the core makes.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeEngineState>,
}

#[derive(Default)]
struct FakeEngineState {
    bounds: Option<Viewport>,
    hits: HashMap<(u16, u16), Vec<StationFeature>>,
    expansions: HashMap<ClusterId, (Duration, Result<f64, EngineError>)>,
    eases: Vec<CameraTarget>,
    sources: Vec<(String, String)>,
    cluster_lookups: Vec<ClusterId>,
}

impl FakeEngine {
    pub fn new(bounds: Viewport) -> Arc<Self> {
        let engine = Self::default();
        engine.state.lock().unwrap().bounds = Some(bounds);
        Arc::new(engine)
    }

    pub fn place(&self, at: ScreenPoint, feature: StationFeature) {
        self.state
            .lock()
            .unwrap()
            .hits
            .entry((at.x, at.y))
            .or_default()
            .push(feature);
    }

    pub fn expansion(&self, id: ClusterId, delay: Duration, result: Result<f64, EngineError>) {
        self.state.lock().unwrap().expansions.insert(id, (delay, result));
    }

    pub fn eases(&self) -> Vec<CameraTarget> {
        self.state.lock().unwrap().eases.clone()
    }

    pub fn sources(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().sources.clone()
    }

    pub fn cluster_lookups(&self) -> Vec<ClusterId> {
        self.state.lock().unwrap().cluster_lookups.clone()
    }
}

impl MapEngine for FakeEngine {
    fn bounds(&self) -> Viewport {
        self.state.lock().unwrap().bounds.unwrap()
    }

    fn hit_test(&self, point: ScreenPoint) -> Vec<StationFeature> {
        let st = self.state.lock().unwrap();
        st.hits.get(&(point.x, point.y)).cloned().unwrap_or_default()
    }

    fn ease_to(&self, target: CameraTarget) {
        self.state.lock().unwrap().eases.push(target);
    }

    fn set_source_data(&self, source_id: &str, url: &str) {
        self.state
            .lock()
            .unwrap()
            .sources
            .push((source_id.to_string(), url.to_string()));
    }

    fn cluster_expansion_zoom(
        &self,
        cluster_id: ClusterId,
    ) -> BoxFuture<'static, Result<f64, EngineError>> {
        let mut st = self.state.lock().unwrap();
        st.cluster_lookups.push(cluster_id);
        let (delay, result) = st
            .expansions
            .get(&cluster_id)
            .cloned()
            .unwrap_or((Duration::ZERO, Err(EngineError::UnknownCluster(cluster_id))));
        async move {
            tokio::time::sleep(delay).await;
            result
        }
        .boxed()
    }
}

/// Detail source answering per beacon after a fixed delay.
#[derive(Default)]
pub struct FakeDetails {
    state: Mutex<FakeDetailsState>,
}

#[derive(Default)]
struct FakeDetailsState {
    answers: HashMap<String, (Duration, Result<StationDetail, DetailError>)>,
    calls: Vec<String>,
}

impl FakeDetails {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, beacon: &str, delay: Duration, result: Result<StationDetail, DetailError>) {
        self.state
            .lock()
            .unwrap()
            .answers
            .insert(beacon.to_string(), (delay, result));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl DetailSource for FakeDetails {
    fn fetch(&self, beacon_name: &str) -> BoxFuture<'static, Result<StationDetail, DetailError>> {
        let mut st = self.state.lock().unwrap();
        st.calls.push(beacon_name.to_string());
        match st.answers.get(beacon_name).cloned() {
            Some((delay, result)) => async move {
                tokio::time::sleep(delay).await;
                result
            }
            .boxed(),
            None => futures_util::future::pending().boxed(),
        }
    }
}

pub fn portland_viewport() -> Viewport {
    Viewport::new(LngLat::new(-122.7, 45.5), LngLat::new(-122.6, 45.6), 12.0)
}

pub fn detail(name: &str, city: &str) -> StationDetail {
    StationDetail {
        station_name: Some(name.to_string()),
        city: Some(city.to_string()),
        ..Default::default()
    }
}

/// A running `MapCore` wired to fakes.
pub struct Harness {
    pub events: mpsc::Sender<MapEvent>,
    pub broadcasts: broadcast::Receiver<MapBroadcast>,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

impl Harness {
    pub fn start(engine: Arc<FakeEngine>, details: Arc<FakeDetails>) -> Self {
        let mut config = Config::default();
        config.feed.base_url = BASE.to_string();

        let (event_tx, event_rx) = mpsc::channel(1024);
        let (broadcast_tx, broadcasts) = broadcast::channel(1024);
        let loader = StationDetailLoader::new(details, &config.detail);
        let core = MapCore::new(&config, engine, loader, event_tx.clone(), broadcast_tx);
        let handle = tokio::spawn(core.run(event_rx));
        Self {
            events: event_tx,
            broadcasts,
            handle,
        }
    }

    pub async fn send(&self, evt: MapEvent) {
        self.events.send(evt).await.unwrap();
    }

    /// Everything broadcast so far.
    pub fn drain(&mut self) -> Vec<MapBroadcast> {
        let mut out = Vec::new();
        while let Ok(msg) = self.broadcasts.try_recv() {
            out.push(msg);
        }
        out
    }
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
