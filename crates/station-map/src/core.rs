/// MapCore — single-owner event loop for the feed URL and the popup.
///
/// Everything that can change what the map shows arrives here as a
/// `MapEvent`: viewport changes from the engine, clicks and dismissals from
/// the UI, and the completions of lookups this loop spawned.  MapCore owns the
/// feed controller, the cluster resolver and the popup exclusively; no other
/// task touches them.
///
/// Lookups are never awaited inline.  They run as spawned tasks that post
/// their result back into the same channel, and each result is checked
/// against the current state before it is applied.
///
/// After each change that the UI renders, MapCore sends a `MapBroadcast` on a
/// `tokio::sync::broadcast` channel.
use std::sync::Arc;

use station_proto::config::Config;
use station_proto::{CameraTarget, FeatureKind, StationFeature, Viewport};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cluster::{ClusterExpansionResolver, ClusterRequest};
use crate::detail::{DetailResponse, StationDetailLoader};
use crate::engine::{EngineError, MapEngine, ScreenPoint};
use crate::feed::{sleep_until_deadline, DebouncedFeedController, FeedUrl};
use crate::popup::{PopupState, PopupStateMachine};

// ── MapEvent ──────────────────────────────────────────────────────────────────

/// All inputs into the MapCore loop.
#[derive(Debug)]
pub enum MapEvent {
    /// The engine moved; fired for every frame of a pan, zoom or animation.
    ViewportChanged(Viewport),
    /// User clicked the map surface.
    Click(ScreenPoint),
    /// User closed the popup.
    DismissPopup,
    /// A cluster expansion lookup finished.
    ClusterZoomResolved {
        request: ClusterRequest,
        result: Result<f64, EngineError>,
    },
    /// A station detail lookup finished.
    DetailResolved(DetailResponse),
    Shutdown,
}

/// State changes published to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum MapBroadcast {
    FeedCommitted(FeedUrl),
    PopupChanged(PopupState),
    CameraMoved(CameraTarget),
}

// ── MapCore ───────────────────────────────────────────────────────────────────

pub struct MapCore {
    engine: Arc<dyn MapEngine>,
    feed: DebouncedFeedController,
    clusters: ClusterExpansionResolver,
    popup: PopupStateMachine,
    loader: StationDetailLoader,
    /// Engine source that receives committed feed URLs.
    source_id: String,
    /// Close-up zoom for a selected station.
    station_zoom: f64,
    /// Completions of spawned lookups come back through here.
    event_tx: mpsc::Sender<MapEvent>,
    broadcast_tx: broadcast::Sender<MapBroadcast>,
}

impl MapCore {
    pub fn new(
        config: &Config,
        engine: Arc<dyn MapEngine>,
        loader: StationDetailLoader,
        event_tx: mpsc::Sender<MapEvent>,
        broadcast_tx: broadcast::Sender<MapBroadcast>,
    ) -> Self {
        Self {
            engine,
            feed: DebouncedFeedController::new(
                config.feed.base_url.clone(),
                config.feed.debounce(),
            ),
            clusters: ClusterExpansionResolver::new(),
            popup: PopupStateMachine::new(),
            loader,
            source_id: config.feed.source_id.clone(),
            station_zoom: config.map.station_zoom,
            event_tx,
            broadcast_tx,
        }
    }

    /// Run the event loop.  Returns when a `Shutdown` event is received or
    /// every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<MapEvent>) -> anyhow::Result<()> {
        info!("MapCore: starting event loop");

        // The initial bounds go through the same settle path as every move.
        let initial = self.engine.bounds();
        self.feed.on_viewport_changed(&initial);

        loop {
            let deadline = self.feed.deadline();
            tokio::select! {
                // Queued moves must replace the candidate before it can settle.
                biased;

                evt = event_rx.recv() => match evt {
                    None => {
                        info!("MapCore: event channel closed, shutting down");
                        break;
                    }
                    Some(MapEvent::Shutdown) => {
                        info!("MapCore: shutdown requested");
                        break;
                    }
                    Some(evt) => self.handle_event(evt),
                },

                _ = sleep_until_deadline(deadline) => {
                    self.settle_feed(Instant::now());
                }
            }
        }

        Ok(())
    }

    pub fn handle_event(&mut self, evt: MapEvent) {
        match evt {
            MapEvent::ViewportChanged(viewport) => self.feed.on_viewport_changed(&viewport),
            MapEvent::Click(point) => self.on_click(point),
            MapEvent::DismissPopup => {
                if self.popup.close() {
                    debug!("MapCore: popup dismissed");
                    self.publish_popup();
                }
            }
            MapEvent::ClusterZoomResolved { request, result } => {
                if let Some(target) = self.clusters.resolve(request, result) {
                    info!(
                        "MapCore: expanding cluster {} to zoom {}",
                        request.cluster_id, target.zoom
                    );
                    self.ease_to(target);
                }
            }
            MapEvent::DetailResolved(response) => {
                if self.popup.apply(response) {
                    self.publish_popup();
                }
            }
            MapEvent::Shutdown => {}
        }
    }

    /// Commit the pending feed URL if it has settled.
    pub fn settle_feed(&mut self, now: Instant) {
        let Some(url) = self.feed.settle(now).cloned() else {
            return;
        };
        self.engine.set_source_data(&self.source_id, url.as_str());
        let _ = self.broadcast_tx.send(MapBroadcast::FeedCommitted(url));
    }

    // ── click handling ────────────────────────────────────────────────────────

    fn on_click(&mut self, point: ScreenPoint) {
        let features = self.engine.hit_test(point);

        // Any click abandons an unresolved cluster lookup and closes the
        // popup; a station click reopens it for the new target below.
        self.clusters.supersede();
        let was_open = self.popup.close();

        match features.into_iter().next() {
            None => {
                if was_open {
                    self.publish_popup();
                }
            }
            Some(feature) => self.on_feature_clicked(feature, was_open),
        }
    }

    fn on_feature_clicked(&mut self, feature: StationFeature, was_open: bool) {
        let anchor = feature.coordinates;
        match feature.kind {
            FeatureKind::Cluster {
                cluster_id,
                point_count,
            } => {
                debug!(
                    "MapCore: cluster {} ({} stations) clicked",
                    cluster_id, point_count
                );
                if was_open {
                    self.publish_popup();
                }
                let request = self.clusters.begin(cluster_id, anchor);
                let lookup = self.engine.cluster_expansion_zoom(cluster_id);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = lookup.await;
                    let _ = tx
                        .send(MapEvent::ClusterZoomResolved { request, result })
                        .await;
                });
            }
            FeatureKind::Station { beacon_name, .. } => {
                info!("MapCore: station {} selected", beacon_name);
                let request = self.popup.open(&beacon_name, anchor);
                self.publish_popup();
                self.ease_to(CameraTarget::new(anchor, self.station_zoom));

                let lookup = self.loader.load(request);
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let response = lookup.await;
                    let _ = tx.send(MapEvent::DetailResolved(response)).await;
                });
            }
        }
    }

    fn ease_to(&self, target: CameraTarget) {
        self.engine.ease_to(target);
        let _ = self.broadcast_tx.send(MapBroadcast::CameraMoved(target));
    }

    fn publish_popup(&self) {
        let _ = self
            .broadcast_tx
            .send(MapBroadcast::PopupChanged(self.popup.state().clone()));
    }
}
