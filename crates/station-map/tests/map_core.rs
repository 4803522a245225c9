//! MapCore driven end to end against a fake engine and detail source.
//!
//! All tests run on paused time: sleeps advance the clock instantly once
//! every task is idle, so debounce and lookup delays are exact.

mod common;

use std::time::Duration;

use common::fakes::{advance, detail, portland_viewport, FakeDetails, FakeEngine, Harness, BASE};
use station_map::detail::DetailError;
use station_map::popup::PopupState;
use station_map::{EngineError, MapBroadcast, MapEvent, ScreenPoint};
use station_proto::source_url::station_url;
use station_proto::{CameraTarget, ClusterId, LngLat, StationFeature, Viewport};

fn viewport(i: u32) -> Viewport {
    let shift = f64::from(i) * 0.001;
    Viewport::new(
        LngLat::new(-122.7 + shift, 45.5),
        LngLat::new(-122.6 + shift, 45.6),
        12.0,
    )
}

fn popups(broadcasts: &[MapBroadcast]) -> Vec<PopupState> {
    broadcasts
        .iter()
        .filter_map(|b| match b {
            MapBroadcast::PopupChanged(state) => Some(state.clone()),
            _ => None,
        })
        .collect()
}

fn loaded_name(state: &PopupState) -> Option<&str> {
    match state {
        PopupState::Loaded { detail, .. } => detail.station_name.as_deref(),
        _ => None,
    }
}

const CLUSTER_AT: ScreenPoint = ScreenPoint::new(5, 5);
const STATION_AT: ScreenPoint = ScreenPoint::new(3, 3);
const OTHER_STATION_AT: ScreenPoint = ScreenPoint::new(7, 2);
const CLUSTER_ANCHOR: LngLat = LngLat::new(-122.65, 45.55);
const STATION_ANCHOR: LngLat = LngLat::new(-122.68, 45.52);

// ── Feed debounce ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn initial_viewport_is_committed_after_settling() {
    let engine = FakeEngine::new(portland_viewport());
    let mut h = Harness::start(engine.clone(), FakeDetails::new());

    advance(5).await;
    assert!(engine.sources().is_empty());

    advance(10).await;
    let expected = station_url(BASE, &portland_viewport());
    assert_eq!(engine.sources(), vec![("stations".to_string(), expected.clone())]);
    assert!(h
        .drain()
        .iter()
        .any(|b| matches!(b, MapBroadcast::FeedCommitted(url) if url.as_str() == expected)));
}

#[tokio::test(start_paused = true)]
async fn continuous_pan_commits_once_for_the_last_viewport() {
    let engine = FakeEngine::new(portland_viewport());
    let h = Harness::start(engine.clone(), FakeDetails::new());

    for i in 0..50 {
        h.send(MapEvent::ViewportChanged(viewport(i))).await;
        advance(1).await;
    }
    assert!(engine.sources().is_empty(), "nothing commits mid-pan");

    advance(20).await;
    assert_eq!(
        engine.sources(),
        vec![("stations".to_string(), station_url(BASE, &viewport(49)))]
    );

    advance(1000).await;
    assert_eq!(engine.sources().len(), 1, "no further commits once settled");
}

#[tokio::test(start_paused = true)]
async fn separate_moves_each_commit() {
    let engine = FakeEngine::new(portland_viewport());
    let h = Harness::start(engine.clone(), FakeDetails::new());
    advance(20).await;

    h.send(MapEvent::ViewportChanged(viewport(1))).await;
    advance(20).await;
    h.send(MapEvent::ViewportChanged(viewport(2))).await;
    advance(20).await;

    let urls: Vec<String> = engine.sources().into_iter().map(|(_, url)| url).collect();
    assert_eq!(
        urls,
        vec![
            station_url(BASE, &portland_viewport()),
            station_url(BASE, &viewport(1)),
            station_url(BASE, &viewport(2)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn identical_viewport_recommits_for_a_live_refetch() {
    let engine = FakeEngine::new(portland_viewport());
    let mut h = Harness::start(engine.clone(), FakeDetails::new());
    advance(20).await;

    h.send(MapEvent::ViewportChanged(portland_viewport())).await;
    advance(20).await;

    let sources = engine.sources();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0], sources[1]);
    assert_eq!(sources[1].1, station_url(BASE, &portland_viewport()));

    let commits = h
        .drain()
        .into_iter()
        .filter(|b| matches!(b, MapBroadcast::FeedCommitted(_)))
        .count();
    assert_eq!(commits, 2);
}

// ── Cluster drill-down ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cluster_click_eases_to_expansion_zoom_without_popup() {
    let engine = FakeEngine::new(portland_viewport());
    let details = FakeDetails::new();
    engine.place(
        CLUSTER_AT,
        StationFeature::cluster(CLUSTER_ANCHOR, ClusterId(1), 5),
    );
    engine.expansion(ClusterId(1), Duration::from_millis(3), Ok(15.0));

    let mut h = Harness::start(engine.clone(), details.clone());
    advance(20).await;
    assert_eq!(engine.sources().len(), 1);
    h.drain();

    h.send(MapEvent::Click(CLUSTER_AT)).await;
    advance(10).await;

    assert_eq!(engine.eases(), vec![CameraTarget::new(CLUSTER_ANCHOR, 15.0)]);
    assert_eq!(engine.cluster_lookups(), vec![ClusterId(1)]);
    assert!(details.calls().is_empty(), "cluster click never fetches details");

    let broadcasts = h.drain();
    assert!(popups(&broadcasts).is_empty(), "popup stays closed");
    assert!(broadcasts.contains(&MapBroadcast::CameraMoved(CameraTarget::new(
        CLUSTER_ANCHOR,
        15.0
    ))));
}

#[tokio::test(start_paused = true)]
async fn failed_cluster_lookup_leaves_camera_alone() {
    let engine = FakeEngine::new(portland_viewport());
    engine.place(
        CLUSTER_AT,
        StationFeature::cluster(CLUSTER_ANCHOR, ClusterId(2), 12),
    );
    engine.expansion(
        ClusterId(2),
        Duration::from_millis(1),
        Err(EngineError::Lookup("source removed".into())),
    );

    let mut h = Harness::start(engine.clone(), FakeDetails::new());
    h.send(MapEvent::Click(CLUSTER_AT)).await;
    advance(10).await;

    assert!(engine.eases().is_empty());
    assert!(popups(&h.drain()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn later_click_supersedes_slow_cluster_lookup() {
    let engine = FakeEngine::new(portland_viewport());
    let details = FakeDetails::new();
    engine.place(
        CLUSTER_AT,
        StationFeature::cluster(CLUSTER_ANCHOR, ClusterId(1), 5),
    );
    engine.expansion(ClusterId(1), Duration::from_millis(100), Ok(15.0));
    engine.place(STATION_AT, StationFeature::station(STATION_ANCHOR, "beacon-42"));
    details.answer(
        "beacon-42",
        Duration::from_millis(5),
        Ok(detail("Main St Charger", "Portland")),
    );

    let h = Harness::start(engine.clone(), details.clone());
    h.send(MapEvent::Click(CLUSTER_AT)).await;
    advance(10).await;
    h.send(MapEvent::Click(STATION_AT)).await;
    advance(200).await;

    // Only the station ease; the cluster answer arrived after it and was dropped.
    assert_eq!(engine.eases(), vec![CameraTarget::new(STATION_ANCHOR, 17.0)]);
}

#[tokio::test(start_paused = true)]
async fn viewport_moves_do_not_cancel_cluster_lookup() {
    let engine = FakeEngine::new(portland_viewport());
    engine.place(
        CLUSTER_AT,
        StationFeature::cluster(CLUSTER_ANCHOR, ClusterId(1), 5),
    );
    engine.expansion(ClusterId(1), Duration::from_millis(30), Ok(16.0));

    let h = Harness::start(engine.clone(), FakeDetails::new());
    h.send(MapEvent::Click(CLUSTER_AT)).await;
    advance(5).await;
    h.send(MapEvent::ViewportChanged(viewport(3))).await;
    advance(50).await;

    assert_eq!(engine.eases(), vec![CameraTarget::new(CLUSTER_ANCHOR, 16.0)]);
}

// ── Station popup ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn station_click_loads_popup() {
    let engine = FakeEngine::new(portland_viewport());
    let details = FakeDetails::new();
    engine.place(STATION_AT, StationFeature::station(STATION_ANCHOR, "beacon-42"));
    details.answer(
        "beacon-42",
        Duration::from_millis(50),
        Ok(detail("Main St Charger", "Portland")),
    );

    let mut h = Harness::start(engine.clone(), details.clone());
    h.send(MapEvent::Click(STATION_AT)).await;
    advance(1).await;

    let early = h.drain();
    let states = popups(&early);
    assert_eq!(states.len(), 1);
    assert!(states[0].is_loading());
    assert_eq!(
        states[0].request().map(|r| r.beacon_name.as_str()),
        Some("beacon-42")
    );
    assert_eq!(states[0].anchor(), Some(STATION_ANCHOR));
    assert_eq!(engine.eases(), vec![CameraTarget::new(STATION_ANCHOR, 17.0)]);

    advance(60).await;
    let states = popups(&h.drain());
    assert_eq!(states.len(), 1);
    assert_eq!(loaded_name(&states[0]), Some("Main St Charger"));
    assert_eq!(states[0].lines(), vec!["Main St Charger", "Portland"]);

    assert_eq!(details.calls(), vec!["beacon-42"]);
    assert!(engine.cluster_lookups().is_empty(), "station click never expands clusters");
}

#[tokio::test(start_paused = true)]
async fn late_response_for_previous_station_is_dropped() {
    let engine = FakeEngine::new(portland_viewport());
    let details = FakeDetails::new();
    engine.place(STATION_AT, StationFeature::station(STATION_ANCHOR, "slow"));
    engine.place(
        OTHER_STATION_AT,
        StationFeature::station(LngLat::new(-122.61, 45.59), "fast"),
    );
    details.answer("slow", Duration::from_millis(100), Ok(detail("Slow One", "Portland")));
    details.answer("fast", Duration::from_millis(10), Ok(detail("Fast One", "Beaverton")));

    let mut h = Harness::start(engine.clone(), details.clone());
    h.send(MapEvent::Click(STATION_AT)).await;
    advance(5).await;
    h.send(MapEvent::Click(OTHER_STATION_AT)).await;
    advance(300).await;

    let states = popups(&h.drain());
    let last = states.last().unwrap();
    assert_eq!(loaded_name(last), Some("Fast One"));
    assert!(
        states.iter().all(|s| loaded_name(s) != Some("Slow One")),
        "the first station's answer never reaches the popup"
    );
}

#[tokio::test(start_paused = true)]
async fn response_after_dismiss_keeps_popup_closed() {
    let engine = FakeEngine::new(portland_viewport());
    let details = FakeDetails::new();
    engine.place(STATION_AT, StationFeature::station(STATION_ANCHOR, "beacon-42"));
    details.answer(
        "beacon-42",
        Duration::from_millis(40),
        Ok(detail("Main St Charger", "Portland")),
    );

    let mut h = Harness::start(engine.clone(), details.clone());
    h.send(MapEvent::Click(STATION_AT)).await;
    advance(5).await;
    h.send(MapEvent::DismissPopup).await;
    advance(100).await;

    let states = popups(&h.drain());
    assert_eq!(states.len(), 2, "loading, then closed; nothing after");
    assert!(states[0].is_loading());
    assert!(states[1].is_closed());
}

#[tokio::test(start_paused = true)]
async fn click_on_empty_map_closes_popup() {
    let engine = FakeEngine::new(portland_viewport());
    let details = FakeDetails::new();
    engine.place(STATION_AT, StationFeature::station(STATION_ANCHOR, "beacon-42"));
    details.answer(
        "beacon-42",
        Duration::from_millis(1),
        Ok(detail("Main St Charger", "Portland")),
    );

    let mut h = Harness::start(engine.clone(), details);
    h.send(MapEvent::Click(STATION_AT)).await;
    advance(10).await;
    h.drain();

    h.send(MapEvent::Click(ScreenPoint::new(40, 12))).await;
    advance(1).await;
    let states = popups(&h.drain());
    assert_eq!(states, vec![PopupState::Closed]);
}

#[tokio::test(start_paused = true)]
async fn missing_station_shows_details_unavailable() {
    let engine = FakeEngine::new(portland_viewport());
    let details = FakeDetails::new();
    engine.place(STATION_AT, StationFeature::station(STATION_ANCHOR, "gone"));
    details.answer("gone", Duration::from_millis(5), Err(DetailError::NotFound));

    let mut h = Harness::start(engine.clone(), details.clone());
    h.send(MapEvent::Click(STATION_AT)).await;
    advance(50).await;

    let states = popups(&h.drain());
    assert!(matches!(states.last(), Some(PopupState::Failed { .. })));
    assert_eq!(states.last().unwrap().lines(), vec!["details unavailable"]);
    assert_eq!(details.calls().len(), 1, "not-found is final");
}

#[tokio::test(start_paused = true)]
async fn unanswered_lookup_fails_after_timeout_and_retry() {
    let engine = FakeEngine::new(portland_viewport());
    let details = FakeDetails::new();
    engine.place(STATION_AT, StationFeature::station(STATION_ANCHOR, "hung"));

    let mut h = Harness::start(engine.clone(), details.clone());
    h.send(MapEvent::Click(STATION_AT)).await;

    // One 10s attempt plus backoff: still loading.
    advance(10_100).await;
    assert!(popups(&h.drain()).iter().all(PopupState::is_loading));

    advance(10_500).await;
    let states = popups(&h.drain());
    assert!(matches!(states.last(), Some(PopupState::Failed { .. })));
    assert_eq!(details.calls().len(), 2);
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let engine = FakeEngine::new(portland_viewport());
    let h = Harness::start(engine, FakeDetails::new());
    h.send(MapEvent::Shutdown).await;
    let result = tokio::time::timeout(Duration::from_secs(1), h.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
