use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use station_proto::source_url::FEED_PATH;
use station_proto::{LngLat, Viewport};

use crate::catalog::Catalog;

#[derive(Debug, Error, PartialEq)]
pub enum BoundsError {
    #[error("No bounds provided")]
    Missing,
    #[error("Invalid bounds format")]
    Invalid,
}

impl IntoResponse for BoundsError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Parse `swLng,swLat,neLng,neLat`.
pub fn parse_bounds(raw: Option<&str>) -> Result<Viewport, BoundsError> {
    let raw = raw.filter(|s| !s.is_empty()).ok_or(BoundsError::Missing)?;
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| BoundsError::Invalid)?;
    match parts[..] {
        [sw_lng, sw_lat, ne_lng, ne_lat] if parts.iter().all(|v| v.is_finite()) => Ok(
            Viewport::new(LngLat::new(sw_lng, sw_lat), LngLat::new(ne_lng, ne_lat), 0.0),
        ),
        _ => Err(BoundsError::Invalid),
    }
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    bounds: Option<String>,
}

pub fn router(catalog: Arc<Catalog>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route(FEED_PATH, get(stations_in_bounds))
        .route("/station/:file", get(station_detail))
        .layer(cors)
        .with_state(catalog)
}

pub async fn serve(listener: TcpListener, catalog: Arc<Catalog>) -> anyhow::Result<()> {
    info!(
        "station server listening on http://{} ({} stations)",
        listener.local_addr()?,
        catalog.len()
    );
    axum::serve(listener, router(catalog)).await?;
    Ok(())
}

async fn stations_in_bounds(
    State(catalog): State<Arc<Catalog>>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, BoundsError> {
    let bounds = parse_bounds(query.bounds.as_deref())?;
    let collection = catalog.within(&bounds);
    debug!(
        "feed: {} stations in {:?}",
        collection.features.len(),
        query.bounds
    );
    Ok(Json(collection).into_response())
}

async fn station_detail(
    State(catalog): State<Arc<Catalog>>,
    Path(file): Path<String>,
) -> Response {
    let station = file
        .strip_suffix(".json")
        .and_then(|beacon| catalog.get(beacon));
    match station {
        Some(s) => Json(s.detail()).into_response(),
        None => {
            debug!("detail: no station for {}", file);
            (StatusCode::NOT_FOUND, Json(serde_json::Value::Null)).into_response()
        }
    }
}
