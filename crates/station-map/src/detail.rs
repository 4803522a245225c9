//! StationDetailLoader — fetches one station's attributes for the popup.
//!
//! Each lookup carries the `DetailRequest` that the popup recorded when it
//! entered `Loading`; the response echoes it back so the popup can tell
//! whether the answer is still wanted.  The loader never touches popup state
//! itself.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use station_proto::config::DetailConfig;
use station_proto::source_url::detail_url;
use station_proto::StationDetail;

/// Monotonic id assigned by the popup to every lookup it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub id: RequestId,
    pub beacon_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailResponse {
    pub request: DetailRequest,
    pub result: Result<StationDetail, DetailError>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetailError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("malformed detail payload: {0}")]
    Decode(String),
    #[error("station not found")]
    NotFound,
    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

/// Where station details come from.
pub trait DetailSource: Send + Sync {
    fn fetch(&self, beacon_name: &str) -> BoxFuture<'static, Result<StationDetail, DetailError>>;
}

/// `GET {base}/station/{beacon}.json`
#[derive(Debug, Clone)]
pub struct HttpDetailSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDetailSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl DetailSource for HttpDetailSource {
    fn fetch(&self, beacon_name: &str) -> BoxFuture<'static, Result<StationDetail, DetailError>> {
        let client = self.client.clone();
        let url = detail_url(&self.base_url, beacon_name);
        async move {
            debug!("detail: GET {}", url);
            let response = client
                .get(&url)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| DetailError::Transport(e.to_string()))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(DetailError::NotFound);
            }
            if !status.is_success() {
                return Err(DetailError::Status(status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| DetailError::Transport(e.to_string()))?;
            parse_detail(&body)
        }
        .boxed()
    }
}

/// Decode a detail body.  An empty body, `null` or an object with no usable
/// fields all mean the station has no data.
pub fn parse_detail(body: &[u8]) -> Result<StationDetail, DetailError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DetailError::NotFound);
    }
    let detail: Option<StationDetail> =
        serde_json::from_slice(body).map_err(|e| DetailError::Decode(e.to_string()))?;
    match detail {
        Some(d) if !d.is_empty() => Ok(d),
        _ => Err(DetailError::NotFound),
    }
}

/// Wraps a [`DetailSource`] with a per-attempt timeout and bounded retries.
#[derive(Clone)]
pub struct StationDetailLoader {
    source: Arc<dyn DetailSource>,
    timeout: Duration,
    attempts: u32,
    backoff: Duration,
}

impl StationDetailLoader {
    pub fn new(source: Arc<dyn DetailSource>, config: &DetailConfig) -> Self {
        Self::with_policy(
            source,
            config.timeout(),
            config.attempts,
            config.retry_backoff(),
        )
    }

    pub fn with_policy(
        source: Arc<dyn DetailSource>,
        timeout: Duration,
        attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            source,
            timeout,
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Run the lookup for `request`.  Always resolves; failures are carried
    /// in the response.  Not-found is final and is not retried.
    pub fn load(&self, request: DetailRequest) -> impl Future<Output = DetailResponse> + Send + 'static {
        let source = Arc::clone(&self.source);
        let (timeout, attempts, backoff) = (self.timeout, self.attempts, self.backoff);

        async move {
            let mut last_err = DetailError::NotFound;
            for attempt in 1..=attempts {
                let result = match tokio::time::timeout(timeout, source.fetch(&request.beacon_name)).await {
                    Ok(result) => result,
                    Err(_) => Err(DetailError::Timeout(timeout)),
                };
                match result {
                    Ok(detail) => {
                        return DetailResponse {
                            request,
                            result: Ok(detail),
                        }
                    }
                    Err(DetailError::NotFound) => {
                        return DetailResponse {
                            request,
                            result: Err(DetailError::NotFound),
                        }
                    }
                    Err(e) => {
                        warn!(
                            "detail {} attempt {}/{} failed: {}",
                            request.beacon_name, attempt, attempts, e
                        );
                        last_err = e;
                        if attempt < attempts {
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
            }
            DetailResponse {
                request,
                result: Err(last_err),
            }
        }
    }
}
