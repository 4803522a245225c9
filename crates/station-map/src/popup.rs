//! PopupStateMachine — what the detail popup shows, keyed to one request.
//!
//! ```text
//!  Closed ──click station──▶ Loading ──matching response──▶ Loaded
//!    ▲                         │  └────matching failure───▶ Failed
//!    └──────── dismiss ────────┴── (from any open state)
//! ```
//!
//! Clicking another station from any state starts a fresh `Loading` with a
//! new request id.  A response is applied only while the popup is `Loading`
//! the very request that produced it; everything else is dropped.

use tracing::{debug, warn};

use station_proto::{LngLat, StationDetail};

use crate::detail::{DetailRequest, DetailResponse, RequestId};

/// Text shown when the detail lookup gave up.
pub const DETAILS_UNAVAILABLE: &str = "details unavailable";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PopupState {
    #[default]
    Closed,
    Loading {
        request: DetailRequest,
        anchor: LngLat,
    },
    Loaded {
        request: DetailRequest,
        anchor: LngLat,
        detail: StationDetail,
    },
    Failed {
        request: DetailRequest,
        anchor: LngLat,
        reason: String,
    },
}

impl PopupState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn request(&self) -> Option<&DetailRequest> {
        match self {
            Self::Closed => None,
            Self::Loading { request, .. }
            | Self::Loaded { request, .. }
            | Self::Failed { request, .. } => Some(request),
        }
    }

    pub fn anchor(&self) -> Option<LngLat> {
        match self {
            Self::Closed => None,
            Self::Loading { anchor, .. }
            | Self::Loaded { anchor, .. }
            | Self::Failed { anchor, .. } => Some(*anchor),
        }
    }

    /// Popup body, line by line.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Closed => Vec::new(),
            Self::Loading { .. } => vec!["Loading...".to_string()],
            Self::Loaded { detail, .. } => detail.display_lines(),
            Self::Failed { .. } => vec![DETAILS_UNAVAILABLE.to_string()],
        }
    }
}

#[derive(Debug, Default)]
pub struct PopupStateMachine {
    state: PopupState,
    last_id: u64,
}

impl PopupStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PopupState {
        &self.state
    }

    /// Enter `Loading` for a station, abandoning whatever was shown before.
    pub fn open(&mut self, beacon_name: &str, anchor: LngLat) -> DetailRequest {
        self.last_id += 1;
        let request = DetailRequest {
            id: RequestId(self.last_id),
            beacon_name: beacon_name.to_string(),
        };
        if let Some(old) = self.state.request() {
            debug!(
                "popup: {} (#{}) replaced by {}",
                old.beacon_name, old.id.0, beacon_name
            );
        }
        self.state = PopupState::Loading {
            request: request.clone(),
            anchor,
        };
        request
    }

    /// User dismissed the popup.  Returns `true` if it was open.
    pub fn close(&mut self) -> bool {
        let was_open = !self.state.is_closed();
        self.state = PopupState::Closed;
        was_open
    }

    /// Apply a finished detail lookup.  Returns `true` if the state changed.
    pub fn apply(&mut self, response: DetailResponse) -> bool {
        let PopupState::Loading { request, anchor } = &self.state else {
            debug!(
                "popup: dropping response for {} (#{}), popup not loading",
                response.request.beacon_name, response.request.id.0
            );
            return false;
        };
        if *request != response.request {
            debug!(
                "popup: dropping stale response for {} (#{}), current is {} (#{})",
                response.request.beacon_name,
                response.request.id.0,
                request.beacon_name,
                request.id.0
            );
            return false;
        }

        let (request, anchor) = (request.clone(), *anchor);
        self.state = match response.result {
            Ok(detail) => PopupState::Loaded {
                request,
                anchor,
                detail,
            },
            Err(e) => {
                warn!("popup: details for {} unavailable: {}", request.beacon_name, e);
                PopupState::Failed {
                    request,
                    anchor,
                    reason: e.to_string(),
                }
            }
        };
        true
    }
}
