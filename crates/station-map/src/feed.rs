//! DebouncedFeedController — owns the live feed URL.
//!
//! Every move event recomputes a candidate URL and restarts the settle
//! timer.  The candidate only becomes the committed `FeedUrl` once no newer
//! viewport has arrived for a full interval, so a continuous pan produces a
//! single refetch for the viewport the user stopped at.
//!
//! The timer is a deadline, not a spawned task: the owning event loop sleeps
//! until [`DebouncedFeedController::deadline`] and then calls
//! [`DebouncedFeedController::settle`].  Replacing the pending candidate is the
//! cancellation.

use std::fmt;

use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use station_proto::source_url::station_url;
use station_proto::Viewport;

/// The URL currently driving the engine's live source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUrl(String);

impl FeedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct PendingCommit {
    url: String,
    deadline: Instant,
}

#[derive(Debug)]
pub struct DebouncedFeedController {
    base_url: String,
    interval: Duration,
    committed: Option<FeedUrl>,
    pending: Option<PendingCommit>,
    /// Number of commits so far.
    commits: u64,
}

impl DebouncedFeedController {
    pub fn new(base_url: impl Into<String>, interval: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            interval,
            committed: None,
            pending: None,
            commits: 0,
        }
    }

    pub fn on_viewport_changed(&mut self, viewport: &Viewport) {
        self.on_viewport_changed_at(viewport, Instant::now());
    }

    pub fn on_viewport_changed_at(&mut self, viewport: &Viewport, now: Instant) {
        let url = station_url(&self.base_url, viewport);
        if let Some(superseded) = self.pending.take() {
            debug!("feed: dropping unsettled candidate {}", superseded.url);
        }
        self.pending = Some(PendingCommit {
            url,
            deadline: now + self.interval,
        });
    }

    /// When the pending candidate settles, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Commit the pending candidate if its deadline has passed.
    ///
    /// Returns the newly committed URL; `None` when nothing was due.
    pub fn settle(&mut self, now: Instant) -> Option<&FeedUrl> {
        match &self.pending {
            Some(p) if p.deadline <= now => {}
            _ => return None,
        }
        let pending = self.pending.take()?;
        info!("feed: committing {}", pending.url);
        self.commits += 1;
        self.committed = Some(FeedUrl(pending.url));
        self.committed.as_ref()
    }

    pub fn current(&self) -> Option<&FeedUrl> {
        self.committed.as_ref()
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }
}

/// Sleep until the debounce deadline; never resolves when nothing is pending.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
