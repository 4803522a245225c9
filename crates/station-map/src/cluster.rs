//! ClusterExpansionResolver — turns a cluster click into a camera move.
//!
//! The expansion-zoom lookup is asynchronous and may fail.  Only the most
//! recent click is honoured: any later click supersedes an unresolved lookup,
//! so a slow answer cannot yank the camera away from where the user went next.

use tracing::debug;

use station_proto::{CameraTarget, ClusterId, LngLat};

use crate::engine::EngineError;

/// Token for one in-flight expansion lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterRequest {
    pub seq: u64,
    pub cluster_id: ClusterId,
    pub anchor: LngLat,
}

#[derive(Debug, Default)]
pub struct ClusterExpansionResolver {
    next_seq: u64,
    pending: Option<ClusterRequest>,
}

impl ClusterExpansionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, cluster_id: ClusterId, anchor: LngLat) -> ClusterRequest {
        self.next_seq += 1;
        let request = ClusterRequest {
            seq: self.next_seq,
            cluster_id,
            anchor,
        };
        self.pending = Some(request);
        request
    }

    /// Forget the pending lookup; its answer will be ignored.
    pub fn supersede(&mut self) {
        if let Some(old) = self.pending.take() {
            debug!("cluster {}: lookup superseded by a newer click", old.cluster_id);
        }
    }

    pub fn pending(&self) -> Option<&ClusterRequest> {
        self.pending.as_ref()
    }

    /// Apply a finished lookup.  Returns the camera move to issue, if any.
    pub fn resolve(
        &mut self,
        request: ClusterRequest,
        result: Result<f64, EngineError>,
    ) -> Option<CameraTarget> {
        if self.pending.map(|p| p.seq) != Some(request.seq) {
            debug!(
                "cluster {}: dropping stale expansion result",
                request.cluster_id
            );
            return None;
        }
        self.pending = None;

        match result {
            Ok(zoom) if zoom.is_finite() => Some(CameraTarget::new(request.anchor, zoom)),
            Ok(zoom) => {
                debug!("cluster {}: ignoring non-finite zoom {}", request.cluster_id, zoom);
                None
            }
            Err(e) => {
                debug!("cluster {}: expansion lookup failed: {}", request.cluster_id, e);
                None
            }
        }
    }
}
