use tether_core::DeletionRequest;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{trace, warn};

/// Caller-facing handle of the deletion pipeline.
///
/// Queueing is fire-and-forget: it never waits for the worker and reports
/// nothing about the eventual outcome. Cloning is cheap; every clone feeds
/// the same worker.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    sender: UnboundedSender<DeletionRequest>,
}

impl DeletionQueue {
    pub(crate) fn new(sender: UnboundedSender<DeletionRequest>) -> Self {
        Self { sender }
    }

    /// Hands `request` to the worker and returns immediately.
    ///
    /// Empty requests are ignored. Requests queued after the worker stopped
    /// are dropped with a warning.
    pub fn queue(&self, request: DeletionRequest) {
        if request.is_empty() {
            trace!(owner_id = %request.owner_id, "ignoring empty deletion request");
            return;
        }

        if let Err(SendError(request)) = self.sender.send(request) {
            warn!(
                owner_id = %request.owner_id,
                ids = request.ids.len(),
                "deletion worker is not running, dropping request"
            );
        }
    }
}
