use crate::queue::DeletionQueue;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{DeletionRequest, Repository};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};
use typed_builder::TypedBuilder;

/// Default coalescing window.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, TypedBuilder)]
pub struct CleanerSettings {
    /// How long requests are buffered before being applied together.
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    flush_interval: Duration,
}

impl Default for CleanerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Lifecycle of the deletion worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Buffering requests and waiting for the next tick.
    Idle,
    /// Applying a batch to the repository.
    Draining,
    /// Stopped. Terminal.
    ShuttingDown,
}

/// The deletion pipeline before it is started.
///
/// Take [`DeletionQueue`] handles with [`Cleaner::queue`], then start the
/// worker with [`Cleaner::run`].
pub struct Cleaner<R: ?Sized> {
    repository: Arc<R>,
    settings: CleanerSettings,
    sender: mpsc::UnboundedSender<DeletionRequest>,
    receiver: mpsc::UnboundedReceiver<DeletionRequest>,
}

impl<R: Repository + ?Sized> Cleaner<R> {
    pub fn new(repository: Arc<R>, settings: CleanerSettings) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            repository,
            settings,
            sender,
            receiver,
        }
    }

    /// Returns a handle for queueing deletion requests.
    pub fn queue(&self) -> DeletionQueue {
        DeletionQueue::new(self.sender.clone())
    }

    /// Spawns the worker task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(self) -> CleanerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(WorkerState::Idle);

        let worker = Worker {
            repository: self.repository,
            flush_interval: self.settings.flush_interval,
            receiver: self.receiver,
            shutdown: shutdown_rx,
            state: state_tx,
            buffer: Vec::new(),
        };

        CleanerHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            task: tokio::spawn(worker.run()),
        }
    }
}

/// Owner handle of a running worker.
///
/// Dropping the handle stops the worker as well; [`CleanerHandle::shutdown`]
/// additionally waits for it to finish.
#[derive(Debug)]
pub struct CleanerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<WorkerState>,
    task: JoinHandle<()>,
}

impl CleanerHandle {
    /// Returns the current worker state.
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Returns a receiver observing worker state changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.clone()
    }

    /// Signals the worker to stop and waits for it.
    ///
    /// Requests already queued are flushed once more before the worker
    /// exits; requests queued after this call are lost.
    pub async fn shutdown(self) {
        if self.shutdown.send(true).is_err() {
            debug!("deletion worker already stopped");
        }

        if let Err(err) = self.task.await {
            error!(error = %err, "deletion worker terminated abnormally");
        }
    }
}

struct Worker<R: ?Sized> {
    repository: Arc<R>,
    flush_interval: Duration,
    receiver: mpsc::UnboundedReceiver<DeletionRequest>,
    shutdown: watch::Receiver<bool>,
    state: watch::Sender<WorkerState>,
    buffer: Vec<DeletionRequest>,
}

impl<R: Repository + ?Sized> Worker<R> {
    async fn run(mut self) {
        let mut ticker = time::interval_at(
            Instant::now() + self.flush_interval,
            self.flush_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut receiving = true;

        info!(
            flush_interval_ms = self.flush_interval.as_millis() as u64,
            "deletion worker started"
        );

        loop {
            // Ticks take priority over receiving so a steady stream of
            // requests cannot postpone a flush.
            tokio::select! {
                biased;

                // Also fires when the handle was dropped.
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => self.flush().await,
                request = self.receiver.recv(), if receiving => match request {
                    Some(request) => self.buffer.push(request),
                    None => {
                        debug!("all deletion queues dropped");
                        receiving = false;
                    }
                },
            }
        }

        self.transition(WorkerState::ShuttingDown);

        while let Ok(request) = self.receiver.try_recv() {
            self.buffer.push(request);
        }
        if !self.buffer.is_empty() {
            let batch = std::mem::take(&mut self.buffer);
            self.apply(batch).await;
        }

        info!("deletion worker stopped");
    }

    /// Applies everything buffered so far as one batch.
    ///
    /// The buffer is swapped out in one step, so requests received after the
    /// tick fired belong to the next batch.
    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        self.transition(WorkerState::Draining);
        let batch = std::mem::take(&mut self.buffer);
        self.apply(batch).await;
        self.transition(WorkerState::Idle);
    }

    async fn apply(&self, batch: Vec<DeletionRequest>) {
        let ids: usize = batch.iter().map(|request| request.ids.len()).sum();

        match self.repository.delete(&batch).await {
            Ok(()) => debug!(requests = batch.len(), ids, "applied deletion batch"),
            Err(err) => error!(
                error = %err,
                requests = batch.len(),
                ids,
                "failed to apply deletion batch, dropping it"
            ),
        }
    }

    fn transition(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        trace!(?previous, ?next, "deletion worker state changed");
    }
}
