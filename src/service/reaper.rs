use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::server::ServerStats;
use crate::AppError;
use crate::AppResult;

/// Supervision traffic between the accept loop, the workers and the
/// reaper. `Spawned` registers a worker, `Exited` announces that one is
/// gone.
#[derive(Debug)]
enum WorkerEvent {
    Spawned { id: u64, handle: JoinHandle<()> },
    Exited { id: u64 },
}

/// Registration side of worker supervision.
///
/// The accept loop keeps one of these, registers every worker it spawns
/// and hands each worker an [`ExitGuard`]. Cloning shares the same reaper.
#[derive(Debug, Clone)]
pub struct WorkerSet {
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerSet {
    /// Registers a spawned worker with the reaper.
    ///
    /// Fails only when the reaper itself is gone, which leaves exits
    /// uncollectable. Callers treat that as fatal.
    pub fn register(&self, id: u64, handle: JoinHandle<()>) -> AppResult<()> {
        self.events_tx
            .send(WorkerEvent::Spawned { id, handle })
            .map_err(|_| {
                AppError::Supervision(format!("reaper is gone, cannot track worker {}", id))
            })
    }

    /// A guard the worker task must own. Dropping it, on any exit path
    /// including a panic unwind, notifies the reaper.
    pub fn exit_guard(&self, id: u64) -> ExitGuard {
        ExitGuard {
            id,
            events_tx: self.events_tx.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ExitGuard {
    id: u64,
    events_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        // the reaper may already be gone during teardown, nothing to do then
        let _ = self.events_tx.send(WorkerEvent::Exited { id: self.id });
    }
}

/// Collects every worker exit so that no session ends unobserved.
///
/// The reaper sleeps on its event channel. Each wakeup drains everything
/// already queued, so any number of simultaneous exits is absorbed in one
/// pass, then awaits the finished workers' join handles to log their
/// outcome. A panic in a worker surfaces here with its payload; it never
/// propagates past the task boundary.
///
/// The reaper exits when every `WorkerSet` and `ExitGuard` is gone and the
/// queue is drained. It holds the shutdown-completion sender until then,
/// so process shutdown cannot finish while exits remain uncollected.
#[derive(Debug)]
pub struct Reaper {
    events_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    tracked: HashMap<u64, JoinHandle<()>>,
    // exit notices whose registration has not arrived yet; a worker can
    // finish before the accept loop gets to register it
    premature: Vec<u64>,
    stats: Arc<ServerStats>,
    _shutdown_complete_tx: mpsc::Sender<()>,
}

impl Reaper {
    pub fn new(
        stats: Arc<ServerStats>,
        shutdown_complete_tx: mpsc::Sender<()>,
    ) -> (WorkerSet, Reaper) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let workers = WorkerSet { events_tx };
        let reaper = Reaper {
            events_rx,
            tracked: HashMap::new(),
            premature: Vec::new(),
            stats,
            _shutdown_complete_tx: shutdown_complete_tx,
        };
        (workers, reaper)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            self.apply(event);
            // drain whatever else is already queued before collecting
            while let Ok(event) = self.events_rx.try_recv() {
                self.apply(event);
            }
            self.collect().await;
        }

        // channel closed: all guards have fired, sweep up any stragglers
        let leftover: Vec<u64> = self.tracked.keys().copied().collect();
        for id in leftover {
            if let Some(handle) = self.tracked.remove(&id) {
                self.reap(id, handle).await;
            }
        }
        debug!("reaper exiting, {} workers reaped", self.stats.reaped());
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Spawned { id, handle } => {
                self.tracked.insert(id, handle);
                self.stats.worker_started();
            }
            WorkerEvent::Exited { id } => {
                self.premature.push(id);
            }
        }
    }

    async fn collect(&mut self) {
        let finished = std::mem::take(&mut self.premature);
        for id in finished {
            match self.tracked.remove(&id) {
                Some(handle) => self.reap(id, handle).await,
                // exit raced ahead of its registration, keep it parked
                // until the Spawned event lands
                None => self.premature.push(id),
            }
        }
    }

    async fn reap(&mut self, id: u64, handle: JoinHandle<()>) {
        match handle.await {
            Ok(()) => debug!("reaped worker {}, exited normally", id),
            Err(join_error) => {
                if join_error.is_panic() {
                    log_worker_panic(id, join_error);
                } else {
                    error!("worker {} failed with non-panic error", id);
                }
            }
        }
        self.stats.worker_reaped();
    }
}

fn log_worker_panic(worker_id: u64, err: tokio::task::JoinError) {
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        error!("worker {worker_id} panicked with message: {message}");
    } else if let Some(message) = payload.downcast_ref::<String>() {
        error!("worker {worker_id} panicked with message: {message}");
    } else {
        error!(
            "worker {worker_id} panicked with an unknown type: {}",
            get_type_name(&payload)
        );
    }
}

#[inline]
fn get_type_name<R>(_: &R) -> &'static str {
    type_name::<R>()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn collects_normal_and_panicked_workers() {
        let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel(1);
        let stats = Arc::new(ServerStats::default());
        let (workers, reaper) = Reaper::new(stats.clone(), shutdown_complete_tx);
        reaper.spawn();

        let guard = workers.exit_guard(1);
        let handle = tokio::spawn(async move {
            let _guard = guard;
        });
        workers.register(1, handle).unwrap();

        let guard = workers.exit_guard(2);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("worker blew up");
        });
        workers.register(2, handle).unwrap();

        // the reaper holds the completion sender until both exits are
        // collected, so recv unblocks only after the full drain
        drop(workers);
        assert!(shutdown_complete_rx.recv().await.is_none());
        assert_eq!(stats.reaped(), 2);
        assert_eq!(stats.live_workers(), 0);
    }

    #[tokio::test]
    async fn exit_before_registration_is_parked_until_matched() {
        let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel(1);
        let stats = Arc::new(ServerStats::default());
        let (workers, reaper) = Reaper::new(stats.clone(), shutdown_complete_tx);
        reaper.spawn();

        // let the worker finish, and its guard fire, before registering it
        let guard = workers.exit_guard(7);
        let handle = tokio::spawn(async move {
            drop(guard);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        workers.register(7, handle).unwrap();

        drop(workers);
        assert!(shutdown_complete_rx.recv().await.is_none());
        assert_eq!(stats.reaped(), 1);
    }

    #[tokio::test]
    async fn registration_fails_once_the_reaper_is_gone() {
        let (shutdown_complete_tx, _shutdown_complete_rx) = mpsc::channel(1);
        let stats = Arc::new(ServerStats::default());
        let (workers, reaper) = Reaper::new(stats, shutdown_complete_tx);
        drop(reaper);

        let handle = tokio::spawn(async {});
        let err = workers.register(9, handle).unwrap_err();
        assert!(matches!(err, AppError::Supervision(_)));
    }
}
