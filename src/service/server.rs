use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

use crate::compute::ComputeFn;
use crate::network::{Connection, ValueFrame};
use crate::AppError;
use crate::AppResult;

use super::config::{ServeMode, ServerConfig};
use super::reaper::Reaper;
use super::Shutdown;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide counters for the accept loop and worker supervision.
#[derive(Debug, Default)]
pub struct ServerStats {
    accepted: AtomicU64,
    live_workers: AtomicU64,
    reaped: AtomicU64,
}

impl ServerStats {
    pub fn connection_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::SeqCst);
    }
    pub fn worker_started(&self) {
        self.live_workers.fetch_add(1, Ordering::SeqCst);
    }
    pub fn worker_reaped(&self) {
        self.live_workers.fetch_sub(1, Ordering::SeqCst);
        self.reaped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::SeqCst)
    }
    pub fn live_workers(&self) -> u64 {
        self.live_workers.load(Ordering::SeqCst)
    }
    pub fn reaped(&self) -> u64 {
        self.reaped.load(Ordering::SeqCst)
    }
}

// handler for one session
struct ConnectionHandler {
    _shutdown_complete_tx: mpsc::Sender<()>,
    connection_id: u64,
    connection: Connection,
    compute: ComputeFn,
    shutdown: Shutdown,
}

impl ConnectionHandler {
    /// Runs the session's request/reply loop.
    ///
    /// Each iteration reads one value frame, applies the computation and
    /// flushes the reply. The sentinel ends the session without a reply.
    /// Any read or write failure, including the peer vanishing without the
    /// sentinel, ends the session with an error. The process-wide shutdown
    /// signal stops the loop at either await point; a reply the client is
    /// not reading is abandoned rather than holding up shutdown.
    async fn serve(&mut self) -> AppResult<()> {
        while !self.shutdown.is_shutdown() {
            let frame = tokio::select! {
                res = self.connection.read_value() => res?,
                _ = self.shutdown.recv() => {
                    debug!(
                        "connection {} exits read loop after recv shutdown signal",
                        self.connection_id
                    );
                    return Ok(());
                }
            };

            if frame.is_sentinel() {
                debug!(
                    "connection {} received the session sentinel",
                    self.connection_id
                );
                break;
            }

            let result = (self.compute)(frame.value());
            debug!(
                "connection {} computed {} -> {}",
                self.connection_id,
                frame.value(),
                result
            );
            tokio::select! {
                res = self.connection.send_value(ValueFrame::new(result)) => res?,
                _ = self.shutdown.recv() => {
                    debug!(
                        "connection {} abandons a blocked reply after recv shutdown signal",
                        self.connection_id
                    );
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    mode: ServeMode,
    compute: ComputeFn,
    stats: Arc<ServerStats>,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
}

impl Server {
    /// Binds the listen socket and prepares the server.
    ///
    /// The socket is IPv4, `SO_REUSEADDR` is set, and the backlog comes
    /// from the configuration. Must be called from within a tokio runtime.
    pub fn bind(
        config: &ServerConfig,
        compute: ComputeFn,
        stats: Arc<ServerStats>,
        notify_shutdown: broadcast::Sender<()>,
        shutdown_complete_tx: mpsc::Sender<()>,
    ) -> AppResult<Server> {
        let addr = config.network.socket_addr()?;

        let socket = TcpSocket::new_v4().map_err(|source| AppError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        socket.set_reuseaddr(true).map_err(|source| AppError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        socket.bind(addr).map_err(|source| AppError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let listener = socket
            .listen(config.network.backlog)
            .map_err(|source| AppError::Listen {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(
            "tcp server listening on {} (backlog {}, mode {:?})",
            local_addr, config.network.backlog, config.service.mode
        );

        Ok(Server {
            listener,
            local_addr,
            mode: config.service.mode,
            compute,
            stats,
            limit_connections: Arc::new(Semaphore::new(config.network.max_connection)),
            notify_shutdown,
            shutdown_complete_tx,
        })
    }

    /// The bound address, with the OS-chosen port when the configured port
    /// was `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        self.stats.clone()
    }

    /// Runs the accept loop in the configured mode.
    ///
    /// # Returns
    /// Under normal operation this never returns. It exits with an error
    /// when accepting fails beyond the retry budget, when a worker can no
    /// longer be registered with the reaper, or, in iterative mode, when a
    /// session fails.
    #[tracing::instrument]
    pub async fn run(&self) -> AppResult<()> {
        match self.mode {
            ServeMode::Concurrent => self.run_concurrent().await,
            ServeMode::Iterative => self.run_iterative().await,
        }
    }

    // One supervised worker per connection. The permit bounds the number
    // of live sessions; the stream moves into the worker, so the accept
    // loop holds no handle to it afterwards.
    //
    // Graceful shutdown sequence:
    // 1. The run loop is canceled upon receiving the shutdown signal from
    //    the upper layer, which drops the `WorkerSet`.
    // 2. Each worker keeps serving until it sees the shutdown signal, then
    //    stops reading new requests and exits; its `ExitGuard` notifies
    //    the reaper.
    // 3. Once every guard has fired, the reaper's event channel closes; it
    //    drains the queue, collects the last join handles and exits.
    // 4. The reaper and the workers drop their `shutdown_complete_tx`
    //    senders last, which lets the daemon's final recv return.
    async fn run_concurrent(&self) -> AppResult<()> {
        let (workers, reaper) = Reaper::new(self.stats.clone(), self.shutdown_complete_tx.clone());
        reaper.spawn();

        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .unwrap();

            let (socket, peer) = self.accept().await?;
            self.stats.connection_accepted();

            let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            debug!("accepted connection {} from {}", connection_id, peer);

            let mut handler = ConnectionHandler {
                _shutdown_complete_tx: self.shutdown_complete_tx.clone(),
                connection_id,
                connection: Connection::new(socket, peer),
                compute: self.compute,
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
            };

            let exit_guard = workers.exit_guard(connection_id);
            let handle = tokio::spawn(async move {
                let _exit_guard = exit_guard;
                if let Err(err) = handler.serve().await {
                    error!("connection {} error: {:?}", handler.connection_id, err);
                }
                // whether gracefully or unexpectedly closed, release connection
                drop(permit);
            });

            // a worker that cannot be supervised must not run unobserved
            workers.register(connection_id, handle)?;
        }
    }

    // One session at a time on the accept task. There is no isolation: a
    // session failure takes the whole server down, and waiting clients sit
    // in the backlog until the current session ends.
    async fn run_iterative(&self) -> AppResult<()> {
        loop {
            let (socket, peer) = self.accept().await?;
            self.stats.connection_accepted();

            let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            debug!("serving connection {} from {} inline", connection_id, peer);

            let mut handler = ConnectionHandler {
                _shutdown_complete_tx: self.shutdown_complete_tx.clone(),
                connection_id,
                connection: Connection::new(socket, peer),
                compute: self.compute,
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
            };

            handler.serve().await?;
        }
    }

    async fn accept(&self) -> AppResult<(TcpStream, SocketAddr)> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => return Ok((socket, peer)),
                Err(err) => {
                    if backoff > 64 {
                        return Err(AppError::Accept(format!(
                            "accept tcp server error: {}",
                            err
                        )));
                    }
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        debug!("tcp server dropped");
    }
}
impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        debug!("connection handler dropped");
    }
}
