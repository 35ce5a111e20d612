use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tokio::sync::{broadcast, mpsc};
use tokio::{runtime, signal};
use tracing::{error, info, trace};

use crate::compute::{factorial, ComputeFn};
use crate::service::Server;
use crate::AppResult;

use super::config::ServerConfig;
use super::server::ServerStats;

/// Process lifecycle around the TCP server.
///
/// Owns runtime construction, signal handling and the graceful shutdown
/// sequence. `start` blocks the calling thread until the server stops,
/// every worker exit has been collected, and the final counters are
/// logged.
pub struct Daemon {
    config: Arc<ServerConfig>,
    compute: ComputeFn,
}

impl Daemon {
    /// A daemon serving the default factorial computation.
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Daemon {
            config,
            compute: factorial,
        }
    }

    pub fn start(&self) -> AppResult<()> {
        let (notify_shutdown, _) = broadcast::channel(1);
        let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel(1);

        // startup tokio runtime
        let rt = runtime::Builder::new_multi_thread()
            .worker_threads(num_cpus::get())
            .enable_all()
            .build()?;

        let stats = Arc::new(ServerStats::default());

        let run_result = rt.block_on(Self::run_tcp_server(
            self.config.clone(),
            self.compute,
            stats.clone(),
            notify_shutdown.clone(),
            shutdown_complete_tx,
        ));

        // the accept loop is down; tell every in-flight worker to finish up
        let _ = notify_shutdown.send(());
        // wait for shutdown complete
        trace!("waiting for shutdown complete...");
        rt.block_on(shutdown_complete_rx.recv());
        info!(
            "server shutdown complete: {} connections accepted, {} workers reaped",
            stats.accepted(),
            stats.reaped()
        );

        run_result
    }

    async fn run_tcp_server(
        config: Arc<ServerConfig>,
        compute: ComputeFn,
        stats: Arc<ServerStats>,
        notify_shutdown: broadcast::Sender<()>,
        shutdown_complete_tx: Sender<()>,
    ) -> AppResult<()> {
        let server = match Server::bind(
            &config,
            compute,
            stats,
            notify_shutdown,
            shutdown_complete_tx,
        ) {
            Ok(server) => server,
            Err(err) => {
                error!("failed to start tcp server: {}", err);
                return Err(err);
            }
        };

        tokio::select! {
            res = server.run() => {
                if let Err(err) = res {
                    error!(cause = %err, "server exited with error");
                    return Err(err);
                }
            }
            _ = signal::ctrl_c() => {
                info!("get shutdown signal");
            }
        }

        Ok(())
    }
}
