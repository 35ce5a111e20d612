mod compute;
mod network;
mod service;

pub use compute::{factorial, ComputeFn};
pub use network::{Connection, ValueFrame, SENTINEL};
pub use service::{
    setup_tracing, AppError, AppResult, Daemon, LogConfig, NetworkConfig, ServeMode, Server,
    ServerConfig, ServerStats, ServiceConfig, Shutdown, TracingGuard,
};
