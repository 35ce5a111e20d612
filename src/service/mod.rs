pub use app_error::AppError;
pub use app_error::AppResult;
pub use config::{LogConfig, NetworkConfig, ServeMode, ServerConfig, ServiceConfig};
pub use daemon::Daemon;
pub use server::{Server, ServerStats};
pub use shutdown::Shutdown;
pub use tracing_config::{setup_tracing, TracingGuard};

mod app_error;
mod config;
mod daemon;
mod reaper;
mod server;
mod shutdown;
mod tracing_config;
