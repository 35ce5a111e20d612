extern crate config as _;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

fn default_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_backlog() -> u32 {
    5
}
fn default_max_connection() -> usize {
    1024
}
fn default_file_prefix() -> String {
    "factord.log".to_string()
}

/// How the server schedules sessions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServeMode {
    /// One supervised worker per connection; sessions run concurrently and
    /// a session failure never touches the listener.
    #[default]
    Concurrent,
    /// One session at a time on the accept task; a session failure is
    /// fatal to the process.
    Iterative,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    /// IPv4 interface to listen on.
    #[serde(default = "default_ip")]
    pub ip: String,
    /// Listen port. When absent, one is derived from the process id so
    /// separately started instances do not collide. `0` asks the OS for an
    /// ephemeral port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Pending-connection queue handed to `listen`.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Concurrent session cap in concurrent mode.
    #[serde(default = "default_max_connection")]
    pub max_connection: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            ip: default_ip(),
            port: None,
            backlog: default_backlog(),
            max_connection: default_max_connection(),
        }
    }
}

impl NetworkConfig {
    /// The resolved listen address.
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip: Ipv4Addr = self.ip.parse().map_err(|_| {
            AppError::InvalidValue(format!("listen ip must be an IPv4 address: {}", self.ip))
        })?;
        Ok(SocketAddr::from((ip, self.effective_port())))
    }

    /// The configured port, or the pid-derived default.
    pub fn effective_port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None => Self::derive_port(std::process::id()),
        }
    }

    // 10000 + pid % 20000 keeps the derived port inside [10000, 30000),
    // clear of the privileged range whatever the pid width.
    fn derive_port(pid: u32) -> u16 {
        10000 + (pid % 20000) as u16
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub mode: ServeMode,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// Directory for hourly-rotated log files. Stdout only when absent.
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            log_dir: None,
            file_prefix: default_file_prefix(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ServerConfig {
    /// Loads configuration from an optional TOML file. Anything the file
    /// does not set falls back to the field defaults; with no file at all
    /// the result is fully defaulted.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> AppResult<ServerConfig> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            let path_str = path
                .as_ref()
                .to_str()
                .ok_or(AppError::InvalidValue(format!(
                    "config file path: {}",
                    path.as_ref().to_string_lossy()
                )))?;
            builder = builder.add_source(config::File::with_name(path_str));
        }
        let config = builder.build()?;

        let server_config: ServerConfig = config.try_deserialize()?;

        Ok(server_config)
    }
}
