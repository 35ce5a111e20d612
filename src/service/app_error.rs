// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub type AppResult<T> = Result<T, AppError>;

/// The error taxonomy of the service.
///
/// Setup failures (`Bind`, `Listen`, `Accept`, `Supervision`, config and
/// value errors) are fatal to the whole process. Session failures
/// (`PeerClosed`, `ShortFrame`, `IoError`) end one connection: in
/// concurrent mode the owning worker logs them and exits, in iterative
/// mode they take the process down with it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: String,
        source: std::io::Error,
    },

    #[error("accept error: {0}")]
    Accept(String),

    #[error("worker supervision error: {0}")]
    Supervision(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("config file error: {0}")]
    ConfigFileError(#[from] config::ConfigError),

    #[error("peer closed the connection without sending the sentinel")]
    PeerClosed,

    #[error("short frame: read {got} of {expected} bytes")]
    ShortFrame { got: usize, expected: usize },

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}
