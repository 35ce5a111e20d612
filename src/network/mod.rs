//! Network Module Implementation
//!
//! This module provides the networking layer for the compute service,
//! handling TCP connections and the fixed-size value frames they carry.
//!
//! # Components
//!
//! - `Connection`: one framed TCP connection, usable from either side of
//!   the protocol
//! - `ValueFrame`: a single signed 64-bit value in network byte order
//!
//! # Features
//!
//! - Asynchronous I/O operations
//! - Whole-frame writes, flushed per reply
//! - Single-read frame intake with explicit short-read errors
//! - Sentinel classification for session termination

pub use connection::Connection;
pub use frame::{ValueFrame, SENTINEL};
mod connection;
mod frame;
