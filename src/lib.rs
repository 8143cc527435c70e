#![deny(missing_docs)]
//! # kvd
//! A single-threaded, in-memory key-value server that maps byte-string
//! keys to byte-string values.
//!
//! Clients speak a length-prefixed binary protocol over TCP (see
//! [`protocol`]) with three commands: `get`, `set` and `del`. The server
//! multiplexes every connection on one readiness poller, and the store
//! behind it is a chained hash map that grows by incremental rehashing,
//! so no single request ever pays for a full table resize.

mod client;
mod command;
mod conn;
mod dict;
mod engine;
mod error;
pub mod protocol;
mod server;

pub use client::KvdClient;
pub use command::Request;
pub use dict::Dict;
pub use engine::{KvdEngine, MemStore};
pub use error::{KvdError, Result};
pub use server::KvdServer;
