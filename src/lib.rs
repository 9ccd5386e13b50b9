//! A minimal, in-memory server speaking a useful subset of the Redis
//! wire protocol (RESP) over TCP.
//!
//! # Layout
//!
//! - [`server`]: the accept loop and per-connection handler.
//! - [`client`]: a small client used by the `tiny-redis-cli` binary.
//! - [`cmd`]: one type per supported command, each owning its own
//!   argument parsing and its own `apply` against the shared state.
//! - [`frame`]: the RESP reply type, plus the inbound request decoder.

pub mod client;

pub mod cmd;
pub use cmd::Command;

mod connection;
pub use connection::Connection;

pub mod frame;
pub use frame::Frame;

mod db;
use db::Db;

mod parse;

pub mod server;

mod shutdown;
use shutdown::Shutdown;

/// Default port the server listens on if none is given on the command line.
pub const DEFAULT_PORT: &str = "6379";

/// Error type returned by most functions in this crate.
///
/// Command dispatch uses the narrower `db::CommandError` where the
/// caller needs to distinguish kinds at runtime (to decide whether to
/// reply with an error frame and keep the connection open, versus
/// closing it); this boxed type is for the connection/process
/// boundary, where any failure just means "tear this down."
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` for this crate's `Error` type.
pub type Result<T> = std::result::Result<T, Error>;
