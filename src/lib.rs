//! p0f v3 OS fingerprint lookups for mail transfer agents
//!
//! Queries a running `p0f` daemon over its Unix domain API socket and turns
//! the answer into a short, human readable operating system label that mail
//! filtering rules can match on.
//!
//! Lookups never fail hard because the daemon is missing or misbehaving: those
//! conditions are logged and reported as `"(failed)"`. Only caller mistakes
//! (wrong argument count, an over-long socket path, an address that is not an
//! IP address) are returned as errors.

pub mod config;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod lookup;
pub mod protocol;
pub mod transport;

pub use config::{Config, Sentinels};
pub use error::{Error, Outcome, Result};
pub use logging::{LogSink, TracingSink};
pub use lookup::{OsLookup, interpret, p0f_os};
pub use transport::Client;
pub use tracing;
