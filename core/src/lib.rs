//! Concurrent HTTP dispatcher with correlated, append-only outcome logs.
//!
//! # Overview
//! A `Request` describes one URL or a batch of URLs plus the configuration
//! every transfer shares. A `Dispatcher` runs it, concurrently for batches,
//! and when logging is enabled appends each outcome to a success or error log
//! under a correlation ID. Callers that only kept the ID read the outcome back
//! later with `LogSettings::lookup`.
//!
//! # Design
//! - Transfers never fail as Rust errors: a refused connection is an
//!   `Outcome` with status 0 and a message, logged like any other outcome.
//! - `Transport` is the seam to the network. `UreqTransport` is the default;
//!   tests substitute their own.
//! - The log is the line-oriented `|||id:Tag code:status:body|||` format,
//!   read back by a linear scan (see `log`).

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod http;
pub mod id;
pub mod log;
pub mod request;
pub mod spool;
pub mod transport;

pub use config::{LogSettings, TransportConfig};
pub use dispatcher::{Dispatcher, PendingBatch};
pub use error::{ConfigError, DispatchError, LogError};
pub use http::{HttpMethod, Outcome, PreparedRequest, Reply};
pub use id::CorrelationId;
pub use log::{LogRecord, OutcomeLogger, OutcomeTag, Projected, Projection};
pub use request::{OptionKey, Request, TransportOption};
pub use spool::{Spool, SpoolKind};
pub use transport::{Sinks, Transport, UreqTransport};
