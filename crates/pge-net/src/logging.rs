//! Tracing targets used by the networking module.
//!
//! `pge-net` logs through the `tracing` crate and never installs a subscriber
//! itself. Install one in your application to see the output:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("pge_net=debug")
//!     .init();
//! ```
//!
//! Per-datagram events are logged at `trace`, session lifecycle at `debug`,
//! and recoverable faults (I/O errors, undecodable datagrams, rejected sends)
//! at `warn`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Crate-wide target.
    pub const NET: &str = "pge_net";
    /// Datagram transport target.
    pub const TRANSPORT: &str = "pge_net::transport";
    /// Client session target.
    pub const CLIENT: &str = "pge_net::client";
    /// Server session target.
    pub const SERVER: &str = "pge_net::server";
}
