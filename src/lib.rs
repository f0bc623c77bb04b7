pub mod analysis;
pub mod app_state;
pub mod chat;
pub mod classify;
pub mod config;
pub mod constants;
pub mod report;
pub mod retry;
pub mod sql_executor;
pub mod stats;
pub mod table;
pub mod text_to_sql;
pub mod transport;
pub mod web_server;

use serde::Serialize;

/// Why a query did not end in a usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport failures that outlasted every retry.
    Transient,
    /// The endpoint answered with a non-200 status.
    Status,
    /// A 200 reply without the expected shape.
    Malformed,
    /// The text-to-SQL service or the database failed.
    Collaborator,
}

/// Reads log level from RUST_LOG (e.g., RUST_LOG=info,askboard=debug); defaults to info.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
