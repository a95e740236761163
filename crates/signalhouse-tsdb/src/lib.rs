//! SignalHouse Time-Series Engine Client
//!
//! A thin transport for issuing DDL, stream control statements and structure
//! queries against the time-series engine.
//!
//! ## Backends
//!
//! - [`RestTsdbClient`]: the engine's REST SQL endpoint over HTTP
//! - [`MemoryTsdb`]: an in-process engine for tests and dry runs
//!
//! Both implement [`TsdbClient`] and are selected from a [`TsdbConfig`] with
//! [`connect`]. The client is constructed once and passed by `Arc` to the
//! schema synchronizer and the stream task manager.
//!
//! ## Delivery semantics
//!
//! Each call is one round trip with at-least-once semantics: a call that
//! timed out may still have been applied. Callers only issue idempotent
//! statements (`IF NOT EXISTS`, deterministic text) and treat
//! [`ErrorCode::is_already_exists`] as success.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod rest;
pub mod schema;

pub use client::TsdbClient;
pub use config::TsdbConfig;
pub use error::{ErrorCode, Result, TsdbError};
pub use memory::{ChildTable, MemoryStream, MemoryTsdb};
pub use rest::RestTsdbClient;
pub use schema::{ColumnDef, ColumnType, TableSchema};

use std::sync::Arc;

/// Build the client selected by `config.url`.
pub fn connect(config: &TsdbConfig) -> Result<Arc<dyn TsdbClient>> {
    if config.is_memory() {
        tracing::info!("Using in-process time-series engine");
        Ok(Arc::new(MemoryTsdb::new()))
    } else {
        tracing::info!(url = %config.url, "Using REST time-series engine");
        Ok(Arc::new(RestTsdbClient::new(config)?))
    }
}
