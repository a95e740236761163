//! SignalHouse Schema Synchronization
//!
//! Turns catalog records into engine structures.
//!
//! - [`ddl`]: pure statement rendering (super-tables, child tables, alters,
//!   fingerprints). No I/O; safe to call from anywhere.
//! - [`diff`]: typed comparison of an engine super-table with the catalog.
//! - [`sync`]: the [`SchemaSynchronizer`], which owns per-category
//!   serialization, retries and fingerprint bookkeeping.

pub mod ddl;
pub mod diff;
pub mod error;
pub mod sync;

pub use ddl::{
    child_table_name, column_type_for, render_child_table_ddl, render_super_table_ddl,
    schema_fingerprint, super_table_name,
};
pub use diff::{diff_signals, ColumnChange, Incompatibility, SchemaDiff};
pub use error::{Result, SyncError};
pub use sync::{RejectedSignal, SchemaSynchronizer, SyncAction, SyncResult};
