//! Structural comparison between the engine and the catalog
//!
//! The diff is a typed value, computed before anything is rendered:
//!
//! - `to_add`: stored signals with no column yet
//! - `to_widen`: columns whose type can be losslessly widened to the desired type
//! - `incompatible`: everything else; never silently dropped
//!
//! Columns present in the engine but absent from the catalog are left alone.

use crate::ddl::desired_schema;
use serde::{Deserialize, Serialize};
use signalhouse_metadata::SignalDefinition;
use signalhouse_tsdb::{ColumnDef, ColumnType, TableSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChange {
    pub name: String,
    pub from: ColumnType,
    pub to: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incompatibility {
    pub signal: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub to_add: Vec<ColumnDef>,
    pub to_widen: Vec<ColumnChange>,
    pub incompatible: Vec<Incompatibility>,
}

impl SchemaDiff {
    /// No statement needs to be issued and nothing was rejected.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_widen.is_empty() && self.incompatible.is_empty()
    }
}

/// Compare an existing super-table with the catalog's stored signals.
pub fn diff_signals(existing: &TableSchema, desired: &[SignalDefinition]) -> SchemaDiff {
    let mut diff = SchemaDiff::default();

    // Skip the leading timestamp column; it is fixed
    for column in desired_schema(desired).columns.into_iter().skip(1) {
        if existing.tag(&column.name).is_some() {
            diff.incompatible.push(Incompatibility {
                signal: column.name.clone(),
                reason: format!("'{}' is a tag of the super-table", column.name),
            });
            continue;
        }

        match existing.column(&column.name) {
            None => diff.to_add.push(column),
            Some(current) if current.column_type == column.column_type => {}
            Some(current) if current.column_type.can_widen_to(column.column_type) => {
                diff.to_widen.push(ColumnChange {
                    name: column.name.clone(),
                    from: current.column_type,
                    to: column.column_type,
                });
            }
            Some(current) => diff.incompatible.push(Incompatibility {
                signal: column.name.clone(),
                reason: format!(
                    "column is {} in the engine and cannot become {}",
                    current.column_type, column.column_type
                ),
            }),
        }
    }

    diff
}
