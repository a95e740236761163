//! Engine-side table structure
//!
//! What the engine reports back for `DESCRIBE`: ordered data columns and tag
//! columns with their physical types.

use crate::error::{Result, TsdbError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Physical column type in the time-series engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Timestamp,
    Double,
    BigInt,
    Bool,
    /// Bounded-length text; the payload is the byte length
    Varchar(u16),
}

impl ColumnType {
    /// Build a type from a `DESCRIBE` row's `type` and `length` cells.
    pub fn from_describe(type_name: &str, length: u64) -> Option<Self> {
        match type_name.to_ascii_uppercase().as_str() {
            "TIMESTAMP" => Some(ColumnType::Timestamp),
            "DOUBLE" => Some(ColumnType::Double),
            "BIGINT" => Some(ColumnType::BigInt),
            "BOOL" => Some(ColumnType::Bool),
            "VARCHAR" | "BINARY" | "NCHAR" => {
                Some(ColumnType::Varchar(u16::try_from(length).ok()?))
            }
            _ => None,
        }
    }

    /// Whether an existing column of this type can be altered to `to`
    /// without losing stored values.
    pub fn can_widen_to(&self, to: ColumnType) -> bool {
        match (*self, to) {
            (a, b) if a == b => true,
            (ColumnType::BigInt, ColumnType::Double) => true,
            (ColumnType::Varchar(from), ColumnType::Varchar(to)) => to >= from,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Timestamp => f.write_str("TIMESTAMP"),
            ColumnType::Double => f.write_str("DOUBLE"),
            ColumnType::BigInt => f.write_str("BIGINT"),
            ColumnType::Bool => f.write_str("BOOL"),
            ColumnType::Varchar(len) => write!(f, "VARCHAR({})", len),
        }
    }
}

impl FromStr for ColumnType {
    type Err = TsdbError;

    /// Parse the DDL spelling, e.g. `DOUBLE` or `VARCHAR(256)`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, length) = match s.find('(') {
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix(')')
                    .ok_or_else(|| TsdbError::InvalidResponse(format!("bad column type '{}'", s)))?;
                let length = inner.trim().parse::<u64>().map_err(|_| {
                    TsdbError::InvalidResponse(format!("bad column length in '{}'", s))
                })?;
                (&s[..open], length)
            }
            None => (s, 0),
        };

        ColumnType::from_describe(name.trim(), length)
            .ok_or_else(|| TsdbError::InvalidResponse(format!("unsupported column type '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Structure of a super-table (or of the super-table behind a child table).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnDef>,
    pub tags: Vec<ColumnDef>,
}

impl TableSchema {
    /// Look up a data column by name (case-insensitive, like the engine).
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn tag(&self, name: &str) -> Option<&ColumnDef> {
        self.tags.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Parse `DESCRIBE` rows: `[field, type, length, note]`, where a note of
    /// `TAG` marks a tag column.
    pub fn from_describe_rows(rows: &[Vec<serde_json::Value>]) -> Result<Self> {
        let mut schema = TableSchema::default();

        for row in rows {
            let field = row
                .first()
                .and_then(|v| v.as_str())
                .ok_or_else(|| TsdbError::InvalidResponse("DESCRIBE row without field".into()))?;
            let type_name = row
                .get(1)
                .and_then(|v| v.as_str())
                .ok_or_else(|| TsdbError::InvalidResponse("DESCRIBE row without type".into()))?;
            let length = row.get(2).and_then(|v| v.as_u64()).unwrap_or(0);
            let is_tag = row
                .get(3)
                .and_then(|v| v.as_str())
                .map(|note| note.eq_ignore_ascii_case("TAG"))
                .unwrap_or(false);

            let column_type = ColumnType::from_describe(type_name, length).ok_or_else(|| {
                TsdbError::InvalidResponse(format!(
                    "unsupported type '{}' for column '{}'",
                    type_name, field
                ))
            })?;

            let def = ColumnDef::new(field, column_type);
            if is_tag {
                schema.tags.push(def);
            } else {
                schema.columns.push(def);
            }
        }

        Ok(schema)
    }
}
