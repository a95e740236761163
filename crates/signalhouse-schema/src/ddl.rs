//! DDL Generation
//!
//! Pure functions that turn catalog records into engine statements. This is
//! the only place that maps signal types to column types or builds
//! engine-facing identifiers; everything else calls in here.
//!
//! ```text
//! CREATE STABLE IF NOT EXISTS `plant`.`raw_motor`
//!     (`ts` TIMESTAMP, `current` DOUBLE, `status` VARCHAR(256))
//!     TAGS (`asset_id` BIGINT, `asset_code` VARCHAR(64))
//!
//! CREATE TABLE IF NOT EXISTS `plant`.`raw_motor_MOTOR001`
//!     USING `plant`.`raw_motor` TAGS (1, 'MOTOR001')
//! ```
//!
//! Output is byte-for-byte deterministic for the same inputs, which is what
//! makes the schema fingerprint meaningful.

use sha2::{Digest, Sha256};
use signalhouse_core::ident::{
    quote_ident, quote_literal, quote_qualified, validate_identifier, validate_signal_code,
    validate_table_name,
};
use signalhouse_core::ValidationResult;
use signalhouse_metadata::{AssetCategory, SignalDataType, SignalDefinition};
use signalhouse_tsdb::{ColumnDef, ColumnType, TableSchema};

pub const TIMESTAMP_COLUMN: &str = "ts";
pub const ASSET_ID_TAG: &str = "asset_id";
pub const ASSET_CODE_TAG: &str = "asset_code";

/// Byte length of string signal columns.
///
/// A `string` signal such as a motor's `status` is stored as bounded text,
/// `VARCHAR(256)`, rather than an unbounded `TEXT` column, which the engine
/// does not offer for super-table columns.
pub const STRING_COLUMN_LENGTH: u16 = 256;

/// Byte length of the asset code tag.
pub const ASSET_CODE_LENGTH: u16 = 64;

/// Physical column type for a signal data type.
pub fn column_type_for(data_type: SignalDataType) -> ColumnType {
    match data_type {
        SignalDataType::Numeric => ColumnType::Double,
        SignalDataType::Integer => ColumnType::BigInt,
        SignalDataType::Boolean => ColumnType::Bool,
        SignalDataType::String => ColumnType::Varchar(STRING_COLUMN_LENGTH),
        SignalDataType::Timestamp => ColumnType::Timestamp,
    }
}

/// `{stable_prefix}_{code}`
pub fn super_table_name(category: &AssetCategory) -> String {
    format!("{}_{}", category.stable_prefix, category.code)
}

/// `{super-table}_{asset code}`
pub fn child_table_name(category: &AssetCategory, asset_code: &str) -> String {
    format!("{}_{}", super_table_name(category), asset_code)
}

/// Stored signals in column order: display order, then code.
pub fn stored_signals(signals: &[SignalDefinition]) -> Vec<&SignalDefinition> {
    let mut stored: Vec<_> = signals.iter().filter(|s| s.is_stored).collect();
    stored.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.code.cmp(&b.code))
    });
    stored
}

/// The super-table structure the catalog asks for.
pub fn desired_schema(signals: &[SignalDefinition]) -> TableSchema {
    let mut columns = vec![ColumnDef::new(TIMESTAMP_COLUMN, ColumnType::Timestamp)];
    columns.extend(
        stored_signals(signals)
            .into_iter()
            .map(|s| ColumnDef::new(s.code.clone(), column_type_for(s.data_type))),
    );

    TableSchema {
        columns,
        tags: vec![
            ColumnDef::new(ASSET_ID_TAG, ColumnType::BigInt),
            ColumnDef::new(ASSET_CODE_TAG, ColumnType::Varchar(ASSET_CODE_LENGTH)),
        ],
    }
}

fn validate_category(category: &AssetCategory) -> ValidationResult<()> {
    validate_identifier("category", &category.code)?;
    validate_identifier("database", &category.database)?;
    validate_identifier("stable prefix", &category.stable_prefix)?;
    validate_table_name(&super_table_name(category))
}

fn render_columns(columns: &[ColumnDef]) -> String {
    columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_database_ddl(database: &str) -> ValidationResult<String> {
    validate_identifier("database", database)?;
    Ok(format!(
        "CREATE DATABASE IF NOT EXISTS {} PRECISION 'ms'",
        quote_ident(database)
    ))
}

/// Render the super-table definition for a category's stored signals.
pub fn render_super_table_ddl(
    category: &AssetCategory,
    signals: &[SignalDefinition],
) -> ValidationResult<String> {
    validate_category(category)?;
    for signal in stored_signals(signals) {
        validate_signal_code(&signal.code)?;
    }

    let schema = desired_schema(signals);
    Ok(format!(
        "CREATE STABLE IF NOT EXISTS {} ({}) TAGS ({})",
        quote_qualified(&category.database, &super_table_name(category)),
        render_columns(&schema.columns),
        render_columns(&schema.tags),
    ))
}

/// Render the child-table statement for one asset.
///
/// Rejects asset codes that are not plain identifiers instead of escaping
/// them.
pub fn render_child_table_ddl(
    category: &AssetCategory,
    asset_code: &str,
    asset_id: i64,
) -> ValidationResult<String> {
    validate_category(category)?;
    validate_identifier("asset", asset_code)?;
    let child = child_table_name(category, asset_code);
    validate_table_name(&child)?;

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} USING {} TAGS ({}, {})",
        quote_qualified(&category.database, &child),
        quote_qualified(&category.database, &super_table_name(category)),
        asset_id,
        quote_literal(asset_code),
    ))
}

pub fn render_add_column(category: &AssetCategory, column: &ColumnDef) -> ValidationResult<String> {
    validate_category(category)?;
    validate_signal_code(&column.name)?;
    Ok(format!(
        "ALTER STABLE {} ADD COLUMN {} {}",
        quote_qualified(&category.database, &super_table_name(category)),
        quote_ident(&column.name),
        column.column_type,
    ))
}

pub fn render_modify_column(
    category: &AssetCategory,
    column: &ColumnDef,
) -> ValidationResult<String> {
    validate_category(category)?;
    validate_signal_code(&column.name)?;
    Ok(format!(
        "ALTER STABLE {} MODIFY COLUMN {} {}",
        quote_qualified(&category.database, &super_table_name(category)),
        quote_ident(&column.name),
        column.column_type,
    ))
}

/// Hex SHA-256 of a canonical super-table statement.
pub fn schema_fingerprint(super_table_ddl: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(super_table_ddl.as_bytes());
    format!("{:x}", hasher.finalize())
}
