//! Stream SQL compilation
//!
//! Renders a [`FeatureConfig`] into a continuous query over the category's
//! super-table (or an upstream derived table):
//!
//! ```text
//! CREATE STREAM IF NOT EXISTS `fs_motor_avg_current_1h_g1` TRIGGER WINDOW_CLOSE
//!     INTO `plant`.`feat_motor_avg_current_1h`
//!     AS SELECT _wstart AS ts, AVG(`current`) AS `avg_current_1h`
//!     FROM `plant`.`raw_motor`
//!     PARTITION BY `asset_id`
//!     INTERVAL(1h) SLIDING(10m)
//! ```
//!
//! `asset_id` always leads the partition list so aggregates never collapse
//! across assets. Output is deterministic for a normalized config.

use crate::dsl::{FeatureConfig, FilterClause, FilterValue, IMPLICIT_GROUP_KEY};
use serde::{Deserialize, Serialize};
use signalhouse_core::ident::{quote_ident, quote_literal, quote_qualified, validate_table_name};
use signalhouse_core::{ValidationError, ValidationResult};
use signalhouse_metadata::{AssetCategory, SignalDefinition};
use signalhouse_schema::super_table_name;

/// Tag columns every super-table carries, usable in filters and grouping.
const TAG_COLUMNS: [&str; 2] = ["asset_id", "asset_code"];

/// A compiled continuous query and its engine-side names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledStream {
    pub stream_name: String,
    pub target_table: String,
    pub generation: i64,
    pub sql: String,
}

/// `fs_{category}_{feature}_g{generation}`
pub fn stream_name(category_code: &str, feature: &str, generation: i64) -> String {
    format!("fs_{}_{}_g{}", category_code, feature, generation)
}

/// `feat_{category}_{feature}`
pub fn target_table_name(category_code: &str, feature: &str) -> String {
    format!("feat_{}_{}", category_code, feature)
}

fn render_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Bool(b) => b.to_string(),
        FilterValue::Number(n) => n.to_string(),
        FilterValue::Text(s) => quote_literal(s),
    }
}

fn render_filter(filter: &FilterClause) -> String {
    format!(
        "{} {} {}",
        quote_ident(&filter.field),
        filter.op.as_str(),
        render_value(&filter.value)
    )
}

/// Render the stream statement for one feature generation.
pub fn generate_stream_sql(
    category: &AssetCategory,
    config: &FeatureConfig,
    generation: i64,
) -> ValidationResult<CompiledStream> {
    if generation < 1 {
        return Err(ValidationError::invalid_field(
            "generation",
            "must be a positive counter",
        ));
    }

    let stream_name = stream_name(&category.code, &config.name, generation);
    let target_table = target_table_name(&category.code, &config.name);
    validate_table_name(&stream_name)?;
    validate_table_name(&target_table)?;

    let source = config
        .source_table
        .clone()
        .unwrap_or_else(|| super_table_name(category));
    validate_table_name(&source)?;

    let mut sql = format!(
        "CREATE STREAM IF NOT EXISTS {} TRIGGER WINDOW_CLOSE INTO {} AS SELECT _wstart AS ts, {}({}) AS {} FROM {}",
        quote_ident(&stream_name),
        quote_qualified(&category.database, &target_table),
        config.function.sql_name(),
        quote_ident(&config.source_signal),
        quote_ident(&config.name),
        quote_qualified(&category.database, &source),
    );

    if !config.filters.is_empty() {
        let predicates: Vec<String> = config.filters.iter().map(render_filter).collect();
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    let partition: Vec<String> = std::iter::once(IMPLICIT_GROUP_KEY)
        .chain(config.group_by.iter().map(String::as_str))
        .map(quote_ident)
        .collect();
    sql.push_str(&format!(
        " PARTITION BY {} INTERVAL({}) SLIDING({})",
        partition.join(", "),
        config.window,
        config.slide_interval
    ));

    Ok(CompiledStream {
        stream_name,
        target_table,
        generation,
        sql,
    })
}

/// Check a config against the category's signals.
///
/// The source signal must exist, be stored and suit the aggregation. Filter
/// and grouping fields must name a signal or a super-table tag. Features over
/// an upstream derived table are not checked here; the engine owns that
/// table's layout.
pub fn check_signals(
    category: &AssetCategory,
    config: &FeatureConfig,
    signals: &[SignalDefinition],
) -> ValidationResult<()> {
    if config.source_table.is_some() {
        return Ok(());
    }

    let find = |code: &str| signals.iter().find(|s| s.code.eq_ignore_ascii_case(code));
    let unknown = |code: &str| ValidationError::UnknownSignal {
        category: category.code.clone(),
        signal: code.to_string(),
    };

    let source = find(&config.source_signal).ok_or_else(|| unknown(&config.source_signal))?;
    if !source.is_stored {
        return Err(ValidationError::SignalNotStored {
            category: category.code.clone(),
            signal: source.code.clone(),
        });
    }
    if !config.function.accepts(source.data_type) {
        return Err(ValidationError::IncompatibleAggregation {
            function: config.function.to_string(),
            signal: source.code.clone(),
            data_type: source.data_type.to_string(),
        });
    }

    for field in config.referenced_fields() {
        let is_tag = TAG_COLUMNS.iter().any(|t| t.eq_ignore_ascii_case(field));
        match find(field) {
            _ if is_tag => {}
            Some(signal) if signal.is_stored => {}
            Some(signal) => {
                return Err(ValidationError::SignalNotStored {
                    category: category.code.clone(),
                    signal: signal.code.clone(),
                })
            }
            None => return Err(unknown(field)),
        }
    }
    Ok(())
}
