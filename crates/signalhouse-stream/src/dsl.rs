//! Feature DSL
//!
//! A feature is a JSON document describing one windowed aggregation:
//!
//! ```json
//! {
//!   "name": "avg_current_1h",
//!   "source_signal": "current",
//!   "function": "avg",
//!   "window": "1h",
//!   "slide_interval": "10m",
//!   "filters": [{"field": "status", "op": "=", "value": "run"}],
//!   "group_by": ["line"]
//! }
//! ```
//!
//! Parsing validates every key and normalizes the document so that
//! semantically identical configs compare (and compile) identically:
//!
//! - durations are re-rendered in their largest exact unit (`60m` -> `1h`)
//! - a missing `slide_interval` becomes the window (tumbling window)
//! - filters are sorted by field, operator, value and deduplicated
//! - `group_by` is sorted and deduplicated; `asset_id` is always implicit
//!   and therefore removed from the list
//!
//! The aggregation function is checked against a closed allow-list here,
//! never at SQL execution time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use signalhouse_core::ident::{validate_identifier, validate_table_name};
use signalhouse_core::{ValidationError, ValidationResult, WindowDuration};
use signalhouse_metadata::SignalDataType;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Implicit partition key of every compiled stream.
pub const IMPLICIT_GROUP_KEY: &str = "asset_id";

const KNOWN_KEYS: [&str; 9] = [
    "name",
    "source_signal",
    "function",
    "window",
    "slide_interval",
    "filters",
    "group_by",
    "source_table",
    "description",
];

// ============================================================
// AGGREGATION FUNCTIONS
// ============================================================

/// The closed set of aggregations a feature may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Avg,
    Min,
    Max,
    Sum,
    Count,
    First,
    Last,
    Stddev,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 8] = [
        AggregateFunction::Avg,
        AggregateFunction::Min,
        AggregateFunction::Max,
        AggregateFunction::Sum,
        AggregateFunction::Count,
        AggregateFunction::First,
        AggregateFunction::Last,
        AggregateFunction::Stddev,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Count => "count",
            AggregateFunction::First => "first",
            AggregateFunction::Last => "last",
            AggregateFunction::Stddev => "stddev",
        }
    }

    /// Engine spelling of the function.
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::First => "FIRST",
            AggregateFunction::Last => "LAST",
            AggregateFunction::Stddev => "STDDEV",
        }
    }

    /// Whether the function can aggregate a signal of the given type.
    pub fn accepts(&self, data_type: SignalDataType) -> bool {
        match self {
            AggregateFunction::Avg | AggregateFunction::Sum | AggregateFunction::Stddev => {
                data_type.is_numeric()
            }
            AggregateFunction::Min | AggregateFunction::Max => !matches!(
                data_type,
                SignalDataType::String | SignalDataType::Boolean
            ),
            AggregateFunction::Count | AggregateFunction::First | AggregateFunction::Last => true,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateFunction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregateFunction::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::DisallowedFunction(s.to_string()))
    }
}

/// Membership check against the aggregation allow-list.
pub fn validate_function(name: &str) -> bool {
    name.parse::<AggregateFunction>().is_ok()
}

// ============================================================
// FILTERS
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
        }
    }
}

impl FromStr for FilterOp {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(FilterOp::Eq),
            "!=" | "<>" => Ok(FilterOp::Ne),
            ">" => Ok(FilterOp::Gt),
            ">=" => Ok(FilterOp::Ge),
            "<" => Ok(FilterOp::Lt),
            "<=" => Ok(FilterOp::Le),
            other => Err(ValidationError::invalid_field(
                "filters",
                format!("unsupported operator '{}'", other),
            )),
        }
    }
}

/// Literal compared against a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(Number),
    Text(String),
}

impl FilterValue {
    fn from_json(value: &Value) -> ValidationResult<Self> {
        match value {
            Value::Bool(b) => Ok(FilterValue::Bool(*b)),
            Value::Number(n) => Ok(FilterValue::Number(n.clone())),
            Value::String(s) => Ok(FilterValue::Text(s.clone())),
            other => Err(ValidationError::invalid_field(
                "filters",
                format!("value must be a number, string or boolean, got {}", other),
            )),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FilterValue::Bool(_) => 0,
            FilterValue::Number(_) => 1,
            FilterValue::Text(_) => 2,
        }
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FilterValue::Bool(a), FilterValue::Bool(b)) => a.cmp(b),
            (FilterValue::Number(a), FilterValue::Number(b)) => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y).then_with(|| a.to_string().cmp(&b.to_string()))
            }
            (FilterValue::Text(a), FilterValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// One `field op value` predicate. Multiple filters are AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl FilterClause {
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.field
            .cmp(&other.field)
            .then(self.op.cmp(&other.op))
            .then_with(|| self.value.canonical_cmp(&other.value))
    }
}

fn parse_filters(raw: &Value) -> ValidationResult<Vec<FilterClause>> {
    let mut filters = match raw {
        Value::Null => Vec::new(),
        // Shorthand: {"status": "run"} means status = 'run'
        Value::Object(map) => map
            .iter()
            .map(|(field, value)| {
                Ok(FilterClause {
                    field: field.clone(),
                    op: FilterOp::Eq,
                    value: FilterValue::from_json(value)?,
                })
            })
            .collect::<ValidationResult<Vec<_>>>()?,
        Value::Array(items) => items
            .iter()
            .map(parse_filter_clause)
            .collect::<ValidationResult<Vec<_>>>()?,
        _ => {
            return Err(ValidationError::invalid_field(
                "filters",
                "expected a list of {field, op, value} objects or a {field: value} object",
            ))
        }
    };

    for filter in &filters {
        validate_identifier("filter field", &filter.field)?;
    }

    filters.sort_by(FilterClause::canonical_cmp);
    filters.dedup();
    Ok(filters)
}

fn parse_filter_clause(item: &Value) -> ValidationResult<FilterClause> {
    let map = item.as_object().ok_or_else(|| {
        ValidationError::invalid_field("filters", "each filter must be an object")
    })?;
    if let Some(unknown) = map.keys().find(|k| !["field", "op", "value"].contains(&k.as_str())) {
        return Err(ValidationError::UnknownField(format!("filters.{}", unknown)));
    }

    let field = map
        .get("field")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::MissingField("filters.field".to_string()))?;
    let op = match map.get("op") {
        None => FilterOp::Eq,
        Some(Value::String(op)) => op.parse()?,
        Some(_) => {
            return Err(ValidationError::invalid_field(
                "filters.op",
                "operator must be a string",
            ))
        }
    };
    let value = map
        .get("value")
        .ok_or_else(|| ValidationError::MissingField("filters.value".to_string()))?;

    Ok(FilterClause {
        field: field.to_string(),
        op,
        value: FilterValue::from_json(value)?,
    })
}

// ============================================================
// FEATURE CONFIG
// ============================================================

/// A validated, normalized feature definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub name: String,
    pub source_signal: String,
    pub function: AggregateFunction,
    pub window: WindowDuration,
    pub slide_interval: WindowDuration,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterClause>,

    /// Extra partition keys besides the implicit `asset_id`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,

    /// Upstream derived table to aggregate instead of the super-table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FeatureConfig {
    /// Columns the compiled query reads, besides the source signal.
    pub fn referenced_fields(&self) -> impl Iterator<Item = &str> {
        self.filters
            .iter()
            .map(|f| f.field.as_str())
            .chain(self.group_by.iter().map(String::as_str))
    }
}

fn required_str<'a>(map: &'a Map<String, Value>, key: &str) -> ValidationResult<&'a str> {
    match map.get(key) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(key.to_string())),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ValidationError::invalid_field(key, "must be a string")),
    }
}

fn optional_str<'a>(map: &'a Map<String, Value>, key: &str) -> ValidationResult<Option<&'a str>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ValidationError::invalid_field(key, "must be a string")),
    }
}

fn parse_duration(field: &str, raw: &str) -> ValidationResult<WindowDuration> {
    raw.parse::<WindowDuration>()
        .map_err(|reason| ValidationError::InvalidDuration {
            field: field.to_string(),
            value: raw.to_string(),
            reason,
        })
}

fn parse_group_by(raw: Option<&Value>) -> ValidationResult<Vec<String>> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ValidationError::invalid_field(
                "group_by",
                "must be a list of column names",
            ))
        }
    };

    let mut keys = Vec::with_capacity(items.len());
    for item in items {
        let key = item.as_str().ok_or_else(|| {
            ValidationError::invalid_field("group_by", "entries must be strings")
        })?;
        validate_identifier("group_by", key)?;
        if !key.eq_ignore_ascii_case(IMPLICIT_GROUP_KEY) {
            keys.push(key.to_string());
        }
    }
    keys.sort();
    keys.dedup();
    Ok(keys)
}

/// Validate and normalize a raw feature configuration.
pub fn parse_feature_config(raw: &Value) -> ValidationResult<FeatureConfig> {
    let map = raw
        .as_object()
        .ok_or_else(|| ValidationError::invalid_field("config", "must be a JSON object"))?;

    if let Some(unknown) = map.keys().find(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        return Err(ValidationError::UnknownField(unknown.clone()));
    }

    let name = required_str(map, "name")?;
    validate_identifier("feature", name)?;

    let source_signal = required_str(map, "source_signal")?;
    validate_identifier("signal", source_signal)?;

    let function: AggregateFunction = required_str(map, "function")?.parse()?;

    let window = parse_duration("window", required_str(map, "window")?)?;
    let slide_interval = match optional_str(map, "slide_interval")? {
        Some(raw) => parse_duration("slide_interval", raw)?,
        None => window,
    };
    if slide_interval > window {
        return Err(ValidationError::SlideExceedsWindow {
            window: window.to_string(),
            slide: slide_interval.to_string(),
        });
    }

    let filters = parse_filters(map.get("filters").unwrap_or(&Value::Null))?;
    let group_by = parse_group_by(map.get("group_by"))?;

    let source_table = optional_str(map, "source_table")?;
    if let Some(table) = source_table {
        validate_table_name(table)?;
    }

    Ok(FeatureConfig {
        name: name.to_string(),
        source_signal: source_signal.to_string(),
        function,
        window,
        slide_interval,
        filters,
        group_by,
        source_table: source_table.map(str::to_string),
        description: optional_str(map, "description")?.map(str::to_string),
    })
}

/// Canonical JSON form; parsing it again yields an identical config.
pub fn to_canonical_json(config: &FeatureConfig) -> ValidationResult<Value> {
    serde_json::to_value(config).map_err(|e| ValidationError::InvalidField {
        field: config.name.clone(),
        reason: format!("cannot serialize feature config: {}", e),
    })
}
