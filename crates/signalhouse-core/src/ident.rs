//! Identifier rules for engine-facing SQL
//!
//! Category codes, signal codes, asset codes, database names and feature names
//! all end up as identifiers in DDL or stream SQL. They are validated here
//! against a deliberately narrow grammar:
//!
//! ```text
//! identifier := [A-Za-z_][A-Za-z0-9_]*
//! ```
//!
//! Anything outside the grammar is rejected with a [`ValidationError`] instead
//! of being escaped. Quoting helpers in this module assume their input already
//! passed validation.

use crate::error::{ValidationError, ValidationResult};

/// Maximum length of a column, database or code identifier.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Maximum length of a (child) table name.
pub const MAX_TABLE_NAME_LEN: usize = 192;

/// Fixed super-table columns and tags that signal codes may not reuse.
pub const RESERVED_COLUMNS: [&str; 3] = ["ts", "asset_id", "asset_code"];

/// Validate a signal code: a plain identifier that is not a reserved column.
pub fn validate_signal_code(value: &str) -> ValidationResult<()> {
    validate_identifier("signal", value)?;
    if RESERVED_COLUMNS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(value))
    {
        return Err(ValidationError::ReservedName {
            kind: "signal".to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Validate an identifier of the given kind (used in error messages).
pub fn validate_identifier(kind: &str, value: &str) -> ValidationResult<()> {
    validate_with_limit(kind, value, MAX_IDENTIFIER_LEN)
}

/// Validate a composed table name, which may be longer than a plain identifier.
pub fn validate_table_name(value: &str) -> ValidationResult<()> {
    validate_with_limit("table", value, MAX_TABLE_NAME_LEN)
}

fn validate_with_limit(kind: &str, value: &str, limit: usize) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidIdentifier {
        kind: kind.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = value.chars();
    let first = chars.next().ok_or_else(|| invalid("must not be empty"))?;

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or underscore"));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(invalid(&format!("character '{}' is not allowed", bad)));
    }
    if value.len() > limit {
        return Err(invalid(&format!("longer than {} characters", limit)));
    }
    Ok(())
}

/// Quote a validated identifier with backticks.
pub fn quote_ident(value: &str) -> String {
    format!("`{}`", value)
}

/// Quote a `database.table` pair.
pub fn quote_qualified(database: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(table))
}

/// Render a single-quoted string literal.
///
/// The engine treats a backslash as an escape inside strings, so backslashes
/// are escaped before embedded quotes are doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        assert!(validate_identifier("signal", "current").is_ok());
        assert!(validate_identifier("asset", "MOTOR001").is_ok());
        assert!(validate_identifier("signal", "_internal_1").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        let err = validate_identifier("asset", "").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_rejects_leading_digit() {
        assert!(validate_identifier("asset", "1motor").is_err());
    }

    #[test]
    fn test_rejects_injection_characters() {
        for value in ["motor;drop", "a b", "x`y", "o'brien", "m-1", "é"] {
            assert!(
                validate_identifier("asset", value).is_err(),
                "{} should be rejected",
                value
            );
        }
    }

    #[test]
    fn test_length_limits() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier("signal", &long).is_err());
        assert!(validate_table_name(&long).is_ok());
        assert!(validate_table_name(&"t".repeat(MAX_TABLE_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_signal_code_reserved_names() {
        assert!(validate_signal_code("current").is_ok());
        for reserved in ["ts", "asset_id", "ASSET_CODE"] {
            let err = validate_signal_code(reserved).unwrap_err();
            assert!(matches!(err, ValidationError::ReservedName { .. }));
        }
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("current"), "`current`");
        assert_eq!(quote_qualified("plant", "raw_motor"), "`plant`.`raw_motor`");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_quote_literal_escapes_backslashes() {
        assert_eq!(quote_literal(r"C:\"), r"'C:\\'");
        assert_eq!(quote_literal(r"\' OR 1=1) --"), r"'\\'' OR 1=1) --'");
    }
}
