//! Identifier validation and quoting for dynamically built SQL.
//!
//! Table, column, schema, constraint and sequence names cannot be bound as
//! statement parameters, so every name that reaches a SQL string goes through
//! [`quote_pg`] first. Names are taken from the catalog, but they may still
//! contain quotes, spaces or mixed case.

use crate::error::{MigrateError, Result};

/// PostgreSQL's NAMEDATALEN - 1.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Reject names PostgreSQL could never have produced: empty, containing NUL,
/// or longer than 63 bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config("empty identifier".into()));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "identifier contains a null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "identifier is {} bytes, longest allowed is {}: {:?}",
            name.len(),
            MAX_IDENTIFIER_LENGTH,
            name
        )));
    }

    Ok(())
}

/// `"name"`, with embedded double quotes doubled.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a table name with its schema: `"schema"."table"`.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_accepted() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("order_items").is_ok());
        assert!(validate_identifier("Mixed Case Table").is_ok());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_null_byte_rejected() {
        let err = validate_identifier("users\0; DROP TABLE x").unwrap_err();
        assert!(err.to_string().contains("null byte"));
    }

    #[test]
    fn test_length_limit() {
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_quoting_doubles_embedded_quotes() {
        assert_eq!(quote_pg("users").unwrap(), "\"users\"");
        assert_eq!(quote_pg("table\"name").unwrap(), "\"table\"\"name\"");
        assert_eq!(quote_pg("\"; DROP TABLE x; --").unwrap(), "\"\"\"; DROP TABLE x; --\"");
    }

    #[test]
    fn test_qualify_pg() {
        assert_eq!(
            qualify_pg("public", "orders").unwrap(),
            "\"public\".\"orders\""
        );
        assert!(qualify_pg("", "orders").is_err());
    }
}
