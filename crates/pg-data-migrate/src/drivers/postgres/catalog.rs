//! Catalog queries and statement builders for PostgreSQL.
//!
//! Queries take the working schema as `$1`. Statement builders are pure so
//! their output can be checked without a server.

use crate::core::identifier::{qualify_pg, quote_pg};
use crate::error::Result;

/// Bind parameters a single statement may carry (protocol limit, u16).
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Base tables of a schema, ordered by name.
///
/// `table_name` is a `sql_identifier` domain and must be cast for the client
/// to decode it as text.
pub const LIST_TABLES: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

/// Foreign keys whose child lives in the schema.
///
/// Parents in another schema come back as `schema.table`. Constraints cloned
/// onto partitions (`conparentid <> 0`) are skipped; they follow their parent.
pub const LIST_FOREIGN_KEYS: &str = r#"
    SELECT
        c.conname::text AS constraint_name,
        t.relname::text AS child,
        CASE WHEN rn.nspname = n.nspname
             THEN rt.relname::text
             ELSE rn.nspname::text || '.' || rt.relname::text
        END AS parent,
        pg_catalog.pg_get_constraintdef(c.oid) AS definition
    FROM pg_catalog.pg_constraint c
    JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
    JOIN pg_catalog.pg_namespace rn ON rn.oid = rt.relnamespace
    WHERE n.nspname = $1
      AND c.contype = 'f'
      AND c.conparentid = 0
    ORDER BY t.relname, c.conname
"#;

/// Sequences owned by a column (`serial`, `OWNED BY`: deptype `a`) or backing
/// an identity column (deptype `i`).
pub const LIST_SEQUENCE_BINDINGS: &str = r#"
    SELECT
        s.relname::text AS sequence_name,
        t.relname::text AS owner_table,
        a.attname::text AS owner_column
    FROM pg_catalog.pg_class s
    JOIN pg_catalog.pg_namespace sn ON sn.oid = s.relnamespace
    JOIN pg_catalog.pg_depend d
      ON d.objid = s.oid
     AND d.classid = 'pg_catalog.pg_class'::regclass
     AND d.refclassid = 'pg_catalog.pg_class'::regclass
     AND d.deptype IN ('a', 'i')
    JOIN pg_catalog.pg_class t ON t.oid = d.refobjid
    JOIN pg_catalog.pg_namespace tn ON tn.oid = t.relnamespace
    JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = d.refobjsubid
    WHERE s.relkind = 'S'
      AND sn.nspname = $1
      AND tn.nspname = $1
    ORDER BY t.relname, a.attname
"#;

/// Stored generated columns of one table (`$2`), in column order.
pub const LIST_GENERATED_COLUMNS: &str = r#"
    SELECT a.attname::text
    FROM pg_catalog.pg_attribute a
    JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
      AND c.relname = $2
      AND a.attnum > 0
      AND NOT a.attisdropped
      AND a.attgenerated <> ''
    ORDER BY a.attnum
"#;

/// Whether a table (`$2`) has a valid, non-partial unique index. Primary keys
/// and unique constraints are backed by one.
pub const HAS_UNIQUE_KEY: &str = r#"
    SELECT EXISTS (
        SELECT 1
        FROM pg_catalog.pg_index i
        JOIN pg_catalog.pg_class c ON c.oid = i.indrelid
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
          AND c.relname = $2
          AND i.indisunique
          AND i.indisvalid
          AND i.indpred IS NULL
    )
"#;

pub fn select_all_sql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("SELECT * FROM {}", qualify_pg(schema, table)?))
}

pub fn count_sql(schema: &str, table: &str) -> Result<String> {
    Ok(format!("SELECT COUNT(*)::int8 FROM {}", qualify_pg(schema, table)?))
}

pub fn max_value_sql(schema: &str, table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "SELECT MAX({})::int8 FROM {}",
        quote_pg(column)?,
        qualify_pg(schema, table)?
    ))
}

pub fn drop_constraint_sql(schema: &str, table: &str, constraint: &str) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
        qualify_pg(schema, table)?,
        quote_pg(constraint)?
    ))
}

/// `definition` is passed through untouched.
pub fn add_constraint_sql(
    schema: &str,
    table: &str,
    constraint: &str,
    definition: &str,
) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {}",
        qualify_pg(schema, table)?,
        quote_pg(constraint)?,
        definition
    ))
}

pub fn restart_sequence_sql(schema: &str, sequence: &str, next: i64) -> Result<String> {
    Ok(format!(
        "ALTER SEQUENCE {} RESTART WITH {}",
        qualify_pg(schema, sequence)?,
        next
    ))
}

/// Most rows one INSERT can carry for the given column count.
pub fn rows_per_statement(column_count: usize) -> usize {
    (MAX_BIND_PARAMS / column_count.max(1)).max(1)
}

/// Multi-row, conflict-ignoring INSERT with numbered placeholders.
///
/// `OVERRIDING SYSTEM VALUE` lets `GENERATED ALWAYS AS IDENTITY` columns take
/// the copied values.
pub fn insert_sql(schema: &str, table: &str, columns: &[String], row_count: usize) -> Result<String> {
    let quoted: Vec<String> = columns.iter().map(|c| quote_pg(c)).collect::<Result<_>>()?;
    let width = columns.len();

    let mut values = Vec::with_capacity(row_count);
    for row in 0..row_count {
        let placeholders: Vec<String> = (1..=width)
            .map(|col| format!("${}", row * width + col))
            .collect();
        values.push(format!("({})", placeholders.join(", ")));
    }

    Ok(format!(
        "INSERT INTO {} ({}) OVERRIDING SYSTEM VALUE VALUES {} ON CONFLICT DO NOTHING",
        qualify_pg(schema, table)?,
        quoted.join(", "),
        values.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_numbering() {
        let sql = insert_sql("public", "orders", &["id".into(), "customer_id".into()], 2).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"orders\" (\"id\", \"customer_id\") OVERRIDING SYSTEM VALUE \
             VALUES ($1, $2), ($3, $4) ON CONFLICT DO NOTHING"
        );
    }

    #[test]
    fn test_insert_sql_quotes_columns() {
        let sql = insert_sql("app", "Order Items", &["Qty\"x".into()], 1).unwrap();
        assert!(sql.starts_with("INSERT INTO \"app\".\"Order Items\" (\"Qty\"\"x\")"));
    }

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(1), 65_535);
        assert_eq!(rows_per_statement(10), 6_553);
        assert_eq!(rows_per_statement(1_600), 40);
        assert_eq!(rows_per_statement(0), 65_535);
    }

    #[test]
    fn test_constraint_ddl() {
        assert_eq!(
            drop_constraint_sql("public", "orders", "orders_customer_id_fkey").unwrap(),
            "ALTER TABLE \"public\".\"orders\" DROP CONSTRAINT IF EXISTS \"orders_customer_id_fkey\""
        );
        assert_eq!(
            add_constraint_sql(
                "public",
                "orders",
                "orders_customer_id_fkey",
                "FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE"
            )
            .unwrap(),
            "ALTER TABLE \"public\".\"orders\" ADD CONSTRAINT \"orders_customer_id_fkey\" \
             FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_sequence_and_scan_sql() {
        assert_eq!(
            restart_sequence_sql("public", "orders_id_seq", 9).unwrap(),
            "ALTER SEQUENCE \"public\".\"orders_id_seq\" RESTART WITH 9"
        );
        assert_eq!(
            max_value_sql("public", "orders", "id").unwrap(),
            "SELECT MAX(\"id\")::int8 FROM \"public\".\"orders\""
        );
        assert_eq!(
            select_all_sql("public", "orders").unwrap(),
            "SELECT * FROM \"public\".\"orders\""
        );
    }
}
