//! Row values carried between the two stores.
//!
//! A value is never decoded into a Rust type on its way from source to
//! target. The binary wire representation the source returned is kept together
//! with its PostgreSQL type and written back verbatim, so every column type
//! the server can send in binary (including arrays, enums, ranges and
//! extension types) copies without loss.

use std::error::Error;
use std::fmt;

use bytes::{Bytes, BytesMut};
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// Longest rendering of a single value in error previews.
const PREVIEW_LIMIT: usize = 64;

/// One column value in the source's binary wire format.
#[derive(Clone, PartialEq)]
pub struct CellValue {
    /// Type the source reported for the column.
    pub ty: Type,
    /// Raw binary representation; `None` is SQL NULL.
    pub bytes: Option<Bytes>,
}

impl CellValue {
    pub fn new(ty: Type, bytes: Option<Bytes>) -> Self {
        Self { ty, bytes }
    }

    pub fn null(ty: Type) -> Self {
        Self { ty, bytes: None }
    }

    pub fn int4(v: i32) -> Self {
        Self::new(Type::INT4, Some(Bytes::copy_from_slice(&v.to_be_bytes())))
    }

    pub fn int8(v: i64) -> Self {
        Self::new(Type::INT8, Some(Bytes::copy_from_slice(&v.to_be_bytes())))
    }

    pub fn text(v: &str) -> Self {
        Self::new(Type::TEXT, Some(Bytes::copy_from_slice(v.as_bytes())))
    }

    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    /// Decode integer-typed values. Anything else yields `None`.
    pub fn as_i64(&self) -> Option<i64> {
        let raw = self.bytes.as_ref()?.as_ref();
        if self.ty == Type::INT2 {
            <[u8; 2]>::try_from(raw).ok().map(|b| i16::from_be_bytes(b) as i64)
        } else if self.ty == Type::INT4 {
            <[u8; 4]>::try_from(raw).ok().map(|b| i32::from_be_bytes(b) as i64)
        } else if self.ty == Type::INT8 {
            <[u8; 8]>::try_from(raw).ok().map(i64::from_be_bytes)
        } else {
            None
        }
    }

    /// Short human-readable rendering for log lines.
    pub fn preview(&self) -> String {
        let Some(raw) = &self.bytes else {
            return "NULL".to_string();
        };
        if let Some(n) = self.as_i64() {
            return n.to_string();
        }
        let textual = [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME];
        let rendered = if textual.contains(&self.ty) {
            match std::str::from_utf8(raw) {
                Ok(s) => format!("'{}'", s),
                Err(_) => format!("\\x{}", hex::encode(raw)),
            }
        } else if self.ty == Type::BOOL {
            match raw.first() {
                Some(0) => "false".to_string(),
                _ => "true".to_string(),
            }
        } else {
            format!("\\x{}", hex::encode(raw))
        };
        truncate(rendered)
    }
}

fn truncate(mut s: String) -> String {
    if s.len() > PREVIEW_LIMIT {
        let mut end = PREVIEW_LIMIT;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        s.push_str("...");
    }
    s
}

impl fmt::Debug for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.preview(), self.ty.name())
    }
}

impl<'a> FromSql<'a> for CellValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self::new(ty.clone(), Some(Bytes::copy_from_slice(raw))))
    }

    fn from_sql_null(ty: &Type) -> Result<Self, BoxError> {
        Ok(Self::null(ty.clone()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl ToSql for CellValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        let Some(raw) = &self.bytes else {
            return Ok(IsNull::Yes);
        };
        // Built-in types have fixed OIDs on every server; a mismatch there means
        // the target column really has a different type. User-defined and
        // domain types are passed through and left to the server to check.
        let both_builtin = Type::from_oid(ty.oid()).is_some() && Type::from_oid(self.ty.oid()).is_some();
        if both_builtin && ty != &self.ty {
            return Err(format!(
                "column type mismatch: source sent {}, target expects {}",
                self.ty.name(),
                ty.name()
            )
            .into());
        }
        out.extend_from_slice(raw);
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Full contents of one table as returned by the source.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    /// Column names, in the order of the first returned row.
    pub columns: Vec<String>,
    /// Row values, each aligned with `columns`.
    pub rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Split into consecutive batches of at most `batch_size` rows.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = Batch<'_>> {
        self.rows
            .chunks(batch_size.max(1))
            .enumerate()
            .map(|(index, rows)| Batch { index, rows })
    }

    /// Remove the named columns from the header and from every row. Names
    /// that are not present are ignored.
    pub fn without_columns(self, names: &[String]) -> RowSet {
        if names.is_empty() {
            return self;
        }
        let keep: Vec<bool> = self.columns.iter().map(|c| !names.contains(c)).collect();
        RowSet {
            columns: retain_flagged(self.columns, &keep),
            rows: self
                .rows
                .into_iter()
                .map(|row| retain_flagged(row, &keep))
                .collect(),
        }
    }

    /// `col=value` rendering of one row, for error logs.
    pub fn preview_row(&self, row: &[CellValue]) -> String {
        self.columns
            .iter()
            .zip(row)
            .map(|(col, value)| format!("{}={}", col, value.preview()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn retain_flagged<T>(values: Vec<T>, keep: &[bool]) -> Vec<T> {
    values
        .into_iter()
        .zip(keep)
        .filter_map(|(value, &kept)| kept.then_some(value))
        .collect()
}

/// One bounded slice of a [`RowSet`].
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// Zero-based position of the batch within the table.
    pub index: usize,
    pub rows: &'a [Vec<CellValue>],
}

impl Batch<'_> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_decoding() {
        assert_eq!(CellValue::int4(-7).as_i64(), Some(-7));
        assert_eq!(CellValue::int8(9_000_000_000).as_i64(), Some(9_000_000_000));
        assert_eq!(CellValue::text("12").as_i64(), None);
        assert_eq!(CellValue::null(Type::INT4).as_i64(), None);
    }

    #[test]
    fn test_to_sql_passes_bytes_through() {
        let value = CellValue::int4(42);
        let mut out = BytesMut::new();
        let is_null = value.to_sql(&Type::INT4, &mut out).unwrap();
        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&out[..], &42i32.to_be_bytes());
    }

    #[test]
    fn test_to_sql_null() {
        let mut out = BytesMut::new();
        let is_null = CellValue::null(Type::TIMESTAMPTZ)
            .to_sql(&Type::TIMESTAMPTZ, &mut out)
            .unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn test_to_sql_rejects_builtin_mismatch() {
        let mut out = BytesMut::new();
        assert!(CellValue::int4(1).to_sql(&Type::INT8, &mut out).is_err());
    }

    #[test]
    fn test_from_sql_keeps_raw_bytes() {
        let raw = [0u8, 1, 2, 255];
        let value = CellValue::from_sql(&Type::BYTEA, &raw).unwrap();
        assert_eq!(value.bytes.as_deref(), Some(&raw[..]));
        assert_eq!(value.preview(), "\\x000102ff");
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "x".repeat(200);
        let preview = CellValue::text(&long).preview();
        assert!(preview.ends_with("..."));
        assert!(preview.len() <= PREVIEW_LIMIT + 3);
    }

    #[test]
    fn test_batches_respect_size() {
        let rows = (0..250).map(|i| vec![CellValue::int4(i)]).collect();
        let set = RowSet::new(vec!["id".into()], rows);
        let sizes: Vec<usize> = set.batches(100).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(set.batches(100).last().map(|b| b.index), Some(2));
    }

    #[test]
    fn test_without_columns() {
        let set = RowSet::new(
            vec!["id".into(), "price".into(), "doubled".into()],
            vec![
                vec![CellValue::int4(1), CellValue::int4(10), CellValue::int4(20)],
                vec![CellValue::int4(2), CellValue::int4(15), CellValue::int4(30)],
            ],
        );

        let trimmed = set.without_columns(&["doubled".into(), "missing".into()]);
        assert_eq!(trimmed.columns, vec!["id", "price"]);
        assert_eq!(trimmed.rows[1].len(), 2);
        assert_eq!(trimmed.rows[1][1].as_i64(), Some(15));
    }

    #[test]
    fn test_preview_row() {
        let set = RowSet::new(
            vec!["id".into(), "email".into()],
            vec![vec![CellValue::int4(3), CellValue::text("a@b.c")]],
        );
        assert_eq!(set.preview_row(&set.rows[0]), "id=3, email='a@b.c'");
    }
}
