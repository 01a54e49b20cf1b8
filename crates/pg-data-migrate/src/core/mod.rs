//! Core types and store abstractions.
//!
//! - [`schema`]: table names, foreign-key edges, sequence bindings and
//!   target table layout
//! - [`value`]: binary row values, row sets and batches
//! - [`traits`]: source and target store traits
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use schema::{ForeignKeyEdge, SequenceBinding, TableName, TargetTable};
pub use traits::{SourceStore, Store, TargetStore};
pub use value::{Batch, CellValue, RowSet};
