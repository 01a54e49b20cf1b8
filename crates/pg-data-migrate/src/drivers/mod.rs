//! Database drivers.
//!
//! - [`postgres`]: [`PgStore`], the PostgreSQL implementation of the store traits
//! - [`tls`]: `sslmode` handling shared by every connection

pub mod postgres;
pub mod tls;

pub use postgres::PgStore;
pub use tls::{SslMode, TlsBuilder};
