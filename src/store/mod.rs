//! Persistence layer: the libSQL-backed secondary index over orders.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::OrderIndex;
