//! Persistence layer for jobs: an in-memory map and a libSQL-backed store.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlJobStore;
pub use memory::InMemoryJobStore;
pub use traits::JobStore;
