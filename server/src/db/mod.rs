//! Postgres-backed storage for workspace records.

mod pool;
mod records;

pub use pool::*;
pub use records::*;
