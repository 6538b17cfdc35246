//! Document store adapters.
//!
//! - [`traits::DocumentStore`]: the capability the cache consumes
//! - [`memory::InMemoryStore`]: in-process, for embedding and tests
//! - [`sql::SqlStore`]: SQLite / MySQL

pub mod traits;
pub mod memory;
pub mod sql;
