//! PostgreSQL write-behind journal.
//!
//! The in-process store is authoritative; this module mirrors committed
//! effects for durability and offline inspection. The engine runs fine
//! with persistence disabled.

pub mod db;
pub mod journal;
pub mod schema;
pub mod worker;

pub use db::Database;
pub use journal::JournalWriter;
pub use schema::init_schema;
pub use worker::JournalWorker;
