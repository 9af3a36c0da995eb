//! Recovery mirror: durable copy of every in-flight job (SQLite via sqlx).
//!
//! An entry is written when a job is dispatched to the transfer engine and
//! removed when the engine reports a terminal event for it. After a restart
//! the orchestrator rebuilds in-flight jobs from these entries.

pub mod db;
mod entries;

pub use db::RecoveryDb;
pub use entries::RecoveryEntry;
