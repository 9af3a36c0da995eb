pub mod config;
pub mod logging;

pub mod catalog;
pub mod conflict;
pub mod engine;
pub mod job;
pub mod orchestrator;
pub mod progress;
pub mod recovery_db;
pub mod scheduler;
pub mod storage;
