//! Job admission.
//!
//! Promotes queued jobs into `downloading` while the concurrency limit allows.
//! The orchestrator re-runs admission after every partition mutation so a freed
//! slot is reused immediately.

mod admission;

pub use admission::AdmissionController;
