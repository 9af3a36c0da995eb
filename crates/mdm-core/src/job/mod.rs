//! Job records and the five-way partition set that owns them.
//!
//! A job's status is never assigned directly: moving it between partitions
//! is the only way it changes, so status always matches where the job lives.

mod partition;
mod types;

pub use partition::{JobPartitions, Partition, PartitionSnapshot};
pub use types::{JobError, JobKey, JobRecord, JobStatus};
