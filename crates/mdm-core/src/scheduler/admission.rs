//! Concurrency-limited admission from `queue` into `downloading`.

use crate::config::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::job::{JobPartitions, JobRecord, Partition};

/// Keeps `|downloading| <= limit`. Holds no job state of its own.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    limit: usize,
}

impl AdmissionController {
    /// Create a controller; `limit` is clamped into 1..=99.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: clamp_limit(limit),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the limit (e.g. after a config reload). Running jobs above a
    /// lowered limit keep running; no new job is admitted until below it.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = clamp_limit(limit);
    }

    /// Free download slots (0 when at or above the limit).
    pub fn free_slots(&self, partitions: &JobPartitions) -> usize {
        self.limit
            .saturating_sub(partitions.len(Partition::Downloading))
    }

    /// Pop queue heads into `downloading` until the limit is reached or the queue
    /// is empty. Returns the admitted jobs in dispatch (FIFO) order; the caller
    /// dispatches them to the transfer engine.
    pub fn admit(&self, partitions: &mut JobPartitions) -> Vec<JobRecord> {
        let mut admitted = Vec::new();
        while partitions.len(Partition::Downloading) < self.limit {
            let Some(job) = partitions.pop_queue_front() else {
                break;
            };
            let key = job.key.clone();
            if let Err(e) = partitions.insert(Partition::Downloading, job) {
                tracing::warn!(key = %key, "admission skipped: {}", e);
                continue;
            }
            if let Some(job) = partitions.get(&key) {
                admitted.push(job.clone());
            }
        }
        admitted
    }
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(MIN_CONCURRENCY as usize, MAX_CONCURRENCY as usize)
}
