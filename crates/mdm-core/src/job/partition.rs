//! The job partition set: `queue`, `downloading`, `extracting`, `completed`, `failed`.

use serde::Serialize;
use std::collections::VecDeque;

use super::types::{JobError, JobKey, JobRecord, JobStatus};

/// One of the five disjoint job groups. Each maps to exactly one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Queue,
    Downloading,
    Extracting,
    Completed,
    Failed,
}

impl Partition {
    pub const ALL: [Partition; 5] = [
        Partition::Queue,
        Partition::Downloading,
        Partition::Extracting,
        Partition::Completed,
        Partition::Failed,
    ];

    pub fn status(self) -> JobStatus {
        match self {
            Partition::Queue => JobStatus::Pending,
            Partition::Downloading => JobStatus::Downloading,
            Partition::Extracting => JobStatus::Extracting,
            Partition::Completed => JobStatus::Completed,
            Partition::Failed => JobStatus::Failed,
        }
    }

    pub fn for_status(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => Partition::Queue,
            JobStatus::Downloading => Partition::Downloading,
            JobStatus::Extracting => Partition::Extracting,
            JobStatus::Completed => Partition::Completed,
            JobStatus::Failed => Partition::Failed,
        }
    }
}

/// Owned store of every known job. Single writer: the orchestrator.
#[derive(Debug, Default)]
pub struct JobPartitions {
    queue: VecDeque<JobRecord>,
    downloading: Vec<JobRecord>,
    extracting: Vec<JobRecord>,
    completed: Vec<JobRecord>,
    failed: Vec<JobRecord>,
}

/// Serialized read-only copy handed to UI consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionSnapshot {
    pub queue: Vec<JobRecord>,
    pub downloading: Vec<JobRecord>,
    pub extracting: Vec<JobRecord>,
    pub completed: Vec<JobRecord>,
    pub failed: Vec<JobRecord>,
}

impl JobPartitions {
    pub fn new() -> Self {
        Self::default()
    }

    fn slice(&self, partition: Partition) -> Box<dyn Iterator<Item = &JobRecord> + '_> {
        match partition {
            Partition::Queue => Box::new(self.queue.iter()),
            Partition::Downloading => Box::new(self.downloading.iter()),
            Partition::Extracting => Box::new(self.extracting.iter()),
            Partition::Completed => Box::new(self.completed.iter()),
            Partition::Failed => Box::new(self.failed.iter()),
        }
    }

    pub fn len(&self, partition: Partition) -> usize {
        match partition {
            Partition::Queue => self.queue.len(),
            Partition::Downloading => self.downloading.len(),
            Partition::Extracting => self.extracting.len(),
            Partition::Completed => self.completed.len(),
            Partition::Failed => self.failed.len(),
        }
    }

    pub fn total(&self) -> usize {
        Partition::ALL.iter().map(|p| self.len(*p)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Jobs of one partition, in order.
    pub fn iter(&self, partition: Partition) -> impl Iterator<Item = &JobRecord> + '_ {
        self.slice(partition)
    }

    /// Every job, partition by partition.
    pub fn iter_all(&self) -> impl Iterator<Item = &JobRecord> + '_ {
        Partition::ALL.into_iter().flat_map(move |p| self.slice(p))
    }

    /// Partition currently holding `key`.
    pub fn locate(&self, key: &JobKey) -> Option<Partition> {
        Partition::ALL
            .into_iter()
            .find(|p| self.slice(*p).any(|j| &j.key == key))
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.locate(key).is_some()
    }

    pub fn get(&self, key: &JobKey) -> Option<&JobRecord> {
        self.iter_all().find(|j| &j.key == key)
    }

    /// Insert a job at the back of `partition`, stamping the matching status.
    pub fn insert(&mut self, partition: Partition, mut job: JobRecord) -> Result<(), JobError> {
        if self.contains(&job.key) {
            return Err(JobError::DuplicateKey(job.key));
        }
        job.status = partition.status();
        match partition {
            Partition::Queue => self.queue.push_back(job),
            Partition::Downloading => self.downloading.push(job),
            Partition::Extracting => self.extracting.push(job),
            Partition::Completed => self.completed.push(job),
            Partition::Failed => self.failed.push(job),
        }
        Ok(())
    }

    /// Remove `key` from `partition`. None if it is not there.
    pub fn take(&mut self, partition: Partition, key: &JobKey) -> Option<JobRecord> {
        match partition {
            Partition::Queue => {
                let idx = self.queue.iter().position(|j| &j.key == key)?;
                self.queue.remove(idx)
            }
            Partition::Downloading => take_from(&mut self.downloading, key),
            Partition::Extracting => take_from(&mut self.extracting, key),
            Partition::Completed => take_from(&mut self.completed, key),
            Partition::Failed => take_from(&mut self.failed, key),
        }
    }

    /// Remove `key` from whichever partition holds it.
    pub fn remove(&mut self, key: &JobKey) -> Option<(Partition, JobRecord)> {
        let partition = self.locate(key)?;
        self.take(partition, key).map(|job| (partition, job))
    }

    /// Move `key` from `from` to the back of `to`. Returns the moved record.
    pub fn move_job(
        &mut self,
        key: &JobKey,
        from: Partition,
        to: Partition,
    ) -> Result<&JobRecord, JobError> {
        let Some(mut job) = self.take(from, key) else {
            return Err(match self.locate(key) {
                Some(actual) => JobError::WrongPartition {
                    key: key.clone(),
                    expected: from.status(),
                    actual: actual.status(),
                },
                None => JobError::UnknownKey(key.clone()),
            });
        };
        job.status = to.status();
        let slot = match to {
            Partition::Queue => {
                self.queue.push_back(job);
                self.queue.back()
            }
            Partition::Downloading => push_back(&mut self.downloading, job),
            Partition::Extracting => push_back(&mut self.extracting, job),
            Partition::Completed => push_back(&mut self.completed, job),
            Partition::Failed => push_back(&mut self.failed, job),
        };
        slot.ok_or_else(|| JobError::UnknownKey(key.clone()))
    }

    /// Pop the head of `queue` (FIFO dispatch order).
    pub fn pop_queue_front(&mut self) -> Option<JobRecord> {
        self.queue.pop_front()
    }

    /// Mutable access to a job for field edits that don't touch status.
    pub fn edit<F>(&mut self, key: &JobKey, f: F) -> bool
    where
        F: FnOnce(&mut JobRecord),
    {
        let found = self
            .queue
            .iter_mut()
            .chain(self.downloading.iter_mut())
            .chain(self.extracting.iter_mut())
            .chain(self.completed.iter_mut())
            .chain(self.failed.iter_mut())
            .find(|j| &j.key == key);
        match found {
            Some(job) => {
                let status = job.status;
                let key = job.key.clone();
                f(job);
                job.status = status;
                job.key = key;
                true
            }
            None => false,
        }
    }

    /// Drop every job in `completed` and `failed`. Returns how many were removed.
    pub fn clear_finished(&mut self) -> usize {
        let n = self.completed.len() + self.failed.len();
        self.completed.clear();
        self.failed.clear();
        n
    }

    pub fn snapshot(&self) -> PartitionSnapshot {
        PartitionSnapshot {
            queue: self.queue.iter().cloned().collect(),
            downloading: self.downloading.clone(),
            extracting: self.extracting.clone(),
            completed: self.completed.clone(),
            failed: self.failed.clone(),
        }
    }
}

fn take_from(list: &mut Vec<JobRecord>, key: &JobKey) -> Option<JobRecord> {
    let idx = list.iter().position(|j| &j.key == key)?;
    Some(list.remove(idx))
}

fn push_back(list: &mut Vec<JobRecord>, job: JobRecord) -> Option<&JobRecord> {
    list.push(job);
    list.last()
}
