//! Event state machine over the partition set.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::engine::TransferEvent;
use crate::job::{JobKey, JobPartitions, JobRecord, Partition};

use super::format::status_line;
use super::throttle::RateLimitedNotify;

/// Minimum wall-clock gap between two status-line pushes for the same job.
pub const UI_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

/// Ephemeral per-job progress. Rebuilt from the next progress event after a restart.
#[derive(Debug, Clone)]
pub struct ProgressScratch {
    pub percent: f64,
    pub status: RateLimitedNotify<String>,
}

/// What applying one event did. The orchestrator turns this into side effects
/// (recovery writes, finalization, notices).
#[derive(Debug, Clone, PartialEq)]
pub enum Reduction {
    /// Unknown key or an event that no longer applies.
    Ignored,
    Progress {
        key: JobKey,
        percent: f64,
        /// Status line, present only when a UI push is due.
        status_line: Option<String>,
        /// The job was rebuilt from the recovery mirror by this event.
        promoted: bool,
    },
    /// The job now sits in `extracting`.
    Extracted(JobRecord),
    Cancelled(JobKey),
    /// The job moved to `completed`; finalization should run.
    Finished(JobRecord),
    /// The job moved to `failed`.
    Failed { job: JobRecord, reason: String },
}

#[derive(Debug)]
pub struct ProgressReducer {
    scratch: HashMap<JobKey, ProgressScratch>,
    interval: Duration,
}

impl Default for ProgressReducer {
    fn default() -> Self {
        Self::new(UI_UPDATE_INTERVAL)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl ProgressReducer {
    pub fn new(interval: Duration) -> Self {
        Self {
            scratch: HashMap::new(),
            interval,
        }
    }

    /// Current percentage for `key`, if tracked.
    pub fn percent(&self, key: &JobKey) -> Option<f64> {
        self.scratch.get(key).map(|s| s.percent)
    }

    pub fn scratch(&self, key: &JobKey) -> Option<&ProgressScratch> {
        self.scratch.get(key)
    }

    /// Percentages of every tracked job.
    pub fn percentages(&self) -> HashMap<JobKey, f64> {
        self.scratch
            .iter()
            .map(|(k, s)| (k.clone(), s.percent))
            .collect()
    }

    /// Drop scratch for `key` (local cancel, clear).
    pub fn forget(&mut self, key: &JobKey) {
        self.scratch.remove(key);
    }

    /// Apply one engine event.
    ///
    /// `recovered` is the recovery-mirror record for the event's key, looked up
    /// by the caller only when the key is not tracked in memory.
    pub fn apply(
        &mut self,
        event: TransferEvent,
        partitions: &mut JobPartitions,
        recovered: Option<JobRecord>,
        categorized_layout: bool,
        now: Instant,
    ) -> Reduction {
        match event {
            TransferEvent::Progress {
                key,
                downloaded,
                total,
                speed,
                eta,
            } => self.on_progress(key, downloaded, total, speed, eta, partitions, recovered, now),
            TransferEvent::Extracted { key } => self.on_extracted(key, partitions, recovered),
            TransferEvent::Cancelled { key } => {
                self.scratch.remove(&key);
                if partitions.contains(&key) || recovered.is_some() {
                    Reduction::Cancelled(key)
                } else {
                    Reduction::Ignored
                }
            }
            TransferEvent::Finished { key, .. } => {
                self.on_finished(key, partitions, recovered, categorized_layout)
            }
            TransferEvent::Failed { key, reason } => {
                self.on_failed(key, reason, partitions, recovered)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_progress(
        &mut self,
        key: JobKey,
        downloaded: u64,
        total: u64,
        speed: f64,
        eta: Option<f64>,
        partitions: &mut JobPartitions,
        recovered: Option<JobRecord>,
        now: Instant,
    ) -> Reduction {
        let mut promoted = false;
        match partitions.locate(&key) {
            Some(Partition::Downloading) => {}
            Some(_) => return Reduction::Ignored,
            None => {
                let Some(job) = recovered else {
                    return Reduction::Ignored;
                };
                if partitions.insert(Partition::Downloading, job).is_err() {
                    return Reduction::Ignored;
                }
                tracing::info!(key = %key, "recovered in-flight job from recovery mirror");
                promoted = true;
            }
        }

        let raw = if total == 0 {
            0.0
        } else {
            round2(downloaded as f64 / total as f64 * 100.0)
        };
        let interval = self.interval;
        let entry = self.scratch.entry(key.clone()).or_insert_with(|| ProgressScratch {
            percent: 0.0,
            status: RateLimitedNotify::new(String::new(), interval),
        });
        // Out-of-order events must not move the bar backwards.
        entry.percent = raw.clamp(entry.percent, 100.0);
        let line = status_line(entry.percent, downloaded, total, speed, eta);
        let status_line = entry.status.set(line, now).cloned();

        Reduction::Progress {
            key,
            percent: entry.percent,
            status_line,
            promoted,
        }
    }

    fn on_extracted(
        &mut self,
        key: JobKey,
        partitions: &mut JobPartitions,
        recovered: Option<JobRecord>,
    ) -> Reduction {
        self.scratch.remove(&key);
        match partitions.locate(&key) {
            Some(Partition::Downloading) => {
                match partitions.move_job(&key, Partition::Downloading, Partition::Extracting) {
                    Ok(job) => Reduction::Extracted(job.clone()),
                    Err(_) => Reduction::Ignored,
                }
            }
            Some(_) => Reduction::Ignored,
            None => match recovered {
                Some(job) => {
                    if partitions.insert(Partition::Extracting, job).is_err() {
                        return Reduction::Ignored;
                    }
                    partitions
                        .get(&key)
                        .cloned()
                        .map(Reduction::Extracted)
                        .unwrap_or(Reduction::Ignored)
                }
                None => Reduction::Ignored,
            },
        }
    }

    fn on_finished(
        &mut self,
        key: JobKey,
        partitions: &mut JobPartitions,
        recovered: Option<JobRecord>,
        categorized_layout: bool,
    ) -> Reduction {
        self.scratch.remove(&key);
        let from = match partitions.locate(&key) {
            Some(p @ (Partition::Extracting | Partition::Downloading)) => p,
            // Already completed, failed or still queued: nothing to finalize.
            Some(_) => return Reduction::Ignored,
            None => {
                let Some(job) = recovered else {
                    return Reduction::Ignored;
                };
                if partitions.insert(Partition::Extracting, job).is_err() {
                    return Reduction::Ignored;
                }
                Partition::Extracting
            }
        };
        // Local installs arrive with the layout already pinned.
        partitions.edit(&key, |j| {
            j.categorized.get_or_insert(categorized_layout);
        });
        match partitions.move_job(&key, from, Partition::Completed) {
            Ok(job) => Reduction::Finished(job.clone()),
            Err(_) => Reduction::Ignored,
        }
    }

    fn on_failed(
        &mut self,
        key: JobKey,
        reason: String,
        partitions: &mut JobPartitions,
        recovered: Option<JobRecord>,
    ) -> Reduction {
        self.scratch.remove(&key);
        let moved = match partitions.locate(&key) {
            Some(p @ (Partition::Downloading | Partition::Extracting)) => partitions
                .move_job(&key, p, Partition::Failed)
                .cloned()
                .ok(),
            Some(_) => None,
            None => recovered.and_then(|job| {
                partitions.insert(Partition::Failed, job).ok()?;
                partitions.get(&key).cloned()
            }),
        };
        match moved {
            Some(job) => Reduction::Failed { job, reason },
            None => Reduction::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FinishKind;
    use crate::job::JobStatus;
    use std::path::PathBuf;

    fn job(key: &str) -> JobRecord {
        JobRecord {
            key: JobKey::new(key),
            title: "SR".into(),
            destination_root: PathBuf::from("/mods"),
            category: String::new(),
            name: key.to_uppercase(),
            source_url: String::new(),
            transfer_url: String::new(),
            preview_url: None,
            archive_name: format!("{key}.7z"),
            categorized: None,
            status: JobStatus::Pending,
        }
    }

    fn progress(key: &str, downloaded: u64, total: u64) -> TransferEvent {
        TransferEvent::Progress {
            key: JobKey::new(key),
            downloaded,
            total,
            speed: 1024.0,
            eta: Some(3.0),
        }
    }

    fn downloading(keys: &[&str]) -> JobPartitions {
        let mut p = JobPartitions::new();
        for k in keys {
            p.insert(Partition::Downloading, job(k)).unwrap();
        }
        p
    }

    #[test]
    fn progress_percentage_and_throttle() {
        let mut r = ProgressReducer::default();
        let mut p = downloading(&["a"]);
        let t0 = Instant::now();

        let out = r.apply(progress("a", 1, 3), &mut p, None, false, t0);
        match out {
            Reduction::Progress {
                percent,
                status_line,
                promoted,
                ..
            } => {
                assert_eq!(percent, 33.33);
                assert!(status_line.unwrap().starts_with("33.33%"));
                assert!(!promoted);
            }
            other => panic!("unexpected {other:?}"),
        }

        let out = r.apply(
            progress("a", 2, 3),
            &mut p,
            None,
            false,
            t0 + Duration::from_millis(300),
        );
        assert!(matches!(
            out,
            Reduction::Progress { percent, status_line: None, .. } if percent == 66.67
        ));
        assert_eq!(r.percent(&JobKey::new("a")), Some(66.67));
        assert!(r
            .scratch(&JobKey::new("a"))
            .unwrap()
            .status
            .get()
            .starts_with("66.67%"));

        let out = r.apply(
            progress("a", 3, 3),
            &mut p,
            None,
            false,
            t0 + Duration::from_millis(1000),
        );
        assert!(matches!(
            out,
            Reduction::Progress { status_line: Some(_), .. }
        ));
    }

    #[test]
    fn progress_is_non_decreasing() {
        let mut r = ProgressReducer::default();
        let mut p = downloading(&["a"]);
        let t0 = Instant::now();
        let mut last = 0.0;
        for (i, downloaded) in [10u64, 25, 20, 60, 59, 100].into_iter().enumerate() {
            let now = t0 + Duration::from_millis(i as u64 * 10);
            if let Reduction::Progress { percent, .. } =
                r.apply(progress("a", downloaded, 100), &mut p, None, false, now)
            {
                assert!(percent >= last, "{percent} < {last}");
                last = percent;
            }
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn zero_total_reports_zero() {
        let mut r = ProgressReducer::default();
        let mut p = downloading(&["a"]);
        let out = r.apply(progress("a", 10, 0), &mut p, None, false, Instant::now());
        assert!(matches!(out, Reduction::Progress { percent, .. } if percent == 0.0));
    }

    #[test]
    fn progress_for_unknown_key_is_ignored() {
        let mut r = ProgressReducer::default();
        let mut p = JobPartitions::new();
        assert_eq!(
            r.apply(progress("ghost", 1, 2), &mut p, None, false, Instant::now()),
            Reduction::Ignored
        );
        assert!(p.is_empty());
        assert!(r.percent(&JobKey::new("ghost")).is_none());
    }

    #[test]
    fn progress_promotes_recovered_job() {
        let mut r = ProgressReducer::default();
        let mut p = JobPartitions::new();
        let out = r.apply(
            progress("a", 1, 2),
            &mut p,
            Some(job("a")),
            false,
            Instant::now(),
        );
        assert!(matches!(out, Reduction::Progress { promoted: true, .. }));
        assert_eq!(p.locate(&JobKey::new("a")), Some(Partition::Downloading));
    }

    #[test]
    fn progress_after_local_cancel_is_ignored() {
        let mut r = ProgressReducer::default();
        let mut p = JobPartitions::new();
        p.insert(Partition::Failed, job("a")).unwrap();
        assert_eq!(
            r.apply(progress("a", 1, 2), &mut p, None, false, Instant::now()),
            Reduction::Ignored
        );
    }

    #[test]
    fn extracted_moves_job_and_drops_scratch() {
        let mut r = ProgressReducer::default();
        let mut p = downloading(&["a"]);
        r.apply(progress("a", 1, 2), &mut p, None, false, Instant::now());
        let out = r.apply(
            TransferEvent::Extracted { key: JobKey::new("a") },
            &mut p,
            None,
            false,
            Instant::now(),
        );
        match out {
            Reduction::Extracted(j) => assert_eq!(j.status, JobStatus::Extracting),
            other => panic!("unexpected {other:?}"),
        }
        assert!(r.percent(&JobKey::new("a")).is_none());
        assert_eq!(p.locate(&JobKey::new("a")), Some(Partition::Extracting));
    }

    #[test]
    fn finished_completes_and_snapshots_layout() {
        let mut r = ProgressReducer::default();
        let mut p = JobPartitions::new();
        p.insert(Partition::Extracting, job("a")).unwrap();
        let out = r.apply(
            TransferEvent::Finished {
                key: JobKey::new("a"),
                kind: FinishKind::Auto,
            },
            &mut p,
            None,
            true,
            Instant::now(),
        );
        match out {
            Reduction::Finished(j) => {
                assert_eq!(j.status, JobStatus::Completed);
                assert_eq!(j.categorized, Some(true));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(p.locate(&JobKey::new("a")), Some(Partition::Completed));
    }

    #[test]
    fn finished_before_extracted_is_tolerated() {
        let mut r = ProgressReducer::default();
        let mut p = downloading(&["a"]);
        let fin = TransferEvent::Finished {
            key: JobKey::new("a"),
            kind: FinishKind::Auto,
        };
        assert!(matches!(
            r.apply(fin.clone(), &mut p, None, false, Instant::now()),
            Reduction::Finished(_)
        ));
        // Late extracted and a duplicate finished are both no-ops.
        assert_eq!(
            r.apply(
                TransferEvent::Extracted { key: JobKey::new("a") },
                &mut p,
                None,
                false,
                Instant::now()
            ),
            Reduction::Ignored
        );
        assert_eq!(
            r.apply(fin, &mut p, None, false, Instant::now()),
            Reduction::Ignored
        );
        assert_eq!(p.len(Partition::Completed), 1);
    }

    #[test]
    fn finished_for_unknown_key_is_noop() {
        let mut r = ProgressReducer::default();
        let mut p = downloading(&["a"]);
        let before = p.snapshot();
        let out = r.apply(
            TransferEvent::Finished {
                key: JobKey::new("nope"),
                kind: FinishKind::Manual,
            },
            &mut p,
            None,
            false,
            Instant::now(),
        );
        assert_eq!(out, Reduction::Ignored);
        assert_eq!(p.snapshot(), before);
    }

    #[test]
    fn manual_finish_keeps_pinned_layout() {
        let mut r = ProgressReducer::default();
        let mut p = JobPartitions::new();
        let mut local = job("a");
        local.categorized = Some(true);
        p.insert(Partition::Extracting, local).unwrap();
        let out = r.apply(
            TransferEvent::Finished {
                key: JobKey::new("a"),
                kind: FinishKind::Manual,
            },
            &mut p,
            None,
            false,
            Instant::now(),
        );
        assert!(matches!(out, Reduction::Finished(ref j) if j.categorized == Some(true)));
    }

    #[test]
    fn finished_uses_recovery_record() {
        let mut r = ProgressReducer::default();
        let mut p = JobPartitions::new();
        let out = r.apply(
            TransferEvent::Finished {
                key: JobKey::new("a"),
                kind: FinishKind::Auto,
            },
            &mut p,
            Some(job("a")),
            false,
            Instant::now(),
        );
        assert!(matches!(out, Reduction::Finished(ref j) if j.categorized == Some(false)));
        assert_eq!(p.len(Partition::Completed), 1);
    }

    #[test]
    fn cancelled_drops_scratch_without_moving() {
        let mut r = ProgressReducer::default();
        let mut p = downloading(&["a"]);
        r.apply(progress("a", 1, 2), &mut p, None, false, Instant::now());
        let out = r.apply(
            TransferEvent::Cancelled { key: JobKey::new("a") },
            &mut p,
            None,
            false,
            Instant::now(),
        );
        assert_eq!(out, Reduction::Cancelled(JobKey::new("a")));
        assert!(r.percent(&JobKey::new("a")).is_none());
        assert_eq!(p.locate(&JobKey::new("a")), Some(Partition::Downloading));
    }

    #[test]
    fn engine_failure_moves_to_failed() {
        let mut r = ProgressReducer::default();
        let mut p = downloading(&["a"]);
        let out = r.apply(
            TransferEvent::Failed {
                key: JobKey::new("a"),
                reason: "timeout".into(),
            },
            &mut p,
            None,
            false,
            Instant::now(),
        );
        assert!(matches!(out, Reduction::Failed { ref reason, .. } if reason == "timeout"));
        assert_eq!(p.locate(&JobKey::new("a")), Some(Partition::Failed));
    }
}
