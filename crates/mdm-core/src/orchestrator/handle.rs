//! Actor plumbing: the input channel, the run loop and the caller handle.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::{Notice, Orchestrator, OrchestratorSnapshot, Routed};
use crate::conflict::{DecisionError, DecisionId, ResolutionAction};
use crate::engine::TransferEvent;
use crate::job::{JobError, JobKey, JobRecord};

/// Inputs buffered before senders wait.
pub const INPUT_CAPACITY: usize = 1024;

/// Everything the orchestrator reacts to, drained one at a time.
#[derive(Debug)]
pub enum Input {
    SubmitUrl {
        url: String,
        reply: Option<oneshot::Sender<Result<(JobKey, Routed)>>>,
    },
    Retry {
        key: JobKey,
        reply: Option<oneshot::Sender<Result<Routed, JobError>>>,
    },
    InstallArchives {
        title: String,
        archives: Vec<PathBuf>,
        reply: Option<oneshot::Sender<Vec<Result<(JobKey, Routed)>>>>,
    },
    Engine(TransferEvent),
    Decide {
        id: DecisionId,
        action: ResolutionAction,
        reply: Option<oneshot::Sender<Result<(), DecisionError>>>,
    },
    Cancel {
        key: JobKey,
        reply: Option<oneshot::Sender<Result<(), JobError>>>,
    },
    Clear {
        key: JobKey,
        reply: Option<oneshot::Sender<Result<JobRecord, JobError>>>,
    },
    ClearFinished {
        reply: Option<oneshot::Sender<usize>>,
    },
    SetConcurrency(u32),
}

pub fn input_channel() -> (mpsc::Sender<Input>, mpsc::Receiver<Input>) {
    mpsc::channel(INPUT_CAPACITY)
}

fn reply<T>(tx: Option<oneshot::Sender<T>>, value: T) {
    if let Some(tx) = tx {
        // Caller stopped waiting.
        let _ = tx.send(value);
    }
}

impl Orchestrator {
    /// Spawn the actor on a fresh input channel.
    pub fn spawn(self) -> (OrchestratorHandle, JoinHandle<()>) {
        let (tx, rx) = input_channel();
        self.spawn_with(tx, rx)
    }

    /// Spawn on a channel created beforehand, so a transfer engine can hold
    /// the sender before the orchestrator exists.
    pub fn spawn_with(
        self,
        tx: mpsc::Sender<Input>,
        rx: mpsc::Receiver<Input>,
    ) -> (OrchestratorHandle, JoinHandle<()>) {
        let handle = OrchestratorHandle {
            tx,
            snapshots: self.watch_snapshots(),
            notices: self.notices.clone(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    /// Restore from the recovery mirror, then drain inputs until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Input>) {
        match self.restore().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(restored = n, "resumed in-flight jobs"),
            Err(e) => tracing::warn!("recovery mirror unreadable, starting empty: {e:#}"),
        }
        self.pump().await;
        self.publish();

        while let Some(input) = rx.recv().await {
            self.handle_input(input).await;
        }
        tracing::info!("orchestrator input closed, stopping");
    }

    async fn handle_input(&mut self, input: Input) {
        match input {
            Input::SubmitUrl { url, reply: tx } => {
                let res = self.submit_url(&url).await;
                if let Err(e) = &res {
                    tracing::warn!(url = %url, "intake failed: {e:#}");
                }
                reply(tx, res);
            }
            Input::Retry { key, reply: tx } => {
                let res = self.retry(&key).await;
                if let Err(e) = &res {
                    tracing::warn!("retry rejected: {e}");
                }
                reply(tx, res);
            }
            Input::InstallArchives {
                title,
                archives,
                reply: tx,
            } => {
                let res = self.install_archives(&title, &archives).await;
                reply(tx, res);
            }
            Input::Engine(event) => self.handle_event(event).await,
            Input::Decide {
                id,
                action,
                reply: tx,
            } => {
                let res = self.answer_decision(id, action).await;
                if let Err(e) = &res {
                    tracing::warn!("decision rejected: {e}");
                }
                reply(tx, res);
            }
            Input::Cancel { key, reply: tx } => {
                let res = self.cancel(&key).await;
                if let Err(e) = &res {
                    tracing::warn!("cancel rejected: {e}");
                }
                reply(tx, res);
            }
            Input::Clear { key, reply: tx } => reply(tx, self.clear(&key)),
            Input::ClearFinished { reply: tx } => reply(tx, self.clear_finished()),
            Input::SetConcurrency(limit) => self.set_concurrency_limit(limit).await,
        }
    }
}

/// Cloneable front end to a running orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Input>,
    snapshots: watch::Receiver<OrchestratorSnapshot>,
    notices: broadcast::Sender<Notice>,
}

impl OrchestratorHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Input) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .await
            .map_err(|_| anyhow!("orchestrator stopped"))?;
        rx.await.map_err(|_| anyhow!("orchestrator dropped the request"))
    }

    pub async fn submit_url(&self, url: impl Into<String>) -> Result<(JobKey, Routed)> {
        let url = url.into();
        self.request(|tx| Input::SubmitUrl {
            url,
            reply: Some(tx),
        })
        .await?
    }

    pub async fn retry(&self, key: JobKey) -> Result<Routed> {
        Ok(self
            .request(|tx| Input::Retry {
                key,
                reply: Some(tx),
            })
            .await??)
    }

    /// One result per archive, in order.
    pub async fn install_archives(
        &self,
        title: impl Into<String>,
        archives: Vec<PathBuf>,
    ) -> Result<Vec<Result<(JobKey, Routed)>>> {
        let title = title.into();
        self.request(|tx| Input::InstallArchives {
            title,
            archives,
            reply: Some(tx),
        })
        .await
    }

    pub async fn answer(&self, id: DecisionId, action: ResolutionAction) -> Result<()> {
        Ok(self
            .request(|tx| Input::Decide {
                id,
                action,
                reply: Some(tx),
            })
            .await??)
    }

    pub async fn cancel(&self, key: JobKey) -> Result<()> {
        Ok(self
            .request(|tx| Input::Cancel {
                key,
                reply: Some(tx),
            })
            .await??)
    }

    pub async fn clear(&self, key: JobKey) -> Result<JobRecord> {
        Ok(self
            .request(|tx| Input::Clear {
                key,
                reply: Some(tx),
            })
            .await??)
    }

    pub async fn clear_finished(&self) -> Result<usize> {
        self.request(|tx| Input::ClearFinished { reply: Some(tx) })
            .await
    }

    pub async fn set_concurrency(&self, limit: u32) -> Result<()> {
        self.send(Input::SetConcurrency(limit)).await
    }

    /// Forward one engine event. Does not wait for it to be applied.
    pub async fn engine_event(&self, event: TransferEvent) -> Result<()> {
        self.send(Input::Engine(event)).await
    }

    pub async fn send(&self, input: Input) -> Result<()> {
        self.tx
            .send(input)
            .await
            .map_err(|_| anyhow!("orchestrator stopped"))
    }

    /// Sender for engines that push events themselves.
    pub fn input_sender(&self) -> mpsc::Sender<Input> {
        self.tx.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> OrchestratorSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<OrchestratorSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}
