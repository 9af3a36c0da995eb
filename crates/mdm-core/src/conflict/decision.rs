//! Pending decision requests and their queue.

use serde::Serialize;
use std::collections::VecDeque;

use crate::job::JobRecord;

pub const TITLE_INVALID_ROOT: &str = "Invalid Mod Directory";
pub const TITLE_ALREADY_EXISTS: &str = "Mod Already Exists";

pub type DecisionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Destructive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStyle {
    Default,
    Destructive,
    Success,
}

/// What answering a decision does. Each action runs at most once, because
/// answering removes the decision from the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionAction {
    /// Dismiss; no state change.
    Acknowledge,
    /// Drop the candidate job; no state change.
    Skip,
    /// Enqueue as-is; the existing install is replaced on finalize.
    Overwrite,
    /// Append ` (n)` to the name until it is free, then enqueue.
    Rename,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub label: String,
    pub style: ResolutionStyle,
    pub action: ResolutionAction,
}

impl Resolution {
    fn new(label: &str, style: ResolutionStyle, action: ResolutionAction) -> Self {
        Self {
            label: label.to_string(),
            style,
            action,
        }
    }
}

/// A question waiting for the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDecision {
    pub id: DecisionId,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub resolutions: Vec<Resolution>,
    /// Candidate job the decision is about (held here until answered).
    #[serde(skip)]
    pub job: Option<JobRecord>,
}

impl PendingDecision {
    pub fn offers(&self, action: ResolutionAction) -> bool {
        self.resolutions.iter().any(|r| r.action == action)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("no decision is waiting")]
    NoActiveDecision,
    #[error("decision {got} is not the active one ({active})")]
    NotActive { active: DecisionId, got: DecisionId },
    #[error("decision {id} does not offer {action:?}")]
    NotOffered {
        id: DecisionId,
        action: ResolutionAction,
    },
}

/// FIFO of pending decisions. Only the front one is active.
#[derive(Debug, Default)]
pub struct DecisionQueue {
    pending: VecDeque<PendingDecision>,
    next_id: DecisionId,
}

impl DecisionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        title: &str,
        description: String,
        severity: Severity,
        resolutions: Vec<Resolution>,
        job: Option<JobRecord>,
    ) -> &PendingDecision {
        self.next_id += 1;
        self.pending.push_back(PendingDecision {
            id: self.next_id,
            title: title.to_string(),
            description,
            severity,
            resolutions,
            job,
        });
        &self.pending[self.pending.len() - 1]
    }

    /// Blocking notice: the title's install root is unset or inaccessible.
    pub fn push_invalid_root(&mut self, title: &str) -> &PendingDecision {
        self.push(
            TITLE_INVALID_ROOT,
            format!("The mod directory for {title} is invalid or inaccessible."),
            Severity::Destructive,
            vec![Resolution::new(
                "Okay",
                ResolutionStyle::Destructive,
                ResolutionAction::Acknowledge,
            )],
            None,
        )
    }

    /// Three-way choice for a job whose install directory is already taken.
    pub fn push_already_exists(&mut self, job: JobRecord) -> &PendingDecision {
        let description = format!(
            "The mod \"{}\" already exists in the directory for {}.",
            job.name, job.title
        );
        self.push(
            TITLE_ALREADY_EXISTS,
            description,
            Severity::Warn,
            vec![
                Resolution::new("Skip Mod", ResolutionStyle::Default, ResolutionAction::Skip),
                Resolution::new(
                    "Overwrite & Update",
                    ResolutionStyle::Destructive,
                    ResolutionAction::Overwrite,
                ),
                Resolution::new(
                    "Rename & Install",
                    ResolutionStyle::Success,
                    ResolutionAction::Rename,
                ),
            ],
            Some(job),
        )
    }

    /// The decision currently shown.
    pub fn active(&self) -> Option<&PendingDecision> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingDecision> {
        self.pending.iter()
    }

    /// Answer the active decision. Removes it and returns it so the caller can
    /// apply `action` to the held job.
    pub fn answer(
        &mut self,
        id: DecisionId,
        action: ResolutionAction,
    ) -> Result<PendingDecision, DecisionError> {
        let active = self.pending.front().ok_or(DecisionError::NoActiveDecision)?;
        if active.id != id {
            return Err(DecisionError::NotActive {
                active: active.id,
                got: id,
            });
        }
        if !active.offers(action) {
            return Err(DecisionError::NotOffered { id, action });
        }
        self.pending.pop_front().ok_or(DecisionError::NoActiveDecision)
    }
}
