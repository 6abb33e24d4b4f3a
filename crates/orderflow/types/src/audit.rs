//! Audit trail: append-only record of every committed transition
//!
//! One entry per committed transition, never mutated or deleted. The
//! trail is the system of record when ledger totals are questioned:
//! recomputing totals from the trail must match the ledger's derived
//! sums.

use crate::{ActorId, Hours, LeaveRequestId, ProposalId, RequestId, Role, WorkOrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reference to the record a transition acted on
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "subject_type", content = "id")]
pub enum SubjectRef {
    WorkOrder(WorkOrderId),
    Proposal(ProposalId),
    Request(RequestId),
    Leave(LeaveRequestId),
}

impl std::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubjectRef::WorkOrder(id) => write!(f, "work_order/{}", id),
            SubjectRef::Proposal(id) => write!(f, "proposal/{}", id),
            SubjectRef::Request(id) => write!(f, "request/{}", id),
            SubjectRef::Leave(id) => write!(f, "leave/{}", id),
        }
    }
}

/// One committed transition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier
    pub entry_id: String,
    /// The record acted on
    pub subject: SubjectRef,
    /// The action that was applied
    pub action: String,
    /// Who performed it
    pub actor: ActorId,
    /// The role they acted under
    pub role: Role,
    /// Short human-readable detail
    pub detail: String,
    /// When the transition committed
    pub timestamp: DateTime<Utc>,
    /// Additional structured context (amounts, assignees)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl AuditEntry {
    pub fn new(
        subject: SubjectRef,
        action: impl Into<String>,
        actor: ActorId,
        role: Role,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            subject,
            action: action.into(),
            actor,
            role,
            detail: detail.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach an hours amount under a conventional metadata key
    pub fn with_hours(self, key: impl Into<String>, hours: Hours) -> Self {
        self.with_metadata(key, hours.0.to_string())
    }
}

/// The append-only trail itself
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. There is deliberately no way to remove one.
    pub fn append(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries for one subject, in commit order
    pub fn for_subject(&self, subject: &SubjectRef) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| e.subject == *subject).collect()
    }

    /// All entries by one actor, in commit order
    pub fn for_actor(&self, actor: &ActorId) -> Vec<&AuditEntry> {
        self.entries.iter().filter(|e| e.actor == *actor).collect()
    }

    /// Recompute a running hours total for a subject from the trail by
    /// summing a metadata key over entries with the given action. Used to
    /// cross-check the ledger's derived totals.
    pub fn replay_hours(&self, subject: &SubjectRef, action: &str, key: &str) -> Hours {
        self.entries
            .iter()
            .filter(|e| e.subject == *subject && e.action == action)
            .filter_map(|e| e.metadata.get(key))
            .filter_map(|v| v.parse::<f64>().ok())
            .map(Hours::new)
            .sum()
    }
}
