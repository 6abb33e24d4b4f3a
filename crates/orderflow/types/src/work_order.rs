//! Work order: one unit of billable engineering work
//!
//! The work order carries the hours ledger: an allocation ceiling,
//! per-designer grants, and logged time entries. Totals are always
//! derived sums over the underlying records so that later edits or
//! voids can never leave a stored counter drifting.

use crate::{ActorId, Hours, ProposalId, Role, TimeEntryId, WorkOrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where the allocation ceiling came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CeilingSource {
    /// Carried over from the proposal's effort estimate
    DerivedFromEstimate,
    /// Entered by an operations lead
    ManualEntry,
    /// Not yet entered
    #[default]
    AwaitingEntry,
}

/// How much of the ceiling has been handed out as grants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    #[default]
    NotStarted,
    Partial,
    Completed,
}

/// Work order lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    #[default]
    PendingAllocation,
    InProgress,
    Completed,
}

/// Deliverable submission sub-state, independent of the main lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DesignStatus {
    #[default]
    NotSubmitted,
    Submitted,
    Accepted,
}

/// A grant of budgeted hours to one assignee
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HourGrant {
    /// Who the hours are granted to
    pub assignee: ActorId,
    /// The assignee's role (must hold design hours)
    pub role: Role,
    /// Hours granted
    pub hours: Hours,
    /// Free-text notes for the assignee
    pub notes: String,
}

impl HourGrant {
    pub fn new(assignee: ActorId, role: Role, hours: Hours, notes: impl Into<String>) -> Self {
        Self {
            assignee,
            role,
            hours,
            notes: notes.into(),
        }
    }
}

/// A dated entry of consumed effort
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeEntry {
    /// Unique entry identifier
    pub id: TimeEntryId,
    /// Who logged the time
    pub actor: ActorId,
    /// Hours consumed
    pub hours: Hours,
    /// What the time was spent on
    pub note: String,
    /// When the entry was logged
    pub logged_at: DateTime<Utc>,
    /// Voided entries are kept for the record but excluded from totals
    pub voided: bool,
}

impl TimeEntry {
    pub fn new(actor: ActorId, hours: Hours, note: impl Into<String>) -> Self {
        Self {
            id: TimeEntryId::generate(),
            actor,
            hours,
            note: note.into(),
            logged_at: Utc::now(),
            voided: false,
        }
    }

    /// Void the entry; it stays in the record but no longer counts
    pub fn void(&mut self) {
        self.voided = true;
    }
}

/// One unit of billable engineering work, converted from a won proposal
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkOrder {
    /// Unique work order identifier
    pub id: WorkOrderId,
    /// The proposal this work order was converted from
    pub source_proposal_id: ProposalId,
    /// Human-readable sequence code, e.g. "WO-0007"
    pub code: String,
    /// Maximum hours this work order may allocate (unset until entered)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_ceiling: Option<Hours>,
    /// Where the ceiling came from
    pub ceiling_source: CeilingSource,
    /// Per-assignee grants, merged additively across allocation calls
    pub assignments: HashMap<ActorId, HourGrant>,
    /// How much of the ceiling has been handed out
    pub allocation_status: AllocationStatus,
    /// Main lifecycle state
    pub status: WorkOrderStatus,
    /// Deliverable submission sub-state
    pub design_status: DesignStatus,
    /// Logged time entries (voided entries retained)
    pub time_entries: Vec<TimeEntry>,
    /// Entries blocked pending an overage approval
    pub staged_entries: Vec<TimeEntry>,
    /// Extra budget granted by approved time-overage requests
    pub extra_budget: Hours,
    /// When the work order was created
    pub created_at: DateTime<Utc>,
    /// When the work order was last mutated
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    pub fn new(source_proposal_id: ProposalId, code: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkOrderId::generate(),
            source_proposal_id,
            code: code.into(),
            allocation_ceiling: None,
            ceiling_source: CeilingSource::AwaitingEntry,
            assignments: HashMap::new(),
            allocation_status: AllocationStatus::NotStarted,
            status: WorkOrderStatus::PendingAllocation,
            design_status: DesignStatus::NotSubmitted,
            time_entries: Vec::new(),
            staged_entries: Vec::new(),
            extra_budget: Hours::zero(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of all designer-hour grants (derived, never stored)
    pub fn total_allocated(&self) -> Hours {
        self.assignments.values().map(|g| g.hours).sum()
    }

    /// Sum of all non-voided time entries (derived, never stored)
    pub fn hours_consumed(&self) -> Hours {
        self.time_entries
            .iter()
            .filter(|e| !e.voided)
            .map(|e| e.hours)
            .sum()
    }

    /// Ceiling plus overage-granted extra budget, if the ceiling is set
    pub fn usable_budget(&self) -> Option<Hours> {
        self.allocation_ceiling.map(|c| c + self.extra_budget)
    }

    /// Whether the actor holds a grant on this work order
    pub fn is_assignee(&self, actor: &ActorId) -> bool {
        self.assignments.contains_key(actor)
    }

    /// Recompute `allocation_status` from the derived total and ceiling
    pub fn recompute_allocation_status(&mut self) {
        let total = self.total_allocated();
        self.allocation_status = if total.is_zero() {
            AllocationStatus::NotStarted
        } else {
            match self.allocation_ceiling {
                Some(ceiling) if total.approx_ge(ceiling) => AllocationStatus::Completed,
                _ => AllocationStatus::Partial,
            }
        };
    }

    /// Bump the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
