//! Proposal: the sales precursor of a work order
//!
//! A proposal moves along a single-threaded, role-gated status path.
//! Every transition appends to an immutable change log. `Won` is
//! terminal and unlocks the creation of exactly one work order.

use crate::{ActorId, Hours, ProposalId, Role, WorkOrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered proposal lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    PendingEstimation,
    PendingPricing,
    PendingDirectorApproval,
    Approved,
    /// Sent back by the director; `revision_target` names who must act
    RevisionRequired,
    SubmittedToClient,
    Won,
    Lost,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Won | ProposalStatus::Lost)
    }
}

/// Actions that advance a proposal
///
/// A closed sum type: the transition table enumerates exactly which
/// (state, action) pairs are legal and which role each is gated to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ProposalAction {
    /// Estimator enters the effort estimate
    AddEstimation { hours: Hours },
    /// Operations lead sets the price
    SetPricing { amount: f64 },
    /// Director approves for client submission
    DirectorApprove,
    /// Director sends back for revision, naming who must act next
    DirectorReject { revision_target: Role },
    /// Sales submits the approved proposal to the client
    SubmitToClient,
    /// Client accepted; unlocks work order creation
    MarkWon,
    /// Client declined
    MarkLost,
}

impl ProposalAction {
    /// The fieldless discriminant, used for permission and table lookups
    pub fn kind(&self) -> ProposalActionKind {
        match self {
            ProposalAction::AddEstimation { .. } => ProposalActionKind::AddEstimation,
            ProposalAction::SetPricing { .. } => ProposalActionKind::SetPricing,
            ProposalAction::DirectorApprove => ProposalActionKind::DirectorApprove,
            ProposalAction::DirectorReject { .. } => ProposalActionKind::DirectorReject,
            ProposalAction::SubmitToClient => ProposalActionKind::SubmitToClient,
            ProposalAction::MarkWon => ProposalActionKind::MarkWon,
            ProposalAction::MarkLost => ProposalActionKind::MarkLost,
        }
    }
}

/// Fieldless discriminant of [`ProposalAction`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalActionKind {
    AddEstimation,
    SetPricing,
    DirectorApprove,
    DirectorReject,
    SubmitToClient,
    MarkWon,
    MarkLost,
}

impl std::fmt::Display for ProposalActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProposalActionKind::AddEstimation => "add_estimation",
            ProposalActionKind::SetPricing => "set_pricing",
            ProposalActionKind::DirectorApprove => "director_approve",
            ProposalActionKind::DirectorReject => "director_reject",
            ProposalActionKind::SubmitToClient => "submit_to_client",
            ProposalActionKind::MarkWon => "mark_won",
            ProposalActionKind::MarkLost => "mark_lost",
        };
        write!(f, "{}", s)
    }
}

/// One immutable change-log line on a proposal
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// The action that was applied
    pub action: ProposalActionKind,
    /// Who applied it
    pub actor: ActorId,
    /// The role they acted under
    pub role: Role,
    /// When it was applied
    pub timestamp: DateTime<Utc>,
    /// Free-text detail
    pub detail: String,
}

/// A proposal record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique proposal identifier
    pub id: ProposalId,
    /// Short title of the proposed work
    pub title: String,
    /// The sales owner
    pub owner: ActorId,
    /// Current lifecycle state
    pub status: ProposalStatus,
    /// Estimated effort, set during estimation; seeds the work order ceiling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<Hours>,
    /// Quoted price, set during pricing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Who must act next after a director rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_target: Option<Role>,
    /// Back-reference to the converted work order, set once on `MarkWon`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_order_id: Option<WorkOrderId>,
    /// Immutable history of every applied action
    pub change_log: Vec<ChangeLogEntry>,
    /// When the proposal was created
    pub created_at: DateTime<Utc>,
    /// When the proposal was last mutated
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(title: impl Into<String>, owner: ActorId) -> Self {
        let now = Utc::now();
        Self {
            id: ProposalId::generate(),
            title: title.into(),
            owner,
            status: ProposalStatus::PendingEstimation,
            estimated_hours: None,
            price: None,
            revision_target: None,
            work_order_id: None,
            change_log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append to the immutable history
    pub fn log_change(
        &mut self,
        action: ProposalActionKind,
        actor: ActorId,
        role: Role,
        detail: impl Into<String>,
    ) {
        self.change_log.push(ChangeLogEntry {
            action,
            actor,
            role,
            timestamp: Utc::now(),
            detail: detail.into(),
        });
        self.updated_at = Utc::now();
    }
}
