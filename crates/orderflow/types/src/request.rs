//! Approval requests: pending actions on a work order's ledger
//!
//! A request is filed by a constrained role, reviewed by a disjoint
//! senior role, and may be approved at most once. Approval mutates the
//! subject ledger by the approved delta as part of the same unit of work
//! that flips the status.

use crate::{ActorId, Hours, RequestId, Role, WorkOrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of ledger change the request asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// An assignee asks for extra budget beyond their granted hours
    TimeOverage,
    /// An operations lead asks to raise the allocation ceiling
    AllocationChange,
    /// A scope variation against the work order
    Variation,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestKind::TimeOverage => "time_overage",
            RequestKind::AllocationChange => "allocation_change",
            RequestKind::Variation => "variation",
        };
        write!(f, "{}", s)
    }
}

/// Review status of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    /// Reviewer asked for more information; still actionable
    InfoRequested,
}

/// A reviewer's decision on a pending request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
    RequestInfo,
}

/// A pending-action record against a work order's ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier
    pub id: RequestId,
    /// What kind of change is requested
    pub kind: RequestKind,
    /// The subject work order
    pub work_order_id: WorkOrderId,
    /// Who filed the request
    pub requester: ActorId,
    /// The role they filed under
    pub requester_role: Role,
    /// Requested hours delta
    pub delta: Hours,
    /// Mandatory justification
    pub justification: String,
    /// Opaque reference to a supporting attachment, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    /// Current review status
    pub status: RequestStatus,
    /// Who reviewed it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<ActorId>,
    /// The role they reviewed under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_role: Option<Role>,
    /// Reviewer's comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_comment: Option<String>,
    /// The delta actually granted (reviewer may adjust the ask)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_delta: Option<Hours>,
    /// An approved grant is single-use; set when it has been applied
    pub consumed: bool,
    /// When the request was filed
    pub filed_at: DateTime<Utc>,
    /// When the review decision landed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Request {
    pub fn new(
        kind: RequestKind,
        work_order_id: WorkOrderId,
        requester: ActorId,
        requester_role: Role,
        delta: Hours,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            kind,
            work_order_id,
            requester,
            requester_role,
            delta,
            justification: justification.into(),
            attachment_ref: None,
            status: RequestStatus::Pending,
            reviewer: None,
            reviewer_role: None,
            review_comment: None,
            approved_delta: None,
            consumed: false,
            filed_at: Utc::now(),
            reviewed_at: None,
        }
    }

    pub fn with_attachment(mut self, attachment_ref: impl Into<String>) -> Self {
        self.attachment_ref = Some(attachment_ref.into());
        self
    }

    /// Still actionable by a reviewer
    pub fn is_reviewable(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Pending | RequestStatus::InfoRequested
        )
    }

    /// Reached a terminal decision
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Approved | RequestStatus::Rejected
        )
    }
}
