//! Leave requests: sequential three-stage approval
//!
//! Leave is the one request type with more than one review stage:
//! Stage 1 is the requester's direct reporting officer, Stage 2 is HR
//! (who also assigns a category), Stage 3 is the director. A rejection
//! at any stage short-circuits the rest.

use crate::{ActorId, LeaveRequestId, Role};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// `current_stage` value once a rejection terminated the flow
pub const STAGE_TERMINATED: u8 = 0;
/// `current_stage` value once all three stages approved
pub const STAGE_COMPLETED: u8 = 4;
/// Number of sequential review stages
pub const LEAVE_STAGE_COUNT: u8 = 3;

/// Overall status of a leave request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Per-stage review status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Category assigned by HR at stage 2
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveCategory {
    Annual,
    Sick,
    Unpaid,
    Compassionate,
    Other(String),
}

/// One review stage of a leave request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageReview {
    /// The role gated to this stage
    pub reviewer_role: Role,
    /// Current stage status
    pub status: StageStatus,
    /// Who decided, once decided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<ActorId>,
    /// Reviewer's comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// When the decision landed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl StageReview {
    fn pending(reviewer_role: Role) -> Self {
        Self {
            reviewer_role,
            status: StageStatus::Pending,
            reviewer: None,
            comment: None,
            decided_at: None,
        }
    }
}

/// A leave request moving through three sequential review stages
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeaveRequest {
    /// Unique leave request identifier
    pub id: LeaveRequestId,
    /// Who filed the request
    pub requester: ActorId,
    /// The role they filed under (selects the stage-1 reviewer)
    pub requester_role: Role,
    /// Reason for the leave
    pub reason: String,
    /// First day of leave
    pub start_date: NaiveDate,
    /// Last day of leave
    pub end_date: NaiveDate,
    /// Category assigned by HR at stage 2
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<LeaveCategory>,
    /// Overall status
    pub status: LeaveStatus,
    /// 1..=3 while active, 0 terminated, 4 completed
    pub current_stage: u8,
    /// The three review stages, in order
    pub stages: Vec<StageReview>,
    /// When the request was filed
    pub filed_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// File a new leave request. The stage-1 reviewer is the requester's
    /// direct reporting officer; stages 2 and 3 are HR and the director.
    pub fn new(
        requester: ActorId,
        requester_role: Role,
        reason: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let stages = vec![
            StageReview::pending(requester_role.reporting_officer()),
            StageReview::pending(Role::Hr),
            StageReview::pending(Role::Director),
        ];
        Self {
            id: LeaveRequestId::generate(),
            requester,
            requester_role,
            reason: reason.into(),
            start_date,
            end_date,
            category: None,
            status: LeaveStatus::Pending,
            current_stage: 1,
            stages,
            filed_at: Utc::now(),
        }
    }

    /// The review record at a given stage (1-based)
    pub fn stage(&self, stage: u8) -> Option<&StageReview> {
        if (1..=LEAVE_STAGE_COUNT).contains(&stage) {
            self.stages.get(stage as usize - 1)
        } else {
            None
        }
    }

    /// The role gated to the currently pending stage, if still active
    pub fn current_reviewer_role(&self) -> Option<Role> {
        self.stage(self.current_stage).map(|s| s.reviewer_role)
    }

    /// Whether any stage remains actionable. Terminal requests become
    /// immutable records; the requester may withdraw only while pending.
    pub fn is_pending(&self) -> bool {
        self.status == LeaveStatus::Pending
    }

    /// Approve the currently pending stage and advance. Approving the
    /// final stage completes the request.
    pub fn approve_current(&mut self, reviewer: ActorId, comment: Option<String>) {
        let idx = self.current_stage as usize - 1;
        let stage = &mut self.stages[idx];
        stage.status = StageStatus::Approved;
        stage.reviewer = Some(reviewer);
        stage.comment = comment;
        stage.decided_at = Some(Utc::now());

        if self.current_stage == LEAVE_STAGE_COUNT {
            self.current_stage = STAGE_COMPLETED;
            self.status = LeaveStatus::Approved;
        } else {
            self.current_stage += 1;
        }
    }

    /// Reject the currently pending stage; later stages never run.
    pub fn reject_current(&mut self, reviewer: ActorId, comment: Option<String>) {
        let idx = self.current_stage as usize - 1;
        let stage = &mut self.stages[idx];
        stage.status = StageStatus::Rejected;
        stage.reviewer = Some(reviewer);
        stage.comment = comment;
        stage.decided_at = Some(Utc::now());

        self.current_stage = STAGE_TERMINATED;
        self.status = LeaveStatus::Rejected;
    }
}
