//! Read-only views over the store, filtered by the asking actor
//!
//! Queries clone snapshots out from under the subject locks; they never
//! hand out live references, so a caller can inspect state without
//! blocking transitions.

use crate::{lock, TransitionEngine};
use orderflow_types::{
    Actor, AuditEntry, AuditTrail, EngineResult, LeaveRequest, Proposal, ProposalId, Request,
    SubjectRef, WorkOrder, WorkOrderId,
};

impl TransitionEngine {
    /// A point-in-time copy of a work order
    pub fn work_order_snapshot(&self, id: &WorkOrderId) -> EngineResult<WorkOrder> {
        let cell = self.store().work_order(id)?;
        let work_order = lock(&cell)?;
        Ok(work_order.clone())
    }

    /// A point-in-time copy of a proposal
    pub fn proposal_snapshot(&self, id: &ProposalId) -> EngineResult<Proposal> {
        let cell = self.store().proposal(id)?;
        let proposal = lock(&cell)?;
        Ok(proposal.clone())
    }

    /// The requests the actor filed, newest first
    pub fn requests_for(&self, actor: &Actor) -> EngineResult<Vec<Request>> {
        let mut own = self.store().requests_where(|r| r.requester == actor.id)?;
        own.sort_by(|a, b| b.filed_at.cmp(&a.filed_at));
        Ok(own)
    }

    /// Requests still awaiting a decision, visible to reviewers
    pub fn requests_pending_review(&self) -> EngineResult<Vec<Request>> {
        let mut pending = self.store().requests_where(|r| r.is_reviewable())?;
        pending.sort_by(|a, b| a.filed_at.cmp(&b.filed_at));
        Ok(pending)
    }

    /// The leave requests the actor filed, newest first
    pub fn leave_for(&self, actor: &Actor) -> EngineResult<Vec<LeaveRequest>> {
        let mut own = self.store().leaves_where(|l| l.requester == actor.id)?;
        own.sort_by(|a, b| b.filed_at.cmp(&a.filed_at));
        Ok(own)
    }

    /// Leave requests whose currently pending stage is gated to the
    /// actor's role, excluding the actor's own filings
    pub fn leave_pending_at(&self, actor: &Actor) -> EngineResult<Vec<LeaveRequest>> {
        let mut pending = self.store().leaves_where(|l| {
            l.is_pending()
                && l.requester != actor.id
                && l.current_reviewer_role() == Some(actor.role)
        })?;
        pending.sort_by(|a, b| a.filed_at.cmp(&b.filed_at));
        Ok(pending)
    }

    /// A point-in-time copy of the full audit trail
    pub fn audit_trail(&self) -> EngineResult<AuditTrail> {
        self.store().audit_snapshot()
    }

    /// Audit entries for one subject, in commit order
    pub fn audit_for_subject(&self, subject: &SubjectRef) -> EngineResult<Vec<AuditEntry>> {
        let trail = self.store().audit_snapshot()?;
        Ok(trail.for_subject(subject).into_iter().cloned().collect())
    }
}
