//! The transition engine: every gated operation in one place
//!
//! Each operation follows the same shape: permission check, state
//! check, ledger check where hours move, then commit the mutation and
//! the audit entry under the subject's lock, then dispatch a
//! notification. A failed check aborts with no partial effect.

use crate::{
    lock, EngineAction, EngineStore, NotificationEvent, NotificationKind, NotificationQueue,
    PermissionTable, ProposalMachine,
};
use chrono::{NaiveDate, Utc};
use orderflow_ledger::{
    allocate, record_time, resolve_overage, set_ceiling, stage_time, void_entry,
    AllocationOutcome,
};
use orderflow_types::{
    Actor, AuditEntry, CeilingSource, DesignStatus, EngineError, EngineResult, HourGrant, Hours,
    LeaveCategory, LeaveRequest, LeaveRequestId, LeaveStatus, Proposal, ProposalAction,
    ProposalActionKind, ProposalId, ProposalStatus, Request, RequestId, RequestKind,
    RequestStatus, ReviewDecision, Role, SubjectRef, TimeEntryId, WorkOrder, WorkOrderId,
    WorkOrderStatus,
};
use tracing::info;

/// What a proposal transition produced
#[derive(Clone, Debug)]
pub struct ProposalOutcome {
    /// The proposal's status after the transition
    pub status: ProposalStatus,
    /// The converted work order, present once the proposal is `Won`
    pub work_order_id: Option<WorkOrderId>,
}

/// The single enforcer of the system's invariants
pub struct TransitionEngine {
    store: EngineStore,
    permissions: PermissionTable,
    machine: ProposalMachine,
    notifications: Option<NotificationQueue>,
}

impl TransitionEngine {
    pub fn new() -> Self {
        Self {
            store: EngineStore::new(),
            permissions: PermissionTable::standard(),
            machine: ProposalMachine::standard(),
            notifications: None,
        }
    }

    pub fn with_notifications(mut self, queue: NotificationQueue) -> Self {
        self.notifications = Some(queue);
        self
    }

    /// The underlying record store, for read-only queries
    pub fn store(&self) -> &EngineStore {
        &self.store
    }

    fn notify(&self, event: NotificationEvent) {
        if let Some(queue) = &self.notifications {
            queue.dispatch(event);
        }
    }

    // ---- proposals ----

    /// Open a new proposal owned by the acting sales person
    pub fn create_proposal(&self, actor: &Actor, title: &str) -> EngineResult<ProposalId> {
        self.permissions
            .require(EngineAction::CreateProposal, actor.role)?;
        if title.trim().is_empty() {
            return Err(EngineError::ValidationFailed(
                "proposal title must not be empty".into(),
            ));
        }

        let proposal = Proposal::new(title, actor.id.clone());
        let id = self.store.insert_proposal(proposal)?;

        self.store.append_audit(AuditEntry::new(
            SubjectRef::Proposal(id.clone()),
            "create_proposal",
            actor.id.clone(),
            actor.role,
            format!("opened proposal '{}'", title),
        ))?;
        self.notify(
            NotificationEvent::new(
                NotificationKind::ProposalAdvanced,
                SubjectRef::Proposal(id.clone()),
                format!("Proposal '{}' awaits estimation", title),
            )
            .for_role(Role::Estimator),
        );

        info!(proposal = %id, actor = %actor.id, "Proposal created");
        Ok(id)
    }

    /// Apply one action to a proposal, moving it along the lifecycle
    ///
    /// `MarkWon` converts the proposal into a work order, seeding the
    /// allocation ceiling from the estimate. A repeated `MarkWon` on an
    /// already-won proposal returns the existing work order id without
    /// a second conversion.
    pub fn advance_proposal(
        &self,
        actor: &Actor,
        proposal_id: &ProposalId,
        action: ProposalAction,
    ) -> EngineResult<ProposalOutcome> {
        let kind = action.kind();
        self.permissions
            .require(EngineAction::Proposal(kind), actor.role)?;

        let cell = self.store.proposal(proposal_id)?;
        let mut proposal = lock(&cell)?;

        // Idempotency guard: a second MarkWon is a no-op returning the
        // existing conversion, not an error and not a second work order.
        if kind == ProposalActionKind::MarkWon
            && proposal.status == ProposalStatus::Won
            && proposal.work_order_id.is_some()
        {
            return Ok(ProposalOutcome {
                status: ProposalStatus::Won,
                work_order_id: proposal.work_order_id.clone(),
            });
        }

        // After a director rejection only the designated role may act.
        if proposal.status == ProposalStatus::RevisionRequired {
            if let Some(target) = proposal.revision_target {
                if actor.role != target {
                    return Err(EngineError::PermissionDenied {
                        role: actor.role.to_string(),
                        action: format!("{} (revision assigned to '{}')", kind, target),
                    });
                }
            }
        }

        let next = self
            .machine
            .next_state(proposal.status, kind)
            .ok_or_else(|| {
                EngineError::InvalidStateTransition(format!(
                    "cannot apply '{}' to proposal {} in state {:?}",
                    kind, proposal.id, proposal.status
                ))
            })?;

        let mut detail = format!("{:?} -> {:?}", proposal.status, next);
        let mut work_order_id = proposal.work_order_id.clone();

        match &action {
            ProposalAction::AddEstimation { hours } => {
                if !hours.is_positive() {
                    return Err(EngineError::ValidationFailed(
                        "estimated hours must be positive".into(),
                    ));
                }
                proposal.estimated_hours = Some(*hours);
                detail = format!("estimated {}", hours);
            }
            ProposalAction::SetPricing { amount } => {
                if *amount <= 0.0 {
                    return Err(EngineError::ValidationFailed(
                        "price must be positive".into(),
                    ));
                }
                proposal.price = Some(*amount);
                detail = format!("priced at {:.2}", amount);
            }
            ProposalAction::DirectorReject { revision_target } => {
                if !matches!(revision_target, Role::Estimator | Role::OperationsLead) {
                    return Err(EngineError::ValidationFailed(format!(
                        "revision cannot be assigned to '{}'",
                        revision_target
                    )));
                }
                proposal.revision_target = Some(*revision_target);
                detail = format!("sent back to '{}'", revision_target);
            }
            ProposalAction::MarkWon => {
                let mut work_order =
                    WorkOrder::new(proposal.id.clone(), self.store.next_work_order_code());
                if let Some(estimate) = proposal.estimated_hours {
                    work_order.allocation_ceiling = Some(estimate);
                    work_order.ceiling_source = CeilingSource::DerivedFromEstimate;
                }
                let code = work_order.code.clone();
                let wo_id = self.store.insert_work_order(work_order)?;

                self.store.append_audit(AuditEntry::new(
                    SubjectRef::WorkOrder(wo_id.clone()),
                    "open_work_order",
                    actor.id.clone(),
                    actor.role,
                    format!("converted from proposal {}", proposal.id),
                ))?;
                self.notify(
                    NotificationEvent::new(
                        NotificationKind::WorkOrderOpened,
                        SubjectRef::WorkOrder(wo_id.clone()),
                        format!("Work order {} opened, allocation pending", code),
                    )
                    .for_role(Role::OperationsLead),
                );

                proposal.work_order_id = Some(wo_id.clone());
                work_order_id = Some(wo_id);
                detail = format!("won; converted to work order {}", code);
            }
            ProposalAction::DirectorApprove
            | ProposalAction::SubmitToClient
            | ProposalAction::MarkLost => {}
        }

        if proposal.status == ProposalStatus::RevisionRequired {
            proposal.revision_target = None;
        }
        proposal.status = next;
        proposal.log_change(kind, actor.id.clone(), actor.role, detail.clone());

        self.store.append_audit(AuditEntry::new(
            SubjectRef::Proposal(proposal.id.clone()),
            kind.to_string(),
            actor.id.clone(),
            actor.role,
            detail,
        ))?;

        let (notify_kind, message) = match next {
            ProposalStatus::RevisionRequired => (
                NotificationKind::ProposalReturned,
                format!("Proposal {} sent back for revision", proposal.id),
            ),
            _ => (
                NotificationKind::ProposalAdvanced,
                format!("Proposal {} is now {:?}", proposal.id, next),
            ),
        };
        self.notify(
            NotificationEvent::new(
                notify_kind,
                SubjectRef::Proposal(proposal.id.clone()),
                message,
            )
            .for_actor(proposal.owner.clone()),
        );

        info!(proposal = %proposal.id, action = %kind, status = ?next, "Proposal advanced");
        Ok(ProposalOutcome {
            status: next,
            work_order_id,
        })
    }

    // ---- work order ledger ----

    /// Enter the allocation ceiling by hand, before allocation starts
    pub fn set_ceiling(
        &self,
        actor: &Actor,
        work_order_id: &WorkOrderId,
        hours: Hours,
    ) -> EngineResult<Hours> {
        self.permissions
            .require(EngineAction::SetCeiling, actor.role)?;

        let cell = self.store.work_order(work_order_id)?;
        let mut work_order = lock(&cell)?;
        let value = set_ceiling(&mut work_order, hours, CeilingSource::ManualEntry)?;

        self.store.append_audit(
            AuditEntry::new(
                SubjectRef::WorkOrder(work_order.id.clone()),
                "set_ceiling",
                actor.id.clone(),
                actor.role,
                format!("ceiling entered for {}", work_order.code),
            )
            .with_hours("ceiling_hours", value),
        )?;
        Ok(value)
    }

    /// Grant designer hours against the ceiling
    pub fn allocate_hours(
        &self,
        actor: &Actor,
        work_order_id: &WorkOrderId,
        grants: &[HourGrant],
    ) -> EngineResult<AllocationOutcome> {
        self.permissions
            .require(EngineAction::AllocateHours, actor.role)?;

        let cell = self.store.work_order(work_order_id)?;
        let mut work_order = lock(&cell)?;
        let outcome = allocate(&mut work_order, grants)?;

        let batch: Hours = grants.iter().map(|g| g.hours).sum();
        self.store.append_audit(
            AuditEntry::new(
                SubjectRef::WorkOrder(work_order.id.clone()),
                "allocate",
                actor.id.clone(),
                actor.role,
                format!(
                    "granted {} across {} assignee(s) on {}",
                    batch,
                    grants.len(),
                    work_order.code
                ),
            )
            .with_hours("granted_hours", batch),
        )?;

        for grant in grants {
            self.notify(
                NotificationEvent::new(
                    NotificationKind::HoursAllocated,
                    SubjectRef::WorkOrder(work_order.id.clone()),
                    format!("You were allocated {} on {}", grant.hours, work_order.code),
                )
                .for_actor(grant.assignee.clone())
                .with_amount(grant.hours),
            );
        }
        Ok(outcome)
    }

    /// Log consumed time against the usable budget
    pub fn record_time(
        &self,
        actor: &Actor,
        work_order_id: &WorkOrderId,
        hours: Hours,
        note: &str,
    ) -> EngineResult<Hours> {
        self.permissions
            .require(EngineAction::RecordTime, actor.role)?;

        let cell = self.store.work_order(work_order_id)?;
        let mut work_order = lock(&cell)?;
        if work_order.status == WorkOrderStatus::Completed {
            return Err(EngineError::InvalidStateTransition(format!(
                "work order {} is completed; no further time may be logged",
                work_order.code
            )));
        }
        let consumed = record_time(&mut work_order, &actor.id, hours, note)?;

        self.store.append_audit(
            AuditEntry::new(
                SubjectRef::WorkOrder(work_order.id.clone()),
                "record_time",
                actor.id.clone(),
                actor.role,
                format!("logged {} on {}", hours, work_order.code),
            )
            .with_hours("logged_hours", hours),
        )?;
        self.notify(
            NotificationEvent::new(
                NotificationKind::TimeRecorded,
                SubjectRef::WorkOrder(work_order.id.clone()),
                format!("{} consumed on {}", consumed, work_order.code),
            )
            .for_role(Role::OperationsLead)
            .with_amount(hours),
        );
        Ok(consumed)
    }

    /// Stage an entry blocked by the budget check, pending an overage
    pub fn stage_time(
        &self,
        actor: &Actor,
        work_order_id: &WorkOrderId,
        hours: Hours,
        note: &str,
    ) -> EngineResult<TimeEntryId> {
        self.permissions
            .require(EngineAction::StageTime, actor.role)?;

        let cell = self.store.work_order(work_order_id)?;
        let mut work_order = lock(&cell)?;
        if work_order.status == WorkOrderStatus::Completed {
            return Err(EngineError::InvalidStateTransition(format!(
                "work order {} is completed; no further time may be staged",
                work_order.code
            )));
        }
        let entry_id = stage_time(&mut work_order, &actor.id, hours, note)?;

        self.store.append_audit(
            AuditEntry::new(
                SubjectRef::WorkOrder(work_order.id.clone()),
                "stage_time",
                actor.id.clone(),
                actor.role,
                format!("staged {} pending overage approval", hours),
            )
            .with_hours("staged_hours", hours),
        )?;
        Ok(entry_id)
    }

    /// Void a recorded entry; designers may void only their own
    pub fn void_time_entry(
        &self,
        actor: &Actor,
        work_order_id: &WorkOrderId,
        entry_id: &TimeEntryId,
    ) -> EngineResult<Hours> {
        self.permissions
            .require(EngineAction::VoidTimeEntry, actor.role)?;

        let cell = self.store.work_order(work_order_id)?;
        let mut work_order = lock(&cell)?;

        if actor.role.holds_design_hours() {
            let owns = work_order
                .time_entries
                .iter()
                .any(|e| e.id == *entry_id && e.actor == actor.id);
            if !owns {
                return Err(EngineError::PermissionDenied {
                    role: actor.role.to_string(),
                    action: "void another assignee's time entry".into(),
                });
            }
        }
        let consumed = void_entry(&mut work_order, entry_id)?;

        self.store.append_audit(AuditEntry::new(
            SubjectRef::WorkOrder(work_order.id.clone()),
            "void_time_entry",
            actor.id.clone(),
            actor.role,
            format!("voided entry {}; consumed now {}", entry_id, consumed),
        ))?;
        Ok(consumed)
    }

    // ---- work order lifecycle ----

    /// Submit the deliverable for acceptance
    pub fn submit_design(&self, actor: &Actor, work_order_id: &WorkOrderId) -> EngineResult<()> {
        self.permissions
            .require(EngineAction::SubmitDesign, actor.role)?;

        let cell = self.store.work_order(work_order_id)?;
        let mut work_order = lock(&cell)?;
        if work_order.status != WorkOrderStatus::InProgress {
            return Err(EngineError::InvalidStateTransition(format!(
                "work order {} is not in progress",
                work_order.code
            )));
        }
        if work_order.design_status == DesignStatus::Accepted {
            return Err(EngineError::InvalidStateTransition(format!(
                "design on {} was already accepted",
                work_order.code
            )));
        }
        work_order.design_status = DesignStatus::Submitted;
        work_order.touch();

        self.store.append_audit(AuditEntry::new(
            SubjectRef::WorkOrder(work_order.id.clone()),
            "submit_design",
            actor.id.clone(),
            actor.role,
            format!("deliverable submitted on {}", work_order.code),
        ))?;
        self.notify(
            NotificationEvent::new(
                NotificationKind::DesignSubmitted,
                SubjectRef::WorkOrder(work_order.id.clone()),
                format!("Deliverable on {} awaits acceptance", work_order.code),
            )
            .for_role(Role::OperationsLead),
        );
        Ok(())
    }

    /// Accept a submitted deliverable
    pub fn accept_design(&self, actor: &Actor, work_order_id: &WorkOrderId) -> EngineResult<()> {
        self.permissions
            .require(EngineAction::AcceptDesign, actor.role)?;

        let cell = self.store.work_order(work_order_id)?;
        let mut work_order = lock(&cell)?;
        if work_order.design_status != DesignStatus::Submitted {
            return Err(EngineError::InvalidStateTransition(format!(
                "no submitted deliverable on {}",
                work_order.code
            )));
        }
        work_order.design_status = DesignStatus::Accepted;
        work_order.touch();

        self.store.append_audit(AuditEntry::new(
            SubjectRef::WorkOrder(work_order.id.clone()),
            "accept_design",
            actor.id.clone(),
            actor.role,
            format!("deliverable accepted on {}", work_order.code),
        ))?;
        self.notify(
            NotificationEvent::new(
                NotificationKind::DesignAccepted,
                SubjectRef::WorkOrder(work_order.id.clone()),
                format!("Deliverable on {} accepted", work_order.code),
            )
            .for_role(Role::DesignLead),
        );
        Ok(())
    }

    /// Close out a work order whose deliverable was accepted
    pub fn complete_work_order(
        &self,
        actor: &Actor,
        work_order_id: &WorkOrderId,
    ) -> EngineResult<()> {
        self.permissions
            .require(EngineAction::CompleteWorkOrder, actor.role)?;

        let cell = self.store.work_order(work_order_id)?;
        let mut work_order = lock(&cell)?;
        if work_order.status != WorkOrderStatus::InProgress {
            return Err(EngineError::InvalidStateTransition(format!(
                "work order {} is not in progress",
                work_order.code
            )));
        }
        if work_order.design_status != DesignStatus::Accepted {
            return Err(EngineError::InvalidStateTransition(format!(
                "deliverable on {} has not been accepted",
                work_order.code
            )));
        }
        work_order.status = WorkOrderStatus::Completed;
        work_order.touch();

        self.store.append_audit(AuditEntry::new(
            SubjectRef::WorkOrder(work_order.id.clone()),
            "complete_work_order",
            actor.id.clone(),
            actor.role,
            format!(
                "completed {} with {} consumed",
                work_order.code,
                work_order.hours_consumed()
            ),
        ))?;
        self.notify(
            NotificationEvent::new(
                NotificationKind::WorkOrderCompleted,
                SubjectRef::WorkOrder(work_order.id.clone()),
                format!("Work order {} completed", work_order.code),
            )
            .for_role(Role::Accounts),
        );
        Ok(())
    }

    // ---- approval requests ----

    /// File an approval request against a work order
    pub fn file_request(
        &self,
        actor: &Actor,
        kind: RequestKind,
        work_order_id: &WorkOrderId,
        delta: Hours,
        justification: &str,
        attachment_ref: Option<String>,
    ) -> EngineResult<RequestId> {
        self.permissions
            .require(EngineAction::FileRequest(kind), actor.role)?;
        if justification.trim().is_empty() {
            return Err(EngineError::ValidationFailed(
                "a request requires a justification".into(),
            ));
        }
        if kind != RequestKind::Variation && !delta.is_positive() {
            return Err(EngineError::ValidationFailed(
                "requested hours delta must be positive".into(),
            ));
        }

        let cell = self.store.work_order(work_order_id)?;
        let work_order = lock(&cell)?;
        if kind == RequestKind::TimeOverage && !work_order.is_assignee(&actor.id) {
            return Err(EngineError::ValidationFailed(format!(
                "{} holds no hour grant on {}",
                actor.id, work_order.code
            )));
        }
        let code = work_order.code.clone();
        drop(work_order);

        let mut request = Request::new(
            kind,
            work_order_id.clone(),
            actor.id.clone(),
            actor.role,
            delta,
            justification,
        );
        if let Some(attachment) = attachment_ref {
            request = request.with_attachment(attachment);
        }
        let id = self.store.insert_request(request)?;

        self.store.append_audit(
            AuditEntry::new(
                SubjectRef::Request(id.clone()),
                format!("file_{}", kind),
                actor.id.clone(),
                actor.role,
                format!("filed against {}", code),
            )
            .with_hours("requested_hours", delta),
        )?;
        self.notify(
            NotificationEvent::new(
                NotificationKind::RequestFiled,
                SubjectRef::Request(id.clone()),
                format!("{} request on {} awaits review", kind, code),
            )
            .for_role(Role::Director)
            .with_amount(delta),
        );

        info!(request = %id, kind = %kind, work_order = %work_order_id, "Request filed");
        Ok(id)
    }

    /// Review a pending request
    ///
    /// Approval and its ledger effect commit as one unit: if applying
    /// the grant fails, the request stays reviewable and the ledger is
    /// untouched. `approved_delta` lets the reviewer adjust the ask.
    pub fn review_request(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        decision: ReviewDecision,
        comment: Option<String>,
        approved_delta: Option<Hours>,
    ) -> EngineResult<RequestStatus> {
        self.permissions
            .require(EngineAction::ReviewRequest, actor.role)?;

        // Lock order: request first, then its work order.
        let cell = self.store.request(request_id)?;
        let mut request = lock(&cell)?;

        if request.is_terminal() {
            return Err(EngineError::AlreadyProcessed(format!(
                "request {} was already {:?}",
                request.id, request.status
            )));
        }
        if request.requester == actor.id {
            return Err(EngineError::ValidationFailed(
                "a request cannot be reviewed by its requester".into(),
            ));
        }

        let status = match decision {
            ReviewDecision::RequestInfo => {
                request.status = RequestStatus::InfoRequested;
                RequestStatus::InfoRequested
            }
            ReviewDecision::Reject => {
                request.status = RequestStatus::Rejected;
                RequestStatus::Rejected
            }
            ReviewDecision::Approve => {
                let granted = approved_delta.unwrap_or(request.delta);
                if request.kind != RequestKind::Variation && !granted.is_positive() {
                    return Err(EngineError::ValidationFailed(
                        "approved grant must be positive".into(),
                    ));
                }
                // Take the work order lock before touching the request
                // so any failure leaves the request untouched.
                let wo_cell = self.store.work_order(&request.work_order_id)?;
                let mut work_order = lock(&wo_cell)?;

                let prior_status = request.status;
                request.status = RequestStatus::Approved;
                request.approved_delta = Some(granted);
                let resolution = match resolve_overage(&mut work_order, &mut request) {
                    Ok(res) => res,
                    Err(err) => {
                        // Revert under the held lock; nobody saw the
                        // intermediate approval.
                        request.status = prior_status;
                        request.approved_delta = None;
                        return Err(err);
                    }
                };

                self.store.append_audit(
                    AuditEntry::new(
                        SubjectRef::WorkOrder(work_order.id.clone()),
                        "resolve_overage",
                        actor.id.clone(),
                        actor.role,
                        format!(
                            "applied {} grant; {} staged entries released",
                            request.kind, resolution.applied_entries
                        ),
                    )
                    .with_hours("approved_hours", granted),
                )?;
                RequestStatus::Approved
            }
        };

        request.reviewer = Some(actor.id.clone());
        request.reviewer_role = Some(actor.role);
        request.review_comment = comment;
        request.reviewed_at = Some(Utc::now());

        self.store.append_audit(AuditEntry::new(
            SubjectRef::Request(request.id.clone()),
            "review_request",
            actor.id.clone(),
            actor.role,
            format!("decision: {:?}", status),
        ))?;

        let notify_kind = match status {
            RequestStatus::Approved => NotificationKind::RequestApproved,
            RequestStatus::Rejected => NotificationKind::RequestRejected,
            _ => NotificationKind::RequestInfoNeeded,
        };
        let mut event = NotificationEvent::new(
            notify_kind,
            SubjectRef::Request(request.id.clone()),
            format!("Your {} request is {:?}", request.kind, status),
        )
        .for_actor(request.requester.clone());
        if let Some(granted) = request.approved_delta {
            event = event.with_amount(granted);
        }
        self.notify(event);

        info!(request = %request.id, decision = ?decision, status = ?status, "Request reviewed");
        Ok(status)
    }

    /// Withdraw one's own request while it is still untouched
    pub fn delete_request(&self, actor: &Actor, request_id: &RequestId) -> EngineResult<()> {
        self.permissions
            .require(EngineAction::DeleteRequest, actor.role)?;

        let cell = self.store.request(request_id)?;
        {
            let request = lock(&cell)?;
            if request.requester != actor.id {
                return Err(EngineError::PermissionDenied {
                    role: actor.role.to_string(),
                    action: "delete another person's request".into(),
                });
            }
            if request.is_terminal() {
                return Err(EngineError::AlreadyProcessed(format!(
                    "request {} was already {:?}",
                    request.id, request.status
                )));
            }
            if request.status != RequestStatus::Pending {
                return Err(EngineError::InvalidStateTransition(format!(
                    "request {} is under review and can no longer be withdrawn",
                    request.id
                )));
            }
        }
        self.store.remove_request(request_id)?;

        self.store.append_audit(AuditEntry::new(
            SubjectRef::Request(request_id.clone()),
            "delete_request",
            actor.id.clone(),
            actor.role,
            "withdrawn by requester",
        ))?;
        Ok(())
    }

    // ---- leave ----

    /// File a leave request; stage 1 goes to the reporting officer
    pub fn file_leave(
        &self,
        actor: &Actor,
        reason: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> EngineResult<LeaveRequestId> {
        self.permissions
            .require(EngineAction::FileLeave, actor.role)?;
        if reason.trim().is_empty() {
            return Err(EngineError::ValidationFailed(
                "a leave request requires a reason".into(),
            ));
        }
        if end_date < start_date {
            return Err(EngineError::ValidationFailed(
                "leave end date precedes its start date".into(),
            ));
        }

        let leave = LeaveRequest::new(
            actor.id.clone(),
            actor.role,
            reason,
            start_date,
            end_date,
        );
        let stage_one = actor.role.reporting_officer();
        let id = self.store.insert_leave(leave)?;

        self.store.append_audit(AuditEntry::new(
            SubjectRef::Leave(id.clone()),
            "file_leave",
            actor.id.clone(),
            actor.role,
            format!("{} to {}", start_date, end_date),
        ))?;
        self.notify(
            NotificationEvent::new(
                NotificationKind::LeaveFiled,
                SubjectRef::Leave(id.clone()),
                format!("Leave request from {} awaits stage 1 review", actor.id),
            )
            .for_role(stage_one),
        );
        Ok(id)
    }

    /// Decide the named stage of a leave request
    ///
    /// The stage must be the currently pending one, the actor's role
    /// must match the stage's reviewer role, and HR must assign a
    /// category when approving stage 2. A rejection at any stage
    /// terminates the flow.
    pub fn review_leave(
        &self,
        actor: &Actor,
        leave_id: &LeaveRequestId,
        stage: u8,
        decision: ReviewDecision,
        comment: Option<String>,
        category: Option<LeaveCategory>,
    ) -> EngineResult<LeaveStatus> {
        self.permissions
            .require(EngineAction::ReviewLeave, actor.role)?;

        let cell = self.store.leave(leave_id)?;
        let mut leave = lock(&cell)?;

        // Stage order first: a terminated or completed request has no
        // current stage, so any review attempt lands here.
        if stage != leave.current_stage {
            return Err(EngineError::InvalidStateTransition(format!(
                "leave request {} is at stage {}, not stage {}",
                leave.id, leave.current_stage, stage
            )));
        }
        if !leave.is_pending() {
            return Err(EngineError::AlreadyProcessed(format!(
                "leave request {} was already {:?}",
                leave.id, leave.status
            )));
        }
        let expected = leave.current_reviewer_role().ok_or_else(|| {
            EngineError::InvalidStateTransition(format!(
                "leave request {} has no pending stage",
                leave.id
            ))
        })?;
        if actor.role != expected {
            return Err(EngineError::PermissionDenied {
                role: actor.role.to_string(),
                action: format!("review_leave stage {} (gated to '{}')", stage, expected),
            });
        }
        if leave.requester == actor.id {
            return Err(EngineError::ValidationFailed(
                "a leave request cannot be reviewed by its requester".into(),
            ));
        }

        match decision {
            ReviewDecision::RequestInfo => {
                return Err(EngineError::ValidationFailed(
                    "leave review supports approve or reject only".into(),
                ));
            }
            ReviewDecision::Approve => {
                if stage == 2 {
                    let assigned = category.ok_or_else(|| {
                        EngineError::ValidationFailed(
                            "stage 2 approval must assign a leave category".into(),
                        )
                    })?;
                    leave.category = Some(assigned);
                }
                leave.approve_current(actor.id.clone(), comment);
            }
            ReviewDecision::Reject => {
                leave.reject_current(actor.id.clone(), comment);
            }
        }

        self.store.append_audit(AuditEntry::new(
            SubjectRef::Leave(leave.id.clone()),
            "review_leave",
            actor.id.clone(),
            actor.role,
            format!("stage {} {:?}; overall {:?}", stage, decision, leave.status),
        ))?;

        let (notify_kind, message) = match leave.status {
            LeaveStatus::Approved => (
                NotificationKind::LeaveApproved,
                "Your leave request was approved".to_string(),
            ),
            LeaveStatus::Rejected => (
                NotificationKind::LeaveRejected,
                format!("Your leave request was rejected at stage {}", stage),
            ),
            LeaveStatus::Pending => (
                NotificationKind::LeaveStageApproved,
                format!("Your leave request passed stage {}", stage),
            ),
        };
        self.notify(
            NotificationEvent::new(notify_kind, SubjectRef::Leave(leave.id.clone()), message)
                .for_actor(leave.requester.clone()),
        );

        info!(leave = %leave.id, stage, decision = ?decision, status = ?leave.status, "Leave reviewed");
        Ok(leave.status)
    }

    /// Withdraw one's own leave request while it is still pending
    pub fn delete_leave(&self, actor: &Actor, leave_id: &LeaveRequestId) -> EngineResult<()> {
        self.permissions
            .require(EngineAction::DeleteLeave, actor.role)?;

        let cell = self.store.leave(leave_id)?;
        {
            let leave = lock(&cell)?;
            if leave.requester != actor.id {
                return Err(EngineError::PermissionDenied {
                    role: actor.role.to_string(),
                    action: "delete another person's leave request".into(),
                });
            }
            if !leave.is_pending() {
                return Err(EngineError::InvalidStateTransition(format!(
                    "leave request {} is {:?} and is now an immutable record",
                    leave.id, leave.status
                )));
            }
        }
        self.store.remove_leave(leave_id)?;

        self.store.append_audit(AuditEntry::new(
            SubjectRef::Leave(leave_id.clone()),
            "delete_leave",
            actor.id.clone(),
            actor.role,
            "withdrawn by requester",
        ))?;
        Ok(())
    }
}

impl Default for TransitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (TransitionEngine, Actors) {
        (
            TransitionEngine::new(),
            Actors {
                sales: Actor::new("sam", Role::Sales),
                estimator: Actor::new("erin", Role::Estimator),
                ops: Actor::new("olly", Role::OperationsLead),
                director: Actor::new("dirk", Role::Director),
                lead: Actor::new("lena", Role::DesignLead),
                designer: Actor::new("dana", Role::Designer),
            },
        )
    }

    struct Actors {
        sales: Actor,
        estimator: Actor,
        ops: Actor,
        director: Actor,
        lead: Actor,
        designer: Actor,
    }

    fn won_work_order(engine: &TransitionEngine, a: &Actors, estimate: f64) -> WorkOrderId {
        let pid = engine.create_proposal(&a.sales, "Substation upgrade").unwrap();
        engine
            .advance_proposal(
                &a.estimator,
                &pid,
                ProposalAction::AddEstimation {
                    hours: Hours::new(estimate),
                },
            )
            .unwrap();
        engine
            .advance_proposal(&a.ops, &pid, ProposalAction::SetPricing { amount: 48_000.0 })
            .unwrap();
        engine
            .advance_proposal(&a.director, &pid, ProposalAction::DirectorApprove)
            .unwrap();
        engine
            .advance_proposal(&a.sales, &pid, ProposalAction::SubmitToClient)
            .unwrap();
        let outcome = engine
            .advance_proposal(&a.sales, &pid, ProposalAction::MarkWon)
            .unwrap();
        outcome.work_order_id.unwrap()
    }

    #[test]
    fn test_proposal_role_gating() {
        let (engine, a) = setup();
        // Only sales may open proposals
        assert!(matches!(
            engine.create_proposal(&a.designer, "Nope"),
            Err(EngineError::PermissionDenied { .. })
        ));

        let pid = engine.create_proposal(&a.sales, "Plant survey").unwrap();
        // Sales cannot estimate
        assert!(matches!(
            engine.advance_proposal(
                &a.sales,
                &pid,
                ProposalAction::AddEstimation {
                    hours: Hours::new(10.0)
                }
            ),
            Err(EngineError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_out_of_order_action_rejected() {
        let (engine, a) = setup();
        let pid = engine.create_proposal(&a.sales, "Plant survey").unwrap();
        // Pricing before estimation has no table row
        assert!(matches!(
            engine.advance_proposal(
                &a.ops,
                &pid,
                ProposalAction::SetPricing { amount: 1000.0 }
            ),
            Err(EngineError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_mark_won_creates_order_with_derived_ceiling() {
        let (engine, a) = setup();
        let wo_id = won_work_order(&engine, &a, 100.0);
        let snapshot = engine.work_order_snapshot(&wo_id).unwrap();
        assert_eq!(snapshot.allocation_ceiling, Some(Hours::new(100.0)));
        assert_eq!(snapshot.ceiling_source, CeilingSource::DerivedFromEstimate);
        assert_eq!(snapshot.code, "WO-0001");
    }

    #[test]
    fn test_mark_won_is_idempotent() {
        let (engine, a) = setup();
        let wo_id = won_work_order(&engine, &a, 80.0);
        let pid = engine.work_order_snapshot(&wo_id).unwrap().source_proposal_id;

        let again = engine
            .advance_proposal(&a.sales, &pid, ProposalAction::MarkWon)
            .unwrap();
        assert_eq!(again.work_order_id, Some(wo_id));
        // Exactly one work order was opened
        let trail = engine.audit_trail().unwrap();
        let opens = trail
            .entries()
            .iter()
            .filter(|e| e.action == "open_work_order")
            .count();
        assert_eq!(opens, 1);
    }

    #[test]
    fn test_revision_target_gates_resumption() {
        let (engine, a) = setup();
        let pid = engine.create_proposal(&a.sales, "Bridge retrofit").unwrap();
        engine
            .advance_proposal(
                &a.estimator,
                &pid,
                ProposalAction::AddEstimation {
                    hours: Hours::new(50.0),
                },
            )
            .unwrap();
        engine
            .advance_proposal(&a.ops, &pid, ProposalAction::SetPricing { amount: 9_000.0 })
            .unwrap();
        engine
            .advance_proposal(
                &a.director,
                &pid,
                ProposalAction::DirectorReject {
                    revision_target: Role::OperationsLead,
                },
            )
            .unwrap();

        // Estimator may not act; the revision was assigned to operations
        assert!(matches!(
            engine.advance_proposal(
                &a.estimator,
                &pid,
                ProposalAction::AddEstimation {
                    hours: Hours::new(60.0)
                }
            ),
            Err(EngineError::PermissionDenied { .. })
        ));
        let outcome = engine
            .advance_proposal(&a.ops, &pid, ProposalAction::SetPricing { amount: 8_000.0 })
            .unwrap();
        assert_eq!(outcome.status, ProposalStatus::PendingDirectorApproval);
    }

    #[test]
    fn test_allocation_and_budget_exceeded() {
        let (engine, a) = setup();
        let wo_id = won_work_order(&engine, &a, 100.0);

        let outcome = engine
            .allocate_hours(
                &a.ops,
                &wo_id,
                &[HourGrant::new(
                    a.designer.id.clone(),
                    Role::Designer,
                    Hours::new(60.0),
                    "",
                )],
            )
            .unwrap();
        assert_eq!(outcome.total_allocated, Hours::new(60.0));

        // Budget invariant: the error names the exact overage
        let over = [HourGrant::new(
            a.lead.id.clone(),
            Role::DesignLead,
            Hours::new(41.0),
            "",
        )];
        match engine.allocate_hours(&a.lead, &wo_id, &over) {
            Err(EngineError::BudgetExceeded { overage }) => {
                assert!((overage.0 - 1.0).abs() < 1e-9);
            }
            other => panic!("expected BudgetExceeded, got {:?}", other),
        }
        // Nothing changed on failure
        let snapshot = engine.work_order_snapshot(&wo_id).unwrap();
        assert_eq!(snapshot.total_allocated(), Hours::new(60.0));
    }

    #[test]
    fn test_work_order_completion_requires_accepted_design() {
        let (engine, a) = setup();
        let wo_id = won_work_order(&engine, &a, 40.0);
        engine
            .allocate_hours(
                &a.ops,
                &wo_id,
                &[HourGrant::new(
                    a.designer.id.clone(),
                    Role::Designer,
                    Hours::new(40.0),
                    "",
                )],
            )
            .unwrap();

        assert!(matches!(
            engine.complete_work_order(&a.ops, &wo_id),
            Err(EngineError::InvalidStateTransition(_))
        ));

        engine.submit_design(&a.lead, &wo_id).unwrap();
        engine.accept_design(&a.ops, &wo_id).unwrap();
        engine.complete_work_order(&a.ops, &wo_id).unwrap();

        // No further time after completion
        assert!(matches!(
            engine.record_time(&a.designer, &wo_id, Hours::new(1.0), ""),
            Err(EngineError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_request_review_self_review_rejected() {
        let (engine, a) = setup();
        let wo_id = won_work_order(&engine, &a, 40.0);
        let req_id = engine
            .file_request(
                &a.ops,
                RequestKind::AllocationChange,
                &wo_id,
                Hours::new(10.0),
                "scope grew",
                None,
            )
            .unwrap();

        // The director reviews; the requester cannot
        let self_review = engine.review_request(
            &Actor::new("olly", Role::Director),
            &req_id,
            ReviewDecision::Approve,
            None,
            None,
        );
        assert!(matches!(
            self_review,
            Err(EngineError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_request_double_review_already_processed() {
        let (engine, a) = setup();
        let wo_id = won_work_order(&engine, &a, 40.0);
        let req_id = engine
            .file_request(
                &a.ops,
                RequestKind::AllocationChange,
                &wo_id,
                Hours::new(10.0),
                "scope grew",
                None,
            )
            .unwrap();

        engine
            .review_request(&a.director, &req_id, ReviewDecision::Reject, None, None)
            .unwrap();
        assert!(matches!(
            engine.review_request(&a.director, &req_id, ReviewDecision::Approve, None, None),
            Err(EngineError::AlreadyProcessed(_))
        ));
    }

    #[test]
    fn test_approved_allocation_change_raises_ceiling() {
        let (engine, a) = setup();
        let wo_id = won_work_order(&engine, &a, 100.0);
        let req_id = engine
            .file_request(
                &a.ops,
                RequestKind::AllocationChange,
                &wo_id,
                Hours::new(10.0),
                "late variation",
                None,
            )
            .unwrap();
        engine
            .review_request(&a.director, &req_id, ReviewDecision::Approve, None, None)
            .unwrap();

        let snapshot = engine.work_order_snapshot(&wo_id).unwrap();
        assert_eq!(snapshot.allocation_ceiling, Some(Hours::new(110.0)));
    }

    #[test]
    fn test_delete_request_window() {
        let (engine, a) = setup();
        let wo_id = won_work_order(&engine, &a, 40.0);
        let req_id = engine
            .file_request(
                &a.ops,
                RequestKind::Variation,
                &wo_id,
                Hours::zero(),
                "drawing package rev B",
                None,
            )
            .unwrap();

        // Someone else cannot withdraw it
        assert!(matches!(
            engine.delete_request(&a.sales, &req_id),
            Err(EngineError::PermissionDenied { .. })
        ));
        engine.delete_request(&a.ops, &req_id).unwrap();
        assert!(matches!(
            engine.store().request(&req_id),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_leave_stage_protocol() {
        let (engine, a) = setup();
        let hr = Actor::new("hana", Role::Hr);
        let start = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 9, 11).unwrap();
        let leave_id = engine
            .file_leave(&a.designer, "family travel", start, end)
            .unwrap();

        // HR cannot jump the queue at stage 1
        assert!(matches!(
            engine.review_leave(&hr, &leave_id, 1, ReviewDecision::Approve, None, None),
            Err(EngineError::PermissionDenied { .. })
        ));
        // Stage number must match the pending stage
        assert!(matches!(
            engine.review_leave(&a.ops, &leave_id, 2, ReviewDecision::Approve, None, None),
            Err(EngineError::InvalidStateTransition(_))
        ));

        engine
            .review_leave(&a.ops, &leave_id, 1, ReviewDecision::Approve, None, None)
            .unwrap();
        // Stage 2 approval requires a category
        assert!(matches!(
            engine.review_leave(&hr, &leave_id, 2, ReviewDecision::Approve, None, None),
            Err(EngineError::ValidationFailed(_))
        ));
        engine
            .review_leave(
                &hr,
                &leave_id,
                2,
                ReviewDecision::Approve,
                None,
                Some(LeaveCategory::Annual),
            )
            .unwrap();
        let status = engine
            .review_leave(&a.director, &leave_id, 3, ReviewDecision::Approve, None, None)
            .unwrap();
        assert_eq!(status, LeaveStatus::Approved);
    }

    #[test]
    fn test_leave_delete_window_closes_when_terminal() {
        let (engine, a) = setup();
        let start = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 10, 2).unwrap();
        let leave_id = engine
            .file_leave(&a.designer, "appointment", start, end)
            .unwrap();
        engine
            .review_leave(&a.ops, &leave_id, 1, ReviewDecision::Reject, None, None)
            .unwrap();
        assert!(matches!(
            engine.delete_leave(&a.designer, &leave_id),
            Err(EngineError::InvalidStateTransition(_))
        ));

        // A pending request may still be withdrawn by its requester
        let leave_id = engine
            .file_leave(&a.designer, "appointment", start, end)
            .unwrap();
        engine.delete_leave(&a.designer, &leave_id).unwrap();
        assert!(matches!(
            engine.store().leave(&leave_id),
            Err(EngineError::NotFound(_))
        ));
    }
}
