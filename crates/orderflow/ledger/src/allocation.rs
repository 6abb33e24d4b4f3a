//! Ceiling management and designer-hour allocation

use orderflow_types::{
    AllocationStatus, CeilingSource, EngineError, EngineResult, HourGrant, Hours, WorkOrder,
    WorkOrderStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Result of a successful allocation call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AllocationOutcome {
    /// New derived total of all grants
    pub total_allocated: Hours,
    /// Recomputed allocation status
    pub status: AllocationStatus,
}

/// Set the allocation ceiling. Allowed only while allocation has not
/// started; afterwards the ceiling moves only through an approved
/// allocation-change request.
pub fn set_ceiling(
    work_order: &mut WorkOrder,
    value: Hours,
    source: CeilingSource,
) -> EngineResult<Hours> {
    if !value.is_positive() {
        return Err(EngineError::ValidationFailed(
            "ceiling must be a positive number of hours".into(),
        ));
    }
    if work_order.allocation_status != AllocationStatus::NotStarted {
        return Err(EngineError::InvalidStateTransition(format!(
            "ceiling for {} can no longer be set directly; file an allocation-change request",
            work_order.code
        )));
    }

    work_order.allocation_ceiling = Some(value);
    work_order.ceiling_source = source;
    work_order.touch();

    info!(work_order = %work_order.id, ceiling = %value, ?source, "Ceiling set");
    Ok(value)
}

/// Raise the ceiling by an approved delta. Only reachable through an
/// approved allocation-change request.
pub fn raise_ceiling(work_order: &mut WorkOrder, delta: Hours) -> EngineResult<Hours> {
    if !delta.is_positive() {
        return Err(EngineError::ValidationFailed(
            "ceiling raise must be positive".into(),
        ));
    }
    let current = work_order.allocation_ceiling.ok_or_else(|| {
        EngineError::InvalidStateTransition(format!(
            "work order {} has no ceiling to raise",
            work_order.code
        ))
    })?;

    let raised = current + delta;
    work_order.allocation_ceiling = Some(raised);
    work_order.recompute_allocation_status();
    work_order.touch();

    info!(work_order = %work_order.id, from = %current, to = %raised, "Ceiling raised");
    Ok(raised)
}

/// Merge a batch of designer-hour grants into the work order.
///
/// Rejects duplicate assignees within the call, assignees whose role
/// cannot hold design hours, and any batch that would push the total
/// past the ceiling (the error carries the exact overage). On success
/// grants top up existing per-assignee totals.
pub fn allocate(work_order: &mut WorkOrder, grants: &[HourGrant]) -> EngineResult<AllocationOutcome> {
    if grants.is_empty() {
        return Err(EngineError::ValidationFailed(
            "allocation requires at least one grant".into(),
        ));
    }

    let mut seen = HashSet::new();
    for grant in grants {
        if !seen.insert(grant.assignee.clone()) {
            return Err(EngineError::ValidationFailed(format!(
                "duplicate assignee in allocation call: {}",
                grant.assignee
            )));
        }
        if !grant.role.holds_design_hours() {
            return Err(EngineError::ValidationFailed(format!(
                "assignee {} has role '{}', which cannot hold design hours",
                grant.assignee, grant.role
            )));
        }
        if !grant.hours.is_positive() {
            return Err(EngineError::ValidationFailed(format!(
                "grant for {} must be a positive number of hours",
                grant.assignee
            )));
        }
    }

    let ceiling = work_order.allocation_ceiling.ok_or_else(|| {
        EngineError::InvalidStateTransition(format!(
            "work order {} has no allocation ceiling yet",
            work_order.code
        ))
    })?;

    let batch_total: Hours = grants.iter().map(|g| g.hours).sum();
    let new_total = work_order.total_allocated() + batch_total;
    // A completed allocation admits no further plain grants either; the
    // ceiling must first move through an approved allocation-change.
    if work_order.allocation_status == AllocationStatus::Completed
        || !new_total.approx_le(ceiling)
    {
        // With the ceiling already treated as fully consumed the raw
        // difference can be zero or negative; report the blocked batch
        // instead so the caller knows how many extra hours to request.
        let exceeded_by = new_total - ceiling;
        let overage = if exceeded_by.is_positive() {
            exceeded_by
        } else {
            batch_total
        };
        return Err(EngineError::BudgetExceeded { overage });
    }

    for grant in grants {
        work_order
            .assignments
            .entry(grant.assignee.clone())
            .and_modify(|existing| {
                existing.hours = existing.hours + grant.hours;
                if !grant.notes.is_empty() {
                    existing.notes = grant.notes.clone();
                }
            })
            .or_insert_with(|| grant.clone());
    }

    work_order.recompute_allocation_status();
    if work_order.status == WorkOrderStatus::PendingAllocation {
        work_order.status = WorkOrderStatus::InProgress;
    }
    work_order.touch();

    let outcome = AllocationOutcome {
        total_allocated: work_order.total_allocated(),
        status: work_order.allocation_status,
    };
    info!(
        work_order = %work_order.id,
        granted = %batch_total,
        total = %outcome.total_allocated,
        status = ?outcome.status,
        "Hours allocated"
    );
    Ok(outcome)
}
