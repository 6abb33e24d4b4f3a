//! Overage resolution: applying an approved request to the ledger
//!
//! Invoked only from an approved request, with both the request and the
//! work order locked. A grant is single-use: once applied the request is
//! marked consumed and cannot mutate the ledger again.

use crate::raise_ceiling;
use orderflow_types::{
    EngineError, EngineResult, Hours, Request, RequestKind, RequestStatus, WorkOrder,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// What an overage resolution did to the ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverageResolution {
    /// The ceiling after resolution, if one is set
    pub ceiling: Option<Hours>,
    /// The extra-budget pool after resolution
    pub extra_budget: Hours,
    /// How many previously staged entries were applied
    pub applied_entries: usize,
}

/// Apply an approved request's grant to the subject ledger.
///
/// Allocation-change requests raise the ceiling; time-overage requests
/// raise the per-order extra-budget pool. Either way, staged entries
/// that now fit are applied in filing order as part of the same unit.
/// Variation requests carry no ledger effect.
pub fn resolve_overage(
    work_order: &mut WorkOrder,
    request: &mut Request,
) -> EngineResult<OverageResolution> {
    if request.status != RequestStatus::Approved {
        return Err(EngineError::InvalidStateTransition(format!(
            "request {} is not approved",
            request.id
        )));
    }
    if request.consumed {
        return Err(EngineError::AlreadyProcessed(format!(
            "overage grant on request {} was already applied",
            request.id
        )));
    }
    if request.work_order_id != work_order.id {
        return Err(EngineError::ValidationFailed(format!(
            "request {} does not target work order {}",
            request.id, work_order.code
        )));
    }

    let delta = request.approved_delta.unwrap_or(request.delta);

    match request.kind {
        RequestKind::AllocationChange => {
            raise_ceiling(work_order, delta)?;
        }
        RequestKind::TimeOverage => {
            if !delta.is_positive() {
                return Err(EngineError::ValidationFailed(
                    "approved overage must be positive".into(),
                ));
            }
            work_order.extra_budget = work_order.extra_budget + delta;
        }
        RequestKind::Variation => {}
    }

    let applied = apply_staged_entries(work_order);
    if request.kind != RequestKind::Variation {
        request.consumed = true;
    }
    work_order.touch();

    let resolution = OverageResolution {
        ceiling: work_order.allocation_ceiling,
        extra_budget: work_order.extra_budget,
        applied_entries: applied,
    };
    info!(
        work_order = %work_order.id,
        request = %request.id,
        kind = %request.kind,
        granted = %delta,
        applied_entries = applied,
        "Overage resolved"
    );
    Ok(resolution)
}

/// Move staged entries into the recorded set, in filing order, as long
/// as each one still fits within the usable budget.
fn apply_staged_entries(work_order: &mut WorkOrder) -> usize {
    let usable = match work_order.usable_budget() {
        Some(u) => u,
        None => return 0,
    };

    let mut applied = 0;
    while let Some(entry) = work_order.staged_entries.first() {
        let would_be = work_order.hours_consumed() + entry.hours;
        if !would_be.approx_le(usable) {
            break;
        }
        let entry = work_order.staged_entries.remove(0);
        work_order.time_entries.push(entry);
        applied += 1;
    }
    applied
}
