//! Time consumption: dated entries with a derived total
//!
//! The consumed total is recomputed from the entry set on every check.
//! Entries that would push consumption past the usable budget are not
//! recorded; the caller may stage them pending an overage approval.

use orderflow_types::{
    ActorId, EngineError, EngineResult, Hours, TimeEntry, TimeEntryId, WorkOrder,
};
use tracing::info;

/// Append a time entry against the work order's usable budget
/// (ceiling plus any approved extra budget). Returns the new derived
/// consumed total.
pub fn record_time(
    work_order: &mut WorkOrder,
    actor: &ActorId,
    hours: Hours,
    note: impl Into<String>,
) -> EngineResult<Hours> {
    if !hours.is_positive() {
        return Err(EngineError::ValidationFailed(
            "logged time must be a positive number of hours".into(),
        ));
    }
    if !work_order.is_assignee(actor) {
        return Err(EngineError::ValidationFailed(format!(
            "{} holds no hour grant on {}",
            actor, work_order.code
        )));
    }
    let usable = work_order.usable_budget().ok_or_else(|| {
        EngineError::InvalidStateTransition(format!(
            "work order {} has no allocation ceiling yet",
            work_order.code
        ))
    })?;

    let new_consumed = work_order.hours_consumed() + hours;
    if !new_consumed.approx_le(usable) {
        return Err(EngineError::BudgetExceeded {
            overage: new_consumed - usable,
        });
    }

    work_order
        .time_entries
        .push(TimeEntry::new(actor.clone(), hours, note));
    work_order.touch();

    let consumed = work_order.hours_consumed();
    info!(work_order = %work_order.id, actor = %actor, logged = %hours, consumed = %consumed, "Time recorded");
    Ok(consumed)
}

/// Stage a time entry that was blocked by the budget check. Staged
/// entries do not count toward consumption until an overage approval
/// applies them.
pub fn stage_time(
    work_order: &mut WorkOrder,
    actor: &ActorId,
    hours: Hours,
    note: impl Into<String>,
) -> EngineResult<TimeEntryId> {
    if !hours.is_positive() {
        return Err(EngineError::ValidationFailed(
            "staged time must be a positive number of hours".into(),
        ));
    }
    if !work_order.is_assignee(actor) {
        return Err(EngineError::ValidationFailed(format!(
            "{} holds no hour grant on {}",
            actor, work_order.code
        )));
    }

    let entry = TimeEntry::new(actor.clone(), hours, note);
    let id = entry.id.clone();
    work_order.staged_entries.push(entry);
    work_order.touch();

    info!(work_order = %work_order.id, actor = %actor, staged = %hours, "Time staged pending overage approval");
    Ok(id)
}

/// Void a recorded entry. The entry stays in the record; the derived
/// consumed total simply no longer includes it.
pub fn void_entry(work_order: &mut WorkOrder, entry_id: &TimeEntryId) -> EngineResult<Hours> {
    let entry = work_order
        .time_entries
        .iter_mut()
        .find(|e| e.id == *entry_id && !e.voided)
        .ok_or_else(|| EngineError::NotFound(format!("time entry {}", entry_id)))?;
    entry.void();
    work_order.touch();
    Ok(work_order.hours_consumed())
}
