//! End-to-end flows through the transition engine: the 100h ceiling
//! walkthrough, the leave stage walkthrough, and the audit-replay
//! cross-check.

use chrono::NaiveDate;
use orderflow_engine::{NotificationKind, NotificationQueue, TransitionEngine};
use orderflow_types::{
    Actor, AllocationStatus, EngineError, HourGrant, Hours, LeaveStatus, ProposalAction,
    RequestKind, RequestStatus, ReviewDecision, Role, StageStatus, SubjectRef, WorkOrderId,
};

struct Firm {
    sales: Actor,
    estimator: Actor,
    ops: Actor,
    director: Actor,
    lead: Actor,
    designer_a: Actor,
    designer_b: Actor,
    designer_c: Actor,
    hr: Actor,
}

fn firm() -> Firm {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Firm {
        sales: Actor::new("sam", Role::Sales),
        estimator: Actor::new("erin", Role::Estimator),
        ops: Actor::new("olly", Role::OperationsLead),
        director: Actor::new("dirk", Role::Director),
        lead: Actor::new("lena", Role::DesignLead),
        designer_a: Actor::new("ana", Role::Designer),
        designer_b: Actor::new("ben", Role::Designer),
        designer_c: Actor::new("cam", Role::Designer),
        hr: Actor::new("hana", Role::Hr),
    }
}

fn grant(actor: &Actor, hours: f64) -> HourGrant {
    HourGrant::new(actor.id.clone(), actor.role, Hours::new(hours), "")
}

/// Drive a proposal through estimation, pricing, approval, submission
/// and a client win; returns the converted work order.
fn win_order(engine: &TransitionEngine, f: &Firm, estimate: f64) -> WorkOrderId {
    let pid = engine
        .create_proposal(&f.sales, "Treatment plant upgrade")
        .unwrap();
    engine
        .advance_proposal(
            &f.estimator,
            &pid,
            ProposalAction::AddEstimation {
                hours: Hours::new(estimate),
            },
        )
        .unwrap();
    engine
        .advance_proposal(&f.ops, &pid, ProposalAction::SetPricing { amount: 52_000.0 })
        .unwrap();
    engine
        .advance_proposal(&f.director, &pid, ProposalAction::DirectorApprove)
        .unwrap();
    engine
        .advance_proposal(&f.sales, &pid, ProposalAction::SubmitToClient)
        .unwrap();
    engine
        .advance_proposal(&f.sales, &pid, ProposalAction::MarkWon)
        .unwrap()
        .work_order_id
        .unwrap()
}

#[test]
fn ceiling_walkthrough_100h() {
    let engine = TransitionEngine::new();
    let f = firm();
    let wo_id = win_order(&engine, &f, 100.0);

    // 60h to designer A: partial
    let outcome = engine
        .allocate_hours(&f.ops, &wo_id, &[grant(&f.designer_a, 60.0)])
        .unwrap();
    assert_eq!(outcome.total_allocated, Hours::new(60.0));
    assert_eq!(outcome.status, AllocationStatus::Partial);

    // 40h to designer B: completed
    let outcome = engine
        .allocate_hours(&f.ops, &wo_id, &[grant(&f.designer_b, 40.0)])
        .unwrap();
    assert_eq!(outcome.total_allocated, Hours::new(100.0));
    assert_eq!(outcome.status, AllocationStatus::Completed);

    // 1h to designer C: the exact overage comes back
    match engine.allocate_hours(&f.ops, &wo_id, &[grant(&f.designer_c, 1.0)]) {
        Err(EngineError::BudgetExceeded { overage }) => {
            assert!((overage.0 - 1.0).abs() < 1e-9);
        }
        other => panic!("expected BudgetExceeded, got {:?}", other),
    }
    // Rejection left no trace
    let snapshot = engine.work_order_snapshot(&wo_id).unwrap();
    assert_eq!(snapshot.total_allocated(), Hours::new(100.0));

    // Operations files for 10 more hours; the director approves
    let req_id = engine
        .file_request(
            &f.ops,
            RequestKind::AllocationChange,
            &wo_id,
            Hours::new(10.0),
            "late scope addition from the client",
            None,
        )
        .unwrap();
    let status = engine
        .review_request(
            &f.director,
            &req_id,
            ReviewDecision::Approve,
            Some("within contingency".into()),
            Some(Hours::new(10.0)),
        )
        .unwrap();
    assert_eq!(status, RequestStatus::Approved);

    // Ceiling raised to 110, status recomputed partial
    let snapshot = engine.work_order_snapshot(&wo_id).unwrap();
    assert_eq!(snapshot.allocation_ceiling, Some(Hours::new(110.0)));
    assert_eq!(snapshot.allocation_status, AllocationStatus::Partial);

    // Designer C now fits
    let outcome = engine
        .allocate_hours(&f.ops, &wo_id, &[grant(&f.designer_c, 10.0)])
        .unwrap();
    assert_eq!(outcome.total_allocated, Hours::new(110.0));
    assert_eq!(outcome.status, AllocationStatus::Completed);

    // A second review of the same request is refused
    assert!(matches!(
        engine.review_request(&f.director, &req_id, ReviewDecision::Approve, None, None),
        Err(EngineError::AlreadyProcessed(_))
    ));
}

#[test]
fn time_overage_applies_staged_entry_atomically() {
    let engine = TransitionEngine::new();
    let f = firm();
    let wo_id = win_order(&engine, &f, 40.0);
    engine
        .allocate_hours(&f.ops, &wo_id, &[grant(&f.designer_a, 40.0)])
        .unwrap();

    engine
        .record_time(&f.designer_a, &wo_id, Hours::new(38.0), "detail drawings")
        .unwrap();
    // The next entry does not fit: blocked with the exact overage
    match engine.record_time(&f.designer_a, &wo_id, Hours::new(6.0), "rework") {
        Err(EngineError::BudgetExceeded { overage }) => {
            assert!((overage.0 - 4.0).abs() < 1e-9);
        }
        other => panic!("expected BudgetExceeded, got {:?}", other),
    }
    engine
        .stage_time(&f.designer_a, &wo_id, Hours::new(6.0), "rework")
        .unwrap();

    let req_id = engine
        .file_request(
            &f.designer_a,
            RequestKind::TimeOverage,
            &wo_id,
            Hours::new(10.0),
            "site conditions forced a redesign",
            Some("s3://attachments/site-photos.zip".into()),
        )
        .unwrap();
    engine
        .review_request(&f.director, &req_id, ReviewDecision::Approve, None, None)
        .unwrap();

    // Approval and staged-entry application are one unit: usable budget
    // rose by exactly 10 and the staged entry is now recorded.
    let snapshot = engine.work_order_snapshot(&wo_id).unwrap();
    assert_eq!(snapshot.extra_budget, Hours::new(10.0));
    assert_eq!(snapshot.usable_budget(), Some(Hours::new(50.0)));
    assert!(snapshot.staged_entries.is_empty());
    assert_eq!(snapshot.hours_consumed(), Hours::new(44.0));
}

#[test]
fn leave_walkthrough_design_lead() {
    let engine = TransitionEngine::new();
    let f = firm();
    let start = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
    let end = NaiveDate::from_ymd_opt(2026, 9, 11).unwrap();

    // Filed by a design lead: stage 1 sits with the operations lead
    let leave_id = engine
        .file_leave(&f.lead, "family travel", start, end)
        .unwrap();
    let pending = engine.leave_pending_at(&f.ops).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].current_stage, 1);

    // Operations lead approves: stage moves to 2
    engine
        .review_leave(&f.ops, &leave_id, 1, ReviewDecision::Approve, None, None)
        .unwrap();
    let own = engine.leave_for(&f.lead).unwrap();
    assert_eq!(own[0].current_stage, 2);

    // HR rejects with a comment: terminated
    let status = engine
        .review_leave(
            &f.hr,
            &leave_id,
            2,
            ReviewDecision::Reject,
            Some("no cover available that week".into()),
            None,
        )
        .unwrap();
    assert_eq!(status, LeaveStatus::Rejected);

    let own = engine.leave_for(&f.lead).unwrap();
    assert_eq!(own[0].current_stage, 0);
    assert_eq!(own[0].stage(2).unwrap().status, StageStatus::Rejected);

    // Stage 3 can never run
    assert!(matches!(
        engine.review_leave(&f.director, &leave_id, 3, ReviewDecision::Approve, None, None),
        Err(EngineError::InvalidStateTransition(_))
    ));
}

#[test]
fn audit_replay_matches_derived_totals() {
    let engine = TransitionEngine::new();
    let f = firm();
    let wo_id = win_order(&engine, &f, 100.0);

    engine
        .allocate_hours(&f.ops, &wo_id, &[grant(&f.designer_a, 60.0)])
        .unwrap();
    engine
        .allocate_hours(
            &f.lead,
            &wo_id,
            &[grant(&f.designer_b, 25.0), grant(&f.designer_c, 15.0)],
        )
        .unwrap();

    let trail = engine.audit_trail().unwrap();
    let subject = SubjectRef::WorkOrder(wo_id.clone());
    let replayed = trail.replay_hours(&subject, "allocate", "granted_hours");

    let snapshot = engine.work_order_snapshot(&wo_id).unwrap();
    assert_eq!(replayed, snapshot.total_allocated());
    assert_eq!(replayed, Hours::new(100.0));
}

#[tokio::test]
async fn notifications_flow_after_commit() {
    let (queue, mut log) = NotificationQueue::with_log();
    let engine = TransitionEngine::new().with_notifications(queue);
    let f = firm();
    let wo_id = win_order(&engine, &f, 40.0);
    engine
        .allocate_hours(&f.ops, &wo_id, &[grant(&f.designer_a, 40.0)])
        .unwrap();

    let events = log.drain();
    assert!(events
        .iter()
        .any(|e| e.kind == NotificationKind::WorkOrderOpened));
    let allocated = events
        .iter()
        .find(|e| e.kind == NotificationKind::HoursAllocated)
        .expect("allocation notification");
    assert_eq!(allocated.recipient_actor, Some(f.designer_a.id.clone()));
    assert_eq!(allocated.amount, Some(Hours::new(40.0)));

    // A failed allocation produced no notification
    let before = log.drain().len();
    let _ = engine.allocate_hours(&f.ops, &wo_id, &[grant(&f.designer_b, 5.0)]);
    assert_eq!(log.drain().len(), before);
}
