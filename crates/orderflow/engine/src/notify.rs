//! Fire-and-forget notification dispatch
//!
//! Every state transition emits a [`NotificationEvent`] describing who
//! should hear about it. Delivery is best-effort: a closed or missing
//! channel is logged and swallowed, and never fails the transition that
//! produced the event.

use chrono::{DateTime, Utc};
use orderflow_types::{ActorId, Hours, Role, SubjectRef};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// What happened, from the recipient's point of view
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ProposalAdvanced,
    ProposalReturned,
    WorkOrderOpened,
    HoursAllocated,
    TimeRecorded,
    DesignSubmitted,
    DesignAccepted,
    WorkOrderCompleted,
    RequestFiled,
    RequestApproved,
    RequestRejected,
    RequestInfoNeeded,
    LeaveFiled,
    LeaveStageApproved,
    LeaveApproved,
    LeaveRejected,
}

/// A single notification addressed to a role, an actor, or both
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub subject: SubjectRef,
    pub message: String,
    pub recipient_role: Option<Role>,
    pub recipient_actor: Option<ActorId>,
    pub amount: Option<Hours>,
    pub emitted_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(kind: NotificationKind, subject: SubjectRef, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject,
            message: message.into(),
            recipient_role: None,
            recipient_actor: None,
            amount: None,
            emitted_at: Utc::now(),
        }
    }

    pub fn for_role(mut self, role: Role) -> Self {
        self.recipient_role = Some(role);
        self
    }

    pub fn for_actor(mut self, actor: ActorId) -> Self {
        self.recipient_actor = Some(actor);
        self
    }

    pub fn with_amount(mut self, amount: Hours) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Outbound side of the notification channel
///
/// Cloneable; the consuming end is whatever delivery worker the caller
/// wires up. An engine constructed without a queue simply drops events.
#[derive(Clone, Debug)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationQueue {
    /// Creates a queue together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Creates a queue whose receiving end collects into a [`NotificationLog`]
    pub fn with_log() -> (Self, NotificationLog) {
        let (queue, receiver) = Self::channel();
        (queue, NotificationLog { receiver })
    }

    /// Sends an event, logging and discarding delivery failures
    pub fn dispatch(&self, event: NotificationEvent) {
        if let Err(err) = self.sender.send(event) {
            warn!(
                subject = %err.0.subject,
                kind = ?err.0.kind,
                "Notification channel closed, event dropped"
            );
        }
    }
}

/// Polling consumer over the receiving end of the channel
///
/// Used by tests and local tools that want to inspect what was sent
/// without standing up a delivery worker.
#[derive(Debug)]
pub struct NotificationLog {
    receiver: mpsc::UnboundedReceiver<NotificationEvent>,
}

impl NotificationLog {
    /// Every event dispatched since the last drain
    pub fn drain(&mut self) -> Vec<NotificationEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            out.push(event);
        }
        out
    }
}

/// Spawns a worker that logs every event through `tracing`
///
/// The simplest possible delivery sink; real deployments replace it
/// with a mail or chat integration consuming the same receiver.
pub fn spawn_tracing_sink(mut receiver: mpsc::UnboundedReceiver<NotificationEvent>) {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            tracing::info!(
                subject = %event.subject,
                kind = ?event.kind,
                recipient_role = ?event.recipient_role,
                "{}",
                event.message
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_types::WorkOrderId;

    #[test]
    fn test_dispatch_delivers_event() {
        let (queue, mut receiver) = NotificationQueue::channel();
        let subject = SubjectRef::WorkOrder(WorkOrderId::new("WO-0001"));
        queue.dispatch(
            NotificationEvent::new(NotificationKind::HoursAllocated, subject, "Hours allocated")
                .for_role(Role::Designer)
                .with_amount(Hours::new(12.0)),
        );

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.kind, NotificationKind::HoursAllocated);
        assert_eq!(event.recipient_role, Some(Role::Designer));
        assert_eq!(event.amount, Some(Hours::new(12.0)));
    }

    #[test]
    fn test_dispatch_swallows_closed_channel() {
        let (queue, receiver) = NotificationQueue::channel();
        drop(receiver);
        let subject = SubjectRef::WorkOrder(WorkOrderId::new("WO-0002"));
        // Must not panic or error.
        queue.dispatch(NotificationEvent::new(
            NotificationKind::TimeRecorded,
            subject,
            "Time recorded",
        ));
    }
}
