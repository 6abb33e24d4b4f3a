//! Transition Engine
//!
//! The engine is the single enforcer of the system's invariants. Every
//! operation follows the same shape: check the actor's role against an
//! immutable permission table, check the subject's current state, check
//! the ledger invariant where hours move, then commit the state change,
//! the ledger mutation, and the audit entry as one unit under the
//! subject's lock. Notification dispatch is the one best-effort tail:
//! enqueued after commit, failures logged and swallowed.
//!
//! # Key Concepts
//!
//! - **PermissionTable**: action → allowed-role set, built once at
//!   startup and never mutated.
//! - **ProposalMachine**: the explicit (state × action → next state)
//!   table for the proposal lifecycle. Illegal combinations simply have
//!   no row.
//! - **EngineStore**: per-subject `Arc<Mutex<_>>` registries. Transitions
//!   on the same record serialize; unrelated records proceed in parallel.
//! - **NotificationQueue**: fire-and-forget channel to the external
//!   notifier. Never awaited for correctness.
//!
//! # Design Principles
//!
//! 1. Either all effects of a transition are visible or none are.
//! 2. Totals are derived, never incremented in place.
//! 3. Every committed transition appends exactly one audit entry per
//!    subject it touched.
//! 4. A failed notification never fails a transition.

#![deny(unsafe_code)]

mod notify;
mod permissions;
mod proposal_machine;
mod queries;
mod store;
mod transition;

pub use notify::*;
pub use permissions::*;
pub use proposal_machine::*;
pub use store::*;
pub use transition::*;
