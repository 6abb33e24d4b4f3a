//! Work-Order Domain Types
//!
//! This crate defines the domain types for a services firm's work-order
//! tracking system: proposals, work orders, approval requests, and the
//! hours ledger that bounds what each work order may consume.
//!
//! # Key Concepts
//!
//! - **Proposal**: the sales precursor of a work order. Moves along a
//!   single-threaded, role-gated status path from estimation to won/lost.
//! - **WorkOrder**: one unit of billable engineering work, converted from
//!   a won proposal. Carries the hours ledger: an allocation ceiling,
//!   per-designer grants, and logged time entries.
//! - **Request**: a pending action (time overage, allocation change,
//!   variation) filed by a constrained role and reviewed by a senior one.
//!   Approval mutates the subject ledger exactly once.
//! - **LeaveRequest**: a request with three sequential review stages
//!   (reporting officer, HR, director) instead of one.
//! - **AuditTrail**: append-only record of every committed transition.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. All types
//! implement `Clone`, `Debug`, `Serialize`, `Deserialize`. IDs use the
//! newtype pattern and implement `Display`, `generate()`, and `new()`.
//! Totals over the ledger (allocated, consumed) are always derived sums
//! over the underlying records, never independently stored counters.

#![deny(unsafe_code)]

mod audit;
mod errors;
mod hours;
mod ids;
mod leave;
mod proposal;
mod request;
mod role;
mod work_order;

pub use audit::*;
pub use errors::*;
pub use hours::*;
pub use ids::*;
pub use leave::*;
pub use proposal::*;
pub use request::*;
pub use role::*;
pub use work_order::*;
