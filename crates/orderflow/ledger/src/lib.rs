//! Hours-Budget Ledger
//!
//! Accounting operations over a work order's hours ledger. The ledger
//! owns the conservation invariant: total allocated hours never exceed
//! the ceiling (within epsilon) without an explicitly approved override.
//!
//! # Key Concepts
//!
//! - **Ceiling**: the maximum hours a work order may allocate. Set once
//!   while allocation has not started; raised only through an approved
//!   allocation-change request.
//! - **Allocation**: additive per-assignee grants checked against the
//!   ceiling. A failed check reports the exact overage so the caller can
//!   offer the "file an overage request" path.
//! - **Consumption**: dated time entries. The consumed total is always
//!   derived from the entry set, never incremented in place.
//! - **Overage resolution**: applying an approved request to the ledger.
//!   Single-use: a request mutates the ledger exactly once.
//!
//! Every function here takes the work order by mutable reference and is
//! called with the subject's lock held, so the invariant check and the
//! mutation commit as one unit.

#![deny(unsafe_code)]

mod allocation;
mod consumption;
mod overage;

pub use allocation::*;
pub use consumption::*;
pub use overage::*;
