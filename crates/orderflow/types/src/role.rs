//! Roles acting on shared records
//!
//! The set of roles is fixed at compile time. Each gated transition names
//! the roles allowed to perform it; the engine checks actors against
//! those allow-lists and nothing else.

use serde::{Deserialize, Serialize};

/// A role held by a person in the firm
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owns proposals and the client relationship
    Sales,
    /// Produces effort estimates for proposals
    Estimator,
    /// Plans capacity, enters ceilings, files allocation changes
    OperationsLead,
    /// Final approver for proposals, requests, and leave
    Director,
    /// Staffs designers against a work order and submits deliverables
    DesignLead,
    /// Executes design work and logs time
    Designer,
    /// Billing and invoicing
    Accounts,
    /// Human resources, second stage of leave review
    Hr,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sales => "sales",
            Role::Estimator => "estimator",
            Role::OperationsLead => "operations_lead",
            Role::Director => "director",
            Role::DesignLead => "design_lead",
            Role::Designer => "designer",
            Role::Accounts => "accounts",
            Role::Hr => "hr",
        }
    }

    /// Whether this role may hold designer-hour grants on a work order
    pub fn holds_design_hours(&self) -> bool {
        matches!(self, Role::Designer | Role::DesignLead)
    }

    /// The direct reporting officer who reviews this role's leave at stage 1
    pub fn reporting_officer(&self) -> Role {
        match self {
            Role::OperationsLead => Role::Director,
            _ => Role::OperationsLead,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An authenticated actor: identity plus resolved role
///
/// Identity and token verification happen outside the engine; callers
/// hand in an already-resolved actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: crate::ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: crate::ActorId::new(id),
            role,
        }
    }
}
