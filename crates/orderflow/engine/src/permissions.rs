//! Role permission table: action → allowed-role set
//!
//! The table is built once at startup and passed by reference into the
//! engine. There is no runtime mutation; the set of stages and roles per
//! document type is fixed at compile time.

use orderflow_types::{EngineError, EngineResult, ProposalActionKind, RequestKind, Role};
use std::collections::{HashMap, HashSet};

/// Every gated operation the engine exposes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineAction {
    CreateProposal,
    Proposal(ProposalActionKind),
    SetCeiling,
    AllocateHours,
    RecordTime,
    StageTime,
    VoidTimeEntry,
    SubmitDesign,
    AcceptDesign,
    CompleteWorkOrder,
    FileRequest(RequestKind),
    ReviewRequest,
    DeleteRequest,
    FileLeave,
    ReviewLeave,
    DeleteLeave,
}

impl std::fmt::Display for EngineAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineAction::CreateProposal => write!(f, "create_proposal"),
            EngineAction::Proposal(kind) => write!(f, "{}", kind),
            EngineAction::SetCeiling => write!(f, "set_ceiling"),
            EngineAction::AllocateHours => write!(f, "allocate"),
            EngineAction::RecordTime => write!(f, "record_time"),
            EngineAction::StageTime => write!(f, "stage_time"),
            EngineAction::VoidTimeEntry => write!(f, "void_time_entry"),
            EngineAction::SubmitDesign => write!(f, "submit_design"),
            EngineAction::AcceptDesign => write!(f, "accept_design"),
            EngineAction::CompleteWorkOrder => write!(f, "complete_work_order"),
            EngineAction::FileRequest(kind) => write!(f, "file_{}", kind),
            EngineAction::ReviewRequest => write!(f, "review_request"),
            EngineAction::DeleteRequest => write!(f, "delete_request"),
            EngineAction::FileLeave => write!(f, "file_leave"),
            EngineAction::ReviewLeave => write!(f, "review_leave"),
            EngineAction::DeleteLeave => write!(f, "delete_leave"),
        }
    }
}

/// Immutable action → allowed-role lookup
#[derive(Clone, Debug)]
pub struct PermissionTable {
    allowed: HashMap<EngineAction, HashSet<Role>>,
}

impl PermissionTable {
    /// The firm's standard gating. Each proposal edge is gated to exactly
    /// one role; request filing is gated per kind; review sits with the
    /// director.
    pub fn standard() -> Self {
        let mut allowed: HashMap<EngineAction, HashSet<Role>> = HashMap::new();
        let mut gate = |action: EngineAction, roles: &[Role]| {
            allowed.insert(action, roles.iter().copied().collect());
        };

        gate(EngineAction::CreateProposal, &[Role::Sales]);
        gate(
            EngineAction::Proposal(ProposalActionKind::AddEstimation),
            &[Role::Estimator],
        );
        gate(
            EngineAction::Proposal(ProposalActionKind::SetPricing),
            &[Role::OperationsLead],
        );
        gate(
            EngineAction::Proposal(ProposalActionKind::DirectorApprove),
            &[Role::Director],
        );
        gate(
            EngineAction::Proposal(ProposalActionKind::DirectorReject),
            &[Role::Director],
        );
        gate(
            EngineAction::Proposal(ProposalActionKind::SubmitToClient),
            &[Role::Sales],
        );
        gate(
            EngineAction::Proposal(ProposalActionKind::MarkWon),
            &[Role::Sales],
        );
        gate(
            EngineAction::Proposal(ProposalActionKind::MarkLost),
            &[Role::Sales],
        );

        gate(EngineAction::SetCeiling, &[Role::OperationsLead]);
        gate(
            EngineAction::AllocateHours,
            &[Role::OperationsLead, Role::DesignLead],
        );
        gate(
            EngineAction::RecordTime,
            &[Role::Designer, Role::DesignLead],
        );
        gate(
            EngineAction::StageTime,
            &[Role::Designer, Role::DesignLead],
        );
        gate(
            EngineAction::VoidTimeEntry,
            &[Role::OperationsLead, Role::Designer, Role::DesignLead],
        );
        gate(EngineAction::SubmitDesign, &[Role::DesignLead]);
        gate(
            EngineAction::AcceptDesign,
            &[Role::OperationsLead, Role::Director],
        );
        gate(EngineAction::CompleteWorkOrder, &[Role::OperationsLead]);

        gate(
            EngineAction::FileRequest(RequestKind::TimeOverage),
            &[Role::Designer, Role::DesignLead],
        );
        gate(
            EngineAction::FileRequest(RequestKind::AllocationChange),
            &[Role::OperationsLead],
        );
        gate(
            EngineAction::FileRequest(RequestKind::Variation),
            &[Role::Sales, Role::OperationsLead],
        );
        gate(EngineAction::ReviewRequest, &[Role::Director]);
        gate(
            EngineAction::DeleteRequest,
            &[
                Role::Designer,
                Role::DesignLead,
                Role::OperationsLead,
                Role::Sales,
            ],
        );

        let everyone = [
            Role::Sales,
            Role::Estimator,
            Role::OperationsLead,
            Role::Director,
            Role::DesignLead,
            Role::Designer,
            Role::Accounts,
            Role::Hr,
        ];
        gate(EngineAction::FileLeave, &everyone);
        gate(EngineAction::DeleteLeave, &everyone);
        gate(
            EngineAction::ReviewLeave,
            &[Role::OperationsLead, Role::Hr, Role::Director],
        );

        Self { allowed }
    }

    /// Roles permitted to perform an action
    pub fn allowed_roles(&self, action: EngineAction) -> Option<&HashSet<Role>> {
        self.allowed.get(&action)
    }

    pub fn is_allowed(&self, action: EngineAction, role: Role) -> bool {
        self.allowed
            .get(&action)
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }

    /// Check and fail with `PermissionDenied` when the role is not listed
    pub fn require(&self, action: EngineAction, role: Role) -> EngineResult<()> {
        if self.is_allowed(action, role) {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied {
                role: role.to_string(),
                action: action.to_string(),
            })
        }
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_edges_single_role() {
        let table = PermissionTable::standard();
        let approve = EngineAction::Proposal(ProposalActionKind::DirectorApprove);
        assert!(table.is_allowed(approve, Role::Director));
        assert!(!table.is_allowed(approve, Role::Sales));
        assert_eq!(table.allowed_roles(approve).unwrap().len(), 1);
    }

    #[test]
    fn test_require_returns_permission_denied() {
        let table = PermissionTable::standard();
        let result = table.require(EngineAction::SetCeiling, Role::Designer);
        assert!(matches!(
            result,
            Err(EngineError::PermissionDenied { .. })
        ));
        assert!(table.require(EngineAction::SetCeiling, Role::OperationsLead).is_ok());
    }

    #[test]
    fn test_filing_gated_per_kind() {
        let table = PermissionTable::standard();
        assert!(table.is_allowed(
            EngineAction::FileRequest(RequestKind::TimeOverage),
            Role::Designer
        ));
        assert!(!table.is_allowed(
            EngineAction::FileRequest(RequestKind::AllocationChange),
            Role::Designer
        ));
        assert!(table.is_allowed(
            EngineAction::FileRequest(RequestKind::AllocationChange),
            Role::OperationsLead
        ));
    }

    #[test]
    fn test_everyone_may_file_leave() {
        let table = PermissionTable::standard();
        for role in [Role::Sales, Role::Accounts, Role::Hr, Role::Director] {
            assert!(table.is_allowed(EngineAction::FileLeave, role));
        }
    }

    #[test]
    fn test_action_display() {
        assert_eq!(format!("{}", EngineAction::AllocateHours), "allocate");
        assert_eq!(
            format!("{}", EngineAction::FileRequest(RequestKind::TimeOverage)),
            "file_time_overage"
        );
        assert_eq!(
            format!(
                "{}",
                EngineAction::Proposal(ProposalActionKind::MarkWon)
            ),
            "mark_won"
        );
    }
}
