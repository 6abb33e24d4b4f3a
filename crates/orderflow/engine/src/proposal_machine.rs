//! Proposal state machine: explicit (state × action → next state) table
//!
//! Forward edges move the proposal single-threadedly toward `Won` or
//! `Lost`; the one backward edge is the director's rejection into
//! `RevisionRequired`, from which the designated role resumes the path.
//! Illegal combinations have no row and fail as invalid transitions.

use orderflow_types::{ProposalActionKind, ProposalStatus};

/// One legal edge of the proposal lifecycle
#[derive(Clone, Copy, Debug)]
pub struct ProposalTransition {
    pub from: ProposalStatus,
    pub action: ProposalActionKind,
    pub to: ProposalStatus,
}

/// The complete transition table
#[derive(Clone, Debug)]
pub struct ProposalMachine {
    transitions: Vec<ProposalTransition>,
}

impl ProposalMachine {
    pub fn standard() -> Self {
        use ProposalActionKind as A;
        use ProposalStatus as S;

        let edge = |from, action, to| ProposalTransition { from, action, to };
        Self {
            transitions: vec![
                edge(S::PendingEstimation, A::AddEstimation, S::PendingPricing),
                edge(S::PendingPricing, A::SetPricing, S::PendingDirectorApproval),
                edge(S::PendingDirectorApproval, A::DirectorApprove, S::Approved),
                edge(
                    S::PendingDirectorApproval,
                    A::DirectorReject,
                    S::RevisionRequired,
                ),
                edge(S::Approved, A::SubmitToClient, S::SubmittedToClient),
                edge(S::SubmittedToClient, A::MarkWon, S::Won),
                edge(S::SubmittedToClient, A::MarkLost, S::Lost),
                // Resuming from revision: the designated role redoes its
                // step and the proposal rejoins the forward path.
                edge(S::RevisionRequired, A::AddEstimation, S::PendingPricing),
                edge(S::RevisionRequired, A::SetPricing, S::PendingDirectorApproval),
            ],
        }
    }

    /// The next state for a (state, action) pair, if the edge exists
    pub fn next_state(
        &self,
        from: ProposalStatus,
        action: ProposalActionKind,
    ) -> Option<ProposalStatus> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.action == action)
            .map(|t| t.to)
    }
}

impl Default for ProposalMachine {
    fn default() -> Self {
        Self::standard()
    }
}
