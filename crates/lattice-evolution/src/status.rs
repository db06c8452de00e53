//! The work-order status graph.

use serde::{Deserialize, Serialize};

/// Work-order lifecycle states. The successor table below is the whole
/// contract: anything not listed is an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Created,
    Assigned,
    Mutating,
    BuildPassed,
    BuildFailed,
    SynthesisPending,
    MergePending,
    Merged,
    Rejected,
}

impl WorkOrderStatus {
    pub const ALL: [WorkOrderStatus; 9] = [
        WorkOrderStatus::Created,
        WorkOrderStatus::Assigned,
        WorkOrderStatus::Mutating,
        WorkOrderStatus::BuildPassed,
        WorkOrderStatus::BuildFailed,
        WorkOrderStatus::SynthesisPending,
        WorkOrderStatus::MergePending,
        WorkOrderStatus::Merged,
        WorkOrderStatus::Rejected,
    ];

    /// Statuses reachable in one step.
    pub fn successors(&self) -> &'static [WorkOrderStatus] {
        match self {
            WorkOrderStatus::Created => &[WorkOrderStatus::Assigned],
            WorkOrderStatus::Assigned => &[WorkOrderStatus::Mutating],
            WorkOrderStatus::Mutating => {
                &[WorkOrderStatus::BuildPassed, WorkOrderStatus::BuildFailed]
            }
            WorkOrderStatus::BuildPassed => &[WorkOrderStatus::SynthesisPending],
            WorkOrderStatus::BuildFailed => {
                &[WorkOrderStatus::Mutating, WorkOrderStatus::Rejected]
            }
            WorkOrderStatus::SynthesisPending => {
                &[WorkOrderStatus::MergePending, WorkOrderStatus::Rejected]
            }
            WorkOrderStatus::MergePending => {
                &[WorkOrderStatus::Merged, WorkOrderStatus::Rejected]
            }
            WorkOrderStatus::Merged | WorkOrderStatus::Rejected => &[],
        }
    }

    pub fn can_transition_to(&self, to: WorkOrderStatus) -> bool {
        self.successors().contains(&to)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Created => "created",
            WorkOrderStatus::Assigned => "assigned",
            WorkOrderStatus::Mutating => "mutating",
            WorkOrderStatus::BuildPassed => "build_passed",
            WorkOrderStatus::BuildFailed => "build_failed",
            WorkOrderStatus::SynthesisPending => "synthesis_pending",
            WorkOrderStatus::MergePending => "merge_pending",
            WorkOrderStatus::Merged => "merged",
            WorkOrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<WorkOrderStatus> {
        Self::ALL.iter().copied().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
