//! Results and errors of engine operations.

use serde::{Deserialize, Serialize};
use workforce_core::{AssignmentId, EmployeeId, EntityRef, ProjectId, SubtaskId, TaskId};
use workforce_storage::StorageError;

/// Engine result type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures of engine operations. Finding nothing to do is not one of them;
/// see [`AssignOutcome::NoEligibleWork`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A referenced record does not exist; nothing was changed
    #[error("Not found: {0}")]
    NotFound(EntityRef),

    /// The requested change would break an assignment invariant
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The store failed
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(entity) => Self::NotFound(entity),
            other => Self::Storage(other),
        }
    }
}

/// How a subtask was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignPolicy {
    /// First available employee per subtask, simple match
    Bulk,
    /// Highest scored subtask for one employee
    BestScored,
    /// First simple-matching subtask for one employee
    NextFirstMatch,
    /// Explicit subtask and employee, no matching
    Manual,
}

impl AssignPolicy {
    /// Short label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::BestScored => "best-scored",
            Self::NextFirstMatch => "next-first-match",
            Self::Manual => "manual",
        }
    }
}

/// A committed assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReport {
    /// Assigned subtask
    pub subtask_id: SubtaskId,
    /// Its name
    pub subtask_name: String,
    /// Owning task
    pub task_id: TaskId,
    /// Owning project
    pub project_id: ProjectId,
    /// Employee now working on it
    pub employee_id: EmployeeId,
    /// Employee name
    pub employee_name: String,
    /// Assignment record created or reused
    pub assignment_id: AssignmentId,
    /// Whether an existing record for the same triple was reused
    pub reused_assignment: bool,
    /// Milestones that received the employee
    pub milestones_cascaded: usize,
    /// Match score, for scored selection
    pub score: Option<usize>,
    /// Selection policy
    pub policy: AssignPolicy,
}

impl AssignmentReport {
    /// Human-readable success message.
    pub fn message(&self) -> String {
        format!(
            "Subtask '{}' assigned to {} (employee {})",
            self.subtask_name, self.employee_name, self.employee_id
        )
    }
}

/// Why nothing was assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoWorkReason {
    /// The employee already holds an in-progress assignment
    EmployeeBusy {
        /// The assignment the employee is working on
        assignment_id: AssignmentId,
    },
    /// No unassigned subtask matches the employee's skills
    NoMatchingSubtask,
}

/// Result of a single-employee assignment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOutcome {
    /// A subtask was assigned
    Assigned(AssignmentReport),
    /// Valid state, nothing to assign
    NoEligibleWork(NoWorkReason),
}

impl AssignOutcome {
    /// The report, when something was assigned.
    pub fn assigned(&self) -> Option<&AssignmentReport> {
        match self {
            Self::Assigned(report) => Some(report),
            Self::NoEligibleWork(_) => None,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::Assigned(report) => report.message(),
            Self::NoEligibleWork(NoWorkReason::EmployeeBusy { assignment_id }) => {
                format!("Employee is busy with assignment {assignment_id}")
            }
            Self::NoEligibleWork(NoWorkReason::NoMatchingSubtask) => {
                "No matching subtasks available for this employee".to_string()
            }
        }
    }
}

/// Result of a bulk assignment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignReport {
    /// Assignments made, in subtask order
    pub assigned: Vec<AssignmentReport>,
    /// Subtasks left unassigned (no available matching employee)
    pub unmatched: Vec<SubtaskId>,
}

impl BulkAssignReport {
    /// Whether the pass found nothing to do.
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Human-readable summary.
    pub fn message(&self) -> String {
        if self.assigned.is_empty() {
            format!("No eligible work: {} subtask(s) left unassigned", self.unmatched.len())
        } else {
            format!(
                "Assigned {} subtask(s), {} left unassigned",
                self.assigned.len(),
                self.unmatched.len()
            )
        }
    }
}
