//! Assignment records and the assignment log.

use serde::{Deserialize, Serialize};
use crate::id::{AssignmentId, EmployeeId, LogId, ProjectId, SubtaskId};
use crate::Time;

/// "This employee is/was working on this subtask within this project."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique identifier
    pub id: AssignmentId,

    /// Assigned employee
    pub employee_id: EmployeeId,

    /// Project the subtask belongs to
    pub project_id: ProjectId,

    /// The subtask, when the assignment is for one
    pub subtask_id: Option<SubtaskId>,

    /// Current status
    pub status: AssignmentStatus,
}

/// Assignment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentStatus {
    /// Employee is working on it
    InProgress,
    /// Subtask finished
    Completed,
}

impl Assignment {
    /// Whether this record occupies the employee's single slot.
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::InProgress
    }
}

/// Data for a new assignment; starts `InProgress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    /// Assigned employee
    pub employee_id: EmployeeId,
    /// Project the subtask belongs to
    pub project_id: ProjectId,
    /// The subtask
    pub subtask_id: Option<SubtaskId>,
}

/// Filter for querying assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentFilter {
    /// Filter by employee
    pub employee_id: Option<EmployeeId>,

    /// Filter by project
    pub project_id: Option<ProjectId>,

    /// Filter by subtask
    pub subtask_id: Option<SubtaskId>,

    /// Filter by status
    pub status: Option<AssignmentStatus>,
}

impl AssignmentFilter {
    /// In-progress assignments of one employee.
    pub fn active_for(employee_id: EmployeeId) -> Self {
        Self {
            employee_id: Some(employee_id),
            status: Some(AssignmentStatus::InProgress),
            ..Default::default()
        }
    }

    /// Whether an assignment passes the filter.
    pub fn matches(&self, assignment: &Assignment) -> bool {
        self.employee_id.map_or(true, |id| assignment.employee_id == id)
            && self.project_id.as_ref().map_or(true, |id| &assignment.project_id == id)
            && self.subtask_id.map_or(true, |id| assignment.subtask_id == Some(id))
            && self.status.map_or(true, |s| assignment.status == s)
    }
}

/// Append-only diagnostic entry about assignment activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentLog {
    /// Unique identifier
    pub id: LogId,

    /// When it was written
    pub timestamp: Time,

    /// Employee it concerns
    pub employee_id: EmployeeId,

    /// Free-text message
    pub message: String,
}

impl AssignmentLog {
    /// Create a log entry.
    pub fn new(timestamp: Time, employee_id: EmployeeId, message: impl Into<String>) -> Self {
        Self {
            id: LogId::new(),
            timestamp,
            employee_id,
            message: message.into(),
        }
    }
}
