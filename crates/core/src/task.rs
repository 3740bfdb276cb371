//! Task, subtask and milestone models - the work breakdown.

use serde::{Deserialize, Serialize};
use crate::id::{EmployeeId, MilestoneId, ProjectId, SubtaskId, TaskId};
use crate::Time;

/// Every generated subtask is broken into exactly this many milestones.
pub const MILESTONES_PER_SUBTASK: usize = 5;

/// Longest name stored for a task, subtask or milestone.
pub const MAX_NAME_LEN: usize = 255;

/// A task groups subtasks within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Owning project
    pub project_id: ProjectId,

    /// Task name (a category such as "Backend Development")
    pub name: String,

    /// Current status
    pub status: TaskStatus,
}

/// Task status. Completed once every owned subtask is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// At least one subtask still open
    NotStarted,
    /// All subtasks completed
    Completed,
}

/// A subtask is the unit of assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Unique identifier
    pub id: SubtaskId,

    /// Owning task
    pub task_id: TaskId,

    /// Subtask name, matched against employee skills
    pub name: String,

    /// Assignment state
    pub state: SubtaskState,
}

/// Subtask lifecycle. An employee is attached exactly when the subtask
/// has left `Unassigned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtaskState {
    /// Waiting for an employee
    Unassigned,

    /// Assigned and being worked on
    InProgress {
        /// Assigned employee
        employee_id: EmployeeId,
    },

    /// All milestones done
    Completed {
        /// Employee who did the work
        employee_id: EmployeeId,
    },
}

/// Data-less view of [`SubtaskState`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubtaskStatus {
    /// No employee yet
    Unassigned,
    /// Assigned and being worked on
    InProgress,
    /// All milestones done
    Completed,
}

impl SubtaskState {
    /// Status without the employee.
    pub fn status(&self) -> SubtaskStatus {
        match self {
            Self::Unassigned => SubtaskStatus::Unassigned,
            Self::InProgress { .. } => SubtaskStatus::InProgress,
            Self::Completed { .. } => SubtaskStatus::Completed,
        }
    }

    /// The assigned employee, if any.
    pub fn employee_id(&self) -> Option<EmployeeId> {
        match *self {
            Self::Unassigned => None,
            Self::InProgress { employee_id } | Self::Completed { employee_id } => Some(employee_id),
        }
    }
}

impl Subtask {
    /// Current status.
    pub fn status(&self) -> SubtaskStatus {
        self.state.status()
    }

    /// Assigned employee, if any.
    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.state.employee_id()
    }

    /// Whether the subtask still waits for an employee.
    pub fn is_unassigned(&self) -> bool {
        matches!(self.state, SubtaskState::Unassigned)
    }

    /// Whether the subtask is done.
    pub fn is_completed(&self) -> bool {
        matches!(self.state, SubtaskState::Completed { .. })
    }
}

/// A milestone is one of the small steps of a subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique identifier
    pub id: MilestoneId,

    /// Owning subtask
    pub subtask_id: SubtaskId,

    /// Milestone name
    pub name: String,

    /// Employee the milestone was cascaded to
    pub employee_id: Option<EmployeeId>,

    /// Completion state
    pub state: MilestoneState,
}

/// Milestone completion. The timestamp exists only once completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneState {
    /// Not done yet
    NotStarted,

    /// Done at the given time
    Completed {
        /// When it was marked done
        completed_at: Time,
    },
}

/// Data-less view of [`MilestoneState`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MilestoneStatus {
    /// Not done yet
    NotStarted,
    /// Done
    Completed,
}

impl MilestoneState {
    /// Status without the timestamp.
    pub fn status(&self) -> MilestoneStatus {
        match self {
            Self::NotStarted => MilestoneStatus::NotStarted,
            Self::Completed { .. } => MilestoneStatus::Completed,
        }
    }
}

impl Milestone {
    /// Whether the milestone is done.
    pub fn is_completed(&self) -> bool {
        matches!(self.state, MilestoneState::Completed { .. })
    }

    /// Completion time, if completed.
    pub fn completed_at(&self) -> Option<Time> {
        match self.state {
            MilestoneState::Completed { completed_at } => Some(completed_at),
            MilestoneState::NotStarted => None,
        }
    }
}

/// Data for a new task; the store allocates the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Owning project
    pub project_id: ProjectId,
    /// Task name
    pub name: String,
}

/// Data for a new subtask; starts `Unassigned`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubtask {
    /// Owning task
    pub task_id: TaskId,
    /// Subtask name
    pub name: String,
}

/// Data for a new milestone; starts unassigned and `NotStarted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMilestone {
    /// Owning subtask
    pub subtask_id: SubtaskId,
    /// Milestone name
    pub name: String,
}

/// Filter for querying tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Filter by owning project
    pub project_id: Option<ProjectId>,

    /// Filter by status
    pub status: Option<TaskStatus>,
}

/// Filter for querying subtasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskFilter {
    /// Filter by owning task
    pub task_id: Option<TaskId>,

    /// Filter by status
    pub status: Option<SubtaskStatus>,

    /// Filter by assigned employee
    pub employee_id: Option<EmployeeId>,
}

impl SubtaskFilter {
    /// Subtasks still waiting for an employee.
    pub fn unassigned() -> Self {
        Self {
            status: Some(SubtaskStatus::Unassigned),
            ..Default::default()
        }
    }

    /// Subtasks owned by a task.
    pub fn for_task(task_id: TaskId) -> Self {
        Self {
            task_id: Some(task_id),
            ..Default::default()
        }
    }

    /// Whether a subtask passes the filter.
    pub fn matches(&self, subtask: &Subtask) -> bool {
        self.task_id.map_or(true, |id| subtask.task_id == id)
            && self.status.map_or(true, |s| subtask.status() == s)
            && self.employee_id.map_or(true, |id| subtask.employee_id() == Some(id))
    }
}

/// Filter for querying milestones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneFilter {
    /// Filter by owning subtask
    pub subtask_id: Option<SubtaskId>,

    /// Filter by assigned employee
    pub employee_id: Option<EmployeeId>,

    /// Filter by status
    pub status: Option<MilestoneStatus>,

    /// Only milestones with no employee
    pub unassigned_only: bool,
}

impl MilestoneFilter {
    /// Milestones owned by a subtask.
    pub fn for_subtask(subtask_id: SubtaskId) -> Self {
        Self {
            subtask_id: Some(subtask_id),
            ..Default::default()
        }
    }

    /// Whether a milestone passes the filter.
    pub fn matches(&self, milestone: &Milestone) -> bool {
        self.subtask_id.map_or(true, |id| milestone.subtask_id == id)
            && self.employee_id.map_or(true, |id| milestone.employee_id == Some(id))
            && self.status.map_or(true, |s| milestone.state.status() == s)
            && (!self.unassigned_only || milestone.employee_id.is_none())
    }
}

impl TaskFilter {
    /// Whether a task passes the filter.
    pub fn matches(&self, task: &Task) -> bool {
        self.project_id.as_ref().map_or(true, |id| &task.project_id == id)
            && self.status.map_or(true, |s| task.status == s)
    }
}

/// Truncate a name to [`MAX_NAME_LEN`] characters.
pub fn clamp_name(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_LEN).collect()
}
