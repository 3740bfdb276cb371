//! Storage trait abstraction.

use async_trait::async_trait;
use workforce_core::{
    Assignment, AssignmentFilter, AssignmentLog, Employee, EmployeeId, EntityRef, Milestone,
    MilestoneFilter, MilestoneId, NewAssignment, NewEmployee, NewMilestone, NewSubtask, NewTask,
    Project, ProjectId, Subtask, SubtaskFilter, SubtaskId, Task, TaskFilter, TaskId,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(EntityRef),

    /// Record already exists
    #[error("Conflict: {0} already exists")]
    Conflict(EntityRef),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Storage abstraction for workforce data.
///
/// Lists come back in ascending id order; the assignment engine's
/// first-match scans rely on it. Writes are visible to the next read.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Employee operations ===

    /// Onboard an employee, allocating its id.
    async fn insert_employee(&mut self, draft: NewEmployee) -> Result<Employee>;

    /// Update an existing employee.
    async fn save_employee(&mut self, employee: &Employee) -> Result<()>;

    /// Load an employee by ID.
    async fn load_employee(&self, id: EmployeeId) -> Result<Option<Employee>>;

    /// List all employees.
    async fn list_employees(&self) -> Result<Vec<Employee>>;

    // === Project operations ===

    /// Save a project (create or update).
    async fn save_project(&mut self, project: &Project) -> Result<()>;

    /// Load a project by ID.
    async fn load_project(&self, id: &ProjectId) -> Result<Option<Project>>;

    /// List all projects.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Delete a project with its tasks, subtasks, milestones and assignments.
    async fn delete_project(&mut self, id: &ProjectId) -> Result<()>;

    // === Task operations ===

    /// Create a task under an existing project.
    async fn insert_task(&mut self, draft: NewTask) -> Result<Task>;

    /// Update an existing task.
    async fn save_task(&mut self, task: &Task) -> Result<()>;

    /// Load a task by ID.
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>>;

    /// List tasks matching the filter.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Delete a task with its subtasks and milestones.
    async fn delete_task(&mut self, id: TaskId) -> Result<()>;

    // === Subtask operations ===

    /// Create an unassigned subtask under an existing task.
    async fn insert_subtask(&mut self, draft: NewSubtask) -> Result<Subtask>;

    /// Update an existing subtask.
    async fn save_subtask(&mut self, subtask: &Subtask) -> Result<()>;

    /// Load a subtask by ID.
    async fn load_subtask(&self, id: SubtaskId) -> Result<Option<Subtask>>;

    /// List subtasks matching the filter.
    async fn list_subtasks(&self, filter: &SubtaskFilter) -> Result<Vec<Subtask>>;

    /// Delete a subtask with its milestones.
    async fn delete_subtask(&mut self, id: SubtaskId) -> Result<()>;

    // === Milestone operations ===

    /// Create an unassigned milestone under an existing subtask.
    async fn insert_milestone(&mut self, draft: NewMilestone) -> Result<Milestone>;

    /// Update an existing milestone.
    async fn save_milestone(&mut self, milestone: &Milestone) -> Result<()>;

    /// Load a milestone by ID.
    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<Milestone>>;

    /// List milestones matching the filter.
    async fn list_milestones(&self, filter: &MilestoneFilter) -> Result<Vec<Milestone>>;

    // === Assignment operations ===

    /// Create an in-progress assignment.
    async fn insert_assignment(&mut self, draft: NewAssignment) -> Result<Assignment>;

    /// Update an existing assignment.
    async fn save_assignment(&mut self, assignment: &Assignment) -> Result<()>;

    /// List assignments matching the filter.
    async fn list_assignments(&self, filter: &AssignmentFilter) -> Result<Vec<Assignment>>;

    // === Assignment log ===

    /// Append a log entry.
    async fn append_log(&mut self, entry: &AssignmentLog) -> Result<()>;

    /// List log entries, oldest first, optionally for one employee.
    async fn list_logs(&self, employee_id: Option<EmployeeId>) -> Result<Vec<AssignmentLog>>;

    // === Transaction support ===

    /// Commit pending changes with a message.
    async fn commit(&mut self, message: &str) -> Result<()>;

    /// Rollback pending changes.
    async fn rollback(&mut self) -> Result<()>;
}
