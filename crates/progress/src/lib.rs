//! Progress Tracking (Layer 3)
//!
//! Milestone completion, subtask and task reconciliation, and progress views.

#![warn(missing_docs)]

pub mod tracker;
pub mod views;

pub use tracker::{
    CompletionTracker, MilestoneCompletion, MilestoneRecord, SubtaskReconciliation,
    TaskReconciliation, TrackerError, Result,
};
pub use views::{
    EmployeeWorkload, ProjectOverview, SubtaskOverview, TaskOverview, WorkloadSubtask,
    WorkloadTask, employee_workload, logs_for_employee, project_overview, subtask_progress,
};
