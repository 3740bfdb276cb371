//! Workforce core data models.
//!
//! This crate defines the work breakdown (projects, tasks, subtasks,
//! milestones), the people work is routed to, and the records the
//! assignment engine keeps about who works on what.

#![warn(missing_docs)]

// Core identities
mod id;

// People and projects
mod employee;
mod project;

// Work breakdown
mod task;

// Assignment records
mod assignment;

// Re-exports
pub use id::*;

pub use employee::{Employee, NewEmployee, split_skills};
pub use project::Project;
pub use task::{
    Task, TaskStatus, TaskFilter, NewTask,
    Subtask, SubtaskState, SubtaskStatus, SubtaskFilter, NewSubtask,
    Milestone, MilestoneState, MilestoneStatus, MilestoneFilter, NewMilestone,
    MILESTONES_PER_SUBTASK, MAX_NAME_LEN, clamp_name,
};
pub use assignment::{
    Assignment, AssignmentStatus, AssignmentFilter, NewAssignment, AssignmentLog,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
