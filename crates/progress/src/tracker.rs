//! Completion tracking service.
//!
//! Propagates milestone completion upward: milestone, then subtask, then
//! task. Finishing a subtask frees the employee, who is offered the next
//! matching subtask straight away.

use std::sync::Arc;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use workforce_core::{
    AssignmentFilter, AssignmentId, AssignmentLog, AssignmentStatus, EmployeeId, EntityRef,
    MilestoneFilter, MilestoneId, MilestoneState, Subtask, SubtaskFilter, SubtaskId, SubtaskState,
    SubtaskStatus, TaskFilter, TaskId, TaskStatus, Time,
};
use workforce_storage::{Storage, StorageError};
use workforce_work::{AssignOutcome, EngineError, SubtaskAssigner};

/// Tracker result type.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors from completion tracking.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// A referenced record does not exist; nothing was changed
    #[error("Not found: {0}")]
    NotFound(EntityRef),

    /// Follow-up assignment or storage failed
    #[error(transparent)]
    Engine(EngineError),
}

impl From<EngineError> for TrackerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(entity) => Self::NotFound(entity),
            other => Self::Engine(other),
        }
    }
}

impl From<StorageError> for TrackerError {
    fn from(err: StorageError) -> Self {
        EngineError::from(err).into()
    }
}

/// A milestone marked completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneCompletion {
    /// The milestone
    pub milestone_id: MilestoneId,
    /// Its owning subtask
    pub subtask_id: SubtaskId,
    /// Employee the milestone was cascaded to, if any
    pub employee_id: Option<EmployeeId>,
    /// Completion timestamp
    pub completed_at: Time,
    /// The milestone was already completed and got a fresh timestamp
    pub restamped: bool,
}

/// What reconciling one subtask did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtaskReconciliation {
    /// Some milestones are still open
    Pending {
        /// Milestones done
        completed: usize,
        /// Milestones owned
        total: usize,
    },

    /// The subtask has no milestones, so it never completes this way
    NoMilestones,

    /// All milestones are done but the subtask is not in progress
    NotInProgress {
        /// Current subtask status
        status: SubtaskStatus,
    },

    /// The subtask was completed and its employee offered new work
    Completed {
        /// Employee who finished the subtask
        employee_id: EmployeeId,
        /// Assignment record closed with the subtask
        assignment_id: Option<AssignmentId>,
        /// Result of offering the employee their next subtask
        next: AssignOutcome,
    },
}

impl SubtaskReconciliation {
    /// Whether this call completed the subtask.
    pub fn completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Boundary result of completing a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    /// The completion itself
    pub milestone: MilestoneCompletion,
    /// What reconciling the owning subtask did
    pub subtask: SubtaskReconciliation,
}

/// Result of a task status sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReconciliation {
    /// Open tasks examined
    pub checked: usize,
    /// Tasks moved to completed
    pub completed: Vec<TaskId>,
}

/// Completion tracker.
pub struct CompletionTracker<C> {
    assigner: SubtaskAssigner<C>,
}

impl<C> Clone for CompletionTracker<C> {
    fn clone(&self) -> Self {
        Self {
            assigner: self.assigner.clone(),
        }
    }
}

impl<C: Clock + Send + Sync> CompletionTracker<C> {
    /// Create a tracker with its own assignment engine on `clock`.
    pub fn new(clock: Arc<C>) -> Self {
        Self::with_assigner(SubtaskAssigner::new(clock))
    }

    /// Create a tracker handing freed employees to `assigner`.
    pub fn with_assigner(assigner: SubtaskAssigner<C>) -> Self {
        Self { assigner }
    }

    /// The engine used for follow-up assignment.
    pub fn assigner(&self) -> &SubtaskAssigner<C> {
        &self.assigner
    }

    /// Mark a milestone completed now.
    ///
    /// Completing it again replaces the timestamp.
    pub async fn complete_milestone<S: Storage>(
        &self,
        store: &mut S,
        milestone_id: MilestoneId,
    ) -> Result<MilestoneCompletion> {
        let mut milestone = store
            .load_milestone(milestone_id)
            .await?
            .ok_or(TrackerError::NotFound(EntityRef::Milestone(milestone_id)))?;

        let restamped = milestone.is_completed();
        let completed_at = self.assigner.clock().utc();
        milestone.state = MilestoneState::Completed { completed_at };
        store.save_milestone(&milestone).await?;

        debug!(milestone = %milestone_id, restamped, "milestone completed");
        Ok(MilestoneCompletion {
            milestone_id,
            subtask_id: milestone.subtask_id,
            employee_id: milestone.employee_id,
            completed_at,
            restamped,
        })
    }

    /// Complete the subtask once all of its milestones are done.
    ///
    /// Closes the employee's assignment for it, logs, and offers the
    /// employee their next subtask.
    pub async fn reconcile_subtask<S: Storage>(
        &self,
        store: &mut S,
        subtask_id: SubtaskId,
    ) -> Result<SubtaskReconciliation> {
        let mut subtask = store
            .load_subtask(subtask_id)
            .await?
            .ok_or(TrackerError::NotFound(EntityRef::Subtask(subtask_id)))?;

        let milestones = store
            .list_milestones(&MilestoneFilter::for_subtask(subtask_id))
            .await?;
        let total = milestones.len();
        let completed = milestones.iter().filter(|m| m.is_completed()).count();

        if total == 0 {
            return Ok(SubtaskReconciliation::NoMilestones);
        }
        if completed < total {
            return Ok(SubtaskReconciliation::Pending { completed, total });
        }
        let SubtaskState::InProgress { employee_id } = subtask.state else {
            debug!(subtask = %subtask_id, status = ?subtask.status(), "milestones done, subtask not in progress");
            return Ok(SubtaskReconciliation::NotInProgress {
                status: subtask.status(),
            });
        };

        subtask.state = SubtaskState::Completed { employee_id };
        store.save_subtask(&subtask).await?;

        let open = store
            .list_assignments(&AssignmentFilter {
                employee_id: Some(employee_id),
                subtask_id: Some(subtask_id),
                status: Some(AssignmentStatus::InProgress),
                ..Default::default()
            })
            .await?;
        let mut assignment_id = None;
        for mut assignment in open {
            assignment.status = AssignmentStatus::Completed;
            store.save_assignment(&assignment).await?;
            assignment_id.get_or_insert(assignment.id);
        }

        store
            .append_log(&AssignmentLog::new(
                self.assigner.clock().utc(),
                employee_id,
                format!("Completed subtask '{}' ({})", subtask.name, subtask.id),
            ))
            .await?;
        info!(subtask = %subtask_id, employee = %employee_id, "subtask '{}' completed", subtask.name);

        let next = self.assigner.assign_next(store, employee_id).await?;
        Ok(SubtaskReconciliation::Completed {
            employee_id,
            assignment_id,
            next,
        })
    }

    /// Complete a milestone and reconcile its subtask.
    pub async fn record_milestone_completion<S: Storage>(
        &self,
        store: &mut S,
        milestone_id: MilestoneId,
    ) -> Result<MilestoneRecord> {
        let milestone = self.complete_milestone(store, milestone_id).await?;
        let subtask = self.reconcile_subtask(store, milestone.subtask_id).await?;
        Ok(MilestoneRecord { milestone, subtask })
    }

    /// Mark every open task whose subtasks are all completed as completed.
    ///
    /// A task without subtasks counts as done. Completed tasks are never
    /// reopened, so a repeat sweep changes nothing.
    pub async fn reconcile_all_tasks<S: Storage>(
        &self,
        store: &mut S,
    ) -> Result<TaskReconciliation> {
        let open = store
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::NotStarted),
                ..Default::default()
            })
            .await?;

        let mut report = TaskReconciliation {
            checked: open.len(),
            ..Default::default()
        };
        for mut task in open {
            let subtasks = store.list_subtasks(&SubtaskFilter::for_task(task.id)).await?;
            if subtasks.iter().all(Subtask::is_completed) {
                task.status = TaskStatus::Completed;
                store.save_task(&task).await?;
                report.completed.push(task.id);
            }
        }

        if !report.completed.is_empty() {
            info!(completed = report.completed.len(), "tasks completed");
        }
        Ok(report)
    }
}
