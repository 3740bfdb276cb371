//! Subtask assignment engine.
//!
//! Maps unassigned subtasks to employees. An employee holds at most one
//! in-progress assignment at a time. All scans enumerate employees and
//! subtasks in ascending id order, so "first match" is well defined.
//!
//! Callers must serialize engine operations against a store; the engine
//! itself takes no locks.

use std::collections::HashSet;
use std::sync::Arc;
use mockable::Clock;
use tracing::{debug, info, warn};
use workforce_core::{
    Assignment, AssignmentFilter, AssignmentLog, AssignmentStatus, Employee, EmployeeId,
    EntityRef, MilestoneFilter, MilestoneState, NewAssignment, Subtask, SubtaskFilter, SubtaskId,
    SubtaskState, Task, TaskId,
};
use workforce_storage::Storage;

use crate::matcher::{pick_best, pick_first, SkillSet};
use crate::outcome::{
    AssignOutcome, AssignPolicy, AssignmentReport, BulkAssignReport, EngineError, NoWorkReason,
    Result,
};

/// The assignment engine.
pub struct SubtaskAssigner<C> {
    clock: Arc<C>,
}

impl<C> Clone for SubtaskAssigner<C> {
    fn clone(&self) -> Self {
        Self {
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock + Send + Sync> SubtaskAssigner<C> {
    /// Create an engine stamping log entries with `clock`.
    pub fn new(clock: Arc<C>) -> Self {
        Self { clock }
    }

    /// The engine's clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Assign every unassigned subtask to the first available employee whose
    /// skills simple-match its name.
    ///
    /// Busy employees are skipped, including ones assigned earlier in the same
    /// pass. Subtasks without a match stay unassigned for the next pass.
    pub async fn bulk_assign<S: Storage>(&self, store: &mut S) -> Result<BulkAssignReport> {
        let subtasks = unassigned_subtasks(store).await?;
        let mut report = BulkAssignReport::default();
        if subtasks.is_empty() {
            debug!("bulk assignment: no unassigned subtasks");
            return Ok(report);
        }

        let mut employees = store.list_employees().await?;
        employees.sort_by_key(|e| e.id);
        let candidates: Vec<(Employee, SkillSet)> = employees
            .into_iter()
            .map(|e| {
                let skills = SkillSet::of(&e);
                (e, skills)
            })
            .collect();

        let mut busy: HashSet<EmployeeId> = store
            .list_assignments(&AssignmentFilter {
                status: Some(AssignmentStatus::InProgress),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|a| a.employee_id)
            .collect();

        for subtask in subtasks {
            let chosen = candidates
                .iter()
                .find(|(e, skills)| !busy.contains(&e.id) && skills.matches(&subtask.name));
            let Some((employee, _)) = chosen else {
                debug!(subtask = %subtask.id, name = %subtask.name, "no available employee matches");
                report.unmatched.push(subtask.id);
                continue;
            };

            let Some(task) = store.load_task(subtask.task_id).await? else {
                warn!(subtask = %subtask.id, task = %subtask.task_id, "subtask owner missing, skipping");
                report.unmatched.push(subtask.id);
                continue;
            };

            let employee_id = employee.id;
            let assigned = self
                .commit_assignment(store, subtask, &task, employee, AssignPolicy::Bulk, None)
                .await?;
            busy.insert(employee_id);
            report.assigned.push(assigned);
        }

        info!(
            assigned = report.assigned.len(),
            unmatched = report.unmatched.len(),
            "bulk assignment finished"
        );
        Ok(report)
    }

    /// Give an idle employee the unassigned subtask with the highest scored
    /// match.
    pub async fn assign_best_for_employee<S: Storage>(
        &self,
        store: &mut S,
        employee_id: EmployeeId,
    ) -> Result<AssignOutcome> {
        let employee = require_employee(store, employee_id).await?;
        if let Some(active) = active_assignment(store, employee_id).await? {
            debug!(employee = %employee_id, assignment = %active.id, "employee busy");
            return Ok(AssignOutcome::NoEligibleWork(NoWorkReason::EmployeeBusy {
                assignment_id: active.id,
            }));
        }

        let skills = SkillSet::of(&employee);
        let subtasks = unassigned_subtasks(store).await?;
        let Some(best) = pick_best(&skills, subtasks, |s| s.name.as_str()) else {
            debug!(employee = %employee_id, "no positively scored subtask");
            return Ok(AssignOutcome::NoEligibleWork(NoWorkReason::NoMatchingSubtask));
        };

        let task = require_task(store, best.candidate.task_id).await?;
        let report = self
            .commit_assignment(
                store,
                best.candidate,
                &task,
                &employee,
                AssignPolicy::BestScored,
                Some(best.score),
            )
            .await?;
        Ok(AssignOutcome::Assigned(report))
    }

    /// Give an idle employee the first unassigned subtask that simple-matches.
    ///
    /// Used when an employee finishes a subtask.
    pub async fn assign_next<S: Storage>(
        &self,
        store: &mut S,
        employee_id: EmployeeId,
    ) -> Result<AssignOutcome> {
        let employee = require_employee(store, employee_id).await?;
        if let Some(active) = active_assignment(store, employee_id).await? {
            debug!(employee = %employee_id, assignment = %active.id, "employee busy");
            return Ok(AssignOutcome::NoEligibleWork(NoWorkReason::EmployeeBusy {
                assignment_id: active.id,
            }));
        }

        let skills = SkillSet::of(&employee);
        let subtasks = unassigned_subtasks(store).await?;
        let Some(subtask) = pick_first(&skills, subtasks, |s| s.name.as_str()) else {
            debug!(employee = %employee_id, skills = ?skills.tokens(), "no matching subtask");
            return Ok(AssignOutcome::NoEligibleWork(NoWorkReason::NoMatchingSubtask));
        };

        let task = require_task(store, subtask.task_id).await?;
        let report = self
            .commit_assignment(store, subtask, &task, &employee, AssignPolicy::NextFirstMatch, None)
            .await?;
        Ok(AssignOutcome::Assigned(report))
    }

    /// Assign a specific subtask to a specific employee, skipping skill
    /// matching.
    ///
    /// Fails with `ConstraintViolation` when the subtask is already assigned,
    /// has no milestones, or the employee is busy.
    pub async fn assign_subtask<S: Storage>(
        &self,
        store: &mut S,
        subtask_id: SubtaskId,
        employee_id: EmployeeId,
    ) -> Result<AssignmentReport> {
        let employee = require_employee(store, employee_id).await?;
        let subtask = require_subtask(store, subtask_id).await?;
        if store
            .list_milestones(&MilestoneFilter::for_subtask(subtask_id))
            .await?
            .is_empty()
        {
            return Err(EngineError::ConstraintViolation(format!(
                "subtask {} has no milestones",
                subtask_id
            )));
        }
        let task = require_task(store, subtask.task_id).await?;
        self.commit_assignment(store, subtask, &task, &employee, AssignPolicy::Manual, None)
            .await
    }

    /// Give every unassigned milestone of a subtask to the employee.
    ///
    /// Milestones that already have an employee are left alone. Returns how
    /// many milestones changed.
    pub async fn cascade_milestones<S: Storage>(
        &self,
        store: &mut S,
        subtask_id: SubtaskId,
        employee_id: EmployeeId,
    ) -> Result<usize> {
        require_subtask(store, subtask_id).await?;
        require_employee(store, employee_id).await?;
        cascade_to(store, subtask_id, employee_id).await
    }

    async fn commit_assignment<S: Storage>(
        &self,
        store: &mut S,
        subtask: Subtask,
        task: &Task,
        employee: &Employee,
        policy: AssignPolicy,
        score: Option<usize>,
    ) -> Result<AssignmentReport> {
        // Check current state before touching anything.
        let mut subtask = require_subtask(store, subtask.id).await?;
        if !subtask.is_unassigned() {
            return Err(EngineError::ConstraintViolation(format!(
                "subtask {} is already assigned",
                subtask.id
            )));
        }
        if let Some(active) = active_assignment(store, employee.id).await? {
            return Err(EngineError::ConstraintViolation(format!(
                "employee {} already works on assignment {}",
                employee.id, active.id
            )));
        }

        subtask.state = SubtaskState::InProgress {
            employee_id: employee.id,
        };
        store.save_subtask(&subtask).await?;

        let existing = store
            .list_assignments(&AssignmentFilter {
                employee_id: Some(employee.id),
                project_id: Some(task.project_id.clone()),
                subtask_id: Some(subtask.id),
                status: None,
            })
            .await?
            .into_iter()
            .next();

        let (assignment, reused) = match existing {
            Some(mut assignment) => {
                if assignment.status != AssignmentStatus::InProgress {
                    assignment.status = AssignmentStatus::InProgress;
                    store.save_assignment(&assignment).await?;
                }
                (assignment, true)
            }
            None => {
                let assignment = store
                    .insert_assignment(NewAssignment {
                        employee_id: employee.id,
                        project_id: task.project_id.clone(),
                        subtask_id: Some(subtask.id),
                    })
                    .await?;
                (assignment, false)
            }
        };

        let cascaded = cascade_to(store, subtask.id, employee.id).await?;

        store
            .append_log(&AssignmentLog::new(
                self.clock.utc(),
                employee.id,
                format!(
                    "Assigned subtask '{}' ({}) via {} with {} milestone(s)",
                    subtask.name,
                    subtask.id,
                    policy.as_str(),
                    cascaded
                ),
            ))
            .await?;

        info!(
            subtask = %subtask.id,
            employee = %employee.id,
            policy = policy.as_str(),
            reused,
            "assigned subtask '{}' to {}",
            subtask.name,
            employee.name
        );

        Ok(AssignmentReport {
            subtask_id: subtask.id,
            subtask_name: subtask.name,
            task_id: task.id,
            project_id: task.project_id.clone(),
            employee_id: employee.id,
            employee_name: employee.name.clone(),
            assignment_id: assignment.id,
            reused_assignment: reused,
            milestones_cascaded: cascaded,
            score,
            policy,
        })
    }
}

/// The employee's in-progress assignment, if any.
pub async fn active_assignment<S: Storage>(
    store: &S,
    employee_id: EmployeeId,
) -> Result<Option<Assignment>> {
    Ok(store
        .list_assignments(&AssignmentFilter::active_for(employee_id))
        .await?
        .into_iter()
        .min_by_key(|a| a.id))
}

/// Unassigned subtasks that own at least one milestone, in id order.
async fn unassigned_subtasks<S: Storage>(store: &S) -> Result<Vec<Subtask>> {
    let owners: HashSet<SubtaskId> = store
        .list_milestones(&MilestoneFilter::default())
        .await?
        .into_iter()
        .map(|m| m.subtask_id)
        .collect();

    let mut subtasks: Vec<Subtask> = store
        .list_subtasks(&SubtaskFilter::unassigned())
        .await?
        .into_iter()
        .filter(|s| {
            let assignable = owners.contains(&s.id);
            if !assignable {
                debug!(subtask = %s.id, name = %s.name, "subtask has no milestones, not assignable");
            }
            assignable
        })
        .collect();
    subtasks.sort_by_key(|s| s.id);
    Ok(subtasks)
}

async fn cascade_to<S: Storage>(
    store: &mut S,
    subtask_id: SubtaskId,
    employee_id: EmployeeId,
) -> Result<usize> {
    let milestones = store
        .list_milestones(&MilestoneFilter {
            subtask_id: Some(subtask_id),
            unassigned_only: true,
            ..Default::default()
        })
        .await?;

    let count = milestones.len();
    for mut milestone in milestones {
        milestone.employee_id = Some(employee_id);
        milestone.state = MilestoneState::NotStarted;
        store.save_milestone(&milestone).await?;
    }
    debug!(subtask = %subtask_id, employee = %employee_id, count, "cascaded milestones");
    Ok(count)
}

async fn require_employee<S: Storage>(store: &S, id: EmployeeId) -> Result<Employee> {
    store
        .load_employee(id)
        .await?
        .ok_or(EngineError::NotFound(EntityRef::Employee(id)))
}

async fn require_subtask<S: Storage>(store: &S, id: SubtaskId) -> Result<Subtask> {
    store
        .load_subtask(id)
        .await?
        .ok_or(EngineError::NotFound(EntityRef::Subtask(id)))
}

async fn require_task<S: Storage>(store: &S, id: TaskId) -> Result<Task> {
    store
        .load_task(id)
        .await?
        .ok_or(EngineError::NotFound(EntityRef::Task(id)))
}
