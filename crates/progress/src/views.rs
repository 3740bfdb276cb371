//! Read-only views over projects and employees.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use workforce_core::{
    AssignmentFilter, AssignmentLog, Employee, EmployeeId, EntityRef, Milestone, MilestoneFilter,
    Project, ProjectId, Subtask, SubtaskFilter, Task, TaskFilter, MILESTONES_PER_SUBTASK,
};
use workforce_storage::Storage;

use crate::tracker::{Result, TrackerError};

/// A project with its full breakdown and who works on what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOverview {
    /// The project
    pub project: Project,
    /// Employees holding any assignment in the project
    pub employees: Vec<Employee>,
    /// Tasks in creation order
    pub tasks: Vec<TaskOverview>,
}

/// A task and its subtasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOverview {
    /// The task
    pub task: Task,
    /// Its subtasks in creation order
    pub subtasks: Vec<SubtaskOverview>,
}

/// A subtask with its employee and milestones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskOverview {
    /// The subtask
    pub subtask: Subtask,
    /// Assigned employee
    pub employee: Option<Employee>,
    /// Milestones in creation order
    pub milestones: Vec<Milestone>,
    /// Completed milestones out of the standard five, as a percentage
    pub progress: f32,
}

/// Everything an employee holds assignments for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeWorkload {
    /// The employee
    pub employee: Employee,
    /// Projects with at least one assignment, ordered by id
    pub projects: Vec<Project>,
    /// Tasks reached through assigned subtasks
    pub tasks: Vec<WorkloadTask>,
}

/// A task as seen from one employee's assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadTask {
    /// The task
    pub task: Task,
    /// Subtasks of the task assigned to the employee
    pub subtasks: Vec<WorkloadSubtask>,
}

/// An assigned subtask and its milestones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSubtask {
    /// The subtask
    pub subtask: Subtask,
    /// Its milestones
    pub milestones: Vec<Milestone>,
}

/// Percentage of the standard milestone count that is completed.
pub fn subtask_progress(milestones: &[Milestone]) -> f32 {
    let completed = milestones.iter().filter(|m| m.is_completed()).count();
    (completed.min(MILESTONES_PER_SUBTASK) * 100) as f32 / MILESTONES_PER_SUBTASK as f32
}

/// Build the overview of one project.
pub async fn project_overview<S: Storage>(store: &S, id: &ProjectId) -> Result<ProjectOverview> {
    let project = store
        .load_project(id)
        .await?
        .ok_or_else(|| TrackerError::NotFound(EntityRef::Project(id.clone())))?;

    let assignments = store
        .list_assignments(&AssignmentFilter {
            project_id: Some(id.clone()),
            ..Default::default()
        })
        .await?;
    let employee_ids: BTreeSet<EmployeeId> = assignments.iter().map(|a| a.employee_id).collect();
    let mut employees = Vec::new();
    for employee_id in employee_ids {
        if let Some(employee) = store.load_employee(employee_id).await? {
            employees.push(employee);
        }
    }

    let tasks = store
        .list_tasks(&TaskFilter {
            project_id: Some(id.clone()),
            ..Default::default()
        })
        .await?;

    let mut overview = Vec::with_capacity(tasks.len());
    for task in tasks {
        let mut subtasks = Vec::new();
        for subtask in store.list_subtasks(&SubtaskFilter::for_task(task.id)).await? {
            let employee = match subtask.employee_id() {
                Some(employee_id) => store.load_employee(employee_id).await?,
                None => None,
            };
            let milestones = store
                .list_milestones(&MilestoneFilter::for_subtask(subtask.id))
                .await?;
            subtasks.push(SubtaskOverview {
                progress: subtask_progress(&milestones),
                subtask,
                employee,
                milestones,
            });
        }
        overview.push(TaskOverview { task, subtasks });
    }

    Ok(ProjectOverview {
        project,
        employees,
        tasks: overview,
    })
}

/// Build the workload of one employee from their assignment records.
pub async fn employee_workload<S: Storage>(
    store: &S,
    employee_id: EmployeeId,
) -> Result<EmployeeWorkload> {
    let employee = store
        .load_employee(employee_id)
        .await?
        .ok_or(TrackerError::NotFound(EntityRef::Employee(employee_id)))?;

    let assignments = store
        .list_assignments(&AssignmentFilter {
            employee_id: Some(employee_id),
            ..Default::default()
        })
        .await?;

    let project_ids: BTreeSet<ProjectId> =
        assignments.iter().map(|a| a.project_id.clone()).collect();
    let mut projects = Vec::new();
    for project_id in &project_ids {
        if let Some(project) = store.load_project(project_id).await? {
            projects.push(project);
        }
    }

    let mut tasks: Vec<WorkloadTask> = Vec::new();
    for subtask_id in assignments.iter().filter_map(|a| a.subtask_id) {
        let Some(subtask) = store.load_subtask(subtask_id).await? else {
            continue;
        };
        let Some(task) = store.load_task(subtask.task_id).await? else {
            continue;
        };
        let milestones = store
            .list_milestones(&MilestoneFilter::for_subtask(subtask.id))
            .await?;
        let entry = WorkloadSubtask { subtask, milestones };

        match tasks.iter_mut().find(|t| t.task.id == task.id) {
            Some(existing) => existing.subtasks.push(entry),
            None => tasks.push(WorkloadTask {
                task,
                subtasks: vec![entry],
            }),
        }
    }

    Ok(EmployeeWorkload {
        employee,
        projects,
        tasks,
    })
}

/// Assignment log of one employee, newest first.
pub async fn logs_for_employee<S: Storage>(
    store: &S,
    employee_id: EmployeeId,
) -> Result<Vec<AssignmentLog>> {
    if store.load_employee(employee_id).await?.is_none() {
        return Err(TrackerError::NotFound(EntityRef::Employee(employee_id)));
    }
    let mut logs = store.list_logs(Some(employee_id)).await?;
    logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::Utc;
    use mockable::DefaultClock;
    use workforce_core::{NewEmployee, NewMilestone, NewSubtask, NewTask};
    use workforce_storage::JsonStorage;

    use crate::tracker::CompletionTracker;

    async fn seeded() -> (JsonStorage, ProjectId, EmployeeId) {
        let mut store = JsonStorage::in_memory();
        let project_id = ProjectId::new("P002");
        store
            .save_project(&Project::new(project_id.clone(), "Analytics", Utc::now()))
            .await
            .unwrap();

        for (task_name, subtask_name) in [("Backend", "Write SQL migrations"), ("Frontend", "Design landing page")] {
            let task = store
                .insert_task(NewTask {
                    project_id: project_id.clone(),
                    name: task_name.to_string(),
                })
                .await
                .unwrap();
            let subtask = store
                .insert_subtask(NewSubtask {
                    task_id: task.id,
                    name: subtask_name.to_string(),
                })
                .await
                .unwrap();
            for i in 1..=MILESTONES_PER_SUBTASK {
                store
                    .insert_milestone(NewMilestone {
                        subtask_id: subtask.id,
                        name: format!("Step {i}"),
                    })
                    .await
                    .unwrap();
            }
        }

        let ada = store.insert_employee(NewEmployee::new("Ada", "sql")).await.unwrap();
        (store, project_id, ada.id)
    }

    #[tokio::test]
    async fn test_project_overview_shows_assignment_and_progress() {
        let (mut store, project_id, ada) = seeded().await;
        let tracker = CompletionTracker::new(Arc::new(DefaultClock));
        tracker.assigner().bulk_assign(&mut store).await.unwrap();

        let first = store
            .list_milestones(&MilestoneFilter {
                employee_id: Some(ada),
                ..Default::default()
            })
            .await
            .unwrap();
        for m in &first[..2] {
            tracker.complete_milestone(&mut store, m.id).await.unwrap();
        }

        let overview = project_overview(&store, &project_id).await.unwrap();
        assert_eq!(overview.employees.len(), 1);
        assert_eq!(overview.tasks.len(), 2);

        let backend = &overview.tasks[0].subtasks[0];
        assert_eq!(backend.employee.as_ref().map(|e| e.id), Some(ada));
        assert_eq!(backend.progress, 40.0);

        let frontend = &overview.tasks[1].subtasks[0];
        assert!(frontend.employee.is_none());
        assert_eq!(frontend.progress, 0.0);
    }

    #[tokio::test]
    async fn test_project_overview_unknown_project() {
        let (store, _, _) = seeded().await;
        let err = project_overview(&store, &ProjectId::new("P404")).await.unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(EntityRef::Project(_))));
    }

    #[tokio::test]
    async fn test_employee_workload_groups_by_task() {
        let (mut store, project_id, ada) = seeded().await;
        let tracker = CompletionTracker::new(Arc::new(DefaultClock));
        tracker.assigner().bulk_assign(&mut store).await.unwrap();

        let workload = employee_workload(&store, ada).await.unwrap();
        assert_eq!(workload.projects.len(), 1);
        assert_eq!(workload.projects[0].id, project_id);
        assert_eq!(workload.tasks.len(), 1);
        assert_eq!(workload.tasks[0].task.name, "Backend");
        assert_eq!(workload.tasks[0].subtasks[0].milestones.len(), MILESTONES_PER_SUBTASK);

        let idle = store.insert_employee(NewEmployee::new("Bo", "go")).await.unwrap();
        let empty = employee_workload(&store, idle.id).await.unwrap();
        assert!(empty.projects.is_empty() && empty.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_logs_newest_first() {
        let (mut store, _, ada) = seeded().await;
        let base = Utc::now();
        for (offset, msg) in [(0, "first"), (5, "third"), (2, "second")] {
            store
                .append_log(&AssignmentLog::new(
                    base + chrono::Duration::seconds(offset),
                    ada,
                    msg,
                ))
                .await
                .unwrap();
        }

        let logs = logs_for_employee(&store, ada).await.unwrap();
        let messages: Vec<_> = logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["third", "second", "first"]);

        let err = logs_for_employee(&store, EmployeeId::new(9)).await.unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(EntityRef::Employee(_))));
    }
}
