//! Serialized boundary over the store.
//!
//! [`AssignmentService`] is what callers (the CLI, the periodic driver)
//! talk to. It owns the store behind a single async mutex: every operation
//! holds the lock for its whole duration, commits on success and rolls
//! back on failure. No two assignment operations ever interleave.

use std::sync::Arc;
use mockable::Clock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use workforce_core::{
    AssignmentFilter, AssignmentLog, AssignmentStatus, Employee, EmployeeId, EntityRef,
    MilestoneId, NewEmployee, Project, ProjectId, SubtaskId,
};
use workforce_progress::{
    employee_workload, logs_for_employee, project_overview, CompletionTracker, EmployeeWorkload,
    MilestoneRecord, ProjectOverview, TaskReconciliation, TrackerError,
};
use workforce_storage::{Storage, StorageError};
use workforce_work::{
    import_breakdown, AssignOutcome, AssignmentReport, BreakdownParser, BulkAssignReport,
    EngineError, GeneratorError, ImportSummary, SubtaskAssigner, TaskGenerator,
};

/// Service result type.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced at the service boundary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(EntityRef),

    /// The change would break an assignment invariant
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The record already exists
    #[error("Conflict: {0} already exists")]
    Conflict(EntityRef),

    /// Rejected input
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Breakdown generation failed
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// The store failed
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(entity) => Self::NotFound(entity),
            StorageError::Conflict(entity) => Self::Conflict(entity),
            other => Self::Storage(other),
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(entity) => Self::NotFound(entity),
            EngineError::ConstraintViolation(msg) => Self::ConstraintViolation(msg),
            EngineError::Storage(err) => err.into(),
        }
    }
}

impl From<TrackerError> for ServiceError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::NotFound(entity) => Self::NotFound(entity),
            TrackerError::Engine(err) => err.into(),
        }
    }
}

/// Result of importing a generated breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownImport {
    /// What was created
    pub summary: ImportSummary,
    /// The assignment pass that followed
    pub assignment: BulkAssignReport,
}

/// Serialized entry point for every assignment operation.
pub struct AssignmentService<S, C> {
    store: Arc<Mutex<S>>,
    tracker: CompletionTracker<C>,
    parser: BreakdownParser,
}

impl<S, C> Clone for AssignmentService<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tracker: self.tracker.clone(),
            parser: self.parser.clone(),
        }
    }
}

impl<S: Storage, C: Clock + Send + Sync> AssignmentService<S, C> {
    /// Wrap a store.
    pub fn new(storage: S, clock: Arc<C>) -> Result<Self> {
        let parser = BreakdownParser::new()
            .map_err(|e| ServiceError::Invalid(format!("outline patterns: {e}")))?;
        Ok(Self {
            store: Arc::new(Mutex::new(storage)),
            tracker: CompletionTracker::with_assigner(SubtaskAssigner::new(clock)),
            parser,
        })
    }

    fn assigner(&self) -> &SubtaskAssigner<C> {
        self.tracker.assigner()
    }

    #[cfg(test)]
    pub(crate) async fn lock_store(&self) -> tokio::sync::MutexGuard<'_, S> {
        self.store.lock().await
    }

    // === Assignment ===

    /// Assign every unassigned subtask that has an available matching
    /// employee.
    pub async fn trigger_bulk_assignment(&self) -> Result<BulkAssignReport> {
        let mut store = self.store.lock().await;
        let result = self.assigner().bulk_assign(&mut *store).await;
        settle(&mut *store, result, "Bulk assignment").await
    }

    /// Offer an employee the first matching subtask.
    pub async fn trigger_assign_next(&self, employee_id: EmployeeId) -> Result<AssignOutcome> {
        let mut store = self.store.lock().await;
        let result = self.assigner().assign_next(&mut *store, employee_id).await;
        settle(&mut *store, result, &format!("Assign next to employee {employee_id}")).await
    }

    /// Offer an employee the best scored subtask.
    pub async fn assign_best_for_employee(&self, employee_id: EmployeeId) -> Result<AssignOutcome> {
        let mut store = self.store.lock().await;
        let result = self
            .assigner()
            .assign_best_for_employee(&mut *store, employee_id)
            .await;
        settle(&mut *store, result, &format!("Assign best to employee {employee_id}")).await
    }

    /// Assign a chosen subtask to a chosen employee.
    pub async fn assign_subtask(
        &self,
        subtask_id: SubtaskId,
        employee_id: EmployeeId,
    ) -> Result<AssignmentReport> {
        let mut store = self.store.lock().await;
        let result = self
            .assigner()
            .assign_subtask(&mut *store, subtask_id, employee_id)
            .await;
        settle(&mut *store, result, &format!("Assign subtask {subtask_id}")).await
    }

    // === Completion ===

    /// Complete a milestone and propagate to its subtask.
    pub async fn complete_milestone(&self, milestone_id: MilestoneId) -> Result<MilestoneRecord> {
        let mut store = self.store.lock().await;
        let result = self
            .tracker
            .record_milestone_completion(&mut *store, milestone_id)
            .await;
        settle(&mut *store, result, &format!("Complete milestone {milestone_id}")).await
    }

    /// Complete every task whose subtasks are all completed.
    pub async fn reconcile_task_status(&self) -> Result<TaskReconciliation> {
        let mut store = self.store.lock().await;
        let result = self.tracker.reconcile_all_tasks(&mut *store).await;
        settle(&mut *store, result, "Reconcile task status").await
    }

    /// Employees holding at least one completed assignment, ascending.
    pub async fn employees_with_completed_work(&self) -> Result<Vec<EmployeeId>> {
        let store = self.store.lock().await;
        let mut ids: Vec<EmployeeId> = store
            .list_assignments(&AssignmentFilter {
                status: Some(AssignmentStatus::Completed),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|a| a.employee_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    // === Registration ===

    /// Register a project under an externally chosen id.
    pub async fn register_project(&self, id: ProjectId, description: &str) -> Result<Project> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ServiceError::Invalid("project description is empty".to_string()));
        }

        let mut store = self.store.lock().await;
        if store.load_project(&id).await?.is_some() {
            return Err(ServiceError::Conflict(EntityRef::Project(id)));
        }
        let project = Project::new(id, description, self.assigner().clock().utc());
        let result = store.save_project(&project).await.map(|()| project);
        settle(&mut *store, result, "Register project").await
    }

    /// Add an employee.
    pub async fn onboard_employee(&self, draft: NewEmployee) -> Result<Employee> {
        if draft.name.trim().is_empty() {
            return Err(ServiceError::Invalid("employee name is empty".to_string()));
        }
        let mut store = self.store.lock().await;
        let result = store.insert_employee(draft).await;
        let employee = settle(&mut *store, result, "Onboard employee").await?;
        info!(employee = %employee.id, skills = %employee.skills_line(), "onboarded '{}'", employee.name);
        Ok(employee)
    }

    /// Append comma-separated skills. Returns the employee and how many
    /// skills were new.
    pub async fn add_skills(&self, employee_id: EmployeeId, raw: &str) -> Result<(Employee, usize)> {
        let mut store = self.store.lock().await;
        let mut employee = store
            .load_employee(employee_id)
            .await?
            .ok_or(ServiceError::NotFound(EntityRef::Employee(employee_id)))?;
        let added = employee.add_skills(raw);
        if added == 0 {
            return Ok((employee, 0));
        }
        let result = store.save_employee(&employee).await;
        settle(&mut *store, result, &format!("Add skills to employee {employee_id}")).await?;
        Ok((employee, added))
    }

    // === Breakdown ===

    /// Parse an outline, persist it under the project and run a bulk
    /// assignment pass.
    pub async fn import_outline(&self, project_id: &ProjectId, text: &str) -> Result<BreakdownImport> {
        let breakdown = self.parser.parse(text);
        if breakdown.is_empty() {
            return Err(ServiceError::Invalid("outline contains no tasks".to_string()));
        }

        let mut store = self.store.lock().await;
        let result = async {
            let summary = import_breakdown(&mut *store, project_id, &breakdown).await?;
            let assignment = self.assigner().bulk_assign(&mut *store).await?;
            Ok::<_, EngineError>(BreakdownImport { summary, assignment })
        }
        .await;
        settle(&mut *store, result, &format!("Import breakdown for {project_id}")).await
    }

    /// Ask a generator for the project's outline and import it.
    ///
    /// The store is not locked while the generator runs.
    pub async fn generate_breakdown(
        &self,
        project_id: &ProjectId,
        generator: &dyn TaskGenerator,
    ) -> Result<BreakdownImport> {
        let project = {
            let store = self.store.lock().await;
            store
                .load_project(project_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(EntityRef::Project(project_id.clone())))?
        };

        debug!(project = %project_id, "generating breakdown");
        let text = generator.generate(&project).await?;
        self.import_outline(project_id, &text).await
    }

    // === Views ===

    /// All employees in id order.
    pub async fn employees(&self) -> Result<Vec<Employee>> {
        Ok(self.store.lock().await.list_employees().await?)
    }

    /// All projects.
    pub async fn projects(&self) -> Result<Vec<Project>> {
        Ok(self.store.lock().await.list_projects().await?)
    }

    /// Breakdown and staffing of one project.
    pub async fn project_overview(&self, project_id: &ProjectId) -> Result<ProjectOverview> {
        let store = self.store.lock().await;
        Ok(project_overview(&*store, project_id).await?)
    }

    /// What an employee holds assignments for.
    pub async fn employee_workload(&self, employee_id: EmployeeId) -> Result<EmployeeWorkload> {
        let store = self.store.lock().await;
        Ok(employee_workload(&*store, employee_id).await?)
    }

    /// Assignment log of one employee, newest first.
    pub async fn logs_for_employee(&self, employee_id: EmployeeId) -> Result<Vec<AssignmentLog>> {
        let store = self.store.lock().await;
        Ok(logs_for_employee(&*store, employee_id).await?)
    }
}

/// Commit on success, roll back on failure.
async fn settle<S, T, E>(store: &mut S, result: std::result::Result<T, E>, message: &str) -> Result<T>
where
    S: Storage,
    ServiceError: From<E>,
{
    match result {
        Ok(value) => {
            store.commit(message).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = store.rollback().await {
                warn!("rollback after failed '{}' failed: {}", message, rollback);
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockable::DefaultClock;
    use workforce_core::{MilestoneFilter, SubtaskFilter};
    use workforce_progress::SubtaskReconciliation;
    use workforce_storage::JsonStorage;
    use workforce_work::NoWorkReason;

    const OUTLINE: &str = "**Backend Development**\n\
- Write SQL migrations\n  - Draft schema\n  - Add indexes\n\
- Tune SQL queries\n  - Profile\n\
**Frontend**\n\
- Design landing page\n  - Wireframe\n";

    struct FixedOutline(&'static str);

    #[async_trait]
    impl TaskGenerator for FixedOutline {
        async fn generate(&self, _project: &Project) -> std::result::Result<String, GeneratorError> {
            Ok(self.0.to_string())
        }
    }

    fn service() -> AssignmentService<JsonStorage, DefaultClock> {
        AssignmentService::new(JsonStorage::in_memory(), Arc::new(DefaultClock)).unwrap()
    }

    async fn staffed() -> (AssignmentService<JsonStorage, DefaultClock>, ProjectId, Employee) {
        let service = service();
        let project_id = ProjectId::new("P006");
        service.register_project(project_id.clone(), "Online shop").await.unwrap();
        let ada = service.onboard_employee(NewEmployee::new("Ada", "sql")).await.unwrap();
        (service, project_id, ada)
    }

    #[tokio::test]
    async fn test_register_project_rejects_duplicates() {
        let service = service();
        let id = ProjectId::new("P001");
        service.register_project(id.clone(), "Shop").await.unwrap();

        let err = service.register_project(id.clone(), "Other").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(EntityRef::Project(_))));

        let err = service.register_project(ProjectId::new("P002"), "  ").await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
        assert_eq!(service.projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_onboard_and_add_skills() {
        let service = service();
        let err = service.onboard_employee(NewEmployee::new(" ", "sql")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));

        let ada = service.onboard_employee(NewEmployee::new("Ada", "sql")).await.unwrap();
        let (updated, added) = service.add_skills(ada.id, "SQL, rust").await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(updated.skills.len(), 2);

        let err = service.add_skills(EmployeeId::new(50), "go").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(EntityRef::Employee(_))));
    }

    #[tokio::test]
    async fn test_generate_breakdown_imports_and_assigns() {
        let (service, project_id, ada) = staffed().await;

        let import = service
            .generate_breakdown(&project_id, &FixedOutline(OUTLINE))
            .await
            .unwrap();

        assert_eq!(import.summary.tasks, 2);
        assert_eq!(import.summary.subtasks.len(), 3);
        assert_eq!(import.assignment.assigned.len(), 1);
        assert_eq!(import.assignment.assigned[0].employee_id, ada.id);
        assert_eq!(import.assignment.assigned[0].subtask_name, "Write SQL migrations");
    }

    #[tokio::test]
    async fn test_generate_for_unknown_project() {
        let service = service();
        let err = service
            .generate_breakdown(&ProjectId::new("P404"), &FixedOutline(OUTLINE))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(EntityRef::Project(_))));

        let (service, project_id, _) = staffed().await;
        let err = service.import_outline(&project_id, "nothing useful").await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_completing_subtask_hands_out_next() {
        let (service, project_id, ada) = staffed().await;
        let import = service.import_outline(&project_id, OUTLINE).await.unwrap();
        let first = import.assignment.assigned[0].subtask_id;

        let milestone_ids: Vec<MilestoneId> = {
            let store = service.store.lock().await;
            store
                .list_milestones(&MilestoneFilter::for_subtask(first))
                .await
                .unwrap()
                .into_iter()
                .map(|m| m.id)
                .collect()
        };

        let mut last = None;
        for id in milestone_ids {
            last = Some(service.complete_milestone(id).await.unwrap());
        }
        let SubtaskReconciliation::Completed { next, .. } = last.unwrap().subtask else {
            panic!("subtask should be complete");
        };
        assert_eq!(next.assigned().unwrap().subtask_name, "Tune SQL queries");
        assert_eq!(service.employees_with_completed_work().await.unwrap(), vec![ada.id]);

        let busy = service.trigger_assign_next(ada.id).await.unwrap();
        assert!(matches!(busy, AssignOutcome::NoEligibleWork(NoWorkReason::EmployeeBusy { .. })));
    }

    #[tokio::test]
    async fn test_failed_operation_rolls_back() {
        let (service, project_id, ada) = staffed().await;
        service.import_outline(&project_id, OUTLINE).await.unwrap();

        let landing = {
            let store = service.store.lock().await;
            store
                .list_subtasks(&SubtaskFilter::unassigned())
                .await
                .unwrap()
                .into_iter()
                .find(|s| s.name == "Design landing page")
                .unwrap()
        };

        // Ada is busy with the SQL subtask.
        let err = service.assign_subtask(landing.id, ada.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::ConstraintViolation(_)));

        let store = service.store.lock().await;
        assert!(!store.is_pending());
        assert!(store.load_subtask(landing.id).await.unwrap().unwrap().is_unassigned());
    }

    #[tokio::test]
    async fn test_views_through_service() {
        let (service, project_id, ada) = staffed().await;
        service.import_outline(&project_id, OUTLINE).await.unwrap();

        let overview = service.project_overview(&project_id).await.unwrap();
        assert_eq!(overview.tasks.len(), 2);
        assert_eq!(overview.employees[0].id, ada.id);

        let workload = service.employee_workload(ada.id).await.unwrap();
        assert_eq!(workload.tasks[0].subtasks[0].subtask.name, "Write SQL migrations");

        let logs = service.logs_for_employee(ada.id).await.unwrap();
        assert_eq!(logs.len(), 1);

        let reconciled = service.reconcile_task_status().await.unwrap();
        assert!(reconciled.completed.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_keep_assignments_consistent() {
        let service = service();
        let project_id = ProjectId::new("P009");
        service.register_project(project_id.clone(), "Warehouse").await.unwrap();

        let mut outline = String::from("**Data**\n");
        for i in 1..=6 {
            outline.push_str(&format!("- SQL report {i}\n  - Query\n  - Review\n"));
        }
        service.import_outline(&project_id, &outline).await.unwrap();

        let mut employees = Vec::new();
        for name in ["Ada", "Bo", "Cy"] {
            employees.push(service.onboard_employee(NewEmployee::new(name, "sql")).await.unwrap().id);
        }
        let milestone_ids: Vec<MilestoneId> = {
            let store = service.store.lock().await;
            store
                .list_milestones(&MilestoneFilter::default())
                .await
                .unwrap()
                .into_iter()
                .map(|m| m.id)
                .collect()
        };

        let mut handles = Vec::new();
        for round in 0..4 {
            let svc = service.clone();
            handles.push(tokio::spawn(async move {
                svc.trigger_bulk_assignment().await.map(|_| ())
            }));
            for &id in &employees {
                let svc = service.clone();
                handles.push(tokio::spawn(async move {
                    svc.trigger_assign_next(id).await.map(|_| ())
                }));
            }
            for &id in milestone_ids.iter().skip(round).step_by(3) {
                let svc = service.clone();
                handles.push(tokio::spawn(async move {
                    svc.complete_milestone(id).await.map(|_| ())
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let store = service.store.lock().await;
        assert!(!store.is_pending());
        let assignments = store.list_assignments(&AssignmentFilter::default()).await.unwrap();
        assert!(!assignments.is_empty());

        let mut per_subtask = std::collections::HashMap::new();
        for a in &assignments {
            *per_subtask.entry(a.subtask_id).or_insert(0) += 1;
        }
        assert!(per_subtask.values().all(|&n| n == 1), "subtask assigned twice: {per_subtask:?}");

        for id in employees {
            let active = store.list_assignments(&AssignmentFilter::active_for(id)).await.unwrap();
            assert!(active.len() <= 1, "employee {id} holds {} active assignments", active.len());
        }
    }
}
