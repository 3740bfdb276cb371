//! JSON snapshot storage implementation.
//!
//! Keeps every table in memory, ordered by id, and writes the whole data set
//! as a single JSON snapshot (plus a small meta marker with version and
//! updated_at) on `commit`. Without a root directory it is a pure in-memory
//! store, which is what the engine tests run against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;
use workforce_core::{
    Assignment, AssignmentFilter, AssignmentId, AssignmentLog, AssignmentStatus, Employee,
    EmployeeId, EntityRef, Milestone, MilestoneFilter, MilestoneId, MilestoneState,
    NewAssignment, NewEmployee, NewMilestone, NewSubtask, NewTask, Project, ProjectId, Subtask,
    SubtaskFilter, SubtaskId, SubtaskState, Task, TaskFilter, TaskId, TaskStatus,
};
use super::{Storage, StorageError, Result};

const SNAPSHOT_FILE: &str = "snapshot.json";
const META_FILE: &str = "meta.json";

/// Next id to hand out per table. Ids are never reused after a delete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Sequences {
    employee: u64,
    task: u64,
    subtask: u64,
    milestone: u64,
    assignment: u64,
}

impl Default for Sequences {
    fn default() -> Self {
        Self {
            employee: 1,
            task: 1,
            subtask: 1,
            milestone: 1,
            assignment: 1,
        }
    }
}

fn take_next(counter: &mut u64) -> u64 {
    let id = *counter;
    *counter += 1;
    id
}

#[derive(Debug, Clone, Default)]
struct Tables {
    sequences: Sequences,
    employees: BTreeMap<EmployeeId, Employee>,
    projects: BTreeMap<ProjectId, Project>,
    tasks: BTreeMap<TaskId, Task>,
    subtasks: BTreeMap<SubtaskId, Subtask>,
    milestones: BTreeMap<MilestoneId, Milestone>,
    assignments: BTreeMap<AssignmentId, Assignment>,
    logs: Vec<AssignmentLog>,
}

/// On-disk form of [`Tables`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    sequences: Sequences,
    #[serde(default)]
    employees: Vec<Employee>,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    subtasks: Vec<Subtask>,
    #[serde(default)]
    milestones: Vec<Milestone>,
    #[serde(default)]
    assignments: Vec<Assignment>,
    #[serde(default)]
    logs: Vec<AssignmentLog>,
}

impl From<&Tables> for Snapshot {
    fn from(tables: &Tables) -> Self {
        Self {
            sequences: tables.sequences,
            employees: tables.employees.values().cloned().collect(),
            projects: tables.projects.values().cloned().collect(),
            tasks: tables.tasks.values().cloned().collect(),
            subtasks: tables.subtasks.values().cloned().collect(),
            milestones: tables.milestones.values().cloned().collect(),
            assignments: tables.assignments.values().cloned().collect(),
            logs: tables.logs.clone(),
        }
    }
}

impl From<Snapshot> for Tables {
    fn from(snapshot: Snapshot) -> Self {
        let mut tables = Self {
            sequences: snapshot.sequences,
            employees: snapshot.employees.into_iter().map(|e| (e.id, e)).collect(),
            projects: snapshot.projects.into_iter().map(|p| (p.id.clone(), p)).collect(),
            tasks: snapshot.tasks.into_iter().map(|t| (t.id, t)).collect(),
            subtasks: snapshot.subtasks.into_iter().map(|s| (s.id, s)).collect(),
            milestones: snapshot.milestones.into_iter().map(|m| (m.id, m)).collect(),
            assignments: snapshot.assignments.into_iter().map(|a| (a.id, a)).collect(),
            logs: snapshot.logs,
        };

        // Hand-edited snapshots may carry ids past the stored counters.
        let seq = &mut tables.sequences;
        seq.employee = seq.employee.max(next_after(tables.employees.keys().map(|id| id.get())));
        seq.task = seq.task.max(next_after(tables.tasks.keys().map(|id| id.get())));
        seq.subtask = seq.subtask.max(next_after(tables.subtasks.keys().map(|id| id.get())));
        seq.milestone = seq.milestone.max(next_after(tables.milestones.keys().map(|id| id.get())));
        seq.assignment = seq.assignment.max(next_after(tables.assignments.keys().map(|id| id.get())));
        tables
    }
}

fn next_after(ids: impl Iterator<Item = u64>) -> u64 {
    ids.max().map_or(1, |max| max + 1)
}

impl Tables {
    /// Remove subtasks and everything hanging off them.
    fn remove_subtasks(&mut self, doomed: &[SubtaskId]) {
        for id in doomed {
            self.subtasks.remove(id);
        }
        self.milestones.retain(|_, m| !doomed.contains(&m.subtask_id));
        self.assignments.retain(|_, a| a.subtask_id.map_or(true, |id| !doomed.contains(&id)));
    }

    fn remove_tasks(&mut self, doomed: &[TaskId]) {
        for id in doomed {
            self.tasks.remove(id);
        }
        let subtasks: Vec<SubtaskId> = self
            .subtasks
            .values()
            .filter(|s| doomed.contains(&s.task_id))
            .map(|s| s.id)
            .collect();
        self.remove_subtasks(&subtasks);
    }
}

/// JSON snapshot storage backend.
pub struct JsonStorage {
    root: Option<PathBuf>,
    tables: Tables,
    committed: Tables,
    pending: bool,
    version: u64,
}

impl JsonStorage {
    /// Create a store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            tables: Tables::default(),
            committed: Tables::default(),
            pending: false,
            version: 0,
        }
    }

    /// Open (or create) a store persisted under `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let snapshot: Snapshot = read_json(&root.join(SNAPSHOT_FILE)).await?.unwrap_or_default();
        let version = read_json::<serde_json::Value>(&root.join(META_FILE))
            .await?
            .and_then(|meta| meta.get("version").and_then(|v| v.as_u64()))
            .unwrap_or(0);

        let tables = Tables::from(snapshot);
        debug!(path = %root.display(), version, "opened workforce store");

        Ok(Self {
            root: Some(root),
            committed: tables.clone(),
            tables,
            pending: false,
            version,
        })
    }

    /// Whether there are uncommitted changes.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Number of commits persisted so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn set_pending(&mut self) {
        self.pending = true;
    }
}

impl Default for JsonStorage {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn insert_employee(&mut self, draft: NewEmployee) -> Result<Employee> {
        let id = EmployeeId::new(take_next(&mut self.tables.sequences.employee));
        let employee = Employee {
            id,
            name: draft.name,
            skills: draft.skills,
        };
        self.tables.employees.insert(id, employee.clone());
        self.set_pending();
        Ok(employee)
    }

    async fn save_employee(&mut self, employee: &Employee) -> Result<()> {
        let slot = self
            .tables
            .employees
            .get_mut(&employee.id)
            .ok_or(StorageError::NotFound(EntityRef::Employee(employee.id)))?;
        *slot = employee.clone();
        self.set_pending();
        Ok(())
    }

    async fn load_employee(&self, id: EmployeeId) -> Result<Option<Employee>> {
        Ok(self.tables.employees.get(&id).cloned())
    }

    async fn list_employees(&self) -> Result<Vec<Employee>> {
        Ok(self.tables.employees.values().cloned().collect())
    }

    async fn save_project(&mut self, project: &Project) -> Result<()> {
        self.tables.projects.insert(project.id.clone(), project.clone());
        self.set_pending();
        Ok(())
    }

    async fn load_project(&self, id: &ProjectId) -> Result<Option<Project>> {
        Ok(self.tables.projects.get(id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.tables.projects.values().cloned().collect())
    }

    async fn delete_project(&mut self, id: &ProjectId) -> Result<()> {
        self.tables.projects.remove(id);
        let tasks: Vec<TaskId> = self
            .tables
            .tasks
            .values()
            .filter(|t| &t.project_id == id)
            .map(|t| t.id)
            .collect();
        self.tables.remove_tasks(&tasks);
        self.tables.assignments.retain(|_, a| &a.project_id != id);
        self.set_pending();
        Ok(())
    }

    async fn insert_task(&mut self, draft: NewTask) -> Result<Task> {
        if !self.tables.projects.contains_key(&draft.project_id) {
            return Err(StorageError::NotFound(EntityRef::Project(draft.project_id)));
        }
        let id = TaskId::new(take_next(&mut self.tables.sequences.task));
        let task = Task {
            id,
            project_id: draft.project_id,
            name: draft.name,
            status: TaskStatus::NotStarted,
        };
        self.tables.tasks.insert(id, task.clone());
        self.set_pending();
        Ok(task)
    }

    async fn save_task(&mut self, task: &Task) -> Result<()> {
        let slot = self
            .tables
            .tasks
            .get_mut(&task.id)
            .ok_or(StorageError::NotFound(EntityRef::Task(task.id)))?;
        *slot = task.clone();
        self.set_pending();
        Ok(())
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.tables.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        Ok(self
            .tables
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn delete_task(&mut self, id: TaskId) -> Result<()> {
        self.tables.remove_tasks(&[id]);
        self.set_pending();
        Ok(())
    }

    async fn insert_subtask(&mut self, draft: NewSubtask) -> Result<Subtask> {
        if !self.tables.tasks.contains_key(&draft.task_id) {
            return Err(StorageError::NotFound(EntityRef::Task(draft.task_id)));
        }
        let id = SubtaskId::new(take_next(&mut self.tables.sequences.subtask));
        let subtask = Subtask {
            id,
            task_id: draft.task_id,
            name: draft.name,
            state: SubtaskState::Unassigned,
        };
        self.tables.subtasks.insert(id, subtask.clone());
        self.set_pending();
        Ok(subtask)
    }

    async fn save_subtask(&mut self, subtask: &Subtask) -> Result<()> {
        let slot = self
            .tables
            .subtasks
            .get_mut(&subtask.id)
            .ok_or(StorageError::NotFound(EntityRef::Subtask(subtask.id)))?;
        *slot = subtask.clone();
        self.set_pending();
        Ok(())
    }

    async fn load_subtask(&self, id: SubtaskId) -> Result<Option<Subtask>> {
        Ok(self.tables.subtasks.get(&id).cloned())
    }

    async fn list_subtasks(&self, filter: &SubtaskFilter) -> Result<Vec<Subtask>> {
        Ok(self
            .tables
            .subtasks
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn delete_subtask(&mut self, id: SubtaskId) -> Result<()> {
        self.tables.remove_subtasks(&[id]);
        self.set_pending();
        Ok(())
    }

    async fn insert_milestone(&mut self, draft: NewMilestone) -> Result<Milestone> {
        if !self.tables.subtasks.contains_key(&draft.subtask_id) {
            return Err(StorageError::NotFound(EntityRef::Subtask(draft.subtask_id)));
        }
        let id = MilestoneId::new(take_next(&mut self.tables.sequences.milestone));
        let milestone = Milestone {
            id,
            subtask_id: draft.subtask_id,
            name: draft.name,
            employee_id: None,
            state: MilestoneState::NotStarted,
        };
        self.tables.milestones.insert(id, milestone.clone());
        self.set_pending();
        Ok(milestone)
    }

    async fn save_milestone(&mut self, milestone: &Milestone) -> Result<()> {
        let slot = self
            .tables
            .milestones
            .get_mut(&milestone.id)
            .ok_or(StorageError::NotFound(EntityRef::Milestone(milestone.id)))?;
        *slot = milestone.clone();
        self.set_pending();
        Ok(())
    }

    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<Milestone>> {
        Ok(self.tables.milestones.get(&id).cloned())
    }

    async fn list_milestones(&self, filter: &MilestoneFilter) -> Result<Vec<Milestone>> {
        Ok(self
            .tables
            .milestones
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    async fn insert_assignment(&mut self, draft: NewAssignment) -> Result<Assignment> {
        if !self.tables.employees.contains_key(&draft.employee_id) {
            return Err(StorageError::NotFound(EntityRef::Employee(draft.employee_id)));
        }
        let id = AssignmentId::new(take_next(&mut self.tables.sequences.assignment));
        let assignment = Assignment {
            id,
            employee_id: draft.employee_id,
            project_id: draft.project_id,
            subtask_id: draft.subtask_id,
            status: AssignmentStatus::InProgress,
        };
        self.tables.assignments.insert(id, assignment.clone());
        self.set_pending();
        Ok(assignment)
    }

    async fn save_assignment(&mut self, assignment: &Assignment) -> Result<()> {
        let slot = self
            .tables
            .assignments
            .get_mut(&assignment.id)
            .ok_or(StorageError::NotFound(EntityRef::Assignment(assignment.id)))?;
        *slot = assignment.clone();
        self.set_pending();
        Ok(())
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> Result<Vec<Assignment>> {
        Ok(self
            .tables
            .assignments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn append_log(&mut self, entry: &AssignmentLog) -> Result<()> {
        self.tables.logs.push(entry.clone());
        self.set_pending();
        Ok(())
    }

    async fn list_logs(&self, employee_id: Option<EmployeeId>) -> Result<Vec<AssignmentLog>> {
        let mut logs: Vec<AssignmentLog> = self
            .tables
            .logs
            .iter()
            .filter(|l| employee_id.map_or(true, |id| l.employee_id == id))
            .cloned()
            .collect();
        logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(logs)
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        if !self.pending {
            return Ok(());
        }

        if let Some(root) = &self.root {
            let snapshot = Snapshot::from(&self.tables);
            let json = serde_json::to_string_pretty(&snapshot)?;
            fs::write(root.join(SNAPSHOT_FILE), json.as_bytes()).await?;

            let meta = serde_json::json!({
                "version": self.version + 1,
                "updated_at": chrono::Utc::now(),
                "message": message,
            });
            fs::write(root.join(META_FILE), serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        }

        self.version += 1;
        self.committed = self.tables.clone();
        self.pending = false;
        debug!(version = self.version, message, "committed workforce store");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.tables = self.committed.clone();
        self.pending = false;
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
