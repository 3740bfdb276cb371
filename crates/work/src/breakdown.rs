//! Work breakdown import.
//!
//! A breakdown outline lists tasks as bold headers, subtasks as top-level
//! bullets and milestones as indented bullets:
//!
//! ```text
//! **Backend Development**
//! - Develop API endpoints for authentication
//!     - Setup API structure
//!     - Secure API using JWT
//! ```
//!
//! Outlines come from a [`TaskGenerator`]. Lines that fit none of the
//! shapes, or that appear before their parent, are ignored.

use std::path::PathBuf;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use workforce_core::{
    clamp_name, EntityRef, NewMilestone, NewSubtask, NewTask, Project, ProjectId, SubtaskId,
    MILESTONES_PER_SUBTASK,
};
use workforce_storage::Storage;

use crate::outcome::{EngineError, Result};

/// A parsed outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    /// Tasks in outline order
    pub tasks: Vec<TaskOutline>,
}

/// One task header and its subtasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutline {
    /// Task name
    pub name: String,
    /// Subtasks in outline order
    pub subtasks: Vec<SubtaskOutline>,
}

/// One subtask bullet and its milestones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskOutline {
    /// Subtask name
    pub name: String,
    /// At most [`MILESTONES_PER_SUBTASK`] entries
    pub milestones: Vec<String>,
}

impl Breakdown {
    /// Whether the outline produced no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of subtasks across all tasks.
    pub fn subtask_count(&self) -> usize {
        self.tasks.iter().map(|t| t.subtasks.len()).sum()
    }
}

/// Line-oriented outline parser.
#[derive(Debug, Clone)]
pub struct BreakdownParser {
    task: Regex,
    subtask: Regex,
    milestone: Regex,
}

impl BreakdownParser {
    /// Compile the line patterns.
    pub fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            task: Regex::new(r"^\*\*(.*?)\*\*")?,
            subtask: Regex::new(r"^- (.+)")?,
            milestone: Regex::new(r"^\s+- (.+)")?,
        })
    }

    /// Parse outline text. Names are trimmed and clamped; milestones beyond
    /// the per-subtask limit are dropped.
    pub fn parse(&self, text: &str) -> Breakdown {
        let mut breakdown = Breakdown::default();

        for line in text.lines() {
            if let Some(caps) = self.task.captures(line) {
                breakdown.tasks.push(TaskOutline {
                    name: clamp_name(&caps[1]),
                    subtasks: Vec::new(),
                });
            } else if let Some(caps) = self.subtask.captures(line) {
                let Some(task) = breakdown.tasks.last_mut() else {
                    debug!(line, "subtask before any task, ignored");
                    continue;
                };
                task.subtasks.push(SubtaskOutline {
                    name: clamp_name(&caps[1]),
                    milestones: Vec::new(),
                });
            } else if let Some(caps) = self.milestone.captures(line) {
                let Some(subtask) = breakdown
                    .tasks
                    .last_mut()
                    .and_then(|t| t.subtasks.last_mut())
                else {
                    debug!(line, "milestone before any subtask, ignored");
                    continue;
                };
                if subtask.milestones.len() < MILESTONES_PER_SUBTASK {
                    subtask.milestones.push(clamp_name(&caps[1]));
                }
            }
        }

        breakdown
    }
}

/// What an import created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Tasks created
    pub tasks: usize,
    /// Subtasks created, in creation order
    pub subtasks: Vec<SubtaskId>,
    /// Milestones created
    pub milestones: usize,
    /// Subtasks left out because they had no milestones
    pub skipped: Vec<String>,
}

/// Persist a breakdown under an existing project. Everything starts
/// unassigned.
///
/// A subtask without milestones could never be completed, so it is left
/// out and reported in [`ImportSummary::skipped`].
pub async fn import_breakdown<S: Storage>(
    store: &mut S,
    project_id: &ProjectId,
    breakdown: &Breakdown,
) -> Result<ImportSummary> {
    if store.load_project(project_id).await?.is_none() {
        return Err(EngineError::NotFound(EntityRef::Project(project_id.clone())));
    }

    let mut summary = ImportSummary::default();
    for outline in &breakdown.tasks {
        let task = store
            .insert_task(NewTask {
                project_id: project_id.clone(),
                name: outline.name.clone(),
            })
            .await?;
        summary.tasks += 1;

        for sub in &outline.subtasks {
            if sub.milestones.is_empty() {
                warn!(task = %task.id, subtask = %sub.name, "subtask has no milestones, skipped");
                summary.skipped.push(sub.name.clone());
                continue;
            }
            let subtask = store
                .insert_subtask(NewSubtask {
                    task_id: task.id,
                    name: sub.name.clone(),
                })
                .await?;
            summary.subtasks.push(subtask.id);

            for name in &sub.milestones {
                store
                    .insert_milestone(NewMilestone {
                        subtask_id: subtask.id,
                        name: name.clone(),
                    })
                    .await?;
                summary.milestones += 1;
            }
        }
    }

    info!(
        project = %project_id,
        tasks = summary.tasks,
        subtasks = summary.subtasks.len(),
        milestones = summary.milestones,
        skipped = summary.skipped.len(),
        "imported breakdown"
    );
    Ok(summary)
}

/// Errors from a task generator.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The generator could not produce an outline
    #[error("Generator unavailable: {0}")]
    Unavailable(String),
}

/// Produces breakdown outline text for a project.
#[async_trait]
pub trait TaskGenerator: Send + Sync {
    /// Outline text for the project's description.
    async fn generate(&self, project: &Project) -> std::result::Result<String, GeneratorError>;
}

/// Reads a prepared outline from a file.
#[derive(Debug, Clone)]
pub struct OutlineFileGenerator {
    path: PathBuf,
}

impl OutlineFileGenerator {
    /// Use the outline stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TaskGenerator for OutlineFileGenerator {
    async fn generate(&self, project: &Project) -> std::result::Result<String, GeneratorError> {
        debug!(project = %project.id, path = %self.path.display(), "reading outline");
        let text = tokio::fs::read_to_string(&self.path).await?;
        if text.trim().is_empty() {
            return Err(GeneratorError::Unavailable(format!(
                "outline file {} is empty",
                self.path.display()
            )));
        }
        Ok(text)
    }
}
