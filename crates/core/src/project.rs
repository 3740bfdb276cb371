//! Project model - the root of a work breakdown.

use serde::{Deserialize, Serialize};
use crate::id::ProjectId;
use crate::Time;

/// A project owns tasks; its description feeds task generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Externally assigned code
    pub id: ProjectId,

    /// Free-text description
    pub description: String,

    /// When registered
    pub created_at: Time,
}

impl Project {
    /// Create a new project.
    pub fn new(id: ProjectId, description: impl Into<String>, created_at: Time) -> Self {
        Self {
            id,
            description: description.into(),
            created_at,
        }
    }
}
