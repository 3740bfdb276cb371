//! Unique identifiers for workforce entities.
//!
//! Employees, tasks, subtasks, milestones and assignments use store-allocated
//! sequential ids. Ascending id order is creation order, and every
//! "first match" scan in the engine enumerates in that order.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Error returned when an identifier cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {input:?}")]
pub struct ParseIdError {
    /// Which kind of id was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub input: String,
}

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw sequence value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw sequence value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self).map_err(|_| ParseIdError {
                    kind: $kind,
                    input: s.to_string(),
                })
            }
        }
    };
}

sequential_id!(
    /// Unique identifier for an Employee
    EmployeeId,
    "employee"
);
sequential_id!(
    /// Unique identifier for a Task
    TaskId,
    "task"
);
sequential_id!(
    /// Unique identifier for a Subtask
    SubtaskId,
    "subtask"
);
sequential_id!(
    /// Unique identifier for a Milestone
    MilestoneId,
    "milestone"
);
sequential_id!(
    /// Unique identifier for an Assignment
    AssignmentId,
    "assignment"
);

/// Externally assigned project code, e.g. `P006`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a project id from its code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The project code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProjectId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.is_empty() {
            return Err(ParseIdError {
                kind: "project",
                input: s.to_string(),
            });
        }
        Ok(Self(code.to_string()))
    }
}

/// Unique identifier for an AssignmentLog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogId(Ulid);

impl LogId {
    /// Generate a new LogId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for LogId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A typed reference to an entity, used when reporting missing records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// An employee
    Employee(EmployeeId),
    /// A project
    Project(ProjectId),
    /// A task
    Task(TaskId),
    /// A subtask
    Subtask(SubtaskId),
    /// A milestone
    Milestone(MilestoneId),
    /// An assignment
    Assignment(AssignmentId),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Employee(id) => write!(f, "employee {id}"),
            Self::Project(id) => write!(f, "project {id}"),
            Self::Task(id) => write!(f, "task {id}"),
            Self::Subtask(id) => write!(f, "subtask {id}"),
            Self::Milestone(id) => write!(f, "milestone {id}"),
            Self::Assignment(id) => write!(f, "assignment {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_order_by_value() {
        let mut ids = vec![SubtaskId::new(3), SubtaskId::new(1), SubtaskId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![SubtaskId::new(1), SubtaskId::new(2), SubtaskId::new(3)]);
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!("42".parse::<EmployeeId>().unwrap(), EmployeeId::new(42));
        assert_eq!(" 7 ".parse::<MilestoneId>().unwrap().get(), 7);

        let err = "abc".parse::<TaskId>().unwrap_err();
        assert_eq!(err.kind, "task");

        assert_eq!("P006".parse::<ProjectId>().unwrap().as_str(), "P006");
        assert!("  ".parse::<ProjectId>().is_err());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&EmployeeId::new(5)).unwrap();
        assert_eq!(json, "5");
        let json = serde_json::to_string(&ProjectId::new("P001")).unwrap();
        assert_eq!(json, "\"P001\"");
    }

    #[test]
    fn test_entity_ref_display() {
        assert_eq!(EntityRef::Milestone(MilestoneId::new(9)).to_string(), "milestone 9");
        assert_eq!(EntityRef::Project(ProjectId::new("P1")).to_string(), "project P1");
    }
}
