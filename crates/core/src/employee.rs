//! Employee model - who work gets routed to.

use serde::{Deserialize, Serialize};
use crate::id::EmployeeId;

/// An employee that can be assigned subtasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier
    pub id: EmployeeId,

    /// Display name
    pub name: String,

    /// Skill tokens in the order they were added
    pub skills: Vec<String>,
}

impl Employee {
    /// Append comma-separated skills.
    ///
    /// Tokens are trimmed; empty tokens and tokens already present
    /// (case-insensitively) are skipped. Returns how many were added.
    pub fn add_skills(&mut self, raw: &str) -> usize {
        let mut added = 0;
        for token in split_skills(raw) {
            let lowered = token.to_lowercase();
            let known = self
                .skills
                .iter()
                .any(|existing| existing.trim().to_lowercase() == lowered);
            if !known {
                self.skills.push(token);
                added += 1;
            }
        }
        added
    }

    /// Skills joined back into the comma-separated form.
    pub fn skills_line(&self) -> String {
        self.skills.join(", ")
    }
}

/// Data needed to onboard an employee; the store allocates the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    /// Display name
    pub name: String,

    /// Skill tokens
    pub skills: Vec<String>,
}

impl NewEmployee {
    /// Build from a name and a comma-separated skill line.
    pub fn new(name: impl Into<String>, skills: &str) -> Self {
        Self {
            name: name.into(),
            skills: split_skills(skills).collect(),
        }
    }
}

/// Split a comma-separated skill line into trimmed, non-empty tokens.
pub fn split_skills(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_employee_splits_skills() {
        let draft = NewEmployee::new("Ada", " Python , api,, SQL ");
        assert_eq!(draft.skills, vec!["Python", "api", "SQL"]);
    }

    #[test]
    fn test_add_skills_skips_duplicates() {
        let mut employee = Employee {
            id: EmployeeId::new(1),
            name: "Ada".to_string(),
            skills: vec!["python".to_string()],
        };

        let added = employee.add_skills("PYTHON, docker, ,rust");
        assert_eq!(added, 2);
        assert_eq!(employee.skills, vec!["python", "docker", "rust"]);
        assert_eq!(employee.skills_line(), "python, docker, rust");
    }

    #[test]
    fn test_add_skills_folds_non_ascii_case() {
        let mut employee = Employee {
            id: EmployeeId::new(2),
            name: "Zoë".to_string(),
            skills: vec!["Übersetzung".to_string()],
        };

        assert_eq!(employee.add_skills("übersetzung, ÜBERSETZUNG"), 0);
        assert_eq!(employee.add_skills("Ελληνικά, ελληνικά"), 1);
        assert_eq!(employee.skills, vec!["Übersetzung", "Ελληνικά"]);
    }
}
