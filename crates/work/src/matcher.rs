//! Skill matching between employees and subtask names.
//!
//! Two heuristics, both purely lexical:
//!
//! - **simple match**: some skill token is a substring of the lowercased name.
//! - **scored match**: the name is split into a set of lowercased words; each
//!   token scores a point when it equals a word or when some word is a
//!   substring of it. A score of zero means no match.

use std::collections::HashSet;
use workforce_core::Employee;

/// Normalized skill tokens of one employee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillSet {
    tokens: Vec<String>,
}

impl SkillSet {
    /// Parse a comma-separated skill line.
    pub fn parse(raw: &str) -> Self {
        Self::from_skills([raw])
    }

    /// Build from stored skill entries. Entries may themselves contain commas.
    pub fn from_skills<I, S>(skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = skills
            .into_iter()
            .flat_map(|entry| {
                entry
                    .as_ref()
                    .split(',')
                    .map(|t| t.trim().to_lowercase())
                    .collect::<Vec<_>>()
            })
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    /// Skills of an employee.
    pub fn of(employee: &Employee) -> Self {
        Self::from_skills(&employee.skills)
    }

    /// Normalized tokens in the order given.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Whether there are no usable tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Simple match: any token appears inside the lowercased label.
    pub fn matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.tokens.iter().any(|token| label.contains(token.as_str()))
    }

    /// Scored match against the words of the label.
    pub fn score(&self, label: &str) -> usize {
        let lowered = label.to_lowercase();
        let words: HashSet<&str> = lowered.split_whitespace().collect();

        self.tokens
            .iter()
            .filter(|token| {
                words.contains(token.as_str())
                    || words.iter().any(|word| token.contains(*word))
            })
            .count()
    }
}

/// A candidate chosen by scored matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMatch<T> {
    /// The chosen candidate
    pub candidate: T,
    /// Its score (always positive)
    pub score: usize,
}

/// Pick the candidate with the strictly highest positive score.
///
/// Ties keep the first candidate encountered.
pub fn pick_best<T, F>(
    skills: &SkillSet,
    candidates: impl IntoIterator<Item = T>,
    label: F,
) -> Option<ScoredMatch<T>>
where
    F: Fn(&T) -> &str,
{
    let mut best: Option<ScoredMatch<T>> = None;
    for candidate in candidates {
        let score = skills.score(label(&candidate));
        if score == 0 {
            continue;
        }
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(ScoredMatch { candidate, score });
        }
    }
    best
}

/// Pick the first candidate that simple-matches.
pub fn pick_first<T, F>(
    skills: &SkillSet,
    candidates: impl IntoIterator<Item = T>,
    label: F,
) -> Option<T>
where
    F: Fn(&T) -> &str,
{
    candidates.into_iter().find(|c| skills.matches(label(c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_tokens() {
        let skills = SkillSet::parse(" Python ,API,, Machine Learning ");
        assert_eq!(skills.tokens(), &["python", "api", "machine learning"]);
    }

    #[test]
    fn test_from_skills_splits_embedded_commas() {
        let skills = SkillSet::from_skills(["Rust, Go", " ", "SQL"]);
        assert_eq!(skills.tokens(), &["rust", "go", "sql"]);
        assert!(SkillSet::from_skills(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_simple_match_is_substring() {
        let skills = SkillSet::parse("api");
        assert!(skills.matches("Develop API endpoints for authentication"));
        // Substring inside a longer word still counts.
        assert!(skills.matches("Set up rapid prototyping"));
        assert!(!skills.matches("Implement user authentication endpoint"));
    }

    #[test]
    fn test_multiword_token_simple_match() {
        let skills = SkillSet::parse("machine learning");
        assert!(skills.matches("Train Machine Learning model"));
        // "machine" sits inside the token, so the token scores once.
        assert_eq!(skills.score("Train Machine Learning model"), 1);
        assert_eq!(skills.score("Review model"), 0);
    }

    #[test]
    fn test_score_counts_equal_words() {
        let skills = SkillSet::parse("python, api");
        assert_eq!(skills.score("Secure API using JWT"), 1);
        assert_eq!(skills.score("Write python api client"), 2);
    }

    #[test]
    fn test_score_word_contained_in_token() {
        // "data" is a word of the name and a substring of "database".
        let skills = SkillSet::parse("database");
        assert_eq!(skills.score("Load data fixtures"), 1);
        // The reverse direction does not count.
        let skills = SkillSet::parse("data");
        assert_eq!(skills.score("Design database layout"), 0);
    }

    #[test]
    fn test_score_zero_without_overlap() {
        let skills = SkillSet::parse("database");
        assert_eq!(skills.score("Design tables and relationships"), 0);
        assert_eq!(skills.score("Perform database testing"), 1);
    }

    #[test]
    fn test_name_without_skill_word_scores_zero() {
        let skills = SkillSet::parse("python, api");
        assert_eq!(skills.score("Implement user authentication endpoint"), 0);
    }

    #[test]
    fn test_pick_best_prefers_higher_score() {
        let skills = SkillSet::parse("database, testing");
        let names = ["Design tables and relationships", "Perform database testing", "Seed database"];
        let best = pick_best(&skills, names, |n| *n).unwrap();
        assert_eq!(best.candidate, "Perform database testing");
        assert_eq!(best.score, 2);
    }

    #[test]
    fn test_pick_best_ties_keep_first() {
        let skills = SkillSet::parse("database");
        let names = ["Seed database", "Perform database testing"];
        let best = pick_best(&skills, names, |n| *n).unwrap();
        assert_eq!(best.candidate, "Seed database");
    }

    #[test]
    fn test_pick_best_none_when_all_zero() {
        let skills = SkillSet::parse("react");
        assert!(pick_best(&skills, ["Write SQL migrations"], |n| *n).is_none());
    }

    #[test]
    fn test_pick_first_uses_simple_match() {
        let skills = SkillSet::parse("sql");
        let names = ["Design UI", "Write SQL migrations", "Tune SQL queries"];
        assert_eq!(pick_first(&skills, names, |n| *n), Some("Write SQL migrations"));
    }
}
