//! Work Assignment (Layer 2)
//!
//! Skill matching, the subtask assignment engine, and breakdown import.

#![warn(missing_docs)]

pub mod matcher;
pub mod outcome;
pub mod assigner;
pub mod breakdown;

pub use matcher::{SkillSet, ScoredMatch, pick_best, pick_first};
pub use outcome::{
    AssignOutcome, AssignPolicy, AssignmentReport, BulkAssignReport, EngineError, NoWorkReason,
    Result,
};
pub use assigner::{SubtaskAssigner, active_assignment};
pub use breakdown::{
    Breakdown, BreakdownParser, GeneratorError, ImportSummary, OutlineFileGenerator,
    SubtaskOutline, TaskGenerator, TaskOutline, import_breakdown,
};
