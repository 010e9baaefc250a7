//! Request and response bodies of the tutor backend's REST surface.

use crate::formula::{Formula, Statement};
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ExerciseId = Uuid;

/// Binds a rule schema's `Formula(from)` placeholder to a concrete formula.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormulaMapping {
    pub from: u32,
    pub to: Formula,
}

/// Binds a rule schema's `Element(from)` placeholder to a variable name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElementMapping {
    pub from: String,
    pub to: String,
}

/// Body of `POST /api/apply`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplyRuleParams {
    pub rule: Rule,
    pub statement: Statement,
    pub mapping: Vec<FormulaMapping>,
    pub substitution: Vec<ElementMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: ExerciseId,
    pub exercise: Statement,
    pub likes: i32,
    pub dislikes: i32,
    pub difficulty: f64,
    #[serde(default)]
    pub hint: bool,
}

impl Exercise {
    /// Share of likes among all votes, `None` while nobody voted.
    pub fn like_ratio(&self) -> Option<f64> {
        let votes = self.likes + self.dislikes;
        if votes <= 0 {
            return None;
        }
        Some(f64::from(self.likes) / f64::from(votes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateExerciseRequest {
    pub lhs: Vec<Formula>,
    pub rhs: Formula,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feedback {
    pub like: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseParams {
    pub formula: String,
}

/// A hint: a rule that applies to the statement and the premises it yields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tipp {
    pub rule: Rule,
    pub premisses: Vec<Statement>,
}

/// A closed proof node as reported to `/api/add_tree`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeNode {
    pub name: Uuid,
    pub statement: Statement,
    pub rule: Rule,
    pub premisses: Vec<Uuid>,
}

/// Body of `POST /api/add_tree`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateTreeRequest {
    pub root_id: Uuid,
    pub nodes: Vec<TreeNode>,
}
