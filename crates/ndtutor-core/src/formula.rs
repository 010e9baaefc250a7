//! Logical formulas, identifiers and statements as exchanged with the backend.
//!
//! Formulas are produced by the backend parser (`/api/parse`) or returned as
//! sub-goals from rule application (`/api/apply`). The client never builds
//! them from text itself; it only displays, inspects and forwards them.
//!
//! Wire encoding uses an explicit discriminant:
//!
//! ```text
//! {"type": "And", "body": {"lhs": {...}, "rhs": {...}}}
//! {"type": "Ident", "body": {"type": "Element", "value": "x"}}
//! {"type": "True"}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A name occurring in a formula.
///
/// `Literal` is a proof-level placeholder (e.g. a propositional letter),
/// `Element` an object-level variable or constant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "type", content = "value")]
pub enum Identifier {
    Literal(String),
    Element(String),
}

impl Identifier {
    pub fn literal(name: impl Into<String>) -> Self {
        Identifier::Literal(name.into())
    }

    pub fn element(name: impl Into<String>) -> Self {
        Identifier::Element(name.into())
    }

    pub fn value(&self) -> &str {
        match self {
            Identifier::Literal(v) | Identifier::Element(v) => v,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Identifier::Element(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "type", content = "body")]
pub enum Formula {
    And {
        lhs: Box<Formula>,
        rhs: Box<Formula>,
    },
    Or {
        lhs: Box<Formula>,
        rhs: Box<Formula>,
    },
    Not(Box<Formula>),
    Ident(Identifier),
    Imp {
        lhs: Box<Formula>,
        rhs: Box<Formula>,
    },
    True,
    False,
    Forall {
        identifier: Identifier,
        formula: Box<Formula>,
    },
    Exists {
        identifier: Identifier,
        formula: Box<Formula>,
    },
    Predicate {
        identifier: Identifier,
        identifiers: Vec<Identifier>,
    },
}

impl Formula {
    pub fn and(lhs: Formula, rhs: Formula) -> Self {
        Formula::And {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn or(lhs: Formula, rhs: Formula) -> Self {
        Formula::Or {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn imp(lhs: Formula, rhs: Formula) -> Self {
        Formula::Imp {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn not(inner: Formula) -> Self {
        Formula::Not(Box::new(inner))
    }

    pub fn forall(identifier: Identifier, body: Formula) -> Self {
        Formula::Forall {
            identifier,
            formula: Box::new(body),
        }
    }

    pub fn exists(identifier: Identifier, body: Formula) -> Self {
        Formula::Exists {
            identifier,
            formula: Box::new(body),
        }
    }

    pub fn predicate(identifier: Identifier, identifiers: Vec<Identifier>) -> Self {
        Formula::Predicate {
            identifier,
            identifiers,
        }
    }

    /// Shorthand for a propositional letter.
    pub fn letter(name: impl Into<String>) -> Self {
        Formula::Ident(Identifier::literal(name))
    }

    /// The variable bound at the top of a quantified formula.
    pub fn bound_identifier(&self) -> Option<&Identifier> {
        match self {
            Formula::Forall { identifier, .. } | Formula::Exists { identifier, .. } => {
                Some(identifier)
            }
            _ => None,
        }
    }

    /// Identifiers a user may bind while matching a rule: quantified variables
    /// and identifier atoms. Predicate names and arguments are not included.
    pub fn placeholders(&self) -> BTreeSet<Identifier> {
        let mut out = BTreeSet::new();
        self.collect_placeholders(&mut out);
        out
    }

    fn collect_placeholders(&self, out: &mut BTreeSet<Identifier>) {
        match self {
            Formula::And { lhs, rhs } | Formula::Or { lhs, rhs } | Formula::Imp { lhs, rhs } => {
                lhs.collect_placeholders(out);
                rhs.collect_placeholders(out);
            }
            Formula::Forall {
                identifier,
                formula,
            }
            | Formula::Exists {
                identifier,
                formula,
            } => {
                out.insert(identifier.clone());
                formula.collect_placeholders(out);
            }
            Formula::Not(inner) => inner.collect_placeholders(out),
            Formula::Ident(identifier) => {
                out.insert(identifier.clone());
            }
            Formula::True | Formula::False | Formula::Predicate { .. } => {}
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::And { lhs, rhs } => write!(f, "({lhs} \u{2227} {rhs})"),
            Formula::Or { lhs, rhs } => write!(f, "({lhs} \u{2228} {rhs})"),
            Formula::Not(inner) => write!(f, "(\u{00AC}{inner})"),
            Formula::Ident(identifier) => write!(f, "{identifier}"),
            Formula::Imp { lhs, rhs } => write!(f, "({lhs} \u{2192} {rhs})"),
            Formula::True => f.write_str("\u{22A4}"),
            Formula::False => f.write_str("\u{22A5}"),
            Formula::Forall {
                identifier,
                formula,
            } => write!(f, "(\u{2200}{identifier}. {formula})"),
            Formula::Exists {
                identifier,
                formula,
            } => write!(f, "(\u{2203}{identifier}. {formula})"),
            Formula::Predicate {
                identifier,
                identifiers,
            } => {
                write!(f, "{identifier}(")?;
                for (i, arg) in identifiers.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Freshness constraint attached to a statement by certain rules.
///
/// `NotFree { element, placeholder }`: `element` must not occur free in the
/// formula bound to `placeholder`. Informational only on the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SideCondition {
    NotFree {
        element: Identifier,
        placeholder: Identifier,
    },
}

impl fmt::Display for SideCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideCondition::NotFree {
                element,
                placeholder,
            } => write!(f, "{element} is not free in {placeholder}"),
        }
    }
}

/// A proof obligation `Γ ⊢ φ`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Statement {
    pub lhs: Vec<Formula>,
    pub formula: Formula,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecondition: Option<Vec<SideCondition>>,
}

impl Statement {
    pub fn new(lhs: Vec<Formula>, formula: Formula) -> Self {
        Self {
            lhs,
            formula,
            sidecondition: None,
        }
    }

    /// A statement with no hypotheses.
    pub fn goal(formula: Formula) -> Self {
        Self::new(Vec::new(), formula)
    }

    pub fn with_side_conditions(mut self, conditions: Vec<SideCondition>) -> Self {
        self.sidecondition = Some(conditions);
        self
    }

    pub fn side_conditions(&self) -> &[SideCondition] {
        self.sidecondition.as_deref().unwrap_or(&[])
    }

    /// Placeholders of the goal and every hypothesis.
    pub fn placeholders(&self) -> BTreeSet<Identifier> {
        let mut out = self.formula.placeholders();
        for hyp in &self.lhs {
            out.extend(hyp.placeholders());
        }
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hyp) in self.lhs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{hyp}")?;
        }
        if !self.lhs.is_empty() {
            f.write_str(" ")?;
        }
        write!(f, "\u{22A2} {}", self.formula)
    }
}
