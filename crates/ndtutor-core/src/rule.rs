//! Inference rules and the rule schemas served by `/api/rules`.
//!
//! Rule schemas are read-only on the client: they drive the mapping UI (which
//! placeholders need a binding) and the symbols shown next to closed nodes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The natural-deduction rules known to the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rule {
    Ax,
    ImplIntro,
    ImplElim,
    FalseElim,
    NotIntro,
    NotElim,
    AndIntro,
    AndElimL,
    AndElimR,
    OrIntroL,
    OrIntroR,
    OrElim,
    ForallElim,
    ForallIntro,
    ExistsElim,
    ExistsIntro,
    AlphaExists,
    AlphaForall,
}

/// How a rule is named inside a Typst proof tree.
///
/// Rules with a side condition carry a footnote template; the placeholders
/// `%%identifier%%`, `%%lhs%%` and `%%rhs%%` are filled in by the exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypstRuleName {
    pub name: String,
    pub footnote: Option<&'static str>,
}

impl Rule {
    pub const ALL: [Rule; 18] = [
        Rule::Ax,
        Rule::ImplIntro,
        Rule::ImplElim,
        Rule::FalseElim,
        Rule::NotIntro,
        Rule::NotElim,
        Rule::AndIntro,
        Rule::AndElimL,
        Rule::AndElimR,
        Rule::OrIntroL,
        Rule::OrIntroR,
        Rule::OrElim,
        Rule::ForallElim,
        Rule::ForallIntro,
        Rule::ExistsElim,
        Rule::ExistsIntro,
        Rule::AlphaExists,
        Rule::AlphaForall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Rule::Ax => "Ax",
            Rule::ImplIntro => "ImplIntro",
            Rule::ImplElim => "ImplElim",
            Rule::FalseElim => "FalseElim",
            Rule::NotIntro => "NotIntro",
            Rule::NotElim => "NotElim",
            Rule::AndIntro => "AndIntro",
            Rule::AndElimL => "AndElimL",
            Rule::AndElimR => "AndElimR",
            Rule::OrIntroL => "OrIntroL",
            Rule::OrIntroR => "OrIntroR",
            Rule::OrElim => "OrElim",
            Rule::ForallElim => "ForallElim",
            Rule::ForallIntro => "ForallIntro",
            Rule::ExistsElim => "ExistsElim",
            Rule::ExistsIntro => "ExistsIntro",
            Rule::AlphaExists => "AlphaExists",
            Rule::AlphaForall => "AlphaForall",
        }
    }

    /// Symbol shown next to a closed node. Asterisks mark rules with a side
    /// condition.
    pub fn symbol(self) -> &'static str {
        match self {
            Rule::AndElimL => "\u{2227}EL",
            Rule::AndElimR => "\u{2227}ER",
            Rule::AndIntro => "\u{2227}I",
            Rule::Ax => "AXIOM",
            Rule::ExistsElim => "\u{2203}E**",
            Rule::ExistsIntro => "\u{2203}I",
            Rule::FalseElim => "\u{22A5}E",
            Rule::ForallElim => "\u{2200}E",
            Rule::ForallIntro => "\u{2200}I*",
            Rule::ImplElim => "\u{2192}E",
            Rule::ImplIntro => "\u{2192}I",
            Rule::NotElim => "\u{00AC}E",
            Rule::NotIntro => "\u{00AC}I",
            Rule::OrElim => "\u{2228}E",
            Rule::OrIntroL | Rule::OrIntroR => "\u{2228}I",
            Rule::AlphaExists => "\u{03B1}\u{2203}***",
            Rule::AlphaForall => "\u{03B1}\u{2200}***",
        }
    }

    pub fn side_condition(self) -> Option<&'static str> {
        match self {
            Rule::AlphaExists | Rule::AlphaForall => Some("the binding structure is preserved"),
            Rule::ExistsElim => Some("x does not occur freely in any formula in \u{0393} or B"),
            Rule::ForallIntro => Some("x does not occur freely in any formula in \u{0393}"),
            _ => None,
        }
    }

    pub fn typst_name(self, footnote: u32) -> TypstRuleName {
        let plain = |name: &str| TypstRuleName {
            name: name.to_string(),
            footnote: None,
        };
        match self {
            Rule::AndElimL => plain(r#"and "EL""#),
            Rule::AndElimR => plain(r#"and "ER""#),
            Rule::AndIntro => plain(r#"and "I""#),
            Rule::Ax => plain(r#""AXIOM""#),
            Rule::ExistsElim => TypstRuleName {
                name: format!(r#"exists "E"^({footnote})"#),
                footnote: Some(
                    r#"%%identifier%% "does not occur freely in any formula in" %%lhs%% "or" %%rhs%%"#,
                ),
            },
            Rule::ExistsIntro => plain(r#"exists "I""#),
            Rule::FalseElim => plain(r#"bot "E""#),
            Rule::ForallElim => plain(r#"forall "E""#),
            Rule::ForallIntro => TypstRuleName {
                name: format!(r#"forall "I"^({footnote})"#),
                footnote: Some(
                    r#"%%identifier%% "does not occur freely in any formula in" %%lhs%%"#,
                ),
            },
            Rule::ImplElim => plain(r#"arrow.r "E""#),
            Rule::ImplIntro => plain(r#"arrow.r "I""#),
            Rule::NotElim => plain(r#"not "E""#),
            Rule::NotIntro => plain(r#"not "I""#),
            Rule::OrElim => plain(r#"or "E""#),
            Rule::OrIntroL | Rule::OrIntroR => plain(r#"or "I""#),
            Rule::AlphaExists => TypstRuleName {
                name: format!("alpha exists^({footnote})"),
                footnote: Some(r#""the binding structure is preserved""#),
            },
            Rule::AlphaForall => TypstRuleName {
                name: format!("alpha forall^({footnote})"),
                footnote: Some(r#""the binding structure is preserved""#),
            },
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rule `{0}`")]
pub struct UnknownRule(pub String);

impl FromStr for Rule {
    type Err = UnknownRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rule::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownRule(s.to_string()))
    }
}

// ============================================================================
// Rule schemas
// ============================================================================

/// A positional placeholder in a rule schema: `Formula(n)` stands for an
/// arbitrary formula, `Element(name)` for an object-level variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "type", content = "value")]
pub enum RuleIdentifier {
    Formula(u32),
    Element(String),
}

impl fmt::Display for RuleIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Formula slots are rendered as A, B, C, ... like in the lecture notes.
            RuleIdentifier::Formula(n) => match char::from_u32('A' as u32 + n) {
                Some(c) if *n < 26 => write!(f, "{c}"),
                _ => write!(f, "F{n}"),
            },
            RuleIdentifier::Element(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "body")]
pub enum RuleFormula {
    Ident(RuleIdentifier),
    And {
        lhs: RuleIdentifier,
        rhs: RuleIdentifier,
    },
    Or {
        lhs: RuleIdentifier,
        rhs: RuleIdentifier,
    },
    Not(RuleIdentifier),
    Imp {
        lhs: RuleIdentifier,
        rhs: RuleIdentifier,
    },
    False,
    True,
    Forall {
        identifier: RuleIdentifier,
        formula: Box<RuleFormula>,
    },
    Exists {
        identifier: RuleIdentifier,
        formula: Box<RuleFormula>,
    },
    Substitution {
        identifier: RuleIdentifier,
        lhs: RuleIdentifier,
        rhs: RuleIdentifier,
    },
}

impl RuleFormula {
    fn push_identifiers<'a>(&'a self, out: &mut Vec<&'a RuleIdentifier>) {
        match self {
            RuleFormula::Ident(id) | RuleFormula::Not(id) => out.push(id),
            RuleFormula::And { lhs, rhs }
            | RuleFormula::Or { lhs, rhs }
            | RuleFormula::Imp { lhs, rhs } => {
                out.push(lhs);
                out.push(rhs);
            }
            RuleFormula::Forall {
                identifier,
                formula,
            }
            | RuleFormula::Exists {
                identifier,
                formula,
            } => {
                out.push(identifier);
                formula.push_identifiers(out);
            }
            RuleFormula::Substitution {
                identifier,
                lhs,
                rhs,
            } => {
                out.push(identifier);
                out.push(lhs);
                out.push(rhs);
            }
            RuleFormula::True | RuleFormula::False => {}
        }
    }
}

impl fmt::Display for RuleFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleFormula::Ident(id) => write!(f, "{id}"),
            RuleFormula::And { lhs, rhs } => write!(f, "({lhs} \u{2227} {rhs})"),
            RuleFormula::Or { lhs, rhs } => write!(f, "({lhs} \u{2228} {rhs})"),
            RuleFormula::Not(id) => write!(f, "(\u{00AC}{id})"),
            RuleFormula::Imp { lhs, rhs } => write!(f, "({lhs} \u{2192} {rhs})"),
            RuleFormula::False => f.write_str("\u{22A5}"),
            RuleFormula::True => f.write_str("\u{22A4}"),
            RuleFormula::Forall {
                identifier,
                formula,
            } => write!(f, "(\u{2200}{identifier}. {formula})"),
            RuleFormula::Exists {
                identifier,
                formula,
            } => write!(f, "(\u{2203}{identifier}. {formula})"),
            RuleFormula::Substitution {
                identifier,
                lhs,
                rhs,
            } => write!(f, "{identifier}[{lhs}/{rhs}]"),
        }
    }
}

/// One line of a rule schema: optional hypothesis-set placeholder and a goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleStatement {
    #[serde(default)]
    pub lhs: Option<RuleIdentifier>,
    pub formula: RuleFormula,
}

impl RuleStatement {
    fn push_identifiers<'a>(&'a self, out: &mut Vec<&'a RuleIdentifier>) {
        if let Some(lhs) = &self.lhs {
            out.push(lhs);
        }
        self.formula.push_identifiers(out);
    }
}

impl fmt::Display for RuleStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lhs {
            Some(lhs) => write!(f, "\u{0393}{lhs} \u{22A2} {}", self.formula),
            None => write!(f, "\u{0393} \u{22A2} {}", self.formula),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivationRule {
    pub name: Rule,
    pub premises: Vec<RuleStatement>,
    pub conclusion: RuleStatement,
}

impl DerivationRule {
    /// Distinct schema identifiers in order of first appearance: conclusion
    /// first, then each premise. This is the order in which bindings are
    /// collected from the user.
    pub fn identifiers(&self) -> Vec<RuleIdentifier> {
        let mut all = Vec::new();
        self.conclusion.push_identifiers(&mut all);
        for premise in &self.premises {
            premise.push_identifiers(&mut all);
        }

        let mut unique: Vec<RuleIdentifier> = Vec::new();
        for id in all {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_names_roundtrip_through_from_str() {
        for rule in Rule::ALL {
            assert_eq!(rule.as_str().parse::<Rule>().unwrap(), rule);
        }
        assert_eq!("andintro".parse::<Rule>().unwrap(), Rule::AndIntro);
        assert!("Cut".parse::<Rule>().is_err());
    }

    #[test]
    fn exactly_four_rules_carry_footnotes() {
        let with_notes: Vec<Rule> = Rule::ALL
            .into_iter()
            .filter(|r| r.typst_name(1).footnote.is_some())
            .collect();
        assert_eq!(
            with_notes,
            vec![
                Rule::ForallIntro,
                Rule::ExistsElim,
                Rule::AlphaExists,
                Rule::AlphaForall
            ]
        );
        for rule in with_notes {
            assert!(rule.side_condition().is_some());
        }
    }

    #[test]
    fn typst_name_embeds_footnote_number() {
        assert_eq!(Rule::ExistsElim.typst_name(3).name, r#"exists "E"^(3)"#);
        assert_eq!(Rule::ForallIntro.typst_name(7).name, r#"forall "I"^(7)"#);
        assert_eq!(Rule::AndIntro.typst_name(7).name, r#"and "I""#);
    }

    #[test]
    fn decodes_rule_schema_and_lists_identifiers() {
        // ∃E: Γ ⊢ ∃x.A    Γ,A ⊢ B  /  Γ ⊢ B
        let rule: DerivationRule = serde_json::from_value(json!({
            "name": "ExistsElim",
            "conclusion": {
                "lhs": null,
                "formula": {"type": "Ident", "body": {"type": "Formula", "value": 1}}
            },
            "premises": [
                {
                    "formula": {
                        "type": "Exists",
                        "body": {
                            "identifier": {"type": "Element", "value": "x"},
                            "formula": {"type": "Ident", "body": {"type": "Formula", "value": 0}}
                        }
                    }
                },
                {
                    "lhs": {"type": "Formula", "value": 0},
                    "formula": {"type": "Ident", "body": {"type": "Formula", "value": 1}}
                }
            ]
        }))
        .unwrap();

        assert_eq!(
            rule.identifiers(),
            vec![
                RuleIdentifier::Formula(1),
                RuleIdentifier::Element("x".to_string()),
                RuleIdentifier::Formula(0),
            ]
        );
        assert_eq!(rule.premises[0].to_string(), "\u{0393} \u{22A2} (\u{2203}x. A)");
    }
}
