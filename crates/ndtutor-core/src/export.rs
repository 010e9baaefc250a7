//! Typst export of proof trees.
//!
//! Produces a standalone Typst document using the `curryst` package:
//!
//! ```text
//! #import "@preview/curryst:0.5.0": rule, prooftree
//! #set page(...)
//! #prooftree(rule(name: $and "I"$,$emptyset tack A and B$,rule(...),
//! rule(...)))
//! [footnote block]
//! ```
//!
//! Rules with a side condition get a superscript footnote number. Numbers are
//! handed out in one pre-order walk starting at 1: a node takes its number
//! before any of its premises, and each premise subtree advances the counter
//! by the number of footnotes it produced.

use crate::formula::{Formula, Identifier, SideCondition, Statement};
use crate::rule::Rule;
use crate::tree::{NodeId, ProofNode, ProofTree};

const IMPORT: &str = r#"#import "@preview/curryst:0.5.0": rule, prooftree"#;
const PAGE: &str = "#set page(fill: none, width: auto, height: auto, margin: (x: 1em, y: 1em))";
const FOOTNOTE_HELPER: &str = "#let footnotes(body) = context {\n\tpad(top: 4pt, line(length: measure(body).width, stroke: 0.5pt + black))\n\tbody\n}";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
}

/// Result of exporting one subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSubtree {
    pub text: String,
    /// `(number, text)` in traversal order.
    pub footnotes: Vec<(u32, String)>,
    /// First footnote number not used by this subtree.
    pub next_footnote: u32,
}

/// Render a formula in Typst math syntax.
pub fn formula_to_typst(formula: &Formula) -> String {
    match formula {
        Formula::And { lhs, rhs } => {
            format!("{} and {}", formula_to_typst(lhs), formula_to_typst(rhs))
        }
        Formula::Or { lhs, rhs } => {
            format!("{} or {}", formula_to_typst(lhs), formula_to_typst(rhs))
        }
        Formula::Not(inner) => format!("not {}", formula_to_typst(inner)),
        Formula::Ident(identifier) => identifier.value().to_string(),
        Formula::Imp { lhs, rhs } => {
            format!("{} arrow.r {}", formula_to_typst(lhs), formula_to_typst(rhs))
        }
        Formula::True => "top".to_string(),
        Formula::False => "bot".to_string(),
        Formula::Forall {
            identifier,
            formula,
        } => format!("forall {}. {}", identifier.value(), formula_to_typst(formula)),
        Formula::Exists {
            identifier,
            formula,
        } => format!("exists {}. {}", identifier.value(), formula_to_typst(formula)),
        Formula::Predicate {
            identifier,
            identifiers,
        } => {
            let args: Vec<&str> = identifiers.iter().map(Identifier::value).collect();
            format!("{}({})", identifier.value(), args.join(", "))
        }
    }
}

fn hypotheses_to_typst(statement: &Statement) -> String {
    if statement.lhs.is_empty() {
        return "emptyset".to_string();
    }
    statement
        .lhs
        .iter()
        .map(formula_to_typst)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The variable a side-condition footnote talks about: for ∃-elimination the
/// variable of the eliminated ∃-premise, otherwise the goal's bound variable.
fn footnote_identifier(tree: &ProofTree, node: &ProofNode) -> String {
    let bound = || {
        node.statement
            .formula
            .bound_identifier()
            .map(|id| id.value().to_string())
    };
    let eliminated = || {
        node.premisses
            .iter()
            .filter_map(|p| tree.node(*p))
            .find_map(|p| match &p.statement.formula {
                Formula::Exists { identifier, .. } => Some(identifier.value().to_string()),
                _ => None,
            })
    };
    let found = if node.rule == Some(Rule::ExistsElim) {
        eliminated().or_else(bound)
    } else {
        bound().or_else(eliminated)
    };
    found.unwrap_or_else(|| "x".to_string())
}

/// Export the subtree at `node`, numbering footnotes from `first_footnote`.
///
/// Premises that do not resolve are skipped, so partially built trees can be
/// previewed.
pub fn export_subtree(tree: &ProofTree, node: &ProofNode, first_footnote: u32) -> ExportedSubtree {
    let lhs = hypotheses_to_typst(&node.statement);
    let current = formula_to_typst(&node.statement.formula);

    let mut next = first_footnote;
    let mut footnotes = Vec::new();
    let name = match node.rule.map(|r| r.typst_name(first_footnote)) {
        Some(typst) => {
            if let Some(template) = typst.footnote {
                let note = template
                    .replace("%%identifier%%", &footnote_identifier(tree, node))
                    .replace("%%lhs%%", &lhs)
                    .replace("%%rhs%%", &current);
                footnotes.push((first_footnote, note));
                next += 1;
            }
            typst.name
        }
        None => String::new(),
    };

    let mut premisses = Vec::with_capacity(node.premisses.len());
    for child in node.premisses.iter().filter_map(|id| tree.node(*id)) {
        let sub = export_subtree(tree, child, next);
        next = sub.next_footnote;
        footnotes.extend(sub.footnotes);
        premisses.push(sub.text);
    }

    ExportedSubtree {
        text: format!(
            "rule(name: ${name}$,${lhs} tack {current}$,{})",
            premisses.join(",\n")
        ),
        footnotes,
        next_footnote: next,
    }
}

fn side_condition_to_typst(condition: &SideCondition) -> String {
    match condition {
        SideCondition::NotFree {
            element,
            placeholder,
        } => format!(
            r#"{} "not occuring freely in" {}"#,
            element.value(),
            placeholder.value()
        ),
    }
}

/// Export the tree rooted at `root` as a complete Typst document.
pub fn export_typst(tree: &ProofTree, root: NodeId) -> Result<String, ExportError> {
    let node = tree.node(root).ok_or(ExportError::NodeNotFound(root))?;
    let exported = export_subtree(tree, node, 1);

    let mut conditions: Vec<String> = node
        .statement
        .side_conditions()
        .iter()
        .map(side_condition_to_typst)
        .collect();
    conditions.extend(
        exported
            .footnotes
            .iter()
            .map(|(id, note)| format!(r#"$"{id}:" {note}$"#)),
    );

    let mut out = format!("{IMPORT}\n{PAGE}\n#prooftree({})", exported.text);
    if !conditions.is_empty() {
        out.push_str("\n#set text(size: 7pt)");
        out.push('\n');
        out.push_str(FOOTNOTE_HELPER);
        out.push_str(&format!(
            "\n#footnotes[#stack(dir: ttb, spacing: 4pt, {})]",
            conditions.join(", ")
        ));
    }
    Ok(out)
}
