//! Plain-text rendering of trees, rules and exercise lists.

use ndtutor_core::catalog::DifficultyBucket;
use ndtutor_core::{DerivationRule, Exercise, NodeId, ProofTree, Tipp};

use crate::session::Candidates;

pub fn short_id(id: NodeId) -> String {
    id.simple().to_string()[..8].to_string()
}

/// The subtree at `from`, one node per line:
///
/// ```text
/// 80375c90  ⊢ (A ∧ B)   [∧I]
/// ├── 1f0e3b2a  ⊢ A   [AXIOM]
/// └── 7c5d9e01  ⊢ B   (open)
/// ```
pub fn render_tree(tree: &ProofTree, from: NodeId) -> String {
    let mut out = String::new();
    render_node(tree, from, "", None, &mut out);
    out
}

fn render_node(tree: &ProofTree, id: NodeId, indent: &str, last: Option<bool>, out: &mut String) {
    let Some(node) = tree.node(id) else {
        return;
    };
    let branch = match last {
        None => "",
        Some(true) => "└── ",
        Some(false) => "├── ",
    };
    let tag = match node.rule {
        Some(rule) => format!("[{}]", rule.symbol()),
        None => "(open)".to_string(),
    };
    let focus = if id == tree.focus() && id != tree.root_id() {
        "  <- focus"
    } else {
        ""
    };
    out.push_str(&format!(
        "{indent}{branch}{}  {}   {tag}{focus}\n",
        short_id(id),
        node.statement
    ));

    let child_indent = match last {
        None => indent.to_string(),
        Some(true) => format!("{indent}    "),
        Some(false) => format!("{indent}│   "),
    };
    for (i, premiss) in node.premisses.iter().enumerate() {
        let is_last = i + 1 == node.premisses.len();
        render_node(tree, *premiss, &child_indent, Some(is_last), out);
    }
}

/// `∧I: Γ ⊢ A   Γ ⊢ B  /  Γ ⊢ (A ∧ B)` plus the side condition, if any.
pub fn render_rule(rule: &DerivationRule) -> String {
    let premises: Vec<String> = rule.premises.iter().map(ToString::to_string).collect();
    let mut line = format!(
        "{:<12} {:<6} {}  /  {}",
        rule.name.as_str(),
        rule.name.symbol(),
        premises.join("   "),
        rule.conclusion
    );
    if let Some(condition) = rule.name.side_condition() {
        line.push_str(&format!("   ({condition})"));
    }
    line
}

pub fn render_tipp(tipp: &Tipp) -> String {
    if tipp.premisses.is_empty() {
        return format!("{} closes the goal", tipp.rule);
    }
    let premisses: Vec<String> = tipp.premisses.iter().map(ToString::to_string).collect();
    format!("{} leaves {}", tipp.rule, premisses.join(" ; "))
}

/// ```text
/// AndIntro needs: A, B
///   formulas: (A ∧ ⊤) ; A
///   elements: (none)
/// ```
pub fn render_candidates(candidates: &Candidates) -> String {
    let slots = if candidates.slots.is_empty() {
        "nothing".to_string()
    } else {
        candidates.slots.join(", ")
    };
    let join = |items: Vec<String>| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.join(" ; ")
        }
    };
    format!(
        "{} needs: {slots}\n  formulas: {}\n  elements: {}\n",
        candidates.rule,
        join(candidates.formulas.iter().map(ToString::to_string).collect()),
        join(candidates.elements.iter().map(ToString::to_string).collect()),
    )
}

pub fn render_exercise(exercise: &Exercise, favorite: bool, completed: bool) -> String {
    let star = if favorite { "*" } else { " " };
    let done = if completed { "done" } else { "    " };
    format!(
        "{star} {done} {}  {:<12} +{:<3} -{:<3} {}",
        exercise.id,
        DifficultyBucket::of(exercise.difficulty).to_string(),
        exercise.likes,
        exercise.dislikes,
        exercise.exercise
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndtutor_core::{Formula, Rule, Statement, DEFAULT_ROOT_ID};

    #[test]
    fn tree_lines_show_rules_and_open_goals() {
        let goal = Statement::goal(Formula::and(Formula::letter("A"), Formula::letter("B")));
        let mut tree = ProofTree::new(DEFAULT_ROOT_ID, goal);
        let kids = tree
            .graft_children(
                DEFAULT_ROOT_ID,
                Rule::AndIntro,
                vec![
                    Statement::goal(Formula::letter("A")),
                    Statement::goal(Formula::letter("B")),
                ],
            )
            .unwrap();
        tree.graft_children(kids[0], Rule::Ax, vec![]).unwrap();

        let text = render_tree(&tree, DEFAULT_ROOT_ID);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "80375c90  ⊢ (A ∧ B)   [∧I]");
        assert_eq!(lines[1], format!("├── {}  ⊢ A   [AXIOM]", short_id(kids[0])));
        assert_eq!(lines[2], format!("└── {}  ⊢ B   (open)", short_id(kids[1])));
    }

    #[test]
    fn tipp_lines() {
        let closing = Tipp {
            rule: Rule::Ax,
            premisses: vec![],
        };
        assert_eq!(render_tipp(&closing), "Ax closes the goal");
        let split = Tipp {
            rule: Rule::AndIntro,
            premisses: vec![Statement::goal(Formula::True), Statement::goal(Formula::False)],
        };
        assert_eq!(render_tipp(&split), "AndIntro leaves ⊢ ⊤ ; ⊢ ⊥");
    }

    #[test]
    fn candidate_listing() {
        let candidates = Candidates {
            rule: Rule::AndIntro,
            slots: vec!["A".into(), "B".into()],
            formulas: vec![
                Formula::and(Formula::letter("A"), Formula::True),
                Formula::letter("A"),
            ],
            elements: vec![],
        };
        assert_eq!(
            render_candidates(&candidates),
            "AndIntro needs: A, B\n  formulas: (A ∧ ⊤) ; A\n  elements: (none)\n"
        );
    }
}
