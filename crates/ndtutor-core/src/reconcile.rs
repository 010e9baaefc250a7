//! Rule-Application Reconciliation
//!
//! Bridges a completed [`MappingBuilder`] and the backend's rule application
//! into the [`ProofTree`]. The round trip is split in two halves so that the
//! tree is not borrowed while the request is in flight:
//!
//! 1. [`prepare`] validates the target and captures the tree revision.
//! 2. [`commit`] grafts the returned sub-goals, unless the target changed in
//!    the meantime, in which case the response is discarded.
//!
//! A failed application never touches the tree.

use crate::formula::Statement;
use crate::mapping::{MappingBuilder, MappingError};
use crate::models::ApplyRuleParams;
use crate::tree::{NodeId, ProofTree, TreeError};
use async_trait::async_trait;

/// The collaborator that performs rule application (the backend's
/// `/api/apply`).
#[async_trait]
pub trait RuleApplier: Send + Sync {
    async fn apply_rule(&self, params: &ApplyRuleParams) -> Result<Vec<Statement>, ApplyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The backend refused the application; the message is meant for the user.
    #[error("{0}")]
    Rejected(String),
    #[error("rule application failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("node {0} is not an open goal")]
    NotOpen(NodeId),
    #[error("node {0} changed while the rule application was in flight")]
    Stale(NodeId),
}

/// A rule application that has been sent (or is about to be) but not yet
/// merged into the tree.
#[derive(Debug, Clone)]
pub struct PendingApplication {
    pub target: NodeId,
    pub revision: u64,
    pub params: ApplyRuleParams,
}

pub fn prepare(
    tree: &ProofTree,
    target: NodeId,
    builder: &MappingBuilder,
) -> Result<PendingApplication, ApplyError> {
    let node = tree.node(target).ok_or(TreeError::NodeNotFound(target))?;
    if !node.is_open() {
        return Err(ApplyError::NotOpen(target));
    }
    let params = builder.to_params(&node.statement)?;
    Ok(PendingApplication {
        target,
        revision: tree.revision(),
        params,
    })
}

/// Graft the backend's sub-goals for `pending` into `tree`.
///
/// If the tree changed since [`prepare`], the response is only applied when
/// the target still exists, is still open and still carries the statement the
/// request was made for.
pub fn commit(
    tree: &mut ProofTree,
    pending: &PendingApplication,
    subgoals: Vec<Statement>,
) -> Result<Vec<NodeId>, ApplyError> {
    if tree.revision() != pending.revision {
        let still_valid = tree
            .node(pending.target)
            .is_some_and(|n| n.is_open() && n.statement == pending.params.statement);
        if !still_valid {
            tracing::warn!(
                node = %pending.target,
                rule = %pending.params.rule,
                "discarding stale rule application"
            );
            return Err(ApplyError::Stale(pending.target));
        }
    }
    Ok(tree.graft_children(pending.target, pending.params.rule, subgoals)?)
}

/// Apply the rule collected in `builder` to `target` in one go.
pub async fn apply_rule(
    tree: &mut ProofTree,
    applier: &dyn RuleApplier,
    target: NodeId,
    builder: &MappingBuilder,
) -> Result<Vec<NodeId>, ApplyError> {
    let pending = prepare(tree, target, builder)?;
    let subgoals = match applier.apply_rule(&pending.params).await {
        Ok(subgoals) => subgoals,
        Err(err) => {
            tracing::info!(node = %target, rule = %pending.params.rule, error = %err, "rule application refused");
            return Err(err);
        }
    };
    commit(tree, &pending, subgoals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Formula;
    use crate::rule::{DerivationRule, Rule, RuleFormula, RuleIdentifier, RuleStatement};
    use crate::tree::DEFAULT_ROOT_ID;

    struct Fixed(Vec<Statement>);

    #[async_trait]
    impl RuleApplier for Fixed {
        async fn apply_rule(&self, _params: &ApplyRuleParams) -> Result<Vec<Statement>, ApplyError> {
            Ok(self.0.clone())
        }
    }

    struct Refuse;

    #[async_trait]
    impl RuleApplier for Refuse {
        async fn apply_rule(&self, _params: &ApplyRuleParams) -> Result<Vec<Statement>, ApplyError> {
            Err(ApplyError::Rejected("Side condition violated".into()))
        }
    }

    fn and_intro() -> DerivationRule {
        DerivationRule {
            name: Rule::AndIntro,
            premises: vec![
                RuleStatement {
                    lhs: None,
                    formula: RuleFormula::Ident(RuleIdentifier::Formula(0)),
                },
                RuleStatement {
                    lhs: None,
                    formula: RuleFormula::Ident(RuleIdentifier::Formula(1)),
                },
            ],
            conclusion: RuleStatement {
                lhs: None,
                formula: RuleFormula::And {
                    lhs: RuleIdentifier::Formula(0),
                    rhs: RuleIdentifier::Formula(1),
                },
            },
        }
    }

    fn bound_builder() -> MappingBuilder {
        let mut builder = MappingBuilder::new(&and_intro());
        builder.pick(Formula::letter("A")).unwrap();
        builder.pick(Formula::letter("B")).unwrap();
        builder
    }

    fn goal() -> Statement {
        Statement::goal(Formula::and(Formula::letter("A"), Formula::letter("B")))
    }

    #[tokio::test]
    async fn successful_application_grafts_children() {
        let mut tree = ProofTree::new(DEFAULT_ROOT_ID, goal());
        let applier = Fixed(vec![
            Statement::goal(Formula::letter("A")),
            Statement::goal(Formula::letter("B")),
        ]);
        let ids = apply_rule(&mut tree, &applier, DEFAULT_ROOT_ID, &bound_builder())
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(tree.root().rule, Some(Rule::AndIntro));
        assert_eq!(tree.root().premisses, ids);
    }

    #[tokio::test]
    async fn refused_application_leaves_tree_untouched() {
        let mut tree = ProofTree::new(DEFAULT_ROOT_ID, goal());
        let before = tree.to_snapshot();
        let err = apply_rule(&mut tree, &Refuse, DEFAULT_ROOT_ID, &bound_builder())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Side condition violated");
        assert_eq!(tree.to_snapshot(), before);
    }

    #[tokio::test]
    async fn incomplete_mapping_never_reaches_backend() {
        let mut tree = ProofTree::new(DEFAULT_ROOT_ID, goal());
        let builder = MappingBuilder::new(&and_intro());
        let err = apply_rule(&mut tree, &Refuse, DEFAULT_ROOT_ID, &builder)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::Mapping(MappingError::Incomplete { .. })));
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut tree = ProofTree::new(DEFAULT_ROOT_ID, goal());
        let pending = prepare(&tree, DEFAULT_ROOT_ID, &bound_builder()).unwrap();

        // Another application closes the target before the response lands.
        tree.graft_children(DEFAULT_ROOT_ID, Rule::Ax, vec![]).unwrap();
        let err = commit(&mut tree, &pending, vec![Statement::goal(Formula::True)]).unwrap_err();
        assert!(matches!(err, ApplyError::Stale(id) if id == DEFAULT_ROOT_ID));
        assert_eq!(tree.root().rule, Some(Rule::Ax));
    }

    #[test]
    fn response_after_reseed_with_other_exercise_is_discarded() {
        let mut tree = ProofTree::new(DEFAULT_ROOT_ID, goal());
        let pending = prepare(&tree, DEFAULT_ROOT_ID, &bound_builder()).unwrap();
        tree.seed_root(Statement::goal(Formula::True));
        assert!(matches!(
            commit(&mut tree, &pending, vec![]),
            Err(ApplyError::Stale(_))
        ));
        assert!(tree.root().is_open());
    }

    #[test]
    fn unrelated_change_does_not_invalidate_response() {
        let mut tree = ProofTree::new(DEFAULT_ROOT_ID, goal());
        let kids = tree
            .graft_children(
                DEFAULT_ROOT_ID,
                Rule::AndIntro,
                vec![goal(), Statement::goal(Formula::True)],
            )
            .unwrap();
        let pending = prepare(&tree, kids[0], &bound_builder()).unwrap();
        tree.graft_children(kids[1], Rule::Ax, vec![]).unwrap();
        let ids = commit(&mut tree, &pending, vec![]).unwrap();
        assert!(ids.is_empty());
        assert_eq!(tree.node(kids[0]).and_then(|n| n.rule), Some(Rule::AndIntro));
    }

    #[test]
    fn closed_target_is_rejected_up_front() {
        let mut tree = ProofTree::new(DEFAULT_ROOT_ID, goal());
        tree.graft_children(DEFAULT_ROOT_ID, Rule::Ax, vec![]).unwrap();
        assert!(matches!(
            prepare(&tree, DEFAULT_ROOT_ID, &bound_builder()),
            Err(ApplyError::NotOpen(_))
        ));
    }
}
