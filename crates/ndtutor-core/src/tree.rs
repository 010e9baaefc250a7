//! Proof Tree Store
//!
//! A flat, id-addressed collection of proof nodes for one exercise session.
//! Nodes refer to their premises by id only; the tree shape is recovered by
//! following `premisses` from the root.
//!
//! ```text
//!            root (rule = AndIntro)
//!           /                    \
//!   n1 (rule = Ax)          n2 (open goal)
//! ```
//!
//! Structural changes happen through exactly two operations:
//! - [`ProofTree::graft_children`] closes an open goal with a rule and appends
//!   one fresh leaf per sub-goal returned by the backend.
//! - [`ProofTree::delete_subtree`] undoes the rule application of a node's
//!   parent, dropping every descendant of that parent.
//!
//! Every mutation bumps a revision counter so that asynchronous callers can
//! tell whether the tree changed underneath them.

use crate::formula::Statement;
use crate::models::{CreateTreeRequest, TreeNode};
use crate::rule::Rule;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub type NodeId = Uuid;

/// Root id used by the tutor front-end for every exercise session.
pub const DEFAULT_ROOT_ID: NodeId = Uuid::from_u128(0x80375c90_d9f3_4f0f_9c60_9263c605d57a);

/// One derivation step: a statement, the rule closing it, and the ids of the
/// nodes proving its premises.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProofNode {
    pub name: NodeId,
    pub statement: Statement,
    #[serde(default)]
    pub rule: Option<Rule>,
    #[serde(default)]
    pub premisses: Vec<NodeId>,
}

impl ProofNode {
    pub fn open(name: NodeId, statement: Statement) -> Self {
        Self {
            name,
            statement,
            rule: None,
            premisses: Vec::new(),
        }
    }

    /// An open goal has neither a rule nor premises.
    pub fn is_open(&self) -> bool {
        self.rule.is_none() && self.premisses.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
    #[error("node {node} is already closed by {rule}")]
    AlreadyClosed { node: NodeId, rule: Rule },
    #[error("snapshot does not contain root node {0}")]
    MissingRoot(NodeId),
    #[error("snapshot contains node {0} more than once")]
    DuplicateNode(NodeId),
    #[error("node {node} references unknown premiss {premiss}")]
    DanglingPremiss { node: NodeId, premiss: NodeId },
    #[error("node {0} is not connected to the root")]
    Disconnected(NodeId),
}

/// Why a delete-subtree request was refused. The tree is unchanged in every
/// case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeleteRejection {
    #[error("cannot delete the root node")]
    Root,
    #[error("cannot delete the focused node {0}; move focus away first")]
    Focused(NodeId),
    #[error("node {0} has no parent")]
    NoParent(NodeId),
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
}

#[derive(Debug, Clone)]
pub struct ProofTree {
    root: NodeId,
    focus: NodeId,
    nodes: HashMap<NodeId, ProofNode>,
    /// Insertion order, kept for snapshots and listings.
    order: Vec<NodeId>,
    revision: u64,
}

impl ProofTree {
    /// A tree holding only the root goal.
    pub fn new(root: NodeId, statement: Statement) -> Self {
        let mut tree = Self {
            root,
            focus: root,
            nodes: HashMap::new(),
            order: Vec::new(),
            revision: 0,
        };
        tree.seed_root(statement);
        tree
    }

    /// Replace the whole collection with a single open root goal.
    pub fn seed_root(&mut self, statement: Statement) {
        self.nodes.clear();
        self.order.clear();
        self.insert(ProofNode::open(self.root, statement));
        self.focus = self.root;
        self.revision += 1;
        tracing::debug!(root = %self.root, "seeded proof tree");
    }

    /// Rebuild a tree from a stored node list.
    ///
    /// Every premiss must resolve, every non-root node must have exactly one
    /// parent, and all nodes must hang off the root.
    pub fn from_snapshot(root: NodeId, nodes: Vec<ProofNode>) -> Result<Self, TreeError> {
        let mut tree = Self {
            root,
            focus: root,
            nodes: HashMap::with_capacity(nodes.len()),
            order: Vec::with_capacity(nodes.len()),
            revision: 1,
        };
        for node in nodes {
            if tree.nodes.contains_key(&node.name) {
                return Err(TreeError::DuplicateNode(node.name));
            }
            tree.insert(node);
        }
        if !tree.nodes.contains_key(&root) {
            return Err(TreeError::MissingRoot(root));
        }

        let mut parent: HashMap<NodeId, NodeId> = HashMap::new();
        for id in &tree.order {
            let node = &tree.nodes[id];
            for premiss in &node.premisses {
                if !tree.nodes.contains_key(premiss) {
                    return Err(TreeError::DanglingPremiss {
                        node: node.name,
                        premiss: *premiss,
                    });
                }
                if *premiss == root || parent.insert(*premiss, node.name).is_some() {
                    return Err(TreeError::Disconnected(*premiss));
                }
            }
        }

        // Walking up from any node must reach the root; this also rules out cycles.
        for id in &tree.order {
            let mut cursor = *id;
            let mut steps = 0;
            while cursor != root {
                match parent.get(&cursor) {
                    Some(p) if steps < tree.order.len() => {
                        cursor = *p;
                        steps += 1;
                    }
                    _ => return Err(TreeError::Disconnected(*id)),
                }
            }
        }

        Ok(tree)
    }

    fn insert(&mut self, node: ProofNode) {
        self.order.push(node.name);
        self.nodes.insert(node.name, node);
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &ProofNode {
        // The root is inserted by every constructor and never removed.
        &self.nodes[&self.root]
    }

    pub fn focus(&self) -> NodeId {
        self.focus
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&ProofNode> {
        self.nodes.get(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ProofNode> + '_ {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn to_snapshot(&self) -> Vec<ProofNode> {
        self.nodes().cloned().collect()
    }

    /// Close `target` with `rule` and append one open leaf per sub-goal.
    ///
    /// Returns the fresh ids in the order of `subgoals`. An empty `subgoals`
    /// closes the node as an axiom.
    pub fn graft_children(
        &mut self,
        target: NodeId,
        rule: Rule,
        subgoals: Vec<Statement>,
    ) -> Result<Vec<NodeId>, TreeError> {
        let node = self
            .nodes
            .get(&target)
            .ok_or(TreeError::NodeNotFound(target))?;
        if let Some(existing) = node.rule {
            return Err(TreeError::AlreadyClosed {
                node: target,
                rule: existing,
            });
        }

        let ids: Vec<NodeId> = subgoals.iter().map(|_| Uuid::new_v4()).collect();
        for (id, statement) in ids.iter().zip(subgoals) {
            self.insert(ProofNode::open(*id, statement));
        }
        if let Some(node) = self.nodes.get_mut(&target) {
            node.rule = Some(rule);
            node.premisses = ids.clone();
        }
        self.revision += 1;

        tracing::debug!(node = %target, rule = %rule, children = ids.len(), "grafted rule application");
        Ok(ids)
    }

    /// The unique node listing `id` among its premises.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes()
            .find(|n| n.premisses.contains(&id))
            .map(|n| n.name)
    }

    /// All transitive premises of `id` in depth-first pre-order, excluding
    /// `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_descendants(id, &mut out, &mut seen);
        out
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>, seen: &mut HashSet<NodeId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        for premiss in &node.premisses {
            if seen.insert(*premiss) {
                out.push(*premiss);
                self.collect_descendants(*premiss, out, seen);
            }
        }
    }

    /// Undo the rule application that produced `id`.
    ///
    /// The whole premise set of the parent goes away, not only `id`'s own
    /// subtree, and the parent becomes an open goal again. Returns the removed
    /// ids.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, DeleteRejection> {
        let rejection = if id == self.root {
            Some(DeleteRejection::Root)
        } else if id == self.focus {
            Some(DeleteRejection::Focused(id))
        } else if !self.nodes.contains_key(&id) {
            Some(DeleteRejection::NodeNotFound(id))
        } else {
            None
        };
        if let Some(rejection) = rejection {
            tracing::warn!(node = %id, reason = %rejection, "delete rejected");
            return Err(rejection);
        }

        let Some(parent) = self.parent_of(id) else {
            tracing::warn!(node = %id, "delete rejected: node has no parent");
            return Err(DeleteRejection::NoParent(id));
        };

        let removed = self.descendants(parent);
        let doomed: HashSet<NodeId> = removed.iter().copied().collect();
        for gone in &removed {
            self.nodes.remove(gone);
        }
        self.order.retain(|n| !doomed.contains(n));
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.rule = None;
            node.premisses.clear();
        }
        if doomed.contains(&self.focus) {
            self.focus = parent;
        }
        self.revision += 1;

        tracing::debug!(node = %id, parent = %parent, removed = removed.len(), "deleted subtree");
        Ok(removed)
    }

    /// A node is complete when it has a rule and every premise is complete.
    /// Unknown ids are never complete.
    pub fn is_complete(&self, id: NodeId) -> bool {
        match self.nodes.get(&id) {
            Some(node) => {
                node.rule.is_some() && node.premisses.iter().all(|p| self.is_complete(*p))
            }
            None => false,
        }
    }

    pub fn is_root_complete(&self) -> bool {
        self.is_complete(self.root)
    }

    /// Open goals below (and including) `id`, left to right.
    pub fn open_goals(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.nodes.get(&id).is_some_and(ProofNode::is_open) {
            out.push(id);
        }
        for d in self.descendants(id) {
            if self.nodes.get(&d).is_some_and(ProofNode::is_open) {
                out.push(d);
            }
        }
        out
    }

    /// Zoom the view onto `id`. Not a structural change.
    pub fn set_focus(&mut self, id: NodeId) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::NodeNotFound(id));
        }
        self.focus = id;
        Ok(())
    }

    pub fn focus_root(&mut self) {
        self.focus = self.root;
    }

    /// Resolve a node by a unique prefix of its id (as typed in the session).
    pub fn resolve_prefix(&self, prefix: &str) -> Option<NodeId> {
        let prefix = prefix.to_ascii_lowercase();
        let mut matches = self
            .order
            .iter()
            .filter(|id| id.to_string().starts_with(&prefix));
        let first = matches.next().copied();
        match matches.next() {
            Some(_) => None,
            None => first,
        }
    }

    /// The `/api/add_tree` payload, available once the root is complete.
    pub fn to_tree_request(&self) -> Option<CreateTreeRequest> {
        if !self.is_root_complete() {
            return None;
        }
        let nodes = self
            .nodes()
            .map(|n| {
                n.rule.map(|rule| TreeNode {
                    name: n.name,
                    statement: n.statement.clone(),
                    rule,
                    premisses: n.premisses.clone(),
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(CreateTreeRequest {
            root_id: self.root,
            nodes,
        })
    }
}
