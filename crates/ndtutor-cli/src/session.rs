//! One exercise being proved interactively.
//!
//! ```text
//!   user command ──► Session ──► Backend (/api/parse, /api/apply, ...)
//!                       │
//!                       ├──► ProofTree (graft / delete / focus)
//!                       └──► LocalStore (completed, snapshot, feedback)
//! ```
//!
//! When the root becomes complete the session records the exercise as
//! completed, stores the finished tree and reports it to the backend. Only the
//! local bookkeeping can fail the command; the telemetry call is best effort.

use std::sync::Arc;

use async_trait::async_trait;
use ndtutor_client::{ApiClient, ClientError};
use ndtutor_core::export::export_typst;
use ndtutor_core::mapping::Slot;
use ndtutor_core::{
    apply_rule, ApplyError, CreateTreeRequest, DeleteRejection, DerivationRule, ExerciseId,
    ExportError, Feedback, Formula, Identifier, MappingBuilder, MappingError, NodeId, ProofTree,
    Rule, RuleApplier, Statement, Tipp, TreeError, DEFAULT_ROOT_ID,
};
use ndtutor_storage::{LocalStore, StorageError};

// ============================================================================
// Backend seam
// ============================================================================

/// Backend calls a session needs beyond rule application.
#[async_trait]
pub trait Backend: RuleApplier {
    fn as_applier(&self) -> &dyn RuleApplier;
    async fn parse(&self, formula: &str) -> Result<Formula, ClientError>;
    async fn check(&self, statement: &Statement) -> Result<bool, ClientError>;
    async fn hint(&self, statement: &Statement) -> Result<Vec<Tipp>, ClientError>;
    async fn add_tree(&self, request: &CreateTreeRequest) -> Result<(), ClientError>;
    async fn feedback(&self, exercise: ExerciseId, feedback: &Feedback) -> Result<(), ClientError>;
}

#[async_trait]
impl Backend for ApiClient {
    fn as_applier(&self) -> &dyn RuleApplier {
        self
    }

    async fn parse(&self, formula: &str) -> Result<Formula, ClientError> {
        ApiClient::parse(self, formula).await
    }

    async fn check(&self, statement: &Statement) -> Result<bool, ClientError> {
        ApiClient::check(self, statement).await
    }

    async fn hint(&self, statement: &Statement) -> Result<Vec<Tipp>, ClientError> {
        ApiClient::hint(self, statement).await
    }

    async fn add_tree(&self, request: &CreateTreeRequest) -> Result<(), ClientError> {
        ApiClient::add_tree(self, request).await
    }

    async fn feedback(&self, exercise: ExerciseId, feedback: &Feedback) -> Result<(), ClientError> {
        ApiClient::feedback(self, exercise, feedback).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no node matches `{0}`")]
    NoSuchNode(String),
    #[error("rule {0} is not offered by the backend")]
    UnknownRule(Rule),
    #[error("{} still needs a binding for {}", .0.rule, .0.slots.join(", "))]
    MissingBindings(Box<Candidates>),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("cannot delete: {0}")]
    Delete(#[from] DeleteRejection),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Unbound placeholders of a rule and what the target statement offers to
/// fill them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidates {
    pub rule: Rule,
    /// In binding order; the first one is bound next.
    pub slots: Vec<String>,
    /// Hypotheses, the goal and the identifier atoms of the statement.
    pub formulas: Vec<Formula>,
    /// Element variables occurring in the statement.
    pub elements: Vec<Identifier>,
}

/// Reported once when the root becomes complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// No feedback has been given for this exercise yet.
    pub ask_feedback: bool,
}

// ============================================================================
// Session
// ============================================================================

pub struct Session {
    exercise: ExerciseId,
    tree: ProofTree,
    rules: Vec<DerivationRule>,
    backend: Arc<dyn Backend>,
    store: Arc<LocalStore>,
    finished: bool,
}

impl Session {
    pub fn new(
        exercise: ExerciseId,
        statement: Statement,
        rules: Vec<DerivationRule>,
        backend: Arc<dyn Backend>,
        store: Arc<LocalStore>,
    ) -> Self {
        Self {
            exercise,
            tree: ProofTree::new(DEFAULT_ROOT_ID, statement),
            rules,
            backend,
            store,
            finished: false,
        }
    }

    pub fn exercise(&self) -> ExerciseId {
        self.exercise
    }

    pub fn tree(&self) -> &ProofTree {
        &self.tree
    }

    pub fn rules(&self) -> &[DerivationRule] {
        &self.rules
    }

    pub fn rule(&self, name: Rule) -> Option<&DerivationRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// `root`, `.` (the focused node) or a unique id prefix.
    pub fn resolve(&self, reference: &str) -> Result<NodeId, SessionError> {
        match reference {
            "root" => Ok(self.tree.root_id()),
            "." => Ok(self.tree.focus()),
            prefix => self
                .tree
                .resolve_prefix(prefix)
                .ok_or_else(|| SessionError::NoSuchNode(prefix.to_string())),
        }
    }

    pub fn focus(&mut self, node: NodeId) -> Result<(), SessionError> {
        Ok(self.tree.set_focus(node)?)
    }

    pub fn focus_root(&mut self) {
        self.tree.focus_root();
    }

    /// Apply `rule` to `target`, binding the rule's placeholders to
    /// `bindings` in order. Element placeholders take a variable name, formula
    /// placeholders are parsed by the backend.
    pub async fn apply(
        &mut self,
        target: NodeId,
        rule: Rule,
        bindings: &[String],
    ) -> Result<Option<Completion>, SessionError> {
        let schema = self.rule(rule).ok_or(SessionError::UnknownRule(rule))?;
        let mut builder = MappingBuilder::new(schema);
        for raw in bindings {
            let formula = match builder.next_slot() {
                None => return Err(MappingError::Full(rule).into()),
                Some(Slot::Element(_)) => Formula::Ident(Identifier::element(raw.trim())),
                Some(Slot::Formula(_)) => self.backend.parse(raw).await?,
            };
            builder.pick(formula)?;
        }
        if !builder.is_complete() {
            let statement = self.node_statement(target)?;
            return Err(SessionError::MissingBindings(Box::new(candidates(
                &builder, &statement,
            ))));
        }

        apply_rule(&mut self.tree, self.backend.as_applier(), target, &builder).await?;
        self.finish_if_complete().await
    }

    /// Placeholders `rule` needs at `target` and the bindings on offer.
    pub fn candidates(&self, target: NodeId, rule: Rule) -> Result<Candidates, SessionError> {
        let schema = self.rule(rule).ok_or(SessionError::UnknownRule(rule))?;
        let statement = self.node_statement(target)?;
        Ok(candidates(&MappingBuilder::new(schema), &statement))
    }

    pub fn delete(&mut self, node: NodeId) -> Result<Vec<NodeId>, SessionError> {
        let removed = self.tree.delete_subtree(node)?;
        if !self.tree.is_root_complete() {
            self.finished = false;
        }
        Ok(removed)
    }

    pub async fn check(&self, node: NodeId) -> Result<bool, SessionError> {
        let statement = &self.node_statement(node)?;
        Ok(self.backend.check(statement).await?)
    }

    pub async fn hint(&self, node: NodeId) -> Result<Vec<Tipp>, SessionError> {
        let statement = &self.node_statement(node)?;
        Ok(self.backend.hint(statement).await?)
    }

    pub fn export(&self) -> Result<String, SessionError> {
        Ok(export_typst(&self.tree, self.tree.root_id())?)
    }

    pub async fn send_feedback(&self, feedback: Feedback) -> Result<(), SessionError> {
        self.backend.feedback(self.exercise, &feedback).await?;
        self.store.add_feedback(self.exercise)?;
        Ok(())
    }

    fn node_statement(&self, node: NodeId) -> Result<Statement, SessionError> {
        self.tree
            .node(node)
            .map(|n| n.statement.clone())
            .ok_or(SessionError::Tree(TreeError::NodeNotFound(node)))
    }

    /// Run the completion side effects the first time the root is complete.
    async fn finish_if_complete(&mut self) -> Result<Option<Completion>, SessionError> {
        if self.finished || !self.tree.is_root_complete() {
            return Ok(None);
        }
        self.finished = true;

        self.store.add_completed(self.exercise)?;
        self.store
            .save_tree(self.tree.root_id(), &self.tree.to_snapshot())?;
        if let Some(request) = self.tree.to_tree_request() {
            if let Err(err) = self.backend.add_tree(&request).await {
                tracing::warn!(exercise = %self.exercise, error = %err, "failed to report finished proof");
            }
        }
        tracing::info!(exercise = %self.exercise, nodes = self.tree.len(), "proof complete");

        Ok(Some(Completion {
            ask_feedback: !self.store.has_feedback(self.exercise)?,
        }))
    }
}

fn candidates(builder: &MappingBuilder, statement: &Statement) -> Candidates {
    let placeholders = statement.placeholders();
    let atoms = placeholders
        .iter()
        .filter(|id| !id.is_element())
        .map(|id| Formula::Ident(id.clone()));

    let mut formulas: Vec<Formula> = Vec::new();
    for formula in statement
        .lhs
        .iter()
        .cloned()
        .chain(std::iter::once(statement.formula.clone()))
        .chain(atoms)
    {
        if !formulas.contains(&formula) {
            formulas.push(formula);
        }
    }

    Candidates {
        rule: builder.rule(),
        slots: builder.remaining().iter().map(ToString::to_string).collect(),
        formulas,
        elements: placeholders.into_iter().filter(|id| id.is_element()).collect(),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use ndtutor_storage::StoreConfig;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn session(backend: Arc<FakeBackend>) -> (Session, Arc<LocalStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalStore::open(StoreConfig::new(dir.path())).unwrap());
        let session = Session::new(Uuid::new_v4(), goal(), rules(), backend, store.clone());
        (session, store, dir)
    }

    #[tokio::test]
    async fn completing_the_proof_runs_side_effects_once() {
        let backend = Arc::new(FakeBackend::default());
        let (mut session, store, _dir) = session(backend.clone());
        let root = session.tree().root_id();

        let bindings = ["A".to_string(), "true".to_string()];
        assert_eq!(session.apply(root, Rule::AndIntro, &bindings).await.unwrap(), None);
        let kids = session.tree().root().premisses.clone();
        assert_eq!(session.apply(kids[0], Rule::Ax, &["A".into()]).await.unwrap(), None);

        let done = session.apply(kids[1], Rule::Ax, &["true".into()]).await.unwrap();
        assert_eq!(done, Some(Completion { ask_feedback: true }));

        assert!(store.is_completed(session.exercise()).unwrap());
        let saved = store.load_tree().unwrap().unwrap();
        assert_eq!(saved.to_snapshot(), session.tree().to_snapshot());
        assert_eq!(backend.trees.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn telemetry_failure_is_not_fatal() {
        let backend = Arc::new(FakeBackend {
            fail_telemetry: true,
            ..FakeBackend::default()
        });
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalStore::open(StoreConfig::new(dir.path())).unwrap());
        let mut session = Session::new(
            Uuid::new_v4(),
            Statement::new(vec![Formula::letter("A")], Formula::letter("A")),
            rules(),
            backend,
            store.clone(),
        );
        let root = session.tree().root_id();
        let done = session.apply(root, Rule::Ax, &["A".into()]).await.unwrap();
        assert!(done.is_some());
        assert!(store.is_completed(session.exercise()).unwrap());
    }

    #[tokio::test]
    async fn feedback_is_remembered() {
        let backend = Arc::new(FakeBackend::default());
        let (session, store, _dir) = session(backend.clone());
        let feedback = Feedback {
            like: false,
            difficulty: Some(8),
        };
        session.send_feedback(feedback.clone()).await.unwrap();
        assert!(store.has_feedback(session.exercise()).unwrap());
        assert_eq!(
            backend.feedback.lock().unwrap().as_slice(),
            &[(session.exercise(), feedback)]
        );
    }

    #[tokio::test]
    async fn refused_rule_keeps_goal_open() {
        let (mut session, _store, _dir) = session(Arc::new(FakeBackend::default()));
        let root = session.tree().root_id();
        // OrElim is not in the rule set.
        let err = session.apply(root, Rule::OrElim, &[]).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownRule(Rule::OrElim)));

        let err = session
            .apply(root, Rule::AndIntro, &["A".into()])
            .await
            .unwrap_err();
        match err {
            SessionError::MissingBindings(candidates) => assert_eq!(candidates.slots, vec!["B"]),
            other => panic!("expected missing bindings, got {other:?}"),
        }
        assert!(session.tree().root().is_open());
    }

    #[test]
    fn candidates_come_from_the_target_statement() {
        let (mut session, _store, _dir) = session(Arc::new(FakeBackend::default()));
        let x = Identifier::element("x");
        let px = Formula::predicate(Identifier::literal("P"), vec![x.clone()]);
        let hyp = Formula::exists(x.clone(), px);
        let goal = Formula::and(Formula::letter("A"), Formula::True);
        session.tree = ProofTree::new(DEFAULT_ROOT_ID, Statement::new(vec![hyp.clone()], goal.clone()));

        let candidates = session.candidates(DEFAULT_ROOT_ID, Rule::AndIntro).unwrap();
        assert_eq!(candidates.rule, Rule::AndIntro);
        assert_eq!(candidates.slots, vec!["A", "B"]);
        assert_eq!(candidates.formulas, vec![hyp, goal, Formula::letter("A")]);
        assert_eq!(candidates.elements, vec![x]);

        assert!(matches!(
            session.candidates(DEFAULT_ROOT_ID, Rule::OrElim),
            Err(SessionError::UnknownRule(Rule::OrElim))
        ));
    }

    #[tokio::test]
    async fn deleting_reopens_completion() {
        let backend = Arc::new(FakeBackend::default());
        let (mut session, _store, _dir) = session(backend.clone());
        let root = session.tree().root_id();
        session
            .apply(root, Rule::AndIntro, &["A".into(), "true".into()])
            .await
            .unwrap();
        let kids = session.tree().root().premisses.clone();
        session.apply(kids[0], Rule::Ax, &["A".into()]).await.unwrap();
        session.apply(kids[1], Rule::Ax, &["true".into()]).await.unwrap();

        session.delete(kids[0]).unwrap();
        assert!(session.tree().root().is_open());
        session
            .apply(root, Rule::AndIntro, &["A".into(), "true".into()])
            .await
            .unwrap();
        let kids = session.tree().root().premisses.clone();
        session.apply(kids[0], Rule::Ax, &["A".into()]).await.unwrap();
        let again = session.apply(kids[1], Rule::Ax, &["true".into()]).await.unwrap();
        assert!(again.is_some());
        assert_eq!(backend.trees.lock().unwrap().len(), 2);
    }

    #[test]
    fn resolve_references() {
        let (session, _store, _dir) = session(Arc::new(FakeBackend::default()));
        assert_eq!(session.resolve("root").unwrap(), DEFAULT_ROOT_ID);
        assert_eq!(session.resolve(".").unwrap(), DEFAULT_ROOT_ID);
        assert_eq!(session.resolve("80375c90").unwrap(), DEFAULT_ROOT_ID);
        assert!(matches!(session.resolve("zzz"), Err(SessionError::NoSuchNode(_))));
    }
}
