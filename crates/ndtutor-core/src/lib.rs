//! ndtutor core: the client-side model of a natural-deduction proof session.
//!
//! ```text
//! ┌────────────────┐  MappingBuilder  ┌────────────────┐  /api/apply
//! │ DerivationRule │ ───────────────► │   reconcile    │ ─────────────► backend
//! └────────────────┘                  │ prepare/commit │ ◄───────────── Statement[]
//!                                     └───────┬────────┘
//!                                             │ graft_children
//!                                             ▼
//!                                     ┌────────────────┐  export_typst  ┌───────┐
//!                                     │   ProofTree    │ ─────────────► │ Typst │
//!                                     └────────────────┘                └───────┘
//! ```
//!
//! Parsing, rule unification and tautology checking live in the backend; this
//! crate only holds the values it returns and the tree built from them.

pub mod catalog;
pub mod export;
pub mod formula;
pub mod mapping;
pub mod models;
pub mod reconcile;
pub mod rule;
pub mod tree;

pub use export::{export_typst, formula_to_typst, ExportError};
pub use formula::{Formula, Identifier, SideCondition, Statement};
pub use mapping::{MappingBuilder, MappingError, Slot};
pub use models::*;
pub use reconcile::{apply_rule, ApplyError, PendingApplication, RuleApplier};
pub use rule::{DerivationRule, Rule, RuleFormula, RuleIdentifier, RuleStatement};
pub use tree::{DeleteRejection, NodeId, ProofNode, ProofTree, TreeError, DEFAULT_ROOT_ID};
