//! Collecting placeholder bindings before a rule application.
//!
//! A rule schema names `Formula(n)` and `Element(x)` placeholders. The user
//! binds them one at a time: every formula placeholder first, then every
//! element placeholder. Element slots only accept a bare element identifier.
//! Submission is possible once every placeholder has exactly one binding; the
//! backend still has the final word on whether the binding is valid.

use std::fmt;

use crate::formula::{Formula, Identifier, Statement};
use crate::models::{ApplyRuleParams, ElementMapping, FormulaMapping};
use crate::rule::{DerivationRule, Rule, RuleIdentifier};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("all placeholders of {0} are already bound")]
    Full(Rule),
    #[error("placeholder {slot} expects an element variable, got {got}")]
    ExpectedElement { slot: String, got: Formula },
    #[error("{missing} placeholder(s) of {rule} still need a binding")]
    Incomplete { rule: Rule, missing: usize },
}

/// The placeholder waiting for the next binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<'a> {
    Formula(u32),
    Element(&'a str),
}

impl fmt::Display for Slot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Formula(n) => write!(f, "{}", RuleIdentifier::Formula(*n)),
            Slot::Element(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MappingBuilder {
    rule: Rule,
    formula_slots: Vec<u32>,
    element_slots: Vec<String>,
    formulas: Vec<FormulaMapping>,
    elements: Vec<ElementMapping>,
}

impl MappingBuilder {
    pub fn new(rule: &DerivationRule) -> Self {
        let mut formula_slots = Vec::new();
        let mut element_slots = Vec::new();
        for id in rule.identifiers() {
            match id {
                RuleIdentifier::Formula(n) => formula_slots.push(n),
                RuleIdentifier::Element(name) => element_slots.push(name),
            }
        }
        Self {
            rule: rule.name,
            formula_slots,
            element_slots,
            formulas: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    fn bound(&self) -> usize {
        self.formulas.len() + self.elements.len()
    }

    fn total(&self) -> usize {
        self.formula_slots.len() + self.element_slots.len()
    }

    pub fn next_slot(&self) -> Option<Slot<'_>> {
        let counter = self.bound();
        if let Some(n) = self.formula_slots.get(counter) {
            return Some(Slot::Formula(*n));
        }
        self.element_slots
            .get(counter - self.formula_slots.len())
            .map(|name| Slot::Element(name.as_str()))
    }

    pub fn is_complete(&self) -> bool {
        self.bound() >= self.total()
    }

    /// Bind the next placeholder to `formula`. On error nothing is bound.
    pub fn pick(&mut self, formula: Formula) -> Result<(), MappingError> {
        match self.next_slot() {
            None => Err(MappingError::Full(self.rule)),
            Some(Slot::Formula(from)) => {
                self.formulas.push(FormulaMapping { from, to: formula });
                Ok(())
            }
            Some(Slot::Element(slot)) => match formula {
                Formula::Ident(Identifier::Element(to)) => {
                    let from = slot.to_string();
                    self.elements.push(ElementMapping { from, to });
                    Ok(())
                }
                other => Err(MappingError::ExpectedElement {
                    slot: slot.to_string(),
                    got: other,
                }),
            },
        }
    }

    pub fn clear(&mut self) {
        self.formulas.clear();
        self.elements.clear();
    }

    /// Placeholders still waiting for a binding, in binding order.
    pub fn remaining(&self) -> Vec<Slot<'_>> {
        let formulas = self
            .formula_slots
            .iter()
            .skip(self.formulas.len())
            .map(|n| Slot::Formula(*n));
        let elements = self
            .element_slots
            .iter()
            .skip(self.elements.len())
            .map(|name| Slot::Element(name.as_str()));
        formulas.chain(elements).collect()
    }

    /// The `/api/apply` request for `statement`, once every slot is bound.
    pub fn to_params(&self, statement: &Statement) -> Result<ApplyRuleParams, MappingError> {
        if !self.is_complete() {
            return Err(MappingError::Incomplete {
                rule: self.rule,
                missing: self.total() - self.bound(),
            });
        }
        Ok(ApplyRuleParams {
            rule: self.rule,
            statement: statement.clone(),
            mapping: self.formulas.clone(),
            substitution: self.elements.clone(),
        })
    }
}
