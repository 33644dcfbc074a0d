//! Abstract belief-base and plan-library traits.
//!
//! These traits are the contract between the epistemic core and the agent
//! runtime that owns beliefs and plans. The in-memory backends in
//! [`super::memory`] are the reference implementation; the epistemic query
//! adapter is itself a [`BeliefBase`] wrapping another one.

use std::fmt;

use thiserror::Error;

use crate::error::ReasonerError;
use crate::syntax::{Literal, Plan, Rule, Trigger};
use crate::unifier::Unifier;

/// Errors that can occur during belief-base or plan-library operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend error (poisoned locks and similar).
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A non-ground fact was added where only ground facts are accepted.
    #[error("Fact must be ground: {0}")]
    NonGroundFact(String),

    /// A modality literal that cannot be turned into a reasoner query.
    #[error("Invalid epistemic query: {0}")]
    InvalidQuery(String),

    /// The reasoner behind an epistemic lookup failed.
    #[error("Epistemic lookup failed: {0}")]
    Reasoner(#[from] ReasonerError),
}

/// One stored belief: a fact or a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BeliefEntry {
    /// A ground fact.
    Fact(Literal),
    /// A rule whose head may be derived from its body.
    Rule(Rule),
}

impl BeliefEntry {
    /// The fact itself, or the rule head.
    #[must_use]
    pub fn head(&self) -> &Literal {
        match self {
            Self::Fact(lit) => lit,
            Self::Rule(rule) => &rule.head,
        }
    }

    /// Returns true for rules.
    #[must_use]
    pub const fn is_rule(&self) -> bool {
        matches!(self, Self::Rule(_))
    }
}

impl From<Literal> for BeliefEntry {
    fn from(lit: Literal) -> Self {
        Self::Fact(lit)
    }
}

impl From<Rule> for BeliefEntry {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl fmt::Display for BeliefEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact(lit) => write!(f, "{lit}."),
            Self::Rule(rule) => write!(f, "{rule}"),
        }
    }
}

/// Storage trait for facts and rules.
///
/// # Safety Considerations
/// - Implementations must be safe to share between threads
/// - Lookups never mutate; a poisoned lock is reported, not unwrapped
pub trait BeliefBase: Send + Sync {
    /// Facts and rules whose head could unify with `literal` under `unifier`.
    ///
    /// Implementations may over-approximate (the caller unifies), but must
    /// never omit an entry with the same functor, arity, sign and namespace.
    fn candidates(&self, literal: &Literal, unifier: &Unifier) -> Result<Vec<BeliefEntry>, StoreError>;

    /// Rules whose head shares functor, arity and sign with `literal`.
    ///
    /// Backends with a separate rule index should override this; the default
    /// filters [`BeliefBase::candidates`].
    fn rules(&self, literal: &Literal) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .candidates(literal, &Unifier::new())?
            .into_iter()
            .filter_map(|entry| match entry {
                BeliefEntry::Rule(rule) => Some(rule),
                BeliefEntry::Fact(_) => None,
            })
            .collect())
    }

    /// Adds a fact or rule. Returns false if it was already present.
    fn add(&self, entry: BeliefEntry) -> Result<bool, StoreError>;

    /// Removes the fact equal to `literal` (annotations ignored).
    /// Returns false if no such fact existed.
    fn remove(&self, literal: &Literal) -> Result<bool, StoreError>;

    /// Returns true if the fact is present (annotations ignored).
    fn contains(&self, literal: &Literal) -> Result<bool, StoreError>;

    /// Every stored entry in insertion order.
    fn snapshot(&self) -> Result<Vec<BeliefEntry>, StoreError>;

    /// Number of stored entries.
    fn len(&self) -> Result<usize, StoreError>;

    /// Returns true if nothing is stored.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// A relevant plan together with the unifier binding its trigger to an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanOption {
    /// The plan, renamed apart from every other option.
    pub plan: Plan,
    /// Bindings from matching the trigger.
    pub unifier: Unifier,
}

/// Storage trait for plans.
pub trait PlanLibrary: Send + Sync {
    /// Adds a plan.
    fn add(&self, plan: Plan) -> Result<(), StoreError>;

    /// Every plan whose trigger matches `trigger` (same operator and kind,
    /// unifiable literal), renamed apart, with the matching unifier.
    fn relevant(&self, trigger: &Trigger) -> Result<Vec<PlanOption>, StoreError>;

    /// Every stored plan in insertion order.
    fn plans(&self) -> Result<Vec<Plan>, StoreError>;
}
