//! Lazy rewrite/resolution engine.
//!
//! [`Rewriter::rewrite`] expands a logical formula against the belief base
//! into every `(rewritten formula, unifier)` pair that could make it hold.
//! It is a Horn-clause consequence finder that keeps the *formula* each
//! derivation depends on instead of answering yes or no: tracked (range)
//! facts stay in the formula, untracked facts become `true`, rules are
//! replaced by their rewritten bodies.
//!
//! Results are produced lazily. Conjunctions never build the full
//! left-by-right product; disjunctions evaluate each side against the
//! caller's unifier; weak negation scopes its bindings to itself.

use std::collections::HashSet;
use std::fmt;
use std::iter;

use crate::actions::InternalActions;
use crate::error::GroundingError;
use crate::range::RangeRegistry;
use crate::store::{BeliefBase, BeliefEntry};
use crate::syntax::{Literal, LogicalFormula, RelOp, Term};
use crate::unifier::Unifier;

/// A rewritten formula together with the unifier that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RewriteUnifier {
    formula: LogicalFormula,
    unifier: Unifier,
}

impl RewriteUnifier {
    /// Pairs a formula with a unifier.
    #[must_use]
    pub fn new(formula: LogicalFormula, unifier: Unifier) -> Self {
        Self { formula, unifier }
    }

    /// The rewritten formula.
    #[must_use]
    pub const fn formula(&self) -> &LogicalFormula {
        &self.formula
    }

    /// The resulting unifier.
    #[must_use]
    pub const fn unifier(&self) -> &Unifier {
        &self.unifier
    }

    /// Splits into formula and unifier.
    #[must_use]
    pub fn into_parts(self) -> (LogicalFormula, Unifier) {
        (self.formula, self.unifier)
    }
}

impl fmt::Display for RewriteUnifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with {}", self.formula, self.unifier)
    }
}

/// Lazy sequence of rewrite consequences.
pub type Consequences<'a> = Box<dyn Iterator<Item = Result<RewriteUnifier, GroundingError>> + 'a>;

fn single<'a>(formula: LogicalFormula, unifier: Unifier) -> Consequences<'a> {
    Box::new(iter::once(Ok(RewriteUnifier::new(formula, unifier))))
}

fn failure<'a>(err: GroundingError) -> Consequences<'a> {
    Box::new(iter::once(Err(err)))
}

fn nothing<'a>() -> Consequences<'a> {
    Box::new(iter::empty())
}

/// Evaluates a relational expression, returning the extended unifier when it holds.
pub fn eval_rel(op: RelOp, lhs: &Term, rhs: &Term, unifier: &Unifier) -> Result<Option<Unifier>, GroundingError> {
    if op == RelOp::Unify {
        let mut u = unifier.clone();
        return Ok(u.unify_terms(lhs, rhs).then_some(u));
    }
    let a = unifier.apply_term(lhs);
    let b = unifier.apply_term(rhs);
    let holds = match op {
        RelOp::Eq => a == b,
        RelOp::Ne => a != b,
        _ => {
            if !a.is_ground() || !b.is_ground() {
                return Err(GroundingError::non_ground(format!("{a} {} {b}", op.symbol())));
            }
            let ord = match (&a, &b) {
                (Term::Int(x), Term::Int(y)) => x.cmp(y),
                _ => a.cmp(&b),
            };
            match op {
                RelOp::Lt => ord.is_lt(),
                RelOp::Le => ord.is_le(),
                RelOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }
        }
    };
    Ok(holds.then(|| unifier.clone()))
}

/// Nested lazy flat-map over `lhs & rhs`, left-major.
struct Conjunction<'a> {
    rewriter: Rewriter<'a>,
    rhs: LogicalFormula,
    left: Consequences<'a>,
    current: Option<(LogicalFormula, Consequences<'a>)>,
}

impl Iterator for Conjunction<'_> {
    type Item = Result<RewriteUnifier, GroundingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((left_formula, right)) = self.current.as_mut() {
                if let Some(item) = right.next() {
                    let left_formula = left_formula.clone();
                    return Some(item.map(|r| {
                        let (formula, unifier) = r.into_parts();
                        RewriteUnifier::new(LogicalFormula::and(left_formula, formula), unifier)
                    }));
                }
            }
            match self.left.next()? {
                Ok(left) => {
                    let (formula, unifier) = left.into_parts();
                    let right = self.rewriter.rewrite(&self.rhs, &unifier);
                    self.current = Some((formula, right));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Context bundle for rewriting: belief base, tracked literals and internal actions.
#[derive(Clone, Copy)]
pub struct Rewriter<'a> {
    beliefs: &'a dyn BeliefBase,
    ranges: &'a RangeRegistry,
    actions: &'a InternalActions,
}

impl fmt::Debug for Rewriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rewriter")
            .field("ranges", &self.ranges.len())
            .field("actions", self.actions)
            .finish_non_exhaustive()
    }
}

impl<'a> Rewriter<'a> {
    /// Creates a rewriter over the given collaborators.
    #[must_use]
    pub fn new(beliefs: &'a dyn BeliefBase, ranges: &'a RangeRegistry, actions: &'a InternalActions) -> Self {
        Self {
            beliefs,
            ranges,
            actions,
        }
    }

    /// Every consequence of `formula` under `unifier`, lazily.
    ///
    /// Each call starts a fresh sequence.
    #[must_use]
    pub fn rewrite(&self, formula: &LogicalFormula, unifier: &Unifier) -> Consequences<'a> {
        let rw = *self;
        match formula {
            LogicalFormula::True => single(LogicalFormula::True, unifier.clone()),
            LogicalFormula::False => single(LogicalFormula::False, unifier.clone()),
            LogicalFormula::Rel { op, lhs, rhs } => match eval_rel(*op, lhs, rhs, unifier) {
                Ok(Some(u)) => single(LogicalFormula::True, u),
                Ok(None) => nothing(),
                Err(e) => failure(e),
            },
            LogicalFormula::Internal(call) => match self.actions.solve(call, unifier) {
                Ok(solutions) => Box::new(
                    solutions
                        .into_iter()
                        .map(|u| Ok(RewriteUnifier::new(LogicalFormula::True, u))),
                ),
                Err(e) => failure(e),
            },
            LogicalFormula::Var(name) => match unifier.apply_formula(formula) {
                LogicalFormula::Var(_) => failure(GroundingError::UnboundFormulaVariable { name: name.clone() }),
                bound => self.rewrite(&bound, unifier),
            },
            LogicalFormula::Literal(lit) => self.rewrite_literal(lit, unifier),
            LogicalFormula::And(lhs, rhs) => Box::new(Conjunction {
                rewriter: rw,
                rhs: (**rhs).clone(),
                left: self.rewrite(lhs, unifier),
                current: None,
            }),
            LogicalFormula::Or(lhs, rhs) => {
                let rhs = (**rhs).clone();
                let original = unifier.clone();
                Box::new(
                    self.rewrite(lhs, unifier)
                        .chain(iter::once_with(move || rw.rewrite(&rhs, &original)).flatten()),
                )
            }
            LogicalFormula::Not(inner) => self.rewrite_not(inner, unifier),
        }
    }

    fn rewrite_not(&self, inner: &LogicalFormula, unifier: &Unifier) -> Consequences<'a> {
        let forked = unifier.clone();
        let mut branches = Vec::new();
        for item in self.rewrite(inner, &forked) {
            match item {
                Ok(ru) => branches.push(ru.formula),
                Err(e) => return failure(e),
            }
        }
        if branches.is_empty() {
            return single(LogicalFormula::True, unifier.clone());
        }
        single(
            LogicalFormula::not(LogicalFormula::disjunction(branches)),
            unifier.clone(),
        )
    }

    fn rewrite_literal(&self, literal: &Literal, unifier: &Unifier) -> Consequences<'a> {
        let query = unifier.apply_literal(literal);
        let candidates = match self.beliefs.candidates(&query, unifier) {
            Ok(c) => c,
            Err(e) => return failure(e.into()),
        };
        let rw = *self;
        let caller = unifier.clone();
        let mut seen = HashSet::new();
        Box::new(
            candidates
                .into_iter()
                .flat_map(move |entry| rw.resolve_candidate(entry, &query, &caller))
                .filter(move |item| match item {
                    Ok(ru) => seen.insert(ru.clone()),
                    Err(_) => true,
                }),
        )
    }

    fn resolve_candidate(&self, entry: BeliefEntry, query: &Literal, caller: &Unifier) -> Consequences<'a> {
        match entry {
            BeliefEntry::Fact(fact) => {
                let mut u = caller.clone();
                if !u.unify_literals(query, &fact) {
                    return nothing();
                }
                let fact = fact.without_annots();
                let formula = if self.ranges.contains(&fact) {
                    LogicalFormula::Literal(fact)
                } else {
                    LogicalFormula::True
                };
                single(formula, u)
            }
            BeliefEntry::Rule(rule) => {
                let rule = rule.rename_apart();
                let mut head_match = Unifier::new();
                if !head_match.unify_literals(&rule.head, query) {
                    return nothing();
                }
                let head = rule.head;
                let query = query.clone();
                let caller = caller.clone();
                Box::new(self.rewrite(&rule.body, &head_match).filter_map(move |item| {
                    let ru = match item {
                        Ok(ru) => ru,
                        Err(e) => return Some(Err(e)),
                    };
                    let formula = ru.unifier.apply_formula(&ru.formula);
                    let instantiated = ru.unifier.apply_literal(&head);
                    let mut u = caller.clone();
                    u.unify_literals(&query, &instantiated)
                        .then(|| Ok(RewriteUnifier::new(formula, u)))
                }))
            }
        }
    }

    /// Collects every distinct consequence in order, aborting on the first error.
    pub fn consequences(&self, formula: &LogicalFormula, unifier: &Unifier) -> Result<Vec<RewriteUnifier>, GroundingError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for item in self.rewrite(formula, unifier) {
            let ru = item?;
            if seen.insert(ru.clone()) {
                out.push(ru);
            }
        }
        Ok(out)
    }
}
