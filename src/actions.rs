//! Internal actions callable from rule bodies and plan contexts.
//!
//! An internal action is a nondeterministic solver: given its arguments and
//! the current unifier it returns every solution unifier. The rewrite
//! engine turns each solution into a `(true, unifier)` consequence.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::GroundingError;
use crate::syntax::{InternalCall, LogicalFormula, Term};
use crate::unifier::Unifier;

/// A nondeterministic built-in predicate.
pub trait InternalAction: Send + Sync {
    /// Every unifier extending `unifier` under which the action succeeds.
    fn solve(&self, args: &[Term], unifier: &Unifier) -> Result<Vec<Unifier>, GroundingError>;
}

fn arg_err(name: &str, reason: impl Into<String>) -> GroundingError {
    GroundingError::InvalidActionArgument {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn expect_arity(name: &str, args: &[Term], arity: usize) -> Result<(), GroundingError> {
    if args.len() == arity {
        Ok(())
    } else {
        Err(arg_err(name, format!("expected {arity} arguments, got {}", args.len())))
    }
}

fn list_arg(name: &str, term: &Term, unifier: &Unifier) -> Result<Vec<Term>, GroundingError> {
    match unifier.apply_term(term) {
        Term::List(items) => Ok(items),
        other => Err(arg_err(name, format!("expected a list, got {other}"))),
    }
}

fn unify_one(unifier: &Unifier, a: &Term, b: &Term) -> Vec<Unifier> {
    let mut u = unifier.clone();
    if u.unify_terms(a, b) {
        vec![u]
    } else {
        Vec::new()
    }
}

/// `.member(X, List)`: one solution per list element unifying with `X`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Member;

impl InternalAction for Member {
    fn solve(&self, args: &[Term], unifier: &Unifier) -> Result<Vec<Unifier>, GroundingError> {
        expect_arity("member", args, 2)?;
        let items = list_arg("member", &args[1], unifier)?;
        Ok(items
            .iter()
            .flat_map(|item| unify_one(unifier, &args[0], item))
            .collect())
    }
}

/// `.ground(T)`: succeeds once if `T` has no free variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ground;

impl InternalAction for Ground {
    fn solve(&self, args: &[Term], unifier: &Unifier) -> Result<Vec<Unifier>, GroundingError> {
        expect_arity("ground", args, 1)?;
        if unifier.apply_term(&args[0]).is_ground() {
            Ok(vec![unifier.clone()])
        } else {
            Ok(Vec::new())
        }
    }
}

/// `.length(List, N)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Length;

impl InternalAction for Length {
    fn solve(&self, args: &[Term], unifier: &Unifier) -> Result<Vec<Unifier>, GroundingError> {
        expect_arity("length", args, 2)?;
        let items = list_arg("length", &args[0], unifier)?;
        let len = i64::try_from(items.len()).map_err(|_| arg_err("length", "list too long"))?;
        Ok(unify_one(unifier, &args[1], &Term::Int(len)))
    }
}

/// `.big_and(Res, List)` / `.big_or(Res, List)`: folds a list of literal
/// terms into one conjunction or disjunction bound to `Res`.
///
/// Members that are unbound or not formulas (numbers, strings, lists) are
/// left out of the fold.
#[derive(Debug, Clone, Copy)]
pub struct BigConnective {
    conjunction: bool,
}

impl BigConnective {
    /// The `.big_and` action.
    #[must_use]
    pub const fn and() -> Self {
        Self { conjunction: true }
    }

    /// The `.big_or` action.
    #[must_use]
    pub const fn or() -> Self {
        Self { conjunction: false }
    }

    const fn name(self) -> &'static str {
        if self.conjunction {
            "big_and"
        } else {
            "big_or"
        }
    }
}

impl InternalAction for BigConnective {
    fn solve(&self, args: &[Term], unifier: &Unifier) -> Result<Vec<Unifier>, GroundingError> {
        let name = self.name();
        expect_arity(name, args, 2)?;
        let mut parts: Vec<LogicalFormula> = Vec::new();
        for item in list_arg(name, &args[1], unifier)? {
            match item.as_formula() {
                Some(part) if item.is_ground() => parts.push(part),
                _ => debug!(action = name, member = %item, "Skipping member that is not a ground formula"),
            }
        }
        let folded = if self.conjunction {
            LogicalFormula::conjunction(parts)
        } else {
            LogicalFormula::disjunction(parts)
        };
        Ok(unify_one(unifier, &args[0], &Term::Formula(Box::new(folded))))
    }
}

/// Registry of internal actions by name (without the leading dot).
#[derive(Clone)]
pub struct InternalActions {
    actions: HashMap<String, Arc<dyn InternalAction>>,
}

impl InternalActions {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// A registry holding the built-in actions.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut actions: HashMap<String, Arc<dyn InternalAction>> = HashMap::new();
        actions.insert("member".to_string(), Arc::new(Member));
        actions.insert("ground".to_string(), Arc::new(Ground));
        actions.insert("length".to_string(), Arc::new(Length));
        actions.insert("big_and".to_string(), Arc::new(BigConnective::and()));
        actions.insert("big_or".to_string(), Arc::new(BigConnective::or()));
        Self { actions }
    }

    /// Registers (or replaces) an action.
    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn InternalAction>) {
        self.actions.insert(name.into(), action);
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Solves a call.
    pub fn solve(&self, call: &InternalCall, unifier: &Unifier) -> Result<Vec<Unifier>, GroundingError> {
        let action = self
            .actions
            .get(&call.name)
            .ok_or_else(|| GroundingError::UnknownAction {
                name: call.name.clone(),
            })?;
        action.solve(&call.args, unifier)
    }
}

impl Default for InternalActions {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for InternalActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.actions.keys().collect();
        names.sort();
        f.debug_struct("InternalActions").field("actions", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_formula, parse_term};

    fn call(src: &str) -> InternalCall {
        match parse_formula(src).unwrap() {
            LogicalFormula::Internal(call) => call,
            other => panic!("not an internal call: {other}"),
        }
    }

    #[test]
    fn member_backtracks_over_elements() {
        let actions = InternalActions::with_builtins();
        let sols = actions.solve(&call(".member(X, [1,2,3])"), &Unifier::new()).unwrap();
        let xs: Vec<_> = sols.iter().map(|u| u.apply_term(&Term::var("X"))).collect();
        assert_eq!(xs, vec![Term::Int(1), Term::Int(2), Term::Int(3)]);
    }

    #[test]
    fn member_respects_existing_bindings() {
        let actions = InternalActions::with_builtins();
        let mut u = Unifier::new();
        u.bind("X", Term::Int(2));
        assert_eq!(actions.solve(&call(".member(X, [1,2,3])"), &u).unwrap().len(), 1);
    }

    #[test]
    fn member_rejects_non_list() {
        let actions = InternalActions::with_builtins();
        let err = actions.solve(&call(".member(X, a)"), &Unifier::new()).unwrap_err();
        assert!(matches!(err, GroundingError::InvalidActionArgument { .. }));
    }

    #[test]
    fn ground_and_length() {
        let actions = InternalActions::with_builtins();
        assert!(actions.solve(&call(".ground(X)"), &Unifier::new()).unwrap().is_empty());
        assert_eq!(actions.solve(&call(".ground(f(a))"), &Unifier::new()).unwrap().len(), 1);

        let sols = actions.solve(&call(".length([a,b], N)"), &Unifier::new()).unwrap();
        assert_eq!(sols[0].apply_term(&Term::var("N")), Term::Int(2));
    }

    #[test]
    fn big_or_binds_a_formula() {
        let actions = InternalActions::with_builtins();
        let sols = actions.solve(&call(".big_or(F, [p, q, ~r])"), &Unifier::new()).unwrap();
        let bound = sols[0].apply_term(&Term::var("F"));
        assert_eq!(bound.to_string(), "(p | (q | ~r))");

        let sols = actions.solve(&call(".big_and(F, [])"), &Unifier::new()).unwrap();
        assert_eq!(sols[0].apply_term(&Term::var("F")), Term::Formula(Box::new(LogicalFormula::True)));
        assert!(parse_term("F").unwrap().is_var());
    }

    #[test]
    fn big_connectives_skip_non_formula_members() {
        let actions = InternalActions::with_builtins();
        let sols = actions
            .solve(&call(".big_and(F, [p, 3, \"s\", Y, q(Z), [a], r])"), &Unifier::new())
            .unwrap();
        assert_eq!(sols.len(), 1);
        assert_eq!(sols[0].apply_term(&Term::var("F")).to_string(), "(p & r)");

        let sols = actions.solve(&call(".big_or(F, [1, 2])"), &Unifier::new()).unwrap();
        assert_eq!(sols[0].apply_term(&Term::var("F")), Term::Formula(Box::new(LogicalFormula::False)));
    }

    #[test]
    fn unknown_action_is_an_error() {
        let actions = InternalActions::empty();
        assert!(!actions.contains("member"));
        let err = actions.solve(&call(".member(X, [1])"), &Unifier::new()).unwrap_err();
        assert!(matches!(err, GroundingError::UnknownAction { name } if name == "member"));
    }
}
