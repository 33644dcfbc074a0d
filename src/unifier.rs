//! Substitutions over agent-language terms.
//!
//! A [`Unifier`] is an immutable, structurally shared map from variable
//! names to terms. Forking is a `clone()` (an `Arc` bump); the first
//! `bind` on a fork copies the map, so sibling branches never observe each
//! other's bindings.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::syntax::{InternalCall, Literal, LogicalFormula, Plan, Term};

/// Variable bindings produced by unification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Unifier {
    bindings: Arc<BTreeMap<String, Term>>,
}

impl Unifier {
    /// Creates an empty unifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Direct binding of `var`, without following chains.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Term> {
        self.bindings.get(var)
    }

    /// Iterates over the raw bindings in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Term)> {
        self.bindings.iter()
    }

    /// Binds `var` to `term`, replacing any previous binding.
    pub fn bind(&mut self, var: impl Into<String>, term: Term) {
        Arc::make_mut(&mut self.bindings).insert(var.into(), term);
    }

    /// Follows variable chains until an unbound variable or a non-variable term.
    #[must_use]
    pub fn deref(&self, term: &Term) -> Term {
        let mut current = term;
        while let Term::Var(name) = current {
            match self.bindings.get(name) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.clone()
    }

    /// Unifies two terms, extending `self` on success.
    ///
    /// On failure `self` is left unchanged.
    pub fn unify_terms(&mut self, a: &Term, b: &Term) -> bool {
        let mut attempt = self.clone();
        if attempt.unify_inner(a, b) {
            *self = attempt;
            true
        } else {
            false
        }
    }

    /// Unifies two literals: functor, arity, strong negation and namespace
    /// must agree. Annotations do not take part.
    ///
    /// On failure `self` is left unchanged.
    pub fn unify_literals(&mut self, a: &Literal, b: &Literal) -> bool {
        let mut attempt = self.clone();
        if attempt.unify_literal_parts(a, b) {
            *self = attempt;
            true
        } else {
            false
        }
    }

    fn unify_literal_parts(&mut self, a: &Literal, b: &Literal) -> bool {
        if a.functor != b.functor
            || a.terms.len() != b.terms.len()
            || a.negated != b.negated
            || a.namespace != b.namespace
        {
            return false;
        }
        a.terms
            .iter()
            .zip(&b.terms)
            .all(|(x, y)| self.unify_inner(x, y))
    }

    fn unify_inner(&mut self, a: &Term, b: &Term) -> bool {
        let a = self.deref(a);
        let b = self.deref(b);
        match (&a, &b) {
            (Term::Var(x), Term::Var(y)) if x == y => true,
            (Term::Var(x), other) | (other, Term::Var(x)) => {
                let value = self.apply_term(other);
                if occurs(x, &value) {
                    return false;
                }
                self.bind(x.clone(), value);
                true
            }
            (Term::Atom(_) | Term::Struct(_), Term::Atom(_) | Term::Struct(_)) => {
                match (a.as_literal(), b.as_literal()) {
                    (Some(la), Some(lb)) => self.unify_literal_parts(&la, &lb),
                    _ => false,
                }
            }
            (Term::List(xs), Term::List(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.unify_inner(x, y))
            }
            (Term::Arith { .. }, _) | (_, Term::Arith { .. }) => {
                let (fa, fb) = (self.apply_term(&a), self.apply_term(&b));
                if matches!(fa, Term::Arith { .. }) || matches!(fb, Term::Arith { .. }) {
                    fa == fb
                } else {
                    self.unify_inner(&fa, &fb)
                }
            }
            (Term::Formula(_), Term::Formula(_)) => self.apply_term(&a) == self.apply_term(&b),
            _ => a == b,
        }
    }

    /// Applies the substitution to a term, folding arithmetic that becomes ground.
    #[must_use]
    pub fn apply_term(&self, term: &Term) -> Term {
        match term {
            Term::Var(name) => match self.bindings.get(name) {
                Some(bound) => self.apply_term(bound),
                None => term.clone(),
            },
            Term::Atom(_) | Term::Int(_) | Term::Str(_) => term.clone(),
            Term::Struct(lit) => Term::from(self.apply_literal(lit)),
            Term::List(items) => Term::List(items.iter().map(|t| self.apply_term(t)).collect()),
            Term::Arith { op, lhs, rhs } => Term::arith(*op, self.apply_term(lhs), self.apply_term(rhs)),
            Term::Formula(f) => Term::Formula(Box::new(self.apply_formula(f))),
        }
    }

    /// Applies the substitution to a literal's arguments and annotations.
    #[must_use]
    pub fn apply_literal(&self, lit: &Literal) -> Literal {
        Literal {
            namespace: lit.namespace.clone(),
            functor: lit.functor.clone(),
            terms: lit.terms.iter().map(|t| self.apply_term(t)).collect(),
            negated: lit.negated,
            annots: lit.annots.iter().map(|t| self.apply_term(t)).collect(),
        }
    }

    /// Applies the substitution to a formula.
    ///
    /// A formula variable bound to a term that denotes a formula is replaced
    /// by that formula.
    #[must_use]
    pub fn apply_formula(&self, formula: &LogicalFormula) -> LogicalFormula {
        match formula {
            LogicalFormula::True | LogicalFormula::False => formula.clone(),
            LogicalFormula::Literal(lit) => LogicalFormula::from(self.apply_literal(lit)),
            LogicalFormula::Var(name) => match self.bindings.get(name) {
                Some(bound) => match self.apply_term(bound).as_formula() {
                    Some(LogicalFormula::Var(other)) if other == *name => formula.clone(),
                    Some(f) => self.apply_formula(&f),
                    None => formula.clone(),
                },
                None => formula.clone(),
            },
            LogicalFormula::Rel { op, lhs, rhs } => LogicalFormula::Rel {
                op: *op,
                lhs: self.apply_term(lhs),
                rhs: self.apply_term(rhs),
            },
            LogicalFormula::Internal(call) => LogicalFormula::Internal(InternalCall {
                name: call.name.clone(),
                args: call.args.iter().map(|t| self.apply_term(t)).collect(),
            }),
            LogicalFormula::And(a, b) => LogicalFormula::and(self.apply_formula(a), self.apply_formula(b)),
            LogicalFormula::Or(a, b) => LogicalFormula::or(self.apply_formula(a), self.apply_formula(b)),
            LogicalFormula::Not(inner) => LogicalFormula::not(self.apply_formula(inner)),
        }
    }

    /// Applies the substitution to trigger, context and body of a plan.
    #[must_use]
    pub fn apply_plan(&self, plan: &Plan) -> Plan {
        plan.map_literals(|l| self.apply_literal(l), |c| self.apply_formula(c))
    }
}

fn occurs(var: &str, term: &Term) -> bool {
    match term {
        Term::Var(name) => name == var,
        Term::Atom(_) | Term::Int(_) | Term::Str(_) => false,
        Term::Struct(lit) => lit.terms.iter().chain(&lit.annots).any(|t| occurs(var, t)),
        Term::List(items) => items.iter().any(|t| occurs(var, t)),
        Term::Arith { lhs, rhs, .. } => occurs(var, lhs) || occurs(var, rhs),
        Term::Formula(f) => {
            let mut vars = std::collections::BTreeSet::new();
            f.collect_vars(&mut vars);
            vars.contains(var)
        }
    }
}

impl fmt::Display for Unifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var}={term}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_formula, parse_literal, parse_term};

    #[test]
    fn unify_binds_variables() {
        let mut u = Unifier::new();
        let a = parse_literal("loc(X, 2)").unwrap();
        let b = parse_literal("loc(1, Y)").unwrap();
        assert!(u.unify_literals(&a, &b));
        assert_eq!(u.apply_literal(&a).to_string(), "loc(1,2)");
        assert_eq!(u.to_string(), "{X=1, Y=2}");
    }

    #[test]
    fn sign_and_namespace_must_match() {
        let mut u = Unifier::new();
        assert!(!u.unify_literals(&parse_literal("p(X)").unwrap(), &parse_literal("~p(1)").unwrap()));
        assert!(!u.unify_literals(&parse_literal("p(X)").unwrap(), &parse_literal("ns::p(1)").unwrap()));
        assert!(u.is_empty());
    }

    #[test]
    fn annotations_are_ignored() {
        let mut u = Unifier::new();
        assert!(u.unify_literals(
            &parse_literal("seen(X)").unwrap(),
            &parse_literal("seen(a)[source(percept)]").unwrap()
        ));
        assert_eq!(u.get("X"), Some(&Term::atom("a")));
    }

    #[test]
    fn failed_unification_leaves_unifier_untouched() {
        let mut u = Unifier::new();
        let a = parse_literal("p(X, X)").unwrap();
        let b = parse_literal("p(1, 2)").unwrap();
        assert!(!u.unify_literals(&a, &b));
        assert!(u.is_empty());
    }

    #[test]
    fn forks_are_independent() {
        let mut parent = Unifier::new();
        parent.bind("X", Term::Int(1));
        let mut child = parent.clone();
        child.bind("Y", Term::Int(2));
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
    }

    #[test]
    fn arithmetic_folds_after_binding() {
        let mut u = Unifier::new();
        u.bind("X", Term::Int(4));
        let t = parse_term("X * 2 + 1").unwrap();
        assert_eq!(u.apply_term(&t), Term::Int(9));
        assert!(u.unify_terms(&t, &Term::Int(9)));
        assert!(!u.unify_terms(&t, &Term::Int(8)));
    }

    #[test]
    fn occurs_check_rejects_cycles() {
        let mut u = Unifier::new();
        assert!(!u.unify_terms(&Term::var("X"), &parse_term("f(X)").unwrap()));
    }

    #[test]
    fn formula_variable_is_substituted() {
        let mut u = Unifier::new();
        u.bind("F", Term::Formula(Box::new(parse_formula("p & q").unwrap())));
        let applied = u.apply_formula(&parse_formula("F | r").unwrap());
        assert_eq!(applied.to_string(), "((p & q) | r)");
    }
}
