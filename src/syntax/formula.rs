//! First-order logical formulas, relational expressions and rules.

use std::collections::BTreeSet;
use std::fmt;

use crate::syntax::term::{write_joined, Literal, Renaming, Term};

/// Relational operators usable in rule bodies and plan contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelOp {
    /// `=` unification.
    Unify,
    /// `==` structural identity.
    Eq,
    /// `\==` structural difference.
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl RelOp {
    /// Source-level symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Unify => "=",
            Self::Eq => "==",
            Self::Ne => "\\==",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A call to an internal action, e.g. `.member(X, [1,2])`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InternalCall {
    /// Action name without the leading dot.
    pub name: String,
    /// Arguments.
    pub args: Vec<Term>,
}

impl InternalCall {
    /// Creates a call.
    pub fn new(name: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for InternalCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "(")?;
            write_joined(f, &self.args, ",")?;
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A logical formula over literals, relational expressions and internal actions.
///
/// `Not` is weak negation (negation as failure); strong negation lives on
/// [`Literal::negated`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalFormula {
    /// The constant true.
    True,
    /// The constant false.
    False,
    /// A relational literal.
    Literal(Literal),
    /// A variable used in formula position; must be bound to a formula term.
    Var(String),
    /// A relational expression.
    Rel {
        /// Operator.
        op: RelOp,
        /// Left operand.
        lhs: Term,
        /// Right operand.
        rhs: Term,
    },
    /// An internal action call.
    Internal(InternalCall),
    /// Conjunction.
    And(Box<LogicalFormula>, Box<LogicalFormula>),
    /// Disjunction.
    Or(Box<LogicalFormula>, Box<LogicalFormula>),
    /// Weak negation.
    Not(Box<LogicalFormula>),
}

impl From<Literal> for LogicalFormula {
    fn from(lit: Literal) -> Self {
        if lit.is_true() {
            Self::True
        } else if lit.is_false() {
            Self::False
        } else {
            Self::Literal(lit)
        }
    }
}

impl LogicalFormula {
    /// `lhs & rhs`
    #[must_use]
    pub fn and(lhs: Self, rhs: Self) -> Self {
        Self::And(Box::new(lhs), Box::new(rhs))
    }

    /// `lhs | rhs`
    #[must_use]
    pub fn or(lhs: Self, rhs: Self) -> Self {
        Self::Or(Box::new(lhs), Box::new(rhs))
    }

    /// `not inner`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    /// `lhs <op> rhs`
    #[must_use]
    pub fn rel(op: RelOp, lhs: Term, rhs: Term) -> Self {
        Self::Rel { op, lhs, rhs }
    }

    /// Right-nested disjunction of `items`; `False` when empty.
    #[must_use]
    pub fn disjunction(items: Vec<Self>) -> Self {
        items.into_iter().rev().reduce(|acc, f| Self::or(f, acc)).unwrap_or(Self::False)
    }

    /// Right-nested conjunction of `items`; `True` when empty.
    #[must_use]
    pub fn conjunction(items: Vec<Self>) -> Self {
        items.into_iter().rev().reduce(|acc, f| Self::and(f, acc)).unwrap_or(Self::True)
    }

    /// Returns true if the formula contains no variables.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        match self {
            Self::True | Self::False => true,
            Self::Literal(l) => l.is_ground(),
            Self::Var(_) => false,
            Self::Rel { lhs, rhs, .. } => lhs.is_ground() && rhs.is_ground(),
            Self::Internal(call) => call.args.iter().all(Term::is_ground),
            Self::And(a, b) | Self::Or(a, b) => a.is_ground() && b.is_ground(),
            Self::Not(inner) => inner.is_ground(),
        }
    }

    /// Collects every variable name in the formula.
    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::True | Self::False => {}
            Self::Literal(l) => l.collect_vars(out),
            Self::Var(name) => {
                out.insert(name.clone());
            }
            Self::Rel { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            Self::Internal(call) => call.args.iter().for_each(|t| t.collect_vars(out)),
            Self::And(a, b) | Self::Or(a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Self::Not(inner) => inner.collect_vars(out),
        }
    }

    /// Returns a copy with every variable renamed through `renaming`.
    #[must_use]
    pub fn rename_vars(&self, renaming: &mut Renaming) -> Self {
        match self {
            Self::True | Self::False => self.clone(),
            Self::Literal(l) => Self::Literal(l.rename_vars(renaming)),
            Self::Var(name) => match Term::var(name.clone()).rename_vars(renaming) {
                Term::Var(renamed) => Self::Var(renamed),
                _ => self.clone(),
            },
            Self::Rel { op, lhs, rhs } => Self::Rel {
                op: *op,
                lhs: lhs.rename_vars(renaming),
                rhs: rhs.rename_vars(renaming),
            },
            Self::Internal(call) => Self::Internal(InternalCall {
                name: call.name.clone(),
                args: call.args.iter().map(|t| t.rename_vars(renaming)).collect(),
            }),
            Self::And(a, b) => Self::and(a.rename_vars(renaming), b.rename_vars(renaming)),
            Self::Or(a, b) => Self::or(a.rename_vars(renaming), b.rename_vars(renaming)),
            Self::Not(inner) => Self::not(inner.rename_vars(renaming)),
        }
    }

    /// Boolean absorption, applied recursively.
    ///
    /// Non-ground literals simplify to `False`: a disjunct that could not
    /// be grounded contributes nothing. The result is a fixpoint, so
    /// simplifying twice changes nothing.
    #[must_use]
    pub fn simplify(&self) -> Self {
        match self {
            Self::And(a, b) => match (a.simplify(), b.simplify()) {
                (Self::True, other) | (other, Self::True) => other,
                (Self::False, _) | (_, Self::False) => Self::False,
                (l, r) => Self::and(l, r),
            },
            Self::Or(a, b) => match (a.simplify(), b.simplify()) {
                (Self::False, other) | (other, Self::False) => other,
                (Self::True, _) | (_, Self::True) => Self::True,
                (l, r) => Self::or(l, r),
            },
            Self::Not(inner) => match inner.simplify() {
                Self::True => Self::False,
                Self::False => Self::True,
                other => Self::not(other),
            },
            Self::Literal(l) if !l.is_ground() => Self::False,
            Self::Var(_) => Self::False,
            other => other.clone(),
        }
    }
}

impl fmt::Display for LogicalFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Literal(l) => write!(f, "{l}"),
            Self::Var(name) => write!(f, "{name}"),
            Self::Rel { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Self::Internal(call) => write!(f, "{call}"),
            Self::And(a, b) => write!(f, "({a} & {b})"),
            Self::Or(a, b) => write!(f, "({a} | {b})"),
            Self::Not(inner) => write!(f, "not ({inner})"),
        }
    }
}

/// A Horn-style rule `head :- body`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rule {
    /// Rule head.
    pub head: Literal,
    /// Rule body.
    pub body: LogicalFormula,
}

impl Rule {
    /// Creates a rule.
    #[must_use]
    pub fn new(head: Literal, body: LogicalFormula) -> Self {
        Self { head, body }
    }

    /// Copy with all variables replaced by fresh ones.
    #[must_use]
    pub fn rename_apart(&self) -> Self {
        let mut renaming = Renaming::fresh();
        Self {
            head: self.head.rename_vars(&mut renaming),
            body: self.body.rename_vars(&mut renaming),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :- {}.", self.head, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(name: &str) -> LogicalFormula {
        LogicalFormula::Literal(Literal::new(name))
    }

    fn open(name: &str) -> LogicalFormula {
        LogicalFormula::Literal(Literal::new(name).with_terms(vec![Term::var("X")]))
    }

    #[test]
    fn simplify_absorbs_constants() {
        let f = LogicalFormula::and(LogicalFormula::True, lit("p"));
        assert_eq!(f.simplify(), lit("p"));

        let f = LogicalFormula::or(LogicalFormula::False, lit("q"));
        assert_eq!(f.simplify(), lit("q"));

        let f = LogicalFormula::and(lit("p"), LogicalFormula::False);
        assert_eq!(f.simplify(), LogicalFormula::False);

        let f = LogicalFormula::not(LogicalFormula::True);
        assert_eq!(f.simplify(), LogicalFormula::False);
    }

    #[test]
    fn simplify_drops_non_ground_disjuncts() {
        let f = LogicalFormula::or(lit("p"), open("q"));
        assert_eq!(f.simplify(), lit("p"));
    }

    #[test]
    fn simplify_is_idempotent() {
        let f = LogicalFormula::or(
            LogicalFormula::and(LogicalFormula::True, LogicalFormula::not(lit("p"))),
            LogicalFormula::and(open("r"), lit("q")),
        );
        let once = f.simplify();
        assert_eq!(once.simplify(), once);
    }

    #[test]
    fn disjunction_of_nothing_is_false() {
        assert_eq!(LogicalFormula::disjunction(Vec::new()), LogicalFormula::False);
        assert_eq!(LogicalFormula::conjunction(Vec::new()), LogicalFormula::True);
        assert_eq!(
            LogicalFormula::disjunction(vec![lit("a"), lit("b")]).to_string(),
            "(a | b)"
        );
    }

    #[test]
    fn rule_rename_apart_keeps_shape() {
        let rule = Rule::new(
            Literal::new("p").with_terms(vec![Term::var("X")]),
            open("q"),
        );
        let renamed = rule.rename_apart();
        let mut head_vars = BTreeSet::new();
        renamed.head.collect_vars(&mut head_vars);
        let mut body_vars = BTreeSet::new();
        renamed.body.collect_vars(&mut body_vars);
        assert_eq!(head_vars, body_vars);
        assert!(!head_vars.contains("X"));
    }
}
