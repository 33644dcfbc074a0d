//! Terms and literals of the agent language.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::syntax::formula::LogicalFormula;

/// Functor of the constant `true` literal.
pub const TRUE_FUNCTOR: &str = "true";

/// Functor of the constant `false` literal.
pub const FALSE_FUNCTOR: &str = "false";

static FRESH_VARS: AtomicU64 = AtomicU64::new(0);

/// Integer arithmetic operators usable inside terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (integer division)
    Div,
}

impl ArithOp {
    fn eval(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            Self::Add => lhs.checked_add(rhs),
            Self::Sub => lhs.checked_sub(rhs),
            Self::Mul => lhs.checked_mul(rhs),
            Self::Div => lhs.checked_div(rhs),
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// A term of the agent language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// A logical variable (`X`, `_Tmp`).
    Var(String),
    /// A constant symbol (`right`, `alice`).
    Atom(String),
    /// An integer.
    Int(i64),
    /// A quoted string.
    Str(String),
    /// A compound (or negated/annotated) literal used as a term.
    Struct(Literal),
    /// A list of terms.
    List(Vec<Term>),
    /// An arithmetic expression, folded once both sides are integers.
    Arith {
        /// Operator.
        op: ArithOp,
        /// Left operand.
        lhs: Box<Term>,
        /// Right operand.
        rhs: Box<Term>,
    },
    /// A logical formula carried as a term (built by `.big_and`/`.big_or`).
    Formula(Box<LogicalFormula>),
}

impl Term {
    /// Creates a variable term.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// Creates an atom term.
    pub fn atom(name: impl Into<String>) -> Self {
        Self::Atom(name.into())
    }

    /// Builds an arithmetic expression, folding it immediately when possible.
    #[must_use]
    pub fn arith(op: ArithOp, lhs: Term, rhs: Term) -> Self {
        Self::Arith {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
        .folded()
    }

    /// Returns true if the term is a variable.
    #[must_use]
    pub const fn is_var(&self) -> bool {
        matches!(self, Self::Var(_))
    }

    /// Returns true if the term contains no variables.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        match self {
            Self::Var(_) => false,
            Self::Atom(_) | Self::Int(_) | Self::Str(_) => true,
            Self::Struct(l) => l.is_ground(),
            Self::List(items) => items.iter().all(Term::is_ground),
            Self::Arith { lhs, rhs, .. } => lhs.is_ground() && rhs.is_ground(),
            Self::Formula(f) => f.is_ground(),
        }
    }

    /// Views this term as a literal, if it denotes one.
    #[must_use]
    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Self::Atom(name) => Some(Literal::new(name.clone())),
            Self::Struct(l) => Some(l.clone()),
            _ => None,
        }
    }

    /// Views this term as a logical formula, if it denotes one.
    #[must_use]
    pub fn as_formula(&self) -> Option<LogicalFormula> {
        match self {
            Self::Formula(f) => Some((**f).clone()),
            Self::Var(name) => Some(LogicalFormula::Var(name.clone())),
            _ => self.as_literal().map(LogicalFormula::from),
        }
    }

    /// Collects every variable name occurring in the term.
    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Var(name) => {
                out.insert(name.clone());
            }
            Self::Atom(_) | Self::Int(_) | Self::Str(_) => {}
            Self::Struct(l) => l.collect_vars(out),
            Self::List(items) => items.iter().for_each(|t| t.collect_vars(out)),
            Self::Arith { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
            Self::Formula(f) => f.collect_vars(out),
        }
    }

    /// Returns a copy with every variable renamed through `renaming`.
    #[must_use]
    pub fn rename_vars(&self, renaming: &mut Renaming) -> Self {
        match self {
            Self::Var(name) => Self::Var(renaming.rename(name)),
            Self::Atom(_) | Self::Int(_) | Self::Str(_) => self.clone(),
            Self::Struct(l) => Self::Struct(l.rename_vars(renaming)),
            Self::List(items) => Self::List(items.iter().map(|t| t.rename_vars(renaming)).collect()),
            Self::Arith { op, lhs, rhs } => Self::Arith {
                op: *op,
                lhs: Box::new(lhs.rename_vars(renaming)),
                rhs: Box::new(rhs.rename_vars(renaming)),
            },
            Self::Formula(f) => Self::Formula(Box::new(f.rename_vars(renaming))),
        }
    }

    /// Folds ground arithmetic.
    #[must_use]
    pub fn folded(self) -> Self {
        match self {
            Self::Arith { op, lhs, rhs } => {
                let lhs = lhs.folded();
                let rhs = rhs.folded();
                if let (Self::Int(a), Self::Int(b)) = (&lhs, &rhs) {
                    if let Some(v) = op.eval(*a, *b) {
                        return Self::Int(v);
                    }
                }
                Self::Arith {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }
            other => other,
        }
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        if lit.terms.is_empty() && !lit.negated && lit.annots.is_empty() && lit.namespace.is_none() {
            Self::Atom(lit.functor)
        } else {
            Self::Struct(lit)
        }
    }
}

impl From<i64> for Term {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) | Self::Atom(name) => write!(f, "{name}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Struct(l) => write!(f, "{l}"),
            Self::List(items) => {
                write!(f, "[")?;
                write_joined(f, items, ",")?;
                write!(f, "]")
            }
            Self::Arith { op, lhs, rhs } => write!(f, "({lhs}{}{rhs})", op.symbol()),
            Self::Formula(inner) => write!(f, "{inner}"),
        }
    }
}

/// Name and arity of a predicate, used to index belief bases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateIndicator {
    /// Predicate functor.
    pub functor: String,
    /// Number of arguments.
    pub arity: usize,
}

impl fmt::Display for PredicateIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.functor, self.arity)
    }
}

/// A relational atom, possibly strongly negated, namespaced and annotated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Literal {
    /// Namespace; `None` is the default namespace.
    pub namespace: Option<String>,
    /// Predicate symbol.
    pub functor: String,
    /// Arguments.
    pub terms: Vec<Term>,
    /// Strong (classical) negation, written `~p`.
    pub negated: bool,
    /// Annotations, written `p[source(percept)]`.
    pub annots: Vec<Term>,
}

impl Literal {
    /// Creates a positive, argument-less literal in the default namespace.
    pub fn new(functor: impl Into<String>) -> Self {
        Self {
            namespace: None,
            functor: functor.into(),
            terms: Vec::new(),
            negated: false,
            annots: Vec::new(),
        }
    }

    /// The constant `true`.
    #[must_use]
    pub fn truth() -> Self {
        Self::new(TRUE_FUNCTOR)
    }

    /// The constant `false`.
    #[must_use]
    pub fn falsity() -> Self {
        Self::new(FALSE_FUNCTOR)
    }

    /// Builder-style argument setter.
    #[must_use]
    pub fn with_terms(mut self, terms: Vec<Term>) -> Self {
        self.terms = terms;
        self
    }

    /// Builder-style strong-negation setter.
    #[must_use]
    pub fn with_negated(mut self, negated: bool) -> Self {
        self.negated = negated;
        self
    }

    /// Builder-style annotation append.
    #[must_use]
    pub fn with_annot(mut self, annot: Term) -> Self {
        self.annots.push(annot);
        self
    }

    /// Builds `functor(inner)` wrapping another literal.
    pub fn wrap(functor: impl Into<String>, inner: Literal) -> Self {
        Self::new(functor).with_terms(vec![Term::from(inner)])
    }

    /// Number of arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// Predicate indicator (`functor/arity`).
    #[must_use]
    pub fn indicator(&self) -> PredicateIndicator {
        PredicateIndicator {
            functor: self.functor.clone(),
            arity: self.terms.len(),
        }
    }

    /// Returns true if this is the constant `true`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.is_constant(TRUE_FUNCTOR)
    }

    /// Returns true if this is the constant `false`.
    #[must_use]
    pub fn is_false(&self) -> bool {
        self.is_constant(FALSE_FUNCTOR)
    }

    fn is_constant(&self, functor: &str) -> bool {
        self.functor == functor && self.terms.is_empty() && !self.negated && self.namespace.is_none()
    }

    /// Returns true if the literal lives in the default namespace.
    #[must_use]
    pub fn is_default_namespace(&self) -> bool {
        self.namespace.is_none()
    }

    /// Returns true if the literal carries `source(<source>)`.
    #[must_use]
    pub fn has_source(&self, source: &str) -> bool {
        self.annots.iter().any(|a| match a {
            Term::Struct(l) => {
                l.functor == "source" && l.terms.len() == 1 && matches!(&l.terms[0], Term::Atom(s) if s == source)
            }
            _ => false,
        })
    }

    /// Returns true if arguments and annotations contain no variables.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(Term::is_ground) && self.annots.iter().all(Term::is_ground)
    }

    /// Copy without annotations.
    #[must_use]
    pub fn without_annots(&self) -> Self {
        Self {
            annots: Vec::new(),
            ..self.clone()
        }
    }

    /// Positive copy (strong negation removed).
    #[must_use]
    pub fn positive(&self) -> Self {
        self.clone().with_negated(false)
    }

    /// Collects every variable name in arguments and annotations.
    pub fn collect_vars(&self, out: &mut BTreeSet<String>) {
        self.terms.iter().for_each(|t| t.collect_vars(out));
        self.annots.iter().for_each(|t| t.collect_vars(out));
    }

    /// Returns a copy with every variable renamed through `renaming`.
    #[must_use]
    pub fn rename_vars(&self, renaming: &mut Renaming) -> Self {
        Self {
            namespace: self.namespace.clone(),
            functor: self.functor.clone(),
            terms: self.terms.iter().map(|t| t.rename_vars(renaming)).collect(),
            negated: self.negated,
            annots: self.annots.iter().map(|t| t.rename_vars(renaming)).collect(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "~")?;
        }
        if let Some(ns) = &self.namespace {
            write!(f, "{ns}::")?;
        }
        write!(f, "{}", self.functor)?;
        if !self.terms.is_empty() {
            write!(f, "(")?;
            write_joined(f, &self.terms, ",")?;
            write!(f, ")")?;
        }
        if !self.annots.is_empty() {
            write!(f, "[")?;
            write_joined(f, &self.annots, ",")?;
            write!(f, "]")?;
        }
        Ok(())
    }
}

pub(crate) fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Consistent variable renaming used to standardize rules and plans apart.
///
/// Every variable of one structure maps to the same fresh name, and fresh
/// names never collide with names produced by another `Renaming`.
#[derive(Debug)]
pub struct Renaming {
    suffix: u64,
    seen: HashMap<String, String>,
}

impl Renaming {
    /// Starts a renaming with a process-unique suffix.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            suffix: FRESH_VARS.fetch_add(1, Ordering::Relaxed),
            seen: HashMap::new(),
        }
    }

    fn rename(&mut self, name: &str) -> String {
        let suffix = self.suffix;
        self.seen
            .entry(name.to_string())
            .or_insert_with(|| format!("{name}_{suffix}"))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(x: Term, y: Term) -> Literal {
        Literal::new("loc").with_terms(vec![x, y])
    }

    #[test]
    fn literal_display_roundtrips_syntax() {
        let lit = loc(Term::Int(1), Term::var("Y"))
            .with_negated(true)
            .with_annot(Term::Struct(Literal::new("source").with_terms(vec![Term::atom("percept")])));
        assert_eq!(lit.to_string(), "~loc(1,Y)[source(percept)]");
    }

    #[test]
    fn groundness_covers_arguments() {
        assert!(loc(Term::Int(1), Term::Int(2)).is_ground());
        assert!(!loc(Term::Int(1), Term::var("Y")).is_ground());
    }

    #[test]
    fn source_annotation_detected() {
        let lit = Literal::new("seen")
            .with_annot(Term::Struct(Literal::new("source").with_terms(vec![Term::atom("percept")])));
        assert!(lit.has_source("percept"));
        assert!(!lit.has_source("self"));
        assert!(!lit.without_annots().has_source("percept"));
    }

    #[test]
    fn arithmetic_folds_when_ground() {
        let t = Term::arith(ArithOp::Add, Term::Int(1), Term::Int(2));
        assert_eq!(t, Term::Int(3));

        let open = Term::arith(ArithOp::Add, Term::var("X"), Term::Int(1));
        assert_eq!(open.to_string(), "(X+1)");
    }

    #[test]
    fn plain_literal_becomes_atom_term() {
        assert_eq!(Term::from(Literal::new("right")), Term::atom("right"));
        assert!(matches!(Term::from(Literal::new("p").with_negated(true)), Term::Struct(_)));
    }

    #[test]
    fn renaming_is_consistent_within_one_structure() {
        let mut renaming = Renaming::fresh();
        let renamed = loc(Term::var("X"), Term::var("X")).rename_vars(&mut renaming);
        assert_eq!(renamed.terms[0], renamed.terms[1]);
        assert_ne!(renamed.terms[0], Term::var("X"));

        let mut other = Renaming::fresh();
        let again = loc(Term::var("X"), Term::var("Y")).rename_vars(&mut other);
        assert_ne!(again.terms[0], renamed.terms[0]);
    }
}
