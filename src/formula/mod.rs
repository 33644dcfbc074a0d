//! Propositional formula IR sent to the epistemic reasoner.
//!
//! A [`Formula`] is the ground, variable-free image of a logical formula.
//! Serde provides the canonical wire form: every node is an object tagged
//! with `type`, e.g. `{"type":"and","formulas":[...]}`.

mod epistemic;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EpistemicError, GroundingError, ParseError};
use crate::syntax::{parse_literal, Literal, LogicalFormula};

pub use epistemic::EpistemicFormulaLiteral;

/// Epistemic modalities understood by the reasoner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpistemicModality {
    /// `know(p)`: p holds in every accessible world.
    Know,
    /// `possible(p)`: p holds in some accessible world.
    Possible,
}

impl EpistemicModality {
    /// All modalities.
    pub const ALL: [Self; 2] = [Self::Know, Self::Possible];

    /// Functor used in agent source and on the wire.
    #[must_use]
    pub const fn functor(self) -> &'static str {
        match self {
            Self::Know => "know",
            Self::Possible => "possible",
        }
    }

    /// Looks a modality up by functor.
    #[must_use]
    pub fn from_functor(functor: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.functor() == functor)
    }
}

impl fmt::Display for EpistemicModality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.functor())
    }
}

/// An atomic proposition: a positive, ground, annotation-free literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prop(Literal);

impl Prop {
    /// Wraps a literal.
    ///
    /// # Errors
    /// - `NonGround` if the literal has free variables
    /// - `UnsupportedFormula` if it is strongly negated (use [`Formula::literal`])
    pub fn new(literal: &Literal) -> Result<Self, GroundingError> {
        if !literal.is_ground() {
            return Err(GroundingError::non_ground(literal));
        }
        if literal.negated {
            return Err(GroundingError::unsupported("proposition", literal));
        }
        Ok(Self(literal.without_annots()))
    }

    /// The wrapped literal.
    #[must_use]
    pub const fn literal(&self) -> &Literal {
        &self.0
    }
}

impl fmt::Display for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Prop> for String {
    fn from(prop: Prop) -> Self {
        prop.to_string()
    }
}

impl TryFrom<String> for Prop {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let lit = parse_literal(&s)?;
        Self::new(&lit).map_err(|e| ParseError::new(0, e.to_string()))
    }
}

/// Propositional (modal) formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Formula {
    /// Atomic proposition.
    Prop {
        /// The proposition.
        prop: Prop,
    },
    /// Negation.
    Not {
        /// Negated formula.
        formula: Box<Formula>,
    },
    /// Conjunction; order preserved for reproducible encoding.
    And {
        /// Conjuncts.
        formulas: Vec<Formula>,
    },
    /// Disjunction; order preserved for reproducible encoding.
    Or {
        /// Disjuncts.
        formulas: Vec<Formula>,
    },
    /// Implication.
    Implies {
        /// Left side.
        antecedent: Box<Formula>,
        /// Right side.
        consequent: Box<Formula>,
    },
    /// Equivalence.
    Equiv {
        /// Left side.
        antecedent: Box<Formula>,
        /// Right side.
        consequent: Box<Formula>,
    },
    /// Modal operator applied to a formula.
    Modal {
        /// The modality.
        modal: EpistemicModality,
        /// Operand.
        formula: Box<Formula>,
    },
}

impl Formula {
    /// Propositionalizes a ground literal; strong negation becomes `Not`.
    pub fn literal(literal: &Literal) -> Result<Self, GroundingError> {
        let prop = Self::Prop {
            prop: Prop::new(&literal.positive())?,
        };
        Ok(if literal.negated { Self::not(prop) } else { prop })
    }

    /// The constant `true` proposition.
    #[must_use]
    pub fn truth() -> Self {
        Self::Prop {
            prop: Prop(Literal::truth()),
        }
    }

    /// The constant `false` proposition.
    #[must_use]
    pub fn falsity() -> Self {
        Self::Prop {
            prop: Prop(Literal::falsity()),
        }
    }

    /// Returns true for the `true` constant.
    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::Prop { prop } if prop.0.is_true())
    }

    /// Returns true for the `false` constant.
    #[must_use]
    pub fn is_false(&self) -> bool {
        matches!(self, Self::Prop { prop } if prop.0.is_false())
    }

    /// `not inner`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Self) -> Self {
        Self::Not {
            formula: Box::new(inner),
        }
    }

    /// Conjunction of `formulas`.
    #[must_use]
    pub fn and(formulas: Vec<Self>) -> Self {
        Self::And { formulas }
    }

    /// Disjunction of `formulas`.
    #[must_use]
    pub fn or(formulas: Vec<Self>) -> Self {
        Self::Or { formulas }
    }

    /// `antecedent => consequent`
    #[must_use]
    pub fn implies(antecedent: Self, consequent: Self) -> Self {
        Self::Implies {
            antecedent: Box::new(antecedent),
            consequent: Box::new(consequent),
        }
    }

    /// `a <=> b`
    #[must_use]
    pub fn equiv(a: Self, b: Self) -> Self {
        Self::Equiv {
            antecedent: Box::new(a),
            consequent: Box::new(b),
        }
    }

    /// `modal formula`
    #[must_use]
    pub fn modal(modal: EpistemicModality, formula: Self) -> Self {
        Self::Modal {
            modal,
            formula: Box::new(formula),
        }
    }

    /// Nesting depth; a proposition has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Prop { .. } => 0,
            Self::Not { formula } | Self::Modal { formula, .. } => 1 + formula.depth(),
            Self::And { formulas } | Self::Or { formulas } => {
                1 + formulas.iter().map(Self::depth).max().unwrap_or(0)
            }
            Self::Implies {
                antecedent,
                consequent,
            }
            | Self::Equiv {
                antecedent,
                consequent,
            } => 1 + antecedent.depth().max(consequent.depth()),
        }
    }

    /// Textual propositional rendering, e.g. `((a and b) => c)`.
    #[must_use]
    pub fn to_prop_string(&self) -> String {
        self.to_string()
    }
}

fn write_nary(f: &mut fmt::Formatter<'_>, op: &str, formulas: &[Formula]) -> fmt::Result {
    write!(f, "(")?;
    for (i, sub) in formulas.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{sub}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prop { prop } => write!(f, "{prop}"),
            Self::Not { formula } => write!(f, "(not {formula})"),
            Self::And { formulas } => write_nary(f, "and", formulas),
            Self::Or { formulas } => write_nary(f, "or", formulas),
            Self::Implies {
                antecedent,
                consequent,
            } => write!(f, "({antecedent} => {consequent})"),
            Self::Equiv {
                antecedent,
                consequent,
            } => write!(f, "({antecedent} <=> {consequent})"),
            Self::Modal { modal, formula } => write!(f, "({modal} {formula})"),
        }
    }
}

fn flatten_into(out: &mut Vec<Formula>, formula: &LogicalFormula, conjunction: bool) -> Result<(), GroundingError> {
    match (formula, conjunction) {
        (LogicalFormula::And(a, b), true) | (LogicalFormula::Or(a, b), false) => {
            flatten_into(out, a, conjunction)?;
            flatten_into(out, b, conjunction)
        }
        _ => {
            out.push(to_prop_formula(formula)?);
            Ok(())
        }
    }
}

/// Converts a ground logical formula into the propositional IR.
///
/// Nested conjunctions and disjunctions are flattened.
///
/// # Errors
/// - `NonGround` for any literal with free variables
/// - `UnsupportedFormula` for residual relational, internal or variable nodes
pub fn to_prop_formula(formula: &LogicalFormula) -> Result<Formula, GroundingError> {
    match formula {
        LogicalFormula::True => Ok(Formula::truth()),
        LogicalFormula::False => Ok(Formula::falsity()),
        LogicalFormula::Literal(lit) => Formula::literal(lit),
        LogicalFormula::Not(inner) => Ok(Formula::not(to_prop_formula(inner)?)),
        LogicalFormula::And(..) => {
            let mut out = Vec::new();
            flatten_into(&mut out, formula, true)?;
            Ok(Formula::and(out))
        }
        LogicalFormula::Or(..) => {
            let mut out = Vec::new();
            flatten_into(&mut out, formula, false)?;
            Ok(Formula::or(out))
        }
        LogicalFormula::Var(_) | LogicalFormula::Rel { .. } | LogicalFormula::Internal(_) => {
            Err(GroundingError::unsupported("propositionalize", formula))
        }
    }
}

/// Simplifies, then propositionalizes.
pub fn simplify_and_prop(formula: &LogicalFormula) -> Result<Formula, GroundingError> {
    to_prop_formula(&formula.simplify())
}

/// Serialize a formula to compact JSON.
pub fn to_json(formula: &Formula) -> Result<String, EpistemicError> {
    serde_json::to_string(formula).map_err(|e| EpistemicError::internal(format!("serialize formula: {e}")))
}

/// Serialize a formula to pretty JSON.
pub fn to_json_pretty(formula: &Formula) -> Result<String, EpistemicError> {
    serde_json::to_string_pretty(formula).map_err(|e| EpistemicError::internal(format!("serialize formula: {e}")))
}

/// Deserialize a formula from JSON.
pub fn from_json(s: &str) -> Result<Formula, EpistemicError> {
    serde_json::from_str::<Formula>(s).map_err(|e| EpistemicError::internal(format!("deserialize formula: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_formula;

    fn prop(src: &str) -> Formula {
        Formula::literal(&parse_literal(src).unwrap()).unwrap()
    }

    #[test]
    fn prop_rejects_non_ground() {
        let err = Prop::new(&parse_literal("loc(X)").unwrap()).unwrap_err();
        assert!(matches!(err, GroundingError::NonGround { .. }));
    }

    #[test]
    fn negated_literal_becomes_not() {
        let f = prop("~loc(1)[source(percept)]");
        assert_eq!(f, Formula::not(prop("loc(1)")));
        assert_eq!(f.to_prop_string(), "(not loc(1))");
    }

    #[test]
    fn prop_strings() {
        let f = Formula::implies(Formula::or(vec![prop("a"), prop("b")]), prop("c"));
        assert_eq!(f.to_string(), "((a or b) => c)");
        let f = Formula::modal(EpistemicModality::Know, Formula::and(vec![prop("a"), prop("b")]));
        assert_eq!(f.to_string(), "(know (a and b))");
        assert_eq!(Formula::equiv(prop("a"), prop("b")).to_string(), "(a <=> b)");
    }

    #[test]
    fn json_shape_is_tagged() {
        let f = Formula::modal(
            EpistemicModality::Possible,
            Formula::or(vec![prop("loc(1,2)"), Formula::not(prop("a"))]),
        );
        let value: serde_json::Value = serde_json::from_str(&to_json(&f).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "modal",
                "modal": "possible",
                "formula": {
                    "type": "or",
                    "formulas": [
                        {"type": "prop", "prop": "loc(1,2)"},
                        {"type": "not", "formula": {"type": "prop", "prop": "a"}}
                    ]
                }
            })
        );
        assert_eq!(from_json(&to_json_pretty(&f).unwrap()).unwrap(), f);
    }

    #[test]
    fn to_prop_formula_flattens() {
        let lf = parse_formula("a & (b & c) | d").unwrap();
        let f = to_prop_formula(&lf).unwrap();
        assert_eq!(f.to_string(), "((a and b and c) or d)");
        assert_eq!(f.depth(), 2);
    }

    #[test]
    fn to_prop_formula_rejects_residual_nodes() {
        let err = to_prop_formula(&parse_formula("X > 3").unwrap()).unwrap_err();
        assert!(matches!(err, GroundingError::UnsupportedFormula { .. }));
        let err = to_prop_formula(&parse_formula("p(X)").unwrap()).unwrap_err();
        assert!(matches!(err, GroundingError::NonGround { .. }));
    }

    #[test]
    fn simplify_and_prop_drops_constants() {
        let lf = parse_formula("true & p | false").unwrap();
        assert_eq!(simplify_and_prop(&lf).unwrap(), prop("p"));
        assert!(simplify_and_prop(&parse_formula("not true").unwrap()).unwrap().is_false());
    }

    #[test]
    fn modality_functors() {
        assert_eq!(EpistemicModality::from_functor("know"), Some(EpistemicModality::Know));
        assert_eq!(EpistemicModality::from_functor("possible"), Some(EpistemicModality::Possible));
        assert_eq!(EpistemicModality::from_functor("believe"), None);
    }
}
