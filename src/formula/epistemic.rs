//! Epistemic literals such as `know(loc(1,2))` or `~possible(~door(open))`.

use std::fmt;
use std::hash::{Hash, Hasher};

use uuid::Uuid;

use crate::error::GroundingError;
use crate::formula::{EpistemicModality, Formula};
use crate::syntax::{Literal, Term};
use crate::unifier::Unifier;

/// A parsed `modality(inner)` literal.
///
/// The outer strong negation negates the modality, the inner one negates
/// the proposition: `~possible(~p)` reads "it is not possible that not p".
/// Each instance carries a fresh id used to match reasoner answers back to
/// the query; equality ignores it.
#[derive(Debug, Clone)]
pub struct EpistemicFormulaLiteral {
    original: Literal,
    root: Literal,
    modality: EpistemicModality,
    modality_negated: bool,
    proposition_negated: bool,
    id: Uuid,
}

impl EpistemicFormulaLiteral {
    /// Returns true if `literal` has the shape of an epistemic literal.
    #[must_use]
    pub fn is_epistemic(literal: &Literal) -> bool {
        literal.is_default_namespace()
            && literal.arity() == 1
            && EpistemicModality::from_functor(&literal.functor).is_some()
    }

    /// Parses an epistemic literal.
    ///
    /// Both modalities accept an outer `~`: `~know(p)` is a negated
    /// knowledge query sent to the reasoner as `not know p`, just like
    /// `~possible(p)`. It is not folded to a constant false.
    ///
    /// # Errors
    /// `InvalidEpistemicLiteral` unless the literal is `modality(inner)` with
    /// a literal argument.
    pub fn parse(literal: &Literal) -> Result<Self, GroundingError> {
        let invalid = |reason: &str| GroundingError::InvalidEpistemicLiteral {
            literal: literal.to_string(),
            reason: reason.to_string(),
        };
        let modality = EpistemicModality::from_functor(&literal.functor)
            .ok_or_else(|| invalid("functor is not a modality"))?;
        if !literal.is_default_namespace() {
            return Err(invalid("modalities live in the default namespace"));
        }
        if literal.arity() != 1 {
            return Err(invalid("expected exactly one argument"));
        }
        let root = literal.terms[0]
            .as_literal()
            .ok_or_else(|| invalid("argument is not a literal"))?
            .without_annots();
        Ok(Self {
            original: literal.without_annots(),
            modality_negated: literal.negated,
            proposition_negated: root.negated,
            root,
            modality,
            id: Uuid::new_v4(),
        })
    }

    /// Builds `modality(root)` (negated as requested) and parses it.
    pub fn from_parts(modality: EpistemicModality, modality_negated: bool, root: Literal) -> Result<Self, GroundingError> {
        let lit = Literal::new(modality.functor())
            .with_terms(vec![Term::from(root)])
            .with_negated(modality_negated);
        Self::parse(&lit)
    }

    /// The same query about a different root literal, with a fresh id.
    pub fn with_root(&self, root: Literal) -> Result<Self, GroundingError> {
        Self::from_parts(self.modality, self.modality_negated, root)
    }

    /// Applies `unifier` and re-parses, yielding a new instance with a fresh id.
    pub fn capply(&self, unifier: &Unifier) -> Result<Self, GroundingError> {
        Self::parse(&unifier.apply_literal(&self.original))
    }

    /// The modality.
    #[must_use]
    pub const fn modality(&self) -> EpistemicModality {
        self.modality
    }

    /// True for `~know(..)` / `~possible(..)`.
    #[must_use]
    pub const fn modality_negated(&self) -> bool {
        self.modality_negated
    }

    /// True when the inner literal is strongly negated.
    #[must_use]
    pub const fn proposition_negated(&self) -> bool {
        self.proposition_negated
    }

    /// The inner literal, sign included.
    #[must_use]
    pub const fn root_literal(&self) -> &Literal {
        &self.root
    }

    /// The literal this was parsed from (annotations stripped).
    #[must_use]
    pub const fn original(&self) -> &Literal {
        &self.original
    }

    /// Unique id for matching reasoner answers.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns true if the root literal has no free variables.
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.root.is_ground()
    }

    /// The modal formula this literal denotes.
    pub fn to_formula(&self) -> Result<Formula, GroundingError> {
        let modal = Formula::modal(self.modality, Formula::literal(&self.root)?);
        Ok(if self.modality_negated {
            Formula::not(modal)
        } else {
            modal
        })
    }
}

impl PartialEq for EpistemicFormulaLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.modality == other.modality
            && self.modality_negated == other.modality_negated
            && self.proposition_negated == other.proposition_negated
            && self.root == other.root
    }
}

impl Eq for EpistemicFormulaLiteral {}

impl Hash for EpistemicFormulaLiteral {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.modality.hash(state);
        self.modality_negated.hash(state);
        self.proposition_negated.hash(state);
        self.root.hash(state);
    }
}

impl fmt::Display for EpistemicFormulaLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_literal;

    fn parse(src: &str) -> EpistemicFormulaLiteral {
        EpistemicFormulaLiteral::parse(&parse_literal(src).unwrap()).unwrap()
    }

    fn tuple(e: &EpistemicFormulaLiteral) -> (EpistemicModality, bool, bool, String) {
        (
            e.modality(),
            e.modality_negated(),
            e.proposition_negated(),
            e.root_literal().to_string(),
        )
    }

    #[test]
    fn parses_signs_at_both_levels() {
        use EpistemicModality::{Know, Possible};
        assert_eq!(tuple(&parse("know(p)")), (Know, false, false, "p".to_string()));
        assert_eq!(tuple(&parse("~know(p)")), (Know, true, false, "p".to_string()));
        assert_eq!(tuple(&parse("possible(~p)")), (Possible, false, true, "~p".to_string()));
        assert_eq!(tuple(&parse("~possible(p)")), (Possible, true, false, "p".to_string()));
    }

    #[test]
    fn rejects_malformed_literals() {
        for src in ["know(p, q)", "know", "know(3)", "believe(p)", "ns::know(p)"] {
            let err = EpistemicFormulaLiteral::parse(&parse_literal(src).unwrap()).unwrap_err();
            assert!(matches!(err, GroundingError::InvalidEpistemicLiteral { .. }), "{src}");
        }
    }

    #[test]
    fn capply_substitutes_and_refreshes_id() {
        let open = parse("know(loc(X, 2))");
        assert!(!open.is_ground());
        let mut u = Unifier::new();
        u.bind("X", Term::Int(1));
        let ground = open.capply(&u).unwrap();
        assert!(ground.is_ground());
        assert_eq!(ground.root_literal().to_string(), "loc(1,2)");
        assert_ne!(ground.id(), open.id());
    }

    #[test]
    fn equality_ignores_id() {
        assert_eq!(parse("know(p)"), parse("know(p)"));
        assert_ne!(parse("know(p)"), parse("~know(p)"));
    }

    #[test]
    fn formula_carries_both_negations() {
        let f = parse("~possible(~p)").to_formula().unwrap();
        assert_eq!(f.to_string(), "(not (possible (not p)))");
    }

    #[test]
    fn negated_know_is_a_real_query() {
        let f = parse("~know(p)").to_formula().unwrap();
        assert!(!f.is_false());
        assert_eq!(f.to_string(), "(not (know p))");
    }
}
