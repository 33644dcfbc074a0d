//! Belief-base view that answers `know(...)` / `possible(...)` queries from
//! the reasoner.
//!
//! A lookup for `know(loc(X))` enumerates every ground `loc(..)` fact in the
//! wrapped base, asks the reasoner about all of them in one batch and returns
//! `know(loc(..))` facts for the ones reported true. Every other lookup and
//! every mutation goes straight to the wrapped base.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::formula::EpistemicFormulaLiteral;
use crate::reasoner::ReasonerClient;
use crate::store::{BeliefBase, BeliefEntry, StoreError};
use crate::syntax::{Literal, Rule};
use crate::unifier::Unifier;

/// A [`BeliefBase`] that resolves modality literals through the reasoner.
#[derive(Clone)]
pub struct EpistemicBeliefBase {
    inner: Arc<dyn BeliefBase>,
    reasoner: Arc<dyn ReasonerClient>,
    model_created: Arc<AtomicBool>,
}

impl std::fmt::Debug for EpistemicBeliefBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpistemicBeliefBase")
            .field("model_created", &self.model_created.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl EpistemicBeliefBase {
    /// Wraps `inner`. Until `model_created` is set every grounding of an
    /// epistemic query is reported true.
    #[must_use]
    pub fn new(
        inner: Arc<dyn BeliefBase>,
        reasoner: Arc<dyn ReasonerClient>,
        model_created: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner,
            reasoner,
            model_created,
        }
    }

    /// The wrapped ground belief base.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn BeliefBase> {
        &self.inner
    }

    /// Every ground instance of the query's root literal known to the
    /// wrapped base, as an epistemic literal with the query's modality.
    pub fn groundings(&self, query: &EpistemicFormulaLiteral) -> Result<Vec<EpistemicFormulaLiteral>, StoreError> {
        let root = query.root_literal();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for entry in self.inner.candidates(root, &Unifier::new())? {
            let BeliefEntry::Fact(fact) = entry else {
                continue;
            };
            let fact = fact.without_annots();
            if !Unifier::new().unify_literals(root, &fact) || !seen.insert(fact.clone()) {
                continue;
            }
            out.push(
                query
                    .with_root(fact)
                    .map_err(|e| StoreError::InvalidQuery(e.to_string()))?,
            );
        }
        Ok(out)
    }

    fn epistemic_candidates(&self, literal: &Literal, unifier: &Unifier) -> Result<Vec<BeliefEntry>, StoreError> {
        let query = EpistemicFormulaLiteral::parse(&unifier.apply_literal(literal))
            .map_err(|e| StoreError::InvalidQuery(e.to_string()))?;
        let groundings = self.groundings(&query)?;
        if groundings.is_empty() {
            return Ok(Vec::new());
        }

        if !self.model_created.load(Ordering::Acquire) {
            warn!(query = %query, "Epistemic model not created yet, reporting every grounding as true");
            return Ok(groundings
                .into_iter()
                .map(|g| BeliefEntry::Fact(g.original().clone()))
                .collect());
        }

        let answers = self.reasoner.evaluate_formulas(&groundings)?;
        let out: Vec<BeliefEntry> = groundings
            .into_iter()
            .filter(|g| answers.get(&g.id()).copied().unwrap_or(false))
            .map(|g| BeliefEntry::Fact(g.original().clone()))
            .collect();
        debug!(query = %query, candidates = out.len(), "Evaluated epistemic query");
        Ok(out)
    }
}

impl BeliefBase for EpistemicBeliefBase {
    fn candidates(&self, literal: &Literal, unifier: &Unifier) -> Result<Vec<BeliefEntry>, StoreError> {
        if EpistemicFormulaLiteral::is_epistemic(literal) {
            self.epistemic_candidates(literal, unifier)
        } else {
            self.inner.candidates(literal, unifier)
        }
    }

    fn rules(&self, literal: &Literal) -> Result<Vec<Rule>, StoreError> {
        self.inner.rules(literal)
    }

    fn add(&self, entry: BeliefEntry) -> Result<bool, StoreError> {
        self.inner.add(entry)
    }

    fn remove(&self, literal: &Literal) -> Result<bool, StoreError> {
        self.inner.remove(literal)
    }

    fn contains(&self, literal: &Literal) -> Result<bool, StoreError> {
        self.inner.contains(literal)
    }

    fn snapshot(&self) -> Result<Vec<BeliefEntry>, StoreError> {
        self.inner.snapshot()
    }

    fn len(&self) -> Result<usize, StoreError> {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{EpistemicModality, Formula};
    use crate::reasoner::{RecordedRequest, RecordingReasoner};
    use crate::store::InMemoryBeliefBase;
    use crate::syntax::parse_literal;

    fn setup(created: bool) -> (EpistemicBeliefBase, Arc<RecordingReasoner>) {
        let bb = InMemoryBeliefBase::new();
        for f in ["loc(1)", "loc(2)", "~loc(1)", "door(open)"] {
            bb.add(BeliefEntry::Fact(parse_literal(f).unwrap())).unwrap();
        }
        let reasoner = Arc::new(RecordingReasoner::new());
        let view = EpistemicBeliefBase::new(Arc::new(bb), reasoner.clone(), Arc::new(AtomicBool::new(created)));
        (view, reasoner)
    }

    fn heads(entries: &[BeliefEntry]) -> Vec<String> {
        entries.iter().map(|e| e.head().to_string()).collect()
    }

    #[test]
    fn returns_groundings_reported_true() {
        let (view, reasoner) = setup(true);
        reasoner.set_true(&Formula::modal(
            EpistemicModality::Know,
            Formula::literal(&parse_literal("loc(2)").unwrap()).unwrap(),
        ));
        let found = view
            .candidates(&parse_literal("know(loc(X))").unwrap(), &Unifier::new())
            .unwrap();
        assert_eq!(heads(&found), vec!["know(loc(2))"]);

        let batches: Vec<_> = reasoner
            .requests()
            .into_iter()
            .filter_map(|r| match r {
                RecordedRequest::EvaluateFormulas(req) => Some(req.formulas.len()),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![2]);
    }

    #[test]
    fn applies_unifier_before_grounding() {
        let (view, _) = setup(false);
        let mut u = Unifier::new();
        u.bind("X", crate::syntax::Term::Int(1));
        let found = view.candidates(&parse_literal("~possible(~loc(X))").unwrap(), &u).unwrap();
        assert_eq!(heads(&found), vec!["~possible(~loc(1))"]);
    }

    #[test]
    fn uninitialized_model_reports_all_true() {
        let (view, reasoner) = setup(false);
        let found = view
            .candidates(&parse_literal("know(loc(X))").unwrap(), &Unifier::new())
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(reasoner.requests().is_empty());
    }

    #[test]
    fn no_groundings_no_round_trip() {
        let (view, reasoner) = setup(true);
        let found = view
            .candidates(&parse_literal("know(light(X))").unwrap(), &Unifier::new())
            .unwrap();
        assert!(found.is_empty());
        assert!(reasoner.requests().is_empty());
    }

    #[test]
    fn other_lookups_pass_through() {
        let (view, _) = setup(true);
        let found = view
            .candidates(&parse_literal("door(X)").unwrap(), &Unifier::new())
            .unwrap();
        assert_eq!(heads(&found), vec!["door(open)"]);
        assert!(view.add(BeliefEntry::Fact(parse_literal("door(closed)").unwrap())).unwrap());
        assert!(view.inner().contains(&parse_literal("door(closed)").unwrap()).unwrap());
    }

    #[test]
    fn transport_errors_surface() {
        let (view, reasoner) = setup(true);
        reasoner.fail_transport(true);
        let err = view
            .candidates(&parse_literal("know(loc(X))").unwrap(), &Unifier::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::Reasoner(_)));
    }
}
