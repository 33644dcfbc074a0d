//! In-memory belief base and plan library.
//!
//! Thread-safe reference implementations of the store traits, intended for
//! embedded usage and tests.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::store::traits::{BeliefBase, BeliefEntry, PlanLibrary, PlanOption, StoreError};
use crate::syntax::{Literal, Plan, Rule, Trigger};
use crate::unifier::Unifier;

fn lock_err(context: &'static str) -> StoreError {
    StoreError::Backend(format!("poisoned lock: {context}"))
}

/// Index key: namespace, functor, arity and strong-negation sign.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HeadKey {
    namespace: Option<String>,
    functor: String,
    arity: usize,
    negated: bool,
}

impl HeadKey {
    fn of(lit: &Literal) -> Self {
        Self {
            namespace: lit.namespace.clone(),
            functor: lit.functor.clone(),
            arity: lit.arity(),
            negated: lit.negated,
        }
    }
}

#[derive(Debug, Default)]
struct BeliefState {
    order: Vec<BeliefEntry>,
    members: HashSet<BeliefEntry>,
    // annotation-stripped fact -> stored variants
    exact: HashMap<Literal, Vec<Literal>>,
    facts_by_head: HashMap<HeadKey, Vec<Literal>>,
    rules_by_head: HashMap<HeadKey, Vec<Rule>>,
}

impl BeliefState {
    fn rules(&self, key: &HeadKey) -> impl Iterator<Item = BeliefEntry> + '_ {
        self.rules_by_head
            .get(key)
            .into_iter()
            .flatten()
            .cloned()
            .map(BeliefEntry::Rule)
    }
}

fn same_fact(entry: &BeliefEntry, lit: &Literal) -> bool {
    matches!(entry, BeliefEntry::Fact(f) if f.without_annots() == *lit)
}

/// In-memory [`BeliefBase`] indexed by predicate head.
///
/// Ground lookups hit an exact fact index; rules are kept apart from facts
/// so rule lookups never walk the facts of a large predicate.
#[derive(Debug, Default)]
pub struct InMemoryBeliefBase {
    state: RwLock<BeliefState>,
}

impl InMemoryBeliefBase {
    /// Creates an empty belief base.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a belief base holding `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = BeliefEntry>) -> Result<Self, StoreError> {
        let bb = Self::new();
        for entry in entries {
            bb.add(entry)?;
        }
        Ok(bb)
    }
}

impl BeliefBase for InMemoryBeliefBase {
    fn candidates(&self, literal: &Literal, unifier: &Unifier) -> Result<Vec<BeliefEntry>, StoreError> {
        let query = unifier.apply_literal(literal).without_annots();
        let key = HeadKey::of(&query);
        let state = self.state.read().map_err(|_| lock_err("belief.candidates"))?;
        let facts = if query.is_ground() {
            state.exact.get(&query)
        } else {
            state.facts_by_head.get(&key)
        };
        Ok(facts
            .into_iter()
            .flatten()
            .cloned()
            .map(BeliefEntry::Fact)
            .chain(state.rules(&key))
            .collect())
    }

    fn rules(&self, literal: &Literal) -> Result<Vec<Rule>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("belief.rules"))?;
        Ok(state
            .rules_by_head
            .get(&HeadKey::of(literal))
            .cloned()
            .unwrap_or_default())
    }

    fn add(&self, entry: BeliefEntry) -> Result<bool, StoreError> {
        if let BeliefEntry::Fact(lit) = &entry {
            if !lit.is_ground() {
                return Err(StoreError::NonGroundFact(lit.to_string()));
            }
        }
        let mut state = self.state.write().map_err(|_| lock_err("belief.add"))?;
        if !state.members.insert(entry.clone()) {
            return Ok(false);
        }
        let key = HeadKey::of(entry.head());
        match &entry {
            BeliefEntry::Fact(lit) => {
                state.exact.entry(lit.without_annots()).or_default().push(lit.clone());
                state.facts_by_head.entry(key).or_default().push(lit.clone());
            }
            BeliefEntry::Rule(rule) => state.rules_by_head.entry(key).or_default().push(rule.clone()),
        }
        state.order.push(entry);
        Ok(true)
    }

    fn remove(&self, literal: &Literal) -> Result<bool, StoreError> {
        let target = literal.without_annots();
        let mut state = self.state.write().map_err(|_| lock_err("belief.remove"))?;
        let Some(variants) = state.exact.remove(&target) else {
            return Ok(false);
        };
        for variant in variants {
            state.members.remove(&BeliefEntry::Fact(variant));
        }
        state.order.retain(|e| !same_fact(e, &target));
        if let Some(bucket) = state.facts_by_head.get_mut(&HeadKey::of(&target)) {
            bucket.retain(|f| f.without_annots() != target);
        }
        Ok(true)
    }

    fn contains(&self, literal: &Literal) -> Result<bool, StoreError> {
        let target = literal.without_annots();
        let state = self.state.read().map_err(|_| lock_err("belief.contains"))?;
        Ok(state.exact.contains_key(&target))
    }

    fn snapshot(&self) -> Result<Vec<BeliefEntry>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("belief.snapshot"))?;
        Ok(state.order.clone())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("belief.len"))?;
        Ok(state.order.len())
    }
}

/// In-memory [`PlanLibrary`].
#[derive(Debug, Default)]
pub struct InMemoryPlanLibrary {
    plans: RwLock<Vec<Plan>>,
}

impl InMemoryPlanLibrary {
    /// Creates an empty plan library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlanLibrary for InMemoryPlanLibrary {
    fn add(&self, plan: Plan) -> Result<(), StoreError> {
        let mut plans = self.plans.write().map_err(|_| lock_err("plan.add"))?;
        plans.push(plan);
        Ok(())
    }

    fn relevant(&self, trigger: &Trigger) -> Result<Vec<PlanOption>, StoreError> {
        let plans = self.plans.read().map_err(|_| lock_err("plan.relevant"))?;
        let mut out = Vec::new();
        for plan in plans
            .iter()
            .filter(|p| p.trigger.op == trigger.op && p.trigger.kind == trigger.kind)
        {
            let renamed = plan.rename_apart();
            let mut unifier = Unifier::new();
            if unifier.unify_literals(&renamed.trigger.literal, &trigger.literal) {
                out.push(PlanOption {
                    plan: renamed,
                    unifier,
                });
            }
        }
        Ok(out)
    }

    fn plans(&self) -> Result<Vec<Plan>, StoreError> {
        let plans = self.plans.read().map_err(|_| lock_err("plan.plans"))?;
        Ok(plans.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_literal, parse_plan, parse_rule};

    fn fact(src: &str) -> BeliefEntry {
        BeliefEntry::Fact(parse_literal(src).unwrap())
    }

    #[test]
    fn belief_add_contains_remove() {
        let bb = InMemoryBeliefBase::new();
        assert!(bb.add(fact("loc(1)")).unwrap());
        assert!(!bb.add(fact("loc(1)")).unwrap());
        assert!(bb.contains(&parse_literal("loc(1)").unwrap()).unwrap());
        assert!(!bb.contains(&parse_literal("~loc(1)").unwrap()).unwrap());

        assert!(bb.remove(&parse_literal("loc(1)").unwrap()).unwrap());
        assert!(!bb.remove(&parse_literal("loc(1)").unwrap()).unwrap());
        assert!(bb.is_empty().unwrap());
    }

    #[test]
    fn annotated_fact_is_found_without_annotations() {
        let bb = InMemoryBeliefBase::new();
        bb.add(fact("seen(a)[source(percept)]")).unwrap();
        assert!(bb.contains(&parse_literal("seen(a)").unwrap()).unwrap());
        assert!(bb.remove(&parse_literal("seen(a)").unwrap()).unwrap());
    }

    #[test]
    fn non_ground_facts_are_rejected() {
        let bb = InMemoryBeliefBase::new();
        assert!(matches!(bb.add(fact("loc(X)")), Err(StoreError::NonGroundFact(_))));
    }

    #[test]
    fn candidates_are_indexed_by_sign_and_arity() {
        let bb = InMemoryBeliefBase::with_entries([
            fact("loc(1)"),
            fact("~loc(2)"),
            fact("loc(1, 2)"),
            BeliefEntry::Rule(parse_rule("loc(X) :- start(X).").unwrap()),
        ])
        .unwrap();
        let u = Unifier::new();
        let pos = bb.candidates(&parse_literal("loc(Y)").unwrap(), &u).unwrap();
        assert_eq!(pos.len(), 2);
        assert!(pos[1].is_rule());
        let neg = bb.candidates(&parse_literal("~loc(Y)").unwrap(), &u).unwrap();
        assert_eq!(neg, vec![fact("~loc(2)")]);
        assert_eq!(bb.snapshot().unwrap().len(), 4);
    }

    #[test]
    fn ground_lookup_uses_exact_facts_and_keeps_rules() {
        let bb = InMemoryBeliefBase::with_entries([
            fact("loc(1)"),
            fact("loc(2)[source(percept)]"),
            fact("loc(3)"),
            BeliefEntry::Rule(parse_rule("loc(X) :- start(X).").unwrap()),
        ])
        .unwrap();
        let mut u = Unifier::new();
        u.bind("Y", crate::syntax::Term::Int(2));
        let found = bb.candidates(&parse_literal("loc(Y)").unwrap(), &u).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], fact("loc(2)[source(percept)]"));
        assert!(found[1].is_rule());

        let rules = bb.rules(&parse_literal("loc(7)").unwrap()).unwrap();
        assert_eq!(rules.len(), 1);
        assert!(bb.rules(&parse_literal("~loc(7)").unwrap()).unwrap().is_empty());
    }

    #[test]
    fn removed_fact_can_be_added_again() {
        let bb = InMemoryBeliefBase::new();
        bb.add(fact("loc(1)")).unwrap();
        bb.add(fact("loc(2)")).unwrap();
        assert!(bb.remove(&parse_literal("loc(1)").unwrap()).unwrap());
        assert!(bb.add(fact("loc(1)")).unwrap());
        let found = bb
            .candidates(&parse_literal("loc(X)").unwrap(), &Unifier::new())
            .unwrap();
        assert_eq!(found, vec![fact("loc(2)"), fact("loc(1)")]);
        assert_eq!(bb.len().unwrap(), 2);
    }

    #[test]
    fn relevant_plans_bind_trigger() {
        let pl = InMemoryPlanLibrary::new();
        pl.add(parse_plan("+on(moved(D)) : loc(X) <- +moved(D).").unwrap()).unwrap();
        pl.add(parse_plan("-on(moved(D)) <- -moved(D).").unwrap()).unwrap();

        let trigger = Trigger::add_belief(parse_literal("on(moved(right))").unwrap());
        let options = pl.relevant(&trigger).unwrap();
        assert_eq!(options.len(), 1);
        let opt = &options[0];
        let applied = opt.unifier.apply_plan(&opt.plan);
        assert_eq!(applied.trigger.literal.to_string(), "on(moved(right))");
        assert_eq!(pl.plans().unwrap().len(), 2);
    }
}
