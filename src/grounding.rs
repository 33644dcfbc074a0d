//! Initial-model constraint extraction.
//!
//! [`ModelGrounder`] walks the belief base once and produces the formulas the
//! reasoner needs to build the initial Kripke model:
//!
//! 1. ground, non-perceptual beliefs as propositions (declarations excluded)
//! 2. bivalence `(p or not p)` for every `range(p)` grounding
//! 3. optionally, mutual exclusion for every `single(...)` group
//! 4. `bodies => head` for rules whose head is a tracked range literal
//!
//! Tracked literals are registered into the caller's [`RangeRegistry`] and
//! added to the belief base as facts so later lookups find them.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

use tracing::{debug, info};

use crate::actions::InternalActions;
use crate::error::GroundingError;
use crate::formula::{simplify_and_prop, Formula};
use crate::range::RangeRegistry;
use crate::rewrite::{RewriteUnifier, Rewriter};
use crate::store::{BeliefBase, BeliefEntry};
use crate::syntax::{Literal, LogicalFormula, Term};
use crate::unifier::Unifier;

/// Functor of range declarations.
pub const RANGE_FUNCTOR: &str = "range";
/// Functor of mutual-exclusion declarations.
pub const SINGLE_FUNCTOR: &str = "single";

const PERCEPT_SOURCE: &str = "percept";
const DECLARATION_VAR: &str = "RangeValue__";

/// Result of a grounding run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundingOutput {
    /// Constraints in phase order.
    pub constraints: Vec<Formula>,
    /// Literals newly tracked by this run, both polarities.
    pub ranges: Vec<Literal>,
}

/// Per-phase constraint counts, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounts {
    /// Belief propositions.
    pub beliefs: usize,
    /// Bivalence disjunctions.
    pub ranges: usize,
    /// Mutual-exclusion constraints.
    pub singles: usize,
    /// Range-derived rule implications.
    pub rules: usize,
}

/// Produces the constraint set for initial model creation.
#[derive(Clone, Copy)]
pub struct ModelGrounder<'a> {
    beliefs: &'a dyn BeliefBase,
    actions: &'a InternalActions,
    single_constraints: bool,
}

impl fmt::Debug for ModelGrounder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelGrounder")
            .field("actions", self.actions)
            .field("single_constraints", &self.single_constraints)
            .finish_non_exhaustive()
    }
}

impl<'a> ModelGrounder<'a> {
    /// Creates a grounder over a belief base.
    #[must_use]
    pub fn new(beliefs: &'a dyn BeliefBase, actions: &'a InternalActions) -> Self {
        Self {
            beliefs,
            actions,
            single_constraints: false,
        }
    }

    /// Enables `single(...)` mutual-exclusion constraints.
    #[must_use]
    pub const fn with_single_constraints(mut self, enabled: bool) -> Self {
        self.single_constraints = enabled;
        self
    }

    /// Runs every phase and returns the constraints in order.
    ///
    /// # Errors
    /// Any invariant violation raised by the rewrite engine or by
    /// propositionalization aborts the whole run.
    pub fn constraints(&self, ranges: &mut RangeRegistry) -> Result<GroundingOutput, GroundingError> {
        let started = Instant::now();
        let mut counts = PhaseCounts::default();
        let mut out = GroundingOutput::default();

        let beliefs = self.belief_constraints()?;
        counts.beliefs = beliefs.len();
        out.constraints.extend(beliefs);

        let (bivalence, tracked) = self.range_constraints(ranges)?;
        counts.ranges = bivalence.len();
        out.constraints.extend(bivalence);
        out.ranges = tracked;

        if self.single_constraints {
            let singles = self.single_constraints(ranges)?;
            counts.singles = singles.len();
            out.constraints.extend(singles);
        }

        let rules = self.range_rule_constraints(ranges)?;
        counts.rules = rules.len();
        out.constraints.extend(rules);

        info!(
            beliefs = counts.beliefs,
            ranges = counts.ranges,
            singles = counts.singles,
            rules = counts.rules,
            constraints = out.constraints.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Grounded model constraints"
        );
        Ok(out)
    }

    fn rewriter<'r>(&'r self, ranges: &'r RangeRegistry) -> Rewriter<'r> {
        Rewriter::new(self.beliefs, ranges, self.actions)
    }

    /// Phase 1: every ground default-namespace fact not sourced from perception.
    fn belief_constraints(&self) -> Result<Vec<Formula>, GroundingError> {
        let mut out = Vec::new();
        for entry in self.beliefs.snapshot()? {
            let BeliefEntry::Fact(fact) = entry else {
                continue;
            };
            if !fact.is_default_namespace() || fact.has_source(PERCEPT_SOURCE) || is_declaration(&fact) {
                continue;
            }
            out.push(Formula::literal(&fact)?);
        }
        Ok(out)
    }

    /// Phase 2: bivalence for every `range(V)` grounding.
    fn range_constraints(&self, ranges: &mut RangeRegistry) -> Result<(Vec<Formula>, Vec<Literal>), GroundingError> {
        let declaration = declaration(RANGE_FUNCTOR);
        let groundings = self.rewriter(ranges).consequences(&declaration, &Unifier::new())?;

        let mut constraints = Vec::new();
        let mut seen = HashSet::new();
        let mut tracked = Vec::new();
        for ru in &groundings {
            let Some(inner) = declared_literal(RANGE_FUNCTOR, ru) else {
                continue;
            };
            let pos = inner.without_annots();
            let neg = pos.clone().with_negated(true);
            let bivalence = Formula::or(vec![Formula::literal(&pos)?, Formula::literal(&neg)?]);
            if seen.insert(bivalence.clone()) {
                constraints.push(bivalence);
            }
            if ranges.register_both(&pos) {
                tracked.push(pos.clone());
                tracked.push(neg.clone());
            }
            self.beliefs.add(BeliefEntry::Fact(pos))?;
            self.beliefs.add(BeliefEntry::Fact(neg))?;
        }
        Ok((constraints, tracked))
    }

    /// Phase 3: for each `single` rule, at least one member holds and any
    /// member excludes the others.
    fn single_constraints(&self, ranges: &RangeRegistry) -> Result<Vec<Formula>, GroundingError> {
        let rewriter = self.rewriter(ranges);
        let mut out = Vec::new();
        for entry in self.beliefs.snapshot()? {
            let BeliefEntry::Rule(rule) = entry else {
                continue;
            };
            let head = &rule.head;
            if head.functor != SINGLE_FUNCTOR || head.arity() != 1 || head.negated || !head.is_default_namespace() {
                continue;
            }
            let rule = rule.rename_apart();
            let mut members: Vec<Formula> = Vec::new();
            for ru in rewriter.consequences(&rule.body, &Unifier::new())? {
                let instantiated = ru.unifier().apply_literal(&rule.head);
                let Some(inner) = instantiated.terms.first().and_then(Term::as_literal) else {
                    continue;
                };
                if !inner.is_ground() {
                    debug!(rule = %rule, member = %inner, "Skipping non-ground single member");
                    continue;
                }
                let member = Formula::literal(&inner)?;
                if !members.contains(&member) {
                    members.push(member);
                }
            }
            if members.is_empty() {
                continue;
            }
            out.push(Formula::or(members.clone()));
            for (i, member) in members.iter().enumerate() {
                let mut exclusive = vec![member.clone()];
                exclusive.extend(
                    members
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, other)| Formula::not(other.clone())),
                );
                out.push(Formula::implies(member.clone(), Formula::and(exclusive)));
            }
        }
        Ok(out)
    }

    /// Phase 4: `(body_1 or ... or body_n) => head` per distinct ground head
    /// of a rule defining a tracked literal.
    fn range_rule_constraints(&self, ranges: &RangeRegistry) -> Result<Vec<Formula>, GroundingError> {
        let rewriter = self.rewriter(ranges);
        let mut heads: Vec<(Literal, Vec<Formula>)> = Vec::new();
        let mut index: HashMap<Literal, usize> = HashMap::new();

        for tracked in ranges.iter() {
            for rule in self.beliefs.rules(tracked)? {
                let rule = rule.rename_apart();
                let mut head_match = Unifier::new();
                if !head_match.unify_literals(&rule.head, tracked) {
                    continue;
                }
                for ru in rewriter.consequences(&rule.body, &head_match)? {
                    let head = ru.unifier().apply_literal(&rule.head).without_annots();
                    if !head.is_ground() {
                        debug!(rule = %rule, head = %head, "Skipping rule with non-ground head");
                        continue;
                    }
                    let body = simplify_and_prop(&ru.unifier().apply_formula(ru.formula()))?;
                    // a body that can never hold contributes no implication
                    if body.is_false() {
                        continue;
                    }
                    let slot = *index.entry(head.clone()).or_insert_with(|| {
                        heads.push((head, Vec::new()));
                        heads.len() - 1
                    });
                    let bodies = &mut heads[slot].1;
                    if !bodies.contains(&body) {
                        bodies.push(body);
                    }
                }
            }
        }

        heads
            .into_iter()
            .map(|(head, bodies)| Ok(Formula::implies(Formula::or(bodies), Formula::literal(&head)?)))
            .collect()
    }
}

/// `functor(V)` with a fresh declaration variable.
fn is_declaration(fact: &Literal) -> bool {
    fact.arity() == 1 && !fact.negated && (fact.functor == RANGE_FUNCTOR || fact.functor == SINGLE_FUNCTOR)
}

fn declaration(functor: &str) -> LogicalFormula {
    LogicalFormula::Literal(Literal::new(functor).with_terms(vec![Term::var(DECLARATION_VAR)]))
}

/// The ground, non-negated literal a declaration grounding binds, if any.
fn declared_literal(functor: &str, ru: &RewriteUnifier) -> Option<Literal> {
    let term = ru.unifier().apply_term(&Term::var(DECLARATION_VAR));
    let Some(inner) = term.as_literal() else {
        debug!(declaration = functor, value = %term, "Skipping non-literal declaration");
        return None;
    };
    if !inner.is_ground() || inner.negated {
        debug!(declaration = functor, value = %inner, "Skipping non-ground or negated declaration");
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBeliefBase;
    use crate::syntax::{parse_program, Clause};

    fn base(src: &str) -> InMemoryBeliefBase {
        let bb = InMemoryBeliefBase::new();
        for clause in parse_program(src).unwrap() {
            match clause {
                Clause::Fact(lit) => {
                    bb.add(BeliefEntry::Fact(lit)).unwrap();
                }
                Clause::Rule(rule) => {
                    bb.add(BeliefEntry::Rule(rule)).unwrap();
                }
                Clause::Plan(_) => {}
            }
        }
        bb
    }

    fn ground(src: &str, single: bool) -> (GroundingOutput, RangeRegistry) {
        let bb = base(src);
        let actions = InternalActions::with_builtins();
        let mut ranges = RangeRegistry::new();
        let out = ModelGrounder::new(&bb, &actions)
            .with_single_constraints(single)
            .constraints(&mut ranges)
            .unwrap();
        (out, ranges)
    }

    fn rendered(out: &GroundingOutput) -> Vec<String> {
        out.constraints.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn plain_rules_yield_nothing() {
        let (out, ranges) = ground("p(X) :- q(X).", false);
        assert!(out.constraints.is_empty());
        assert!(ranges.is_empty());
    }

    #[test]
    fn beliefs_skip_percepts_and_namespaces() {
        let (out, _) = ground("door(open). light(on)[source(percept)]. ns::x(1). ~wet.", false);
        assert_eq!(rendered(&out), vec!["door(open)", "(not wet)"]);
    }

    #[test]
    fn two_ranges_two_constraints() {
        let (out, ranges) = ground("range(loc(1)). range(loc(2)).", false);
        let r = rendered(&out);
        assert!(r.contains(&"(loc(1) or (not loc(1)))".to_string()));
        assert!(r.contains(&"(loc(2) or (not loc(2)))".to_string()));
        assert_eq!(out.constraints.len(), 2);
        assert_eq!(ranges.len(), 4);
        assert_eq!(out.ranges.len(), 4);
    }

    #[test]
    fn false_range_rule_still_bivalent() {
        let (out, ranges) = ground("range(test(1,1)) :- false.", false);
        assert_eq!(rendered(&out), vec!["(test(1,1) or (not test(1,1)))"]);
        assert!(ranges.contains(&crate::syntax::parse_literal("~test(1,1)").unwrap()));
    }

    #[test]
    fn unsatisfiable_rule_body_adds_no_implication() {
        let (out, _) = ground("range(loc(1)). loc(1) :- false.", false);
        assert_eq!(rendered(&out), vec!["(loc(1) or (not loc(1)))"]);

        let (out, _) = ground("range(loc(1)). range(loc(2)). loc(1) :- false. loc(1) :- loc(2).", false);
        assert_eq!(
            rendered(&out),
            vec![
                "(loc(1) or (not loc(1)))",
                "(loc(2) or (not loc(2)))",
                "((loc(2)) => loc(1))",
            ]
        );
    }

    #[test]
    fn grounder_debug_names_its_settings() {
        let bb = InMemoryBeliefBase::new();
        let actions = InternalActions::with_builtins();
        let grounder = ModelGrounder::new(&bb, &actions).with_single_constraints(true);
        let shown = format!("{grounder:?}");
        assert!(shown.starts_with("ModelGrounder"));
        assert!(shown.contains("single_constraints: true"));
    }

    #[test]
    fn range_rule_with_alternatives() {
        let (out, _) = ground("range(test(X,Y)) :- (X = 5 & Y = 2) | (X = 8 & Y = 3).", false);
        assert_eq!(
            rendered(&out),
            vec!["(test(5,2) or (not test(5,2)))", "(test(8,3) or (not test(8,3)))"]
        );
    }

    #[test]
    fn negated_range_values_are_skipped() {
        let (out, ranges) = ground("range(~loc(1)).", false);
        assert!(out.constraints.is_empty());
        assert!(ranges.is_empty());
    }

    #[test]
    fn rules_over_ranges_become_implications() {
        let src = "range(loc(1)). range(loc(2)). range(near).\n\
                   near :- loc(1).\n\
                   near :- loc(2).";
        let (out, _) = ground(src, false);
        let r = rendered(&out);
        assert!(r.contains(&"((loc(1) or loc(2)) => near)".to_string()), "{r:?}");
    }

    #[test]
    fn single_constraints_are_opt_in() {
        let src = "single(loc(X)) :- .member(X, [1,2]).";
        let (off, _) = ground(src, false);
        assert!(off.constraints.is_empty());

        let (on, _) = ground(src, true);
        assert_eq!(
            rendered(&on),
            vec![
                "(loc(1) or loc(2))",
                "(loc(1) => (loc(1) and (not loc(2))))",
                "(loc(2) => (loc(2) and (not loc(1))))",
            ]
        );
    }

    #[test]
    fn range_literals_become_facts() {
        let bb = base("range(loc(1)).");
        let actions = InternalActions::with_builtins();
        let mut ranges = RangeRegistry::new();
        ModelGrounder::new(&bb, &actions).constraints(&mut ranges).unwrap();
        assert!(bb.contains(&crate::syntax::parse_literal("loc(1)").unwrap()).unwrap());
        assert!(bb.contains(&crate::syntax::parse_literal("~loc(1)").unwrap()).unwrap());
    }
}
