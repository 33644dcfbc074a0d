//! Dynamic epistemic logic event models built from belief updates.
//!
//! A belief event `+p` is remapped to `+on(p)`. Every `on(p)` plan whose
//! context has at least one rewrite becomes one alternative event: the
//! rewritten context is its precondition and the belief changes in its body
//! are its postcondition. With no applicable plan a single default event
//! simply makes `p` true (or false for a removal).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::InternalActions;
use crate::error::GroundingError;
use crate::formula::{simplify_and_prop, Formula, Prop};
use crate::range::RangeRegistry;
use crate::rewrite::Rewriter;
use crate::store::{BeliefBase, PlanLibrary, PlanOption, StoreError};
use crate::syntax::{BodyStep, Literal, LogicalFormula, Plan, Trigger, TriggerKind, TriggerOp};

/// Functor wrapping the event literal of epistemic-effect plans.
pub const ON_FUNCTOR: &str = "on";

/// A belief event remapped to its `on(...)` trigger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OnEvent {
    op: TriggerOp,
    event_literal: Literal,
    on_trigger: Trigger,
}

impl OnEvent {
    /// Maps `+p` / `-p` to `+on(p)` / `-on(p)`. Annotations are dropped.
    ///
    /// Returns `None` for goal events.
    #[must_use]
    pub fn from_trigger(trigger: &Trigger) -> Option<Self> {
        if trigger.kind != TriggerKind::Belief {
            return None;
        }
        let event_literal = trigger.literal.without_annots();
        let on_trigger = Trigger {
            op: trigger.op,
            kind: TriggerKind::Belief,
            literal: Literal::wrap(ON_FUNCTOR, event_literal.clone()),
        };
        Some(Self {
            op: trigger.op,
            event_literal,
            on_trigger,
        })
    }

    /// The updated literal `p`.
    #[must_use]
    pub const fn event_literal(&self) -> &Literal {
        &self.event_literal
    }

    /// The `on(p)` trigger used to look up plans.
    #[must_use]
    pub const fn on_trigger(&self) -> &Trigger {
        &self.on_trigger
    }

    /// `+` or `-`.
    #[must_use]
    pub const fn op(&self) -> TriggerOp {
        self.op
    }

    /// Returns true for additions.
    #[must_use]
    pub const fn is_addition(&self) -> bool {
        matches!(self.op, TriggerOp::Add)
    }
}

impl fmt::Display for OnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.event_literal)
    }
}

/// One alternative of an event model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DelEvent {
    /// Readable identifier, unique within a model.
    pub id: String,
    /// When this alternative can happen.
    #[serde(rename = "pre")]
    pub precondition: Formula,
    /// New truth value per affected proposition.
    #[serde(rename = "post")]
    pub postcondition: BTreeMap<Prop, Formula>,
}

impl DelEvent {
    /// An event with no postconditions.
    #[must_use]
    pub fn new(id: impl Into<String>, precondition: Formula) -> Self {
        Self {
            id: id.into(),
            precondition,
            postcondition: BTreeMap::new(),
        }
    }

    /// Sets `prop` to `value` after the event. A later call for the same
    /// proposition wins.
    pub fn set_post(&mut self, prop: Prop, value: Formula) {
        self.postcondition.insert(prop, value);
    }

    /// Maps an instantiated plan to an event.
    ///
    /// The id is the label-free plan text, the precondition its simplified
    /// context, and every `+l` / `-l` in the body sets `l` true or false.
    /// A strongly negated `+~l` sets `l` false.
    ///
    /// # Errors
    /// `NonGround` if the context or an updated literal is not ground.
    pub fn from_plan(plan: &Plan) -> Result<Self, GroundingError> {
        let plan = plan.without_label();
        let precondition = match &plan.context {
            Some(context) => simplify_and_prop(context)?,
            None => Formula::truth(),
        };
        let mut event = Self::new(plan.to_string(), precondition);
        for step in &plan.body {
            let (literal, added) = match step {
                BodyStep::AddBel(l) | BodyStep::ReplaceBel(l) => (l, !l.negated),
                BodyStep::DelBel(l) => (l, false),
                BodyStep::Achieve(_) | BodyStep::Internal(_) | BodyStep::Action(_) => continue,
            };
            let value = if added { Formula::truth() } else { Formula::falsity() };
            event.set_post(Prop::new(&literal.positive())?, value);
        }
        Ok(event)
    }

    /// The event used when no `on(...)` plan applies: `+p` makes `p` true,
    /// anything else makes it false.
    pub fn default_for(on_event: &OnEvent) -> Result<Self, GroundingError> {
        let literal = on_event.event_literal();
        let value = if on_event.is_addition() && !literal.negated {
            Formula::truth()
        } else {
            Formula::falsity()
        };
        let mut event = Self::new(on_event.to_string(), Formula::truth());
        event.set_post(Prop::new(&literal.positive())?, value);
        Ok(event)
    }

    /// Returns true if this event sets `prop` to the constant false.
    #[must_use]
    pub fn sets_false(&self, prop: &Prop) -> bool {
        self.postcondition.get(prop).is_some_and(Formula::is_false)
    }
}

/// Alternative events for one update, without duplicates, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelEventModel {
    events: Vec<DelEvent>,
}

impl DelEventModel {
    /// An empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A public announcement of `literal`: one event whose precondition is
    /// the literal itself and which changes nothing else.
    pub fn announcement(literal: &Literal) -> Result<Self, GroundingError> {
        let literal = literal.without_annots();
        let precondition = simplify_and_prop(&LogicalFormula::Literal(literal.clone()))?;
        let mut model = Self::new();
        model.push(DelEvent::new(literal.to_string(), precondition));
        Ok(model)
    }

    /// Adds an event unless an equal one is already present.
    pub fn push(&mut self, event: DelEvent) -> bool {
        if self.events.contains(&event) {
            return false;
        }
        self.events.push(event);
        true
    }

    /// The events.
    #[must_use]
    pub fn events(&self) -> &[DelEvent] {
        &self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if there are no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Every proposition some event assigns, with the values assigned.
    pub fn postconditions(&self) -> impl Iterator<Item = (&Prop, &Formula)> {
        self.events.iter().flat_map(|e| e.postcondition.iter())
    }
}

impl FromIterator<DelEvent> for DelEventModel {
    fn from_iter<I: IntoIterator<Item = DelEvent>>(iter: I) -> Self {
        let mut model = Self::new();
        for event in iter {
            model.push(event);
        }
        model
    }
}

/// Builds DEL event models from `on(...)` plans.
///
/// Plan applicability runs inside `selection_lock`, the same lock the agent
/// runtime holds while selecting plans.
#[derive(Clone, Copy)]
pub struct EventModelBuilder<'a> {
    beliefs: &'a dyn BeliefBase,
    plans: &'a dyn PlanLibrary,
    ranges: &'a RangeRegistry,
    actions: &'a InternalActions,
    selection_lock: &'a Mutex<()>,
}

impl fmt::Debug for EventModelBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventModelBuilder")
            .field("ranges", &self.ranges.len())
            .finish_non_exhaustive()
    }
}

impl<'a> EventModelBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub fn new(
        beliefs: &'a dyn BeliefBase,
        plans: &'a dyn PlanLibrary,
        ranges: &'a RangeRegistry,
        actions: &'a InternalActions,
        selection_lock: &'a Mutex<()>,
    ) -> Self {
        Self {
            beliefs,
            plans,
            ranges,
            actions,
            selection_lock,
        }
    }

    /// Every applicable option for the event's `on(...)` trigger.
    ///
    /// A plan without context applies as is. Otherwise each distinct
    /// `(simplified context, unifier)` rewrite of its context yields a copy
    /// of the plan carrying that simplified context.
    pub fn applicable_options(&self, on_event: &OnEvent) -> Result<Vec<PlanOption>, GroundingError> {
        let _guard = self
            .selection_lock
            .lock()
            .map_err(|_| StoreError::Backend("poisoned lock: plan selection".to_string()))?;

        let rewriter = Rewriter::new(self.beliefs, self.ranges, self.actions);
        let mut out = Vec::new();
        for option in self.plans.relevant(on_event.on_trigger())? {
            let Some(context) = &option.plan.context else {
                debug!(plan = %option.plan, unifier = %option.unifier, "Applicable without context");
                out.push(option);
                continue;
            };
            let mut distinct = HashSet::new();
            for ru in rewriter.consequences(context, &option.unifier)? {
                let (formula, unifier) = ru.into_parts();
                let simplified = formula.simplify();
                if !distinct.insert((simplified.clone(), unifier.clone())) {
                    continue;
                }
                debug!(plan = %option.plan, context = %simplified, unifier = %unifier, "Applicable");
                out.push(PlanOption {
                    plan: option.plan.with_context(simplified),
                    unifier,
                });
            }
            if distinct.is_empty() {
                debug!(plan = %option.plan, "Not applicable");
            }
        }
        Ok(out)
    }

    /// Builds the event model for `on_event`.
    ///
    /// # Errors
    /// Grounding errors from rewriting contexts or propositionalizing plans.
    pub fn build(&self, on_event: &OnEvent) -> Result<DelEventModel, GroundingError> {
        let started = Instant::now();
        let options = self.applicable_options(on_event)?;
        let model: DelEventModel = if options.is_empty() {
            [DelEvent::default_for(on_event)?].into_iter().collect()
        } else {
            options
                .iter()
                .map(|o| DelEvent::from_plan(&o.unifier.apply_plan(&o.plan)))
                .collect::<Result<DelEventModel, _>>()?
        };
        debug!(
            event = %on_event,
            options = options.len(),
            events = model.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Built event model"
        );
        Ok(model)
    }
}
