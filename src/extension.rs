//! The epistemic extension attached to one agent.
//!
//! [`EpistemicExtension`] owns the model state (tracked literals and the
//! one-shot "model created" flag) and drives the pipelines:
//!
//! - [`EpistemicExtension::create_model`] grounds the belief base once and
//!   sends the constraints to the reasoner
//! - [`EpistemicExtension::apply_event`] turns a belief update into a DEL
//!   event model (or a public announcement) and applies it
//! - [`EpistemicExtension::query_base`] is the belief-base view used during
//!   plan selection
//!
//! State is single-writer: mutation goes through `&mut self`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::actions::InternalActions;
use crate::config::{ExtensionConfig, ReasonerType};
use crate::del::{DelEventModel, EventModelBuilder, OnEvent};
use crate::error::{EpistemicError, EpistemicResult};
use crate::formula::{EpistemicModality, Formula};
use crate::grounding::ModelGrounder;
use crate::query::EpistemicBeliefBase;
use crate::range::RangeRegistry;
use crate::reasoner::{ConstraintDump, ReasonerClient};
use crate::store::{BeliefBase, BeliefEntry, PlanLibrary};
use crate::syntax::{parse_program, Clause, Literal, Trigger};

/// Outcome of [`EpistemicExtension::create_model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    /// Constraints were sent; `success` is the reasoner's answer.
    Created {
        /// Number of constraints sent.
        constraints: usize,
        /// Reasoner-reported success.
        success: bool,
    },
    /// The model already existed; nothing was sent.
    AlreadyCreated,
}

/// Outcome of [`EpistemicExtension::apply_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event model was sent.
    Applied {
        /// Alternative events in the model.
        events: usize,
        /// Reasoner-reported success.
        success: bool,
    },
    /// The update has no epistemic effect (goal event, foreign namespace,
    /// or an untracked literal under PAL).
    Skipped,
}

/// Epistemic reasoning for one agent.
pub struct EpistemicExtension {
    beliefs: Arc<dyn BeliefBase>,
    plans: Arc<dyn PlanLibrary>,
    reasoner: Arc<dyn ReasonerClient>,
    actions: InternalActions,
    config: ExtensionConfig,
    ranges: RangeRegistry,
    model_created: Arc<AtomicBool>,
    selection_lock: Arc<Mutex<()>>,
    events_tx: Sender<Trigger>,
    events_rx: Receiver<Trigger>,
}

impl std::fmt::Debug for EpistemicExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpistemicExtension")
            .field("config", &self.config)
            .field("ranges", &self.ranges.len())
            .field("model_created", &self.is_model_created())
            .field("pending_events", &self.events_rx.len())
            .finish_non_exhaustive()
    }
}

impl EpistemicExtension {
    /// Creates an extension over the agent's stores.
    ///
    /// # Errors
    /// `Config` if the configuration does not validate.
    pub fn new(
        beliefs: Arc<dyn BeliefBase>,
        plans: Arc<dyn PlanLibrary>,
        reasoner: Arc<dyn ReasonerClient>,
        config: ExtensionConfig,
    ) -> EpistemicResult<Self> {
        config.validate()?;
        let (events_tx, events_rx) = bounded(config.event_queue_capacity);
        Ok(Self {
            beliefs,
            plans,
            reasoner,
            actions: InternalActions::with_builtins(),
            config,
            ranges: RangeRegistry::new(),
            model_created: Arc::new(AtomicBool::new(false)),
            selection_lock: Arc::new(Mutex::new(())),
            events_tx,
            events_rx,
        })
    }

    /// Replaces the internal-action registry.
    #[must_use]
    pub fn with_actions(mut self, actions: InternalActions) -> Self {
        self.actions = actions;
        self
    }

    /// Shares the plan-selection lock with the agent runtime.
    #[must_use]
    pub fn with_selection_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.selection_lock = lock;
        self
    }

    /// Parses agent source and loads its facts, rules and plans.
    ///
    /// Returns the number of clauses loaded.
    pub fn load_source(&self, src: &str) -> EpistemicResult<usize> {
        let clauses = parse_program(src)?;
        let count = clauses.len();
        for clause in clauses {
            match clause {
                Clause::Fact(lit) => {
                    self.beliefs.add(BeliefEntry::Fact(lit))?;
                }
                Clause::Rule(rule) => {
                    self.beliefs.add(BeliefEntry::Rule(rule))?;
                }
                Clause::Plan(plan) => self.plans.add(plan)?,
            }
        }
        Ok(count)
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    /// Tracked literals.
    #[must_use]
    pub const fn ranges(&self) -> &RangeRegistry {
        &self.ranges
    }

    /// The ground belief base.
    #[must_use]
    pub fn beliefs(&self) -> &Arc<dyn BeliefBase> {
        &self.beliefs
    }

    /// The plan-selection lock.
    #[must_use]
    pub fn selection_lock(&self) -> &Arc<Mutex<()>> {
        &self.selection_lock
    }

    /// Returns true once model creation has run.
    #[must_use]
    pub fn is_model_created(&self) -> bool {
        self.model_created.load(Ordering::Acquire)
    }

    /// Builds the initial model. Runs at most once.
    ///
    /// A reasoner-reported failure is logged and the model still counts as
    /// created. Grounding and transport errors abort without marking it.
    pub fn create_model(&mut self) -> EpistemicResult<ModelStatus> {
        if self.is_model_created() {
            debug!("Epistemic model already created");
            return Ok(ModelStatus::AlreadyCreated);
        }
        let started = Instant::now();
        let output = ModelGrounder::new(self.beliefs.as_ref(), &self.actions)
            .with_single_constraints(self.config.single_constraints)
            .constraints(&mut self.ranges)?;
        let grounded_ms = started.elapsed().as_millis();

        if let Some(dir) = &self.config.dump_constraints_dir {
            match ConstraintDump::new(dir).write(&output.constraints) {
                Ok(path) => info!(path = %path.display(), "Dumped model constraints"),
                Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to dump model constraints"),
            }
        }

        let success = self.reasoner.create_model(&output.constraints)?;
        if !success {
            warn!(constraints = output.constraints.len(), "Failed to create epistemic model from constraints");
        }
        self.model_created.store(true, Ordering::Release);
        info!(
            constraints = output.constraints.len(),
            ranges = self.ranges.len(),
            grounding_ms = grounded_ms,
            elapsed_ms = started.elapsed().as_millis(),
            success,
            "Epistemic model created"
        );
        Ok(ModelStatus::Created {
            constraints: output.constraints.len(),
            success,
        })
    }

    /// Builds the update for `trigger` without sending it.
    pub fn event_model(&self, trigger: &Trigger) -> EpistemicResult<Option<DelEventModel>> {
        let Some(on_event) = OnEvent::from_trigger(trigger) else {
            return Ok(None);
        };
        let literal = on_event.event_literal();
        if !literal.is_default_namespace() {
            info!(event = %trigger, "Skipping on-event outside the default namespace");
            return Ok(None);
        }
        match self.config.reasoner_type {
            ReasonerType::Pal => {
                if !self.ranges.contains(literal) {
                    debug!(event = %trigger, "Skipping announcement of untracked literal");
                    return Ok(None);
                }
                Ok(Some(DelEventModel::announcement(literal)?))
            }
            ReasonerType::Del => {
                let builder = EventModelBuilder::new(
                    self.beliefs.as_ref(),
                    self.plans.as_ref(),
                    &self.ranges,
                    &self.actions,
                    &self.selection_lock,
                );
                Ok(Some(builder.build(&on_event)?))
            }
        }
    }

    /// Applies one belief update to the model.
    ///
    /// On success, every literal an event may set to something other than
    /// false becomes tracked; a literal the only event sets to false stops
    /// being tracked.
    pub fn apply_event(&mut self, trigger: &Trigger) -> EpistemicResult<EventOutcome> {
        let started = Instant::now();
        let Some(model) = self.event_model(trigger)? else {
            return Ok(EventOutcome::Skipped);
        };
        let success = self.reasoner.apply_event_model(&model)?;
        if success {
            self.track_postconditions(&model)?;
        } else {
            warn!(event = %trigger, events = model.len(), "Reasoner rejected event model");
        }
        info!(
            event = %trigger,
            events = model.len(),
            success,
            elapsed_ms = started.elapsed().as_millis(),
            "Applied event model"
        );
        Ok(EventOutcome::Applied {
            events: model.len(),
            success,
        })
    }

    fn track_postconditions(&mut self, model: &DelEventModel) -> EpistemicResult<()> {
        let only_event = model.len() == 1;
        for (prop, value) in model.postconditions() {
            let pos = prop.literal().clone();
            let neg = pos.clone().with_negated(true);
            if value.is_false() {
                if only_event && self.ranges.remove_both(&pos) {
                    self.beliefs.remove(&pos)?;
                    self.beliefs.remove(&neg)?;
                }
            } else if self.ranges.register_both(&pos) {
                self.beliefs.add(BeliefEntry::Fact(pos))?;
                self.beliefs.add(BeliefEntry::Fact(neg))?;
            }
        }
        Ok(())
    }

    /// Sender for belief events produced by the agent runtime.
    #[must_use]
    pub fn event_sink(&self) -> Sender<Trigger> {
        self.events_tx.clone()
    }

    /// Applies every queued belief event in order. Stops at the first error.
    ///
    /// Returns the number of events taken from the queue.
    pub fn process_pending_events(&mut self) -> EpistemicResult<usize> {
        let mut processed = 0;
        loop {
            match self.events_rx.try_recv() {
                Ok(trigger) => {
                    processed += 1;
                    self.apply_event(&trigger)?;
                }
                Err(TryRecvError::Empty) => return Ok(processed),
                Err(TryRecvError::Disconnected) => {
                    return Err(EpistemicError::internal("belief event queue disconnected"));
                }
            }
        }
    }

    /// The belief-base view answering epistemic queries.
    #[must_use]
    pub fn query_base(&self) -> EpistemicBeliefBase {
        EpistemicBeliefBase::new(
            Arc::clone(&self.beliefs),
            Arc::clone(&self.reasoner),
            Arc::clone(&self.model_created),
        )
    }

    /// Evaluates `modality formula`.
    ///
    /// The constants are answered locally. Before model creation every
    /// query is answered true.
    pub fn evaluate(&self, modality: EpistemicModality, formula: &Formula) -> EpistemicResult<bool> {
        if formula.is_true() {
            return Ok(true);
        }
        if formula.is_false() {
            return Ok(false);
        }
        if !self.is_model_created() {
            warn!(formula = %formula, "Epistemic model not created yet, evaluating as true");
            return Ok(true);
        }
        Ok(self.reasoner.evaluate_formula(&Formula::modal(modality, formula.clone()))?)
    }

    /// Evaluates `modality literal` for a ground literal.
    pub fn evaluate_literal(&self, modality: EpistemicModality, literal: &Literal) -> EpistemicResult<bool> {
        self.evaluate(modality, &Formula::literal(literal)?)
    }
}
