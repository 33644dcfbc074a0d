//! # bdi-epistemic - Epistemic reasoning for BDI agents
//!
//! Connects a rule-based agent belief base to an external epistemic
//! reasoner that maintains a Kripke model of what the agent knows and
//! considers possible.
//!
//! ## Core Concepts
//!
//! - **Range**: a `range(p)` declaration makes `p` bivalent in the model
//! - **Grounding**: rules are rewritten into propositional constraints
//!   over ground literals
//! - **Event model**: a belief update becomes a set of alternative DEL
//!   events, one per applicable `on(...)` plan grounding
//! - **Epistemic query**: `know(p)` / `possible(p)` lookups during plan
//!   selection are answered by the reasoner
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bdi_epistemic::{EpistemicExtension, ExtensionConfig, InMemoryBeliefBase, InMemoryPlanLibrary};
//! use bdi_epistemic::reasoner::RecordingReasoner;
//!
//! let mut ext = EpistemicExtension::new(
//!     Arc::new(InMemoryBeliefBase::new()),
//!     Arc::new(InMemoryPlanLibrary::new()),
//!     Arc::new(RecordingReasoner::new()),
//!     ExtensionConfig::default(),
//! )?;
//! ext.load_source("range(loc(1)). range(loc(2)).")?;
//! ext.create_model()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Agent language
pub mod syntax;
pub mod unifier;

// Stores and built-ins
pub mod actions;
pub mod store;

// Propositionalization
pub mod formula;
pub mod range;
pub mod rewrite;
pub mod grounding;

// Updates, queries and the reasoner
pub mod del;
pub mod query;
pub mod reasoner;

pub mod config;
pub mod error;
pub mod extension;

pub use actions::{InternalAction, InternalActions};
pub use config::{ExtensionConfig, ReasonerConfig, ReasonerType};
pub use del::{DelEvent, DelEventModel, EventModelBuilder, OnEvent};
pub use error::{ConfigError, EpistemicError, EpistemicResult, GroundingError, ParseError, ReasonerError};
pub use extension::{EpistemicExtension, EventOutcome, ModelStatus};
pub use formula::{EpistemicFormulaLiteral, EpistemicModality, Formula, Prop};
pub use grounding::{GroundingOutput, ModelGrounder};
pub use query::EpistemicBeliefBase;
pub use range::RangeRegistry;
pub use reasoner::ReasonerClient;
pub use rewrite::{RewriteUnifier, Rewriter};
pub use store::{BeliefBase, BeliefEntry, InMemoryBeliefBase, InMemoryPlanLibrary, PlanLibrary, PlanOption, StoreError};
pub use syntax::{Literal, LogicalFormula, Plan, Rule, Term, Trigger};
pub use unifier::Unifier;
