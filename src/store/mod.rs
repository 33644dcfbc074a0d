//! Belief-base and plan-library storage.
//!
//! The traits define the interface the epistemic core consumes; the
//! in-memory module provides the reference backends.

mod memory;
mod traits;

pub use memory::{InMemoryBeliefBase, InMemoryPlanLibrary};
pub use traits::{BeliefBase, BeliefEntry, PlanLibrary, PlanOption, StoreError};
