//! Request/response boundary to the external epistemic model checker.
//!
//! The reasoner owns the Kripke model. The extension only sends it
//! constraints, event models and queries; see [`protocol`] for the bodies.

mod dump;
#[cfg(feature = "http")]
mod http;
pub mod protocol;
mod recording;

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::del::DelEventModel;
use crate::error::ReasonerError;
use crate::formula::{EpistemicFormulaLiteral, Formula};

pub use dump::ConstraintDump;
#[cfg(feature = "http")]
pub use http::HttpReasonerClient;
pub use recording::{RecordedRequest, RecordingReasoner};

/// Client for the reasoner service. Every call is a blocking round trip.
pub trait ReasonerClient: Send + Sync {
    /// Builds the initial model. Returns the reasoner's success flag.
    fn create_model(&self, constraints: &[Formula]) -> Result<bool, ReasonerError>;

    /// Applies an event model. Returns the reasoner's success flag.
    fn apply_event_model(&self, model: &DelEventModel) -> Result<bool, ReasonerError>;

    /// Evaluates a batch of epistemic literals, keyed by their ids.
    ///
    /// Ids missing from the answer were not reported true.
    fn evaluate_formulas(&self, formulas: &[EpistemicFormulaLiteral]) -> Result<HashMap<Uuid, bool>, ReasonerError>;

    /// Evaluates one (modal) formula.
    fn evaluate_formula(&self, formula: &Formula) -> Result<bool, ReasonerError>;
}

/// Maps a batch answer keyed by id strings back onto the queried ids.
/// Unknown ids are logged and dropped.
pub(crate) fn match_answers(
    formulas: &[EpistemicFormulaLiteral],
    answers: HashMap<String, bool>,
) -> HashMap<Uuid, bool> {
    let known: HashMap<String, Uuid> = formulas.iter().map(|f| (f.id().to_string(), f.id())).collect();
    let mut out = HashMap::with_capacity(answers.len());
    for (key, value) in answers {
        match known.get(&key) {
            Some(id) => {
                out.insert(*id, value);
            }
            None => warn!(id = %key, "Reasoner answered an unknown formula id"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_literal;

    #[test]
    fn unknown_ids_are_dropped() {
        let f = EpistemicFormulaLiteral::parse(&parse_literal("know(p)").unwrap()).unwrap();
        let answers: HashMap<String, bool> = [(f.id().to_string(), true), ("bogus".to_string(), true)]
            .into_iter()
            .collect();
        let matched = match_answers(std::slice::from_ref(&f), answers);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched.get(&f.id()), Some(&true));
    }
}
