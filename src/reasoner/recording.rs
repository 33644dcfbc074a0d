//! In-process reasoner that records requests and answers from a fixed valuation.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use uuid::Uuid;

use crate::del::DelEventModel;
use crate::error::ReasonerError;
use crate::formula::{EpistemicFormulaLiteral, Formula};
use crate::reasoner::protocol::{
    ApplyEventModelRequest, CreateModelRequest, EvaluateFormulaRequest, EvaluateFormulasRequest, FormulaQuery,
};
use crate::reasoner::{match_answers, ReasonerClient};

/// A request seen by [`RecordingReasoner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    /// Model creation.
    CreateModel(CreateModelRequest),
    /// Event-model application.
    ApplyEventModel(ApplyEventModelRequest),
    /// Batch evaluation.
    EvaluateFormulas(EvaluateFormulasRequest),
    /// Single evaluation.
    EvaluateFormula(EvaluateFormulaRequest),
}

#[derive(Debug)]
struct State {
    requests: Vec<RecordedRequest>,
    true_formulas: HashSet<String>,
    accept_updates: bool,
    fail_transport: bool,
}

/// Reasoner stand-in for tests and embedded use.
///
/// A modal query is true iff its rendered formula (e.g. `(know loc(1))`) was
/// marked true. Updates succeed unless [`RecordingReasoner::reject_updates`]
/// was called.
#[derive(Debug)]
pub struct RecordingReasoner {
    state: Mutex<State>,
}

impl Default for RecordingReasoner {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingReasoner {
    /// A reasoner for which nothing is true.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                requests: Vec::new(),
                true_formulas: HashSet::new(),
                accept_updates: true,
                fail_transport: false,
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> Result<T, ReasonerError> {
        let mut state = self.state.lock().map_err(|_| ReasonerError::ConnectionFailed {
            message: "recording reasoner lock poisoned".to_string(),
        })?;
        if state.fail_transport {
            return Err(ReasonerError::ConnectionFailed {
                message: "connection refused".to_string(),
            });
        }
        Ok(f(&mut state))
    }

    fn configure(&self, f: impl FnOnce(&mut State)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    /// Marks a rendered formula as true.
    pub fn set_true(&self, formula: &Formula) {
        let key = formula.to_string();
        self.configure(|s| {
            s.true_formulas.insert(key);
        });
    }

    /// Makes model creation and event application report failure.
    pub fn reject_updates(&self) {
        self.configure(|s| s.accept_updates = false);
    }

    /// Makes every call fail with a connection error.
    pub fn fail_transport(&self, fail: bool) {
        self.configure(|s| s.fail_transport = fail);
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().map(|s| s.requests.clone()).unwrap_or_default()
    }
}

impl ReasonerClient for RecordingReasoner {
    fn create_model(&self, constraints: &[Formula]) -> Result<bool, ReasonerError> {
        self.with_state(|s| {
            s.requests.push(RecordedRequest::CreateModel(CreateModelRequest {
                constraints: constraints.to_vec(),
            }));
            s.accept_updates
        })
    }

    fn apply_event_model(&self, model: &DelEventModel) -> Result<bool, ReasonerError> {
        self.with_state(|s| {
            s.requests
                .push(RecordedRequest::ApplyEventModel(ApplyEventModelRequest::from(model)));
            s.accept_updates
        })
    }

    fn evaluate_formulas(&self, formulas: &[EpistemicFormulaLiteral]) -> Result<HashMap<Uuid, bool>, ReasonerError> {
        let mut rendered = Vec::with_capacity(formulas.len());
        for f in formulas {
            let formula = f.to_formula().map_err(|e| ReasonerError::SerializationFailed {
                message: e.to_string(),
            })?;
            rendered.push((f.id().to_string(), formula.to_string()));
        }
        let answers = self.with_state(|s| {
            s.requests.push(RecordedRequest::EvaluateFormulas(EvaluateFormulasRequest {
                formulas: formulas.iter().map(FormulaQuery::from).collect(),
            }));
            rendered
                .into_iter()
                .map(|(id, text)| (id, s.true_formulas.contains(&text)))
                .collect::<HashMap<String, bool>>()
        })?;
        Ok(match_answers(formulas, answers))
    }

    fn evaluate_formula(&self, formula: &Formula) -> Result<bool, ReasonerError> {
        self.with_state(|s| {
            s.requests.push(RecordedRequest::EvaluateFormula(EvaluateFormulaRequest {
                formula: formula.clone(),
            }));
            s.true_formulas.contains(&formula.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::EpistemicModality;
    use crate::syntax::parse_literal;

    fn know(src: &str) -> Formula {
        Formula::modal(
            EpistemicModality::Know,
            Formula::literal(&parse_literal(src).unwrap()).unwrap(),
        )
    }

    #[test]
    fn answers_from_valuation_and_records() {
        let reasoner = RecordingReasoner::new();
        reasoner.set_true(&know("loc(1)"));
        assert!(reasoner.evaluate_formula(&know("loc(1)")).unwrap());
        assert!(!reasoner.evaluate_formula(&know("loc(2)")).unwrap());

        let lits: Vec<_> = ["know(loc(1))", "know(loc(2))"]
            .iter()
            .map(|s| EpistemicFormulaLiteral::parse(&parse_literal(s).unwrap()).unwrap())
            .collect();
        let answers = reasoner.evaluate_formulas(&lits).unwrap();
        assert_eq!(answers[&lits[0].id()], true);
        assert_eq!(answers[&lits[1].id()], false);
        assert_eq!(reasoner.requests().len(), 3);
    }

    #[test]
    fn transport_failures_and_rejections() {
        let reasoner = RecordingReasoner::new();
        reasoner.reject_updates();
        assert!(!reasoner.create_model(&[]).unwrap());
        reasoner.fail_transport(true);
        assert!(matches!(
            reasoner.create_model(&[]),
            Err(ReasonerError::ConnectionFailed { .. })
        ));
        assert_eq!(reasoner.requests().len(), 1);
    }
}
