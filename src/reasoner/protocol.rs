//! JSON bodies exchanged with the reasoner service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::del::{DelEvent, DelEventModel};
use crate::formula::{EpistemicFormulaLiteral, EpistemicModality, Formula};

/// `POST create_model_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateModelRequest {
    /// Initial-model constraints.
    pub constraints: Vec<Formula>,
}

/// `POST apply_event_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyEventModelRequest {
    /// Alternative events.
    pub events: Vec<DelEvent>,
}

impl From<&DelEventModel> for ApplyEventModelRequest {
    fn from(model: &DelEventModel) -> Self {
        Self {
            events: model.events().to_vec(),
        }
    }
}

/// One epistemic query of a batch.
///
/// `prop` is always the positive proposition; the inner sign travels in
/// `prop_negated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaQuery {
    /// Correlates the answer with the query.
    pub id: String,
    /// `know` or `possible`.
    pub modality: EpistemicModality,
    /// Outer negation.
    pub modality_negated: bool,
    /// Inner negation.
    pub prop_negated: bool,
    /// Positive proposition text.
    pub prop: String,
}

impl From<&EpistemicFormulaLiteral> for FormulaQuery {
    fn from(formula: &EpistemicFormulaLiteral) -> Self {
        Self {
            id: formula.id().to_string(),
            modality: formula.modality(),
            modality_negated: formula.modality_negated(),
            prop_negated: formula.proposition_negated(),
            prop: formula.root_literal().positive().without_annots().to_string(),
        }
    }
}

/// `POST evaluate_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateFormulasRequest {
    /// Queries.
    pub formulas: Vec<FormulaQuery>,
}

/// Batch answer. A missing `result` means nothing was true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateFormulasResponse {
    /// Truth value per query id.
    #[serde(default)]
    pub result: Option<HashMap<String, bool>>,
}

/// `POST evaluate_single_path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateFormulaRequest {
    /// A modal formula.
    pub formula: Formula,
}

/// Single-formula answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateFormulaResponse {
    /// Truth value, absent if the reasoner could not evaluate the formula.
    #[serde(default)]
    pub result: Option<bool>,
}

/// Answer to model creation and event application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Whether the reasoner accepted the update.
    #[serde(default)]
    pub success: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_literal;

    #[test]
    fn query_uses_camel_case_and_positive_prop() {
        let lit = EpistemicFormulaLiteral::parse(&parse_literal("~possible(~loc(1,2))").unwrap()).unwrap();
        let query = FormulaQuery::from(&lit);
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["modality"], "possible");
        assert_eq!(value["modalityNegated"], true);
        assert_eq!(value["propNegated"], true);
        assert_eq!(value["prop"], "loc(1,2)");
        assert_eq!(value["id"], lit.id().to_string());
    }

    #[test]
    fn missing_result_fields_default() {
        let batch: EvaluateFormulasResponse = serde_json::from_str("{}").unwrap();
        assert!(batch.result.is_none());
        let single: EvaluateFormulaResponse = serde_json::from_str("{\"result\": true}").unwrap();
        assert_eq!(single.result, Some(true));
        let ok: SuccessResponse = serde_json::from_str("{\"success\": false}").unwrap();
        assert_eq!(ok.success, Some(false));
    }

    #[test]
    fn create_model_body() {
        let req = CreateModelRequest {
            constraints: vec![Formula::truth()],
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"constraints":[{"type":"prop","prop":"true"}]}"#
        );
    }
}
