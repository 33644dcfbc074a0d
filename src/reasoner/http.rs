//! Blocking HTTP client for the reasoner service.
//!
//! Every request has an explicit timeout. Connection errors, timeouts and
//! 5xx answers are retried with exponential backoff up to
//! `max_retries` times; anything else fails immediately.

use std::collections::HashMap;
use std::thread;
use std::time::Instant;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReasonerConfig;
use crate::del::DelEventModel;
use crate::error::ReasonerError;
use crate::formula::{EpistemicFormulaLiteral, Formula};
use crate::reasoner::protocol::{
    ApplyEventModelRequest, CreateModelRequest, EvaluateFormulaRequest, EvaluateFormulaResponse,
    EvaluateFormulasRequest, EvaluateFormulasResponse, FormulaQuery, SuccessResponse,
};
use crate::reasoner::{match_answers, ReasonerClient};

/// Reasoner client over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpReasonerClient {
    client: Client,
    config: ReasonerConfig,
}

impl HttpReasonerClient {
    /// Builds a client for the configured endpoints.
    pub fn new(config: ReasonerConfig) -> Result<Self, ReasonerError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ReasonerError::ConnectionFailed { message: e.to_string() })?;
        Ok(Self { client, config })
    }

    /// Endpoint configuration.
    #[must_use]
    pub const fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    fn transport_error(&self, err: &reqwest::Error) -> ReasonerError {
        if err.is_timeout() {
            ReasonerError::Timeout {
                duration_ms: self.config.timeout_secs.saturating_mul(1000),
            }
        } else {
            ReasonerError::ConnectionFailed { message: err.to_string() }
        }
    }

    /// Posts `body` and returns the raw answer text of a 2xx response.
    fn post_raw<B: Serialize>(&self, path: &str, body: &B) -> Result<String, ReasonerError> {
        let url = self.config.endpoint(path);
        let payload = serde_json::to_vec(body).map_err(|e| ReasonerError::SerializationFailed {
            message: e.to_string(),
        })?;

        let mut attempt = 0;
        loop {
            let err = match self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(payload.clone())
                .send()
            {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().map_err(|e| self.transport_error(&e))?;
                    if status.is_success() {
                        return Ok(text);
                    }
                    ReasonerError::ServerError {
                        code: status.as_u16(),
                        message: text,
                    }
                }
                Err(e) => self.transport_error(&e),
            };

            if attempt >= self.config.max_retries || !err.is_retryable() {
                return Err(err);
            }
            let backoff = self.config.backoff(attempt);
            debug!(
                url = %url,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis(),
                error = %err,
                "Retrying reasoner request"
            );
            thread::sleep(backoff);
            attempt += 1;
        }
    }

    fn post<B: Serialize, R: DeserializeOwned + Default>(&self, path: &str, body: &B) -> Result<R, ReasonerError> {
        let text = self.post_raw(path, body)?;
        if text.trim().is_empty() {
            return Ok(R::default());
        }
        serde_json::from_str(&text).map_err(|e| ReasonerError::DeserializationFailed {
            message: e.to_string(),
        })
    }
}

impl ReasonerClient for HttpReasonerClient {
    fn create_model(&self, constraints: &[Formula]) -> Result<bool, ReasonerError> {
        let started = Instant::now();
        let request = CreateModelRequest {
            constraints: constraints.to_vec(),
        };
        let response: SuccessResponse = self.post(&self.config.create_model_path, &request)?;
        info!(
            constraints = constraints.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Reasoner model created"
        );
        // a 2xx without a body counts as success
        Ok(response.success.unwrap_or(true))
    }

    fn apply_event_model(&self, model: &DelEventModel) -> Result<bool, ReasonerError> {
        let request = ApplyEventModelRequest::from(model);
        let response: SuccessResponse = self.post(&self.config.apply_event_path, &request)?;
        response.success.ok_or(ReasonerError::MissingField { field: "success" })
    }

    fn evaluate_formulas(&self, formulas: &[EpistemicFormulaLiteral]) -> Result<HashMap<Uuid, bool>, ReasonerError> {
        if formulas.is_empty() {
            return Ok(HashMap::new());
        }
        let started = Instant::now();
        let request = EvaluateFormulasRequest {
            formulas: formulas.iter().map(FormulaQuery::from).collect(),
        };
        let response: EvaluateFormulasResponse = self.post(&self.config.evaluate_path, &request)?;
        debug!(
            formulas = formulas.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Reasoner evaluated formulas"
        );
        Ok(response
            .result
            .map(|answers| match_answers(formulas, answers))
            .unwrap_or_default())
    }

    fn evaluate_formula(&self, formula: &Formula) -> Result<bool, ReasonerError> {
        let request = EvaluateFormulaRequest {
            formula: formula.clone(),
        };
        let response: EvaluateFormulaResponse = self.post(&self.config.evaluate_single_path, &request)?;
        Ok(response.result.unwrap_or_else(|| {
            warn!(formula = %formula, "Reasoner returned no result for formula");
            false
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_reasoner_is_a_connection_error() {
        let config = ReasonerConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            max_retries: 1,
            backoff_ms: 1,
            ..ReasonerConfig::default()
        };
        let client = HttpReasonerClient::new(config).unwrap();
        let err = client.evaluate_formula(&Formula::truth()).unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }

    #[test]
    fn empty_batch_skips_the_round_trip() {
        let client = HttpReasonerClient::new(ReasonerConfig::default()).unwrap();
        assert!(client.evaluate_formulas(&[]).unwrap().is_empty());
    }
}
