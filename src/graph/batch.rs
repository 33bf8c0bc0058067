//! `$batch` fan-out with a result per sub-request.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GraphApi;

/// One sub-request of a `$batch` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchStep {
    pub id: String,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl BatchStep {
    /// JSON `POST` sub-request.
    pub fn post(id: impl ToString, url: impl Into<String>, body: Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            id: id.to_string(),
            method: "POST".to_string(),
            url: url.into(),
            headers,
            body: Some(body),
        }
    }
}

/// `$batch` request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<BatchStep>,
}

/// One sub-response of a `$batch` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItemResponse {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub body: Option<Value>,
}

impl BatchItemResponse {
    fn into_outcome(self) -> Result<Value, String> {
        if (200..300).contains(&self.status) {
            return Ok(self.body.unwrap_or(Value::Null));
        }
        let detail = self
            .body
            .as_ref()
            .and_then(|b| b.pointer("/error/message"))
            .and_then(Value::as_str)
            .unwrap_or("no error message");
        Err(format!("status {}: {}", self.status, detail))
    }
}

/// `$batch` response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub responses: Vec<BatchItemResponse>,
}

/// Per-item outcome of a batched stage, keyed by request id.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    outcomes: BTreeMap<String, Result<Value, String>>,
    batches: usize,
}

impl BatchReport {
    /// Response body of a successful sub-request.
    pub fn success(&self, id: &str) -> Option<&Value> {
        self.outcomes.get(id).and_then(|o| o.as_ref().ok())
    }

    pub fn is_success(&self, id: &str) -> bool {
        self.success(id).is_some()
    }

    /// Ids of sub-requests that failed or got no response.
    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_err())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_err()).count()
    }

    pub fn item_count(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of physical `$batch` round-trips issued.
    pub fn batches(&self) -> usize {
        self.batches
    }
}

/// Issue `steps` as serial `$batch` calls of at most `batch_size` items.
///
/// A failing round-trip marks all of its items failed and the next chunk is
/// still sent. Sub-requests missing from a response count as failed.
pub async fn run_batched(
    graph: &dyn GraphApi,
    steps: Vec<BatchStep>,
    batch_size: usize,
    stage: &'static str,
) -> BatchReport {
    let mut report = BatchReport::default();
    let batch_size = batch_size.max(1);

    for (batch, chunk) in steps.chunks(batch_size).enumerate() {
        report.batches += 1;
        match graph.batch(chunk).await {
            Ok(responses) => {
                let mut by_id: HashMap<String, BatchItemResponse> = responses
                    .into_iter()
                    .map(|r| (r.id.clone(), r))
                    .collect();

                for step in chunk {
                    let outcome = match by_id.remove(&step.id) {
                        Some(response) => response.into_outcome(),
                        None => Err("no response for request".to_string()),
                    };
                    if let Err(reason) = &outcome {
                        tracing::warn!(stage, batch, request_id = %step.id, %reason, "Batch item failed");
                    }
                    report.outcomes.insert(step.id.clone(), outcome);
                }
            }
            Err(e) => {
                tracing::warn!(stage, batch, size = chunk.len(), error = %e, "Batch request failed");
                for step in chunk {
                    report
                        .outcomes
                        .insert(step.id.clone(), Err(format!("batch failed: {}", e)));
                }
            }
        }
    }

    tracing::info!(
        stage,
        items = report.item_count(),
        batches = report.batches(),
        failed = report.failure_count(),
        "Batch stage finished"
    );
    report
}
