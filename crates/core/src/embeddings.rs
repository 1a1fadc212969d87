use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Fixed process-wide dimensionality. Must match the external index
/// configuration; a mismatch is a fatal configuration error.
pub const EMBEDDING_DIMENSIONS: usize = 768;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);
const DOCUMENT_TASK: &str = "RETRIEVAL_DOCUMENT";
const QUERY_TASK: &str = "RETRIEVAL_QUERY";

/// Text-to-vector seam. Documents and queries are encoded asymmetrically,
/// so the two operations carry different task-type hints.
#[async_trait]
pub trait TextEmbedder {
    fn dimensions(&self) -> usize;

    /// Batch encoding, one call for all chunks of a document.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}

pub struct GeminiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "missing embedding API key".to_string(),
            ));
        }

        let client = Client::builder().timeout(EMBED_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key,
            model: model.into(),
            dimensions: EMBEDDING_DIMENSIONS,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn post(&self, operation: &str, body: Value) -> Result<Value, PipelineError> {
        let response = self
            .client
            .post(format!("{}/{}:{}", self.endpoint, self.model, operation))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "gemini-embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TextEmbedder for GeminiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let requests = texts
            .iter()
            .map(|text| {
                json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": text }] },
                    "taskType": DOCUMENT_TASK,
                })
            })
            .collect::<Vec<_>>();

        let parsed = self
            .post("batchEmbedContents", json!({ "requests": requests }))
            .await?;

        parse_batch_embeddings(&parsed, texts.len(), self.dimensions)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let parsed = self
            .post(
                "embedContent",
                json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": text }] },
                    "taskType": QUERY_TASK,
                }),
            )
            .await?;

        let vector = parse_embedding_values(parsed.pointer("/embedding/values"))?;
        check_dimensions(&vector, self.dimensions)?;
        Ok(vector)
    }
}

fn parse_batch_embeddings(
    parsed: &Value,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let entries = parsed
        .pointer("/embeddings")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::BackendResponse {
            backend: "gemini-embeddings".to_string(),
            details: "response has no embeddings array".to_string(),
        })?;

    if entries.len() != expected {
        return Err(PipelineError::BackendResponse {
            backend: "gemini-embeddings".to_string(),
            details: format!("{} embeddings returned for {} inputs", entries.len(), expected),
        });
    }

    let mut vectors = Vec::with_capacity(entries.len());
    for entry in entries {
        let vector = parse_embedding_values(entry.pointer("/values"))?;
        check_dimensions(&vector, dimensions)?;
        vectors.push(vector);
    }
    Ok(vectors)
}

fn parse_embedding_values(values: Option<&Value>) -> Result<Vec<f32>, PipelineError> {
    values
        .and_then(Value::as_array)
        .map(|numbers| {
            numbers
                .iter()
                .map(|number| number.as_f64().unwrap_or(0.0) as f32)
                .collect()
        })
        .ok_or_else(|| PipelineError::BackendResponse {
            backend: "gemini-embeddings".to_string(),
            details: "embedding entry has no values".to_string(),
        })
}

fn check_dimensions(vector: &[f32], dimensions: usize) -> Result<(), PipelineError> {
    if vector.len() != dimensions {
        return Err(PipelineError::BackendResponse {
            backend: "gemini-embeddings".to_string(),
            details: format!("embedding dimension {} != {}", vector.len(), dimensions),
        });
    }
    Ok(())
}
