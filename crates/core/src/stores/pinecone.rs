use crate::error::PipelineError;
use crate::models::{ChunkMetadata, RetrievedChunk, VectorRecord};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin client for a named Pinecone index, addressed by its data-plane
/// host. Holds no state beyond the connection handle.
pub struct PineconeStore {
    client: Client,
    endpoint: String,
    api_key: String,
    dimensions: usize,
}

impl PineconeStore {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, PipelineError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "missing vector store API key".to_string(),
            ));
        }

        let client = Client::builder().timeout(STORE_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            dimensions,
        })
    }

    /// Startup check: the embedder's dimensionality must match the index
    /// configuration. A mismatch is fatal, not recoverable.
    pub fn ensure_dimensions(&self, dimensions: usize) -> Result<(), PipelineError> {
        if self.dimensions != dimensions {
            return Err(PipelineError::InvalidConfig(format!(
                "index is configured for {} dimensions but the embedder produces {}",
                self.dimensions, dimensions
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PineconeStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), PipelineError> {
        if records.is_empty() {
            return Ok(());
        }

        let vectors = records
            .iter()
            .map(|record| {
                if record.values.len() != self.dimensions {
                    return Err(PipelineError::Request(format!(
                        "record {} has dimension {} instead of {}",
                        record.id,
                        record.values.len(),
                        self.dimensions
                    )));
                }

                Ok(json!({
                    "id": record.id,
                    "values": record.values,
                    "metadata": record.metadata,
                }))
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let response = self
            .client
            .post(format!("{}/vectors/upsert", self.endpoint))
            .header("Api-Key", &self.api_key)
            .json(&json!({ "vectors": vectors }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, PipelineError> {
        if vector.len() != self.dimensions {
            return Err(PipelineError::Request(format!(
                "query vector dimension {} is not {}",
                vector.len(),
                self.dimensions
            )));
        }

        let response = self
            .client
            .post(format!("{}/query", self.endpoint))
            .header("Api-Key", &self.api_key)
            .json(&json!({
                "vector": vector,
                "topK": top_k,
                "includeMetadata": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "pinecone".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(parse_query_matches(&parsed))
    }
}

fn parse_query_matches(parsed: &Value) -> Vec<RetrievedChunk> {
    let matches = parsed
        .pointer("/matches")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut result = Vec::new();
    for hit in matches {
        let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
        let metadata = hit
            .pointer("/metadata")
            .and_then(Value::as_object)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(key, value)| {
                        let rendered = value
                            .as_str()
                            .map(|text| text.to_string())
                            .unwrap_or_else(|| value.to_string());
                        (key.clone(), rendered)
                    })
                    .collect::<ChunkMetadata>()
            })
            .unwrap_or_default();

        let text = metadata.get("text").cloned().unwrap_or_default();
        result.push(RetrievedChunk {
            text,
            score,
            metadata,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matches_keep_score_order_and_metadata() {
        let parsed = json!({
            "matches": [
                {
                    "id": "policy.pdf-0",
                    "score": 0.92,
                    "metadata": { "text": "room rent is capped", "page_number": "4" }
                },
                {
                    "id": "policy.pdf-3",
                    "score": 0.81,
                    "metadata": { "text": "waiting period applies", "page_number": "9" }
                }
            ]
        });

        let chunks = parse_query_matches(&parsed);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "room rent is capped");
        assert_eq!(chunks[0].metadata["page_number"], "4");
        assert!(chunks[0].score > chunks[1].score);
    }

    #[test]
    fn missing_matches_array_yields_no_chunks() {
        let parsed = json!({ "results": [] });
        assert!(parse_query_matches(&parsed).is_empty());
    }

    #[test]
    fn dimension_mismatch_is_a_fatal_config_error() {
        let store = PineconeStore::new("https://idx.example", "key", 768)
            .expect("store should build");
        assert!(store.ensure_dimensions(768).is_ok());
        assert!(store.ensure_dimensions(384).is_err());
    }
}
