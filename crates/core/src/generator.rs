use crate::error::PipelineError;
use crate::models::{
    AnswerRecord, GenerationOutcome, RetrievedChunk, SourceRef, NOT_AVAILABLE_ANSWER,
};
use crate::traits::AnswerModel;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds the grounding prompt: all context blocks, the grounding rules,
/// the fixed not-available sentence, and the required JSON shape.
pub fn build_prompt(question: &str, context: &[RetrievedChunk]) -> String {
    let context_blocks = context
        .iter()
        .map(|chunk| format!("CONTEXT: {}", chunk.text))
        .collect::<Vec<_>>()
        .join("\n---\n");

    format!(
        "You are an expert on the provided policy documents and your goal is to answer \
user questions using only the information provided.\n\
\n\
---\n\
{context_blocks}\n\
---\n\
\n\
INSTRUCTIONS:\n\
1. Answer the user's QUESTION based SOLELY on the provided CONTEXT.\n\
2. If the CONTEXT does not contain the answer, you MUST respond with \
\"{NOT_AVAILABLE_ANSWER}\" Do not guess.\n\
3. Your answer must be accurate, concise, and directly address the question.\n\
4. For every piece of information you provide, you must cite the specific source \
from the CONTEXT, naming the document id and page number.\n\
5. Provide the final answer in a structured JSON format.\n\
\n\
QUESTION:\n\
{question}\n\
\n\
The JSON output should have the following structure:\n\
{{\n\
    \"answer\": \"...\",\n\
    \"justification\": \"...\",\n\
    \"sources\": [\n\
        {{ \"document_id\": \"...\", \"page_number\": \"...\" }}\n\
    ]\n\
}}"
    )
}

/// Parses the JSON-constrained model output. `answer` is required;
/// `justification` and `sources` default to empty.
pub fn parse_answer(body: &str) -> Result<AnswerRecord, PipelineError> {
    let value: Value = serde_json::from_str(body)?;

    let answer = value
        .get("answer")
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::Request("model response has no answer field".to_string()))?
        .to_string();

    let justification = value
        .get("justification")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let sources = value
        .get("sources")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(source_from_value).collect())
        .unwrap_or_default();

    Ok(AnswerRecord {
        answer,
        justification,
        sources,
    })
}

fn source_from_value(item: &Value) -> Option<SourceRef> {
    let document_id = item.get("document_id").and_then(Value::as_str)?.to_string();
    let page_number = item
        .get("page_number")
        .map(|value| {
            value
                .as_str()
                .map(|text| text.to_string())
                .unwrap_or_else(|| value.to_string())
        })
        .unwrap_or_else(|| "N/A".to_string());

    Some(SourceRef {
        document_id,
        page_number,
    })
}

/// Gemini-backed generator. API errors and unparseable responses degrade
/// to an explicit outcome; this type never raises past its boundary.
pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "missing generation API key".to_string(),
            ));
        }

        let client = Client::builder().timeout(GENERATION_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key,
            model: model.into(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.endpoint, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": { "response_mime_type": "application/json" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::BackendResponse {
                backend: "gemini".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(|text| text.to_string())
            .ok_or_else(|| PipelineError::BackendResponse {
                backend: "gemini".to_string(),
                details: "response has no candidate text".to_string(),
            })
    }
}

#[async_trait]
impl AnswerModel for GeminiGenerator {
    async fn generate(&self, question: &str, context: &[RetrievedChunk]) -> GenerationOutcome {
        let prompt = build_prompt(question, context);
        debug!(context_chunks = context.len(), "generating answer");

        match self.complete(&prompt).await {
            Ok(body) => match parse_answer(&body) {
                Ok(record) => GenerationOutcome::Answered(record),
                Err(error) => GenerationOutcome::Degraded {
                    reason: format!("unparseable model response: {error}"),
                },
            },
            Err(error) => GenerationOutcome::Degraded {
                reason: error.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            score: 0.9,
            metadata: ChunkMetadata::new(),
        }
    }

    #[test]
    fn prompt_lists_every_context_block() {
        let context = vec![chunk("room rent capped at 2%"), chunk("pre-existing: 48 months")];
        let prompt = build_prompt("What is the room rent limit?", &context);

        assert!(prompt.contains("CONTEXT: room rent capped at 2%"));
        assert!(prompt.contains("CONTEXT: pre-existing: 48 months"));
        assert!(prompt.contains("QUESTION:\nWhat is the room rent limit?"));
        assert!(prompt.contains(NOT_AVAILABLE_ANSWER));
        assert!(prompt.contains("based SOLELY on the provided CONTEXT"));
    }

    #[test]
    fn prompt_with_no_context_still_carries_the_contract() {
        let prompt = build_prompt("Anything?", &[]);
        assert!(prompt.contains(NOT_AVAILABLE_ANSWER));
        assert!(prompt.contains("QUESTION:\nAnything?"));
    }

    #[test]
    fn well_formed_response_parses_into_a_record() {
        let body = r#"{
            "answer": "Room rent is capped at 2% of the sum insured.",
            "justification": "Stated under the hospitalisation section.",
            "sources": [
                { "document_id": "policy.pdf", "page_number": "4" },
                { "document_id": "policy.pdf", "page_number": 9 }
            ]
        }"#;

        let record = parse_answer(body).expect("response should parse");
        assert_eq!(record.sources.len(), 2);
        assert_eq!(record.sources[0].page_number, "4");
        // Numeric page numbers are coerced to strings.
        assert_eq!(record.sources[1].page_number, "9");
    }

    #[test]
    fn response_without_answer_field_is_rejected() {
        assert!(parse_answer(r#"{ "justification": "x" }"#).is_err());
    }

    #[test]
    fn non_json_response_is_rejected() {
        assert!(parse_answer("Sorry, I cannot answer that.").is_err());
    }
}
