use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Literal answer the model is instructed to return when the context does
/// not contain the requested information.
pub const NOT_AVAILABLE_ANSWER: &str =
    "The information is not available in the provided documents.";

/// Literal answer returned when generation itself failed.
pub const GENERATION_FAILED_ANSWER: &str =
    "An error occurred while generating the answer.";

pub type ChunkMetadata = BTreeMap<String, String>;

/// A contiguous span of document text, the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub document_id: String,
    pub metadata: ChunkMetadata,
    pub sequence: usize,
}

impl DocumentChunk {
    /// Stable record id. Re-ingesting the same document produces colliding
    /// ids, which the store treats as overwrite.
    pub fn record_id(&self) -> String {
        format!("{}-{}", self.document_id, self.sequence)
    }
}

/// An embedded chunk ready for upsert into the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// One nearest-neighbor match for a query, ordered by descending score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f64,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub document_id: String,
    pub page_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecord {
    pub answer: String,
    pub justification: String,
    pub sources: Vec<SourceRef>,
}

impl AnswerRecord {
    /// Degraded record substituted when generation fails.
    pub fn fallback() -> Self {
        Self {
            answer: GENERATION_FAILED_ANSWER.to_string(),
            justification: String::new(),
            sources: Vec::new(),
        }
    }
}

/// Outcome of one generation call. The orchestrator decides how a degraded
/// outcome surfaces; the generator itself never raises past this boundary.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Answered(AnswerRecord),
    Degraded { reason: String },
}

/// Chunking policy selector, supplied explicitly by the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    StructuredPolicy,
    General,
}

impl DocumentType {
    /// Unknown tags fall back to the general policy.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "structured_policy" => Self::StructuredPolicy,
            _ => Self::General,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::StructuredPolicy => "structured_policy",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub document_id: String,
    pub checksum: String,
    pub chunk_count: usize,
    pub ingested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_combines_document_and_sequence() {
        let chunk = DocumentChunk {
            text: "body".to_string(),
            document_id: "policy.pdf".to_string(),
            metadata: ChunkMetadata::new(),
            sequence: 7,
        };
        assert_eq!(chunk.record_id(), "policy.pdf-7");
    }

    #[test]
    fn unknown_document_type_tag_falls_back_to_general() {
        assert_eq!(
            DocumentType::from_tag("structured_policy"),
            DocumentType::StructuredPolicy
        );
        assert_eq!(DocumentType::from_tag("invoice"), DocumentType::General);
    }

    #[test]
    fn fallback_record_is_the_fixed_error_sentence() {
        let record = AnswerRecord::fallback();
        assert_eq!(record.answer, GENERATION_FAILED_ANSWER);
        assert!(record.justification.is_empty());
        assert!(record.sources.is_empty());
    }
}
