use crate::error::PipelineError;
use crate::models::{GenerationOutcome, RetrievedChunk, VectorRecord};
use async_trait::async_trait;

/// Named external vector index. Obtained once per process lifetime and
/// shared across requests; assumed safe for concurrent use.
#[async_trait]
pub trait VectorIndex {
    /// Insert-or-overwrite by record id. Fire-and-forget: a partial batch
    /// failure surfaces as an error with no partial-success accounting.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), PipelineError>;

    /// Top-k nearest neighbors by descending similarity score, with
    /// stored metadata.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, PipelineError>;
}

/// Grounded answer generation. Infallible at this boundary: failures are
/// reported as a degraded outcome, never as an error.
#[async_trait]
pub trait AnswerModel {
    async fn generate(&self, question: &str, context: &[RetrievedChunk]) -> GenerationOutcome;
}
