use crate::embeddings::TextEmbedder;
use crate::models::{AnswerRecord, GenerationOutcome, RetrievedChunk};
use crate::traits::{AnswerModel, VectorIndex};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_QUESTION_CONCURRENCY: usize = 4;

/// Drives retrieval and generation per question. Questions fan out under
/// a bounded concurrency cap; answers come back in question order. One
/// bad question degrades to its fallback record and never fails the
/// batch.
pub struct AnswerPipeline<E, V, M> {
    embedder: E,
    index: V,
    model: M,
    top_k: usize,
    concurrency: usize,
}

impl<E, V, M> AnswerPipeline<E, V, M>
where
    E: TextEmbedder + Send + Sync,
    V: VectorIndex + Send + Sync,
    M: AnswerModel + Send + Sync,
{
    pub fn new(embedder: E, index: V, model: M) -> Self {
        Self {
            embedder,
            index,
            model,
            top_k: DEFAULT_TOP_K,
            concurrency: DEFAULT_QUESTION_CONCURRENCY,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Caps concurrent question processing to avoid tripping external
    /// rate limits.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn answer_all(&self, questions: &[String]) -> Vec<AnswerRecord> {
        info!(questions = questions.len(), "answering question batch");

        stream::iter(0..questions.len())
            .map(|index| self.answer_one(&questions[index]))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    pub async fn answer_one(&self, question: &str) -> AnswerRecord {
        let context = self.retrieve(question).await;

        // Zero retrieved chunks is not special-cased: the prompt contract
        // makes the model return the not-available sentence.
        match self.model.generate(question, &context).await {
            GenerationOutcome::Answered(record) => record,
            GenerationOutcome::Degraded { reason } => {
                warn!(%question, %reason, "generation degraded to fallback");
                AnswerRecord::fallback()
            }
        }
    }

    /// Retrieval failures are converted to an empty context, logged.
    async fn retrieve(&self, question: &str) -> Vec<RetrievedChunk> {
        let vector = match self.embedder.embed_query(question).await {
            Ok(vector) => vector,
            Err(error) => {
                warn!(%question, %error, "query embedding failed");
                return Vec::new();
            }
        };

        match self.index.query(&vector, self.top_k).await {
            Ok(chunks) => chunks,
            Err(error) => {
                warn!(%question, %error, "vector query failed");
                Vec::new()
            }
        }
    }
}
