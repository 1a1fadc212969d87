pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_pages, split_recursive};
pub use embeddings::{GeminiEmbedder, TextEmbedder, EMBEDDING_DIMENSIONS};
pub use error::{IngestError, PipelineError};
pub use generator::{build_prompt, parse_answer, GeminiGenerator};
pub use ingest::{build_records, digest_file, ingest_document};
pub use loader::{load_document, parse_local, LoadedDocument, PageText};
pub use models::{
    AnswerRecord, ChunkMetadata, ChunkingOptions, DocumentChunk, DocumentType,
    GenerationOutcome, IngestionReport, RetrievedChunk, SourceRef, VectorRecord,
    GENERATION_FAILED_ANSWER, NOT_AVAILABLE_ANSWER,
};
pub use orchestrator::{AnswerPipeline, DEFAULT_QUESTION_CONCURRENCY, DEFAULT_TOP_K};
pub use stores::PineconeStore;
pub use traits::{AnswerModel, VectorIndex};
