use crate::chunking::chunk_pages;
use crate::embeddings::TextEmbedder;
use crate::error::IngestError;
use crate::loader::load_document;
use crate::models::{
    ChunkingOptions, DocumentChunk, DocumentType, IngestionReport, VectorRecord,
};
use crate::traits::VectorIndex;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Runs the full ingestion path for one document: load, chunk, batch
/// embed, upsert. Any stage failure aborts the whole ingestion; vectors
/// upserted before a later failure are not rolled back.
pub async fn ingest_document<E, V>(
    reference: &str,
    doc_type: DocumentType,
    options: &ChunkingOptions,
    embedder: &E,
    index: &V,
    workdir: &Path,
) -> Result<IngestionReport, IngestError>
where
    E: TextEmbedder + Send + Sync,
    V: VectorIndex + Send + Sync,
{
    let loaded = load_document(reference, workdir).await?;
    if loaded.pages.is_empty() {
        return Err(IngestError::EmptyDocument(reference.to_string()));
    }

    let document_id = document_id_from_path(&loaded.path)?;
    let checksum = digest_file(&loaded.path)?;

    let chunks = chunk_pages(&document_id, &loaded.pages, doc_type, options);
    if chunks.is_empty() {
        return Err(IngestError::EmptyDocument(reference.to_string()));
    }
    info!(%document_id, chunk_count = chunks.len(), doc_type = doc_type.as_tag(), "document chunked");

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let embeddings = embedder
        .embed_documents(&texts)
        .await
        .map_err(|error| IngestError::Embedding(error.to_string()))?;

    let records = build_records(&chunks, &embeddings, doc_type)?;
    index
        .upsert(&records)
        .await
        .map_err(|error| IngestError::Store(error.to_string()))?;
    info!(%document_id, records = records.len(), "chunks upserted");

    Ok(IngestionReport {
        document_id,
        checksum,
        chunk_count: chunks.len(),
        ingested_at: Utc::now(),
    })
}

/// Pairs chunks with their embeddings. Record metadata carries the raw
/// chunk text plus document provenance, so retrieval needs no second
/// lookup.
pub fn build_records(
    chunks: &[DocumentChunk],
    embeddings: &[Vec<f32>],
    doc_type: DocumentType,
) -> Result<Vec<VectorRecord>, IngestError> {
    if chunks.len() != embeddings.len() {
        return Err(IngestError::Embedding(format!(
            "embedding count {} doesn't match chunk count {}",
            embeddings.len(),
            chunks.len()
        )));
    }

    let records = chunks
        .iter()
        .zip(embeddings.iter())
        .map(|(chunk, embedding)| {
            let mut metadata = chunk.metadata.clone();
            metadata.insert("text".to_string(), chunk.text.clone());
            metadata.insert("document_id".to_string(), chunk.document_id.clone());
            metadata.insert("document_type".to_string(), doc_type.as_tag().to_string());
            metadata
                .entry("page_number".to_string())
                .or_insert_with(|| "N/A".to_string());

            let header = metadata
                .get("header_1")
                .or_else(|| metadata.get("header_2"))
                .cloned()
                .unwrap_or_else(|| "N/A".to_string());
            metadata.insert("header".to_string(), header);

            VectorRecord {
                id: chunk.record_id(),
                values: embedding.clone(),
                metadata,
            }
        })
        .collect();

    Ok(records)
}

fn document_id_from_path(path: &Path) -> Result<String, IngestError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}
