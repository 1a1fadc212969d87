mod server;

use chrono::Utc;
use clap::{Parser, Subcommand};
use policy_rag_core::{
    ingest_document, AnswerPipeline, ChunkingOptions, DocumentType, GeminiEmbedder,
    GeminiGenerator, PineconeStore, TextEmbedder, EMBEDDING_DIMENSIONS,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "policy-rag-server", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Gemini API key, used for embeddings and generation.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: String,

    /// Pinecone API key.
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pinecone_api_key: String,

    /// Pinecone index data-plane host, e.g. https://my-index-abc.svc.us-east-1.pinecone.io
    #[arg(long, env = "PINECONE_INDEX_HOST")]
    pinecone_index_host: String,

    /// Embedding model identifier.
    #[arg(long, default_value = "models/embedding-001")]
    embedding_model: String,

    /// Generative model identifier.
    #[arg(long, default_value = "gemini-1.5-flash-latest")]
    generation_model: String,

    /// Chunks retrieved per question.
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Questions processed concurrently within one request.
    #[arg(long, default_value_t = 4)]
    question_concurrency: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the question answering endpoint over HTTP.
    Serve {
        /// Address to bind the HTTP server to (host:port).
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: String,
    },
    /// Ingest one document into the vector index.
    Ingest {
        /// Local path or http(s) URL of the document.
        #[arg(long)]
        document: String,
        /// Chunking policy tag (structured_policy or general).
        #[arg(long, default_value = "general")]
        doc_type: String,
        /// Directory downloaded documents are written to.
        #[arg(long, default_value = "data")]
        workdir: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = GeminiEmbedder::new(cli.gemini_api_key.as_str(), cli.embedding_model.as_str())?;
    let store = PineconeStore::new(
        cli.pinecone_index_host.as_str(),
        cli.pinecone_api_key.as_str(),
        EMBEDDING_DIMENSIONS,
    )?;
    store.ensure_dimensions(embedder.dimensions())?;

    match cli.command {
        Command::Serve { bind } => {
            let generator =
                GeminiGenerator::new(cli.gemini_api_key.as_str(), cli.generation_model.as_str())?;
            let pipeline = AnswerPipeline::new(embedder, store, generator)
                .with_top_k(cli.top_k)
                .with_concurrency(cli.question_concurrency);

            info!(
                version = env!("CARGO_PKG_VERSION"),
                started_at = %Utc::now().to_rfc3339(),
                "policy-rag-server boot"
            );
            server::serve(&bind, Arc::new(pipeline)).await?;
        }
        Command::Ingest {
            document,
            doc_type,
            workdir,
        } => {
            let workdir = PathBuf::from(workdir);
            tokio::fs::create_dir_all(&workdir).await?;

            let report = ingest_document(
                &document,
                DocumentType::from_tag(&doc_type),
                &ChunkingOptions::default(),
                &embedder,
                &store,
                &workdir,
            )
            .await
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} chunks from {} ingested at {}",
                report.chunk_count,
                report.document_id,
                report.ingested_at.to_rfc3339()
            );
        }
    }

    Ok(())
}
