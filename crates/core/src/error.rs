use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("download of {reference} failed with status {status}")]
    Download { reference: String, status: u16 },

    #[error("document parse error: {0}")]
    DocumentParse(String),

    #[error("reference has no file name: {0}")]
    MissingFileName(String),

    #[error("document produced no text: {0}")]
    EmptyDocument(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store rejected records: {0}")]
    Store(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
