use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Empty batch: nothing to insert")]
    EmptyBatch,

    #[error("No valid chunks: every chunk in the batch was blank")]
    NoValidChunks,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No relevant documents found")]
    NoResults,

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Answer generation failed: {0}")]
    Generator(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
