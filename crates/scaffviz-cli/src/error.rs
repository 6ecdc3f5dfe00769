use scaffviz::core::io::csv_table::TableFileError;
use scaffviz::core::io::store::StoreError;
use scaffviz::engine::error::EngineError;
use scaffviz::workflows::scatter::ScatterError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    ScaffvizCore(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to read table file '{path}': {source}", path = path.display())]
    TableFile {
        path: PathBuf,
        #[source]
        source: TableFileError,
    },

    #[error(transparent)]
    Scatter(#[from] ScatterError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
