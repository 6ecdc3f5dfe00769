use crate::core::manifold::error::ManifoldError;
use crate::core::models::table::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Descriptors must be calculated for table '{table}' before adding manifold data")]
    MissingDescriptors { table: String },

    #[error("Manifold algorithm failed: {source}")]
    Algorithm {
        #[from]
        source: ManifoldError,
    },

    #[error("Embedding has {found} rows but the table holds {expected} molecules")]
    EmbeddingShape { expected: usize, found: usize },

    #[error("Table operation failed: {source}")]
    Table {
        #[from]
        source: TableError,
    },
}
