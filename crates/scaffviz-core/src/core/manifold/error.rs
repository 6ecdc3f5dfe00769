use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ManifoldError {
    #[error("Input matrix is empty ({rows}x{cols})")]
    EmptyInput { rows: usize, cols: usize },

    #[error("Input matrix contains a non-finite value at row {row}, column {col}")]
    NonFinite { row: usize, col: usize },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Manifold must be fitted before calling transform")]
    NotFitted,

    #[error("Feature width mismatch: fitted on {expected} features, got {found}")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("Numerical failure: {0}")]
    Numerical(String),
}
