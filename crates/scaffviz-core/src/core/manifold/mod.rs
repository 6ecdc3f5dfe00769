//! # Manifold Module
//!
//! Dimensionality reduction algorithms that map a descriptor matrix (rows = molecules,
//! columns = features) to low-dimensional coordinates for plotting.
//!
//! Every algorithm implements the [`Manifold`] trait. The trait's [`Manifold::identity`]
//! names the algorithm variant only, not its parameters; it is used as the namespace of
//! the embedding columns written to a molecule table, so two differently configured
//! instances of the same variant share (and overwrite) the same columns.
//!
//! - [`pca`] - Principal component analysis, a linear projection with out-of-sample support.
//! - [`tsne`] - Exact t-distributed stochastic neighbour embedding.

pub mod error;
pub mod pca;
pub mod tsne;

use error::ManifoldError;
use nalgebra::DMatrix;

/// A fit/transform embedding algorithm.
pub trait Manifold {
    /// Fits the internal algorithm state to `x`.
    ///
    /// # Errors
    ///
    /// Returns an error for empty or non-finite input, invalid parameters, or
    /// numerical failures of the underlying routine.
    fn fit(&mut self, x: &DMatrix<f64>) -> Result<(), ManifoldError>;

    /// Embeds `x`, which must have the feature width used in [`fit`](Manifold::fit).
    ///
    /// Variants without out-of-sample support compute a fresh embedding of `x` instead of
    /// applying the fitted state; see the documentation of each implementation.
    fn transform(&mut self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ManifoldError>;

    /// Fits to `x` and returns its embedding.
    fn fit_transform(&mut self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ManifoldError> {
        self.fit(x)?;
        self.transform(x)
    }

    /// The namespace key of this algorithm variant, e.g. `"PCA"`.
    fn identity(&self) -> &str;

    /// By-value [`fit`](Manifold::fit) for chaining.
    fn fitted(mut self, x: &DMatrix<f64>) -> Result<Self, ManifoldError>
    where
        Self: Sized,
    {
        self.fit(x)?;
        Ok(self)
    }
}

/// Rejects matrices that are empty or contain `NaN`/infinite entries.
pub(crate) fn validate_input(x: &DMatrix<f64>) -> Result<(), ManifoldError> {
    let (rows, cols) = x.shape();
    if rows == 0 || cols == 0 {
        return Err(ManifoldError::EmptyInput { rows, cols });
    }
    // Column-major storage: linear index i maps to (i % rows, i / rows).
    if let Some(i) = x.iter().position(|v| !v.is_finite()) {
        return Err(ManifoldError::NonFinite {
            row: i % rows,
            col: i / rows,
        });
    }
    Ok(())
}
