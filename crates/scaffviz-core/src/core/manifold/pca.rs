use super::error::ManifoldError;
use super::{Manifold, validate_input};
use nalgebra::{DMatrix, DVector, RowDVector};
use tracing::{debug, instrument};

const IDENTITY: &str = "PCA";

/// Principal component analysis via a thin SVD of the centred data.
///
/// Components are ordered by decreasing explained variance. The sign of each component is
/// fixed so that its largest-magnitude loading is positive, which makes repeated fits of
/// the same data produce identical coordinates.
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    state: Option<PcaState>,
}

#[derive(Debug, Clone)]
struct PcaState {
    mean: RowDVector<f64>,
    /// `n_components x n_features`, one component per row.
    components: DMatrix<f64>,
    explained_variance: DVector<f64>,
    explained_variance_ratio: DVector<f64>,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            state: None,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Principal axes in feature space, one per row.
    pub fn components(&self) -> Option<&DMatrix<f64>> {
        self.state.as_ref().map(|s| &s.components)
    }

    pub fn explained_variance(&self) -> Option<&DVector<f64>> {
        self.state.as_ref().map(|s| &s.explained_variance)
    }

    pub fn explained_variance_ratio(&self) -> Option<&DVector<f64>> {
        self.state.as_ref().map(|s| &s.explained_variance_ratio)
    }

    fn center(x: &DMatrix<f64>, mean: &RowDVector<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] - mean[j])
    }
}

impl Default for Pca {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Manifold for Pca {
    #[instrument(level = "debug", skip_all, fields(n_components = self.n_components))]
    fn fit(&mut self, x: &DMatrix<f64>) -> Result<(), ManifoldError> {
        validate_input(x)?;
        let (n, d) = x.shape();
        let max_components = n.min(d);
        if self.n_components == 0 || self.n_components > max_components {
            return Err(ManifoldError::InvalidParameter {
                name: "n_components",
                reason: format!(
                    "must be between 1 and min(n_samples, n_features) = {}, got {}",
                    max_components, self.n_components
                ),
            });
        }

        let mean = x.row_mean();
        let centered = Self::center(x, &mean);
        let svd = centered.svd(false, true);
        let v_t = svd.v_t.ok_or_else(|| {
            ManifoldError::Numerical("SVD did not produce right singular vectors".to_string())
        })?;
        let singular_values = svd.singular_values;

        let mut order: Vec<usize> = (0..singular_values.len()).collect();
        order.sort_by(|&a, &b| {
            singular_values[b]
                .partial_cmp(&singular_values[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(self.n_components);

        let signs: Vec<f64> = order
            .iter()
            .map(|&k| {
                let row = v_t.row(k);
                let dominant = row
                    .iter()
                    .copied()
                    .max_by(|a, b| {
                        a.abs()
                            .partial_cmp(&b.abs())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .unwrap_or(0.0);
                if dominant < 0.0 { -1.0 } else { 1.0 }
            })
            .collect();

        let components =
            DMatrix::from_fn(order.len(), d, |r, c| signs[r] * v_t[(order[r], c)]);

        let dof = n.saturating_sub(1).max(1) as f64;
        let total_variance: f64 = singular_values.iter().map(|s| s * s / dof).sum();
        let explained_variance = DVector::from_iterator(
            order.len(),
            order
                .iter()
                .map(|&k| singular_values[k] * singular_values[k] / dof),
        );
        let explained_variance_ratio = if total_variance > 0.0 {
            explained_variance.map(|v| v / total_variance)
        } else {
            DVector::zeros(order.len())
        };

        debug!(
            "Fitted PCA on {}x{} matrix; explained variance ratio: {:?}",
            n,
            d,
            explained_variance_ratio.as_slice()
        );

        self.state = Some(PcaState {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        });
        Ok(())
    }

    fn transform(&mut self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ManifoldError> {
        let state = self.state.as_ref().ok_or(ManifoldError::NotFitted)?;
        if x.ncols() != state.mean.len() {
            return Err(ManifoldError::FeatureMismatch {
                expected: state.mean.len(),
                found: x.ncols(),
            });
        }
        validate_input(x)?;
        Ok(Self::center(x, &state.mean) * state.components.transpose())
    }

    fn identity(&self) -> &str {
        IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn line_data() -> DMatrix<f64> {
        // Points on the line y = 2x.
        DMatrix::from_fn(5, 2, |i, j| (i as f64) * if j == 0 { 1.0 } else { 2.0 })
    }

    #[test]
    fn identity_is_independent_of_parameters() {
        assert_eq!(Pca::new(2).identity(), "PCA");
        assert_eq!(Pca::new(3).identity(), Pca::new(1).identity());
    }

    #[test]
    fn fit_finds_the_principal_axis_of_collinear_data() {
        let pca = Pca::new(1).fitted(&line_data()).unwrap();
        let axis = pca.components().unwrap();
        let norm = 5.0_f64.sqrt();
        assert!(f64_approx_equal(axis[(0, 0)], 1.0 / norm));
        assert!(f64_approx_equal(axis[(0, 1)], 2.0 / norm));
        assert!(f64_approx_equal(pca.explained_variance_ratio().unwrap()[0], 1.0));
    }

    #[test]
    fn transform_projects_centred_data() {
        let x = line_data();
        let mut pca = Pca::new(2);
        let embedding = pca.fit_transform(&x).unwrap();
        assert_eq!(embedding.shape(), (5, 2));

        let norm = 5.0_f64.sqrt();
        for i in 0..5 {
            let expected = (i as f64 - 2.0) * norm;
            assert!(f64_approx_equal(embedding[(i, 0)], expected));
            assert!(embedding[(i, 1)].abs() < 1e-9);
        }
    }

    #[test]
    fn explained_variance_is_sorted_descending() {
        let x = DMatrix::from_row_slice(
            4,
            3,
            &[
                1.0, 0.0, 0.1, //
                -1.0, 0.0, -0.1, //
                0.0, 3.0, 0.0, //
                0.0, -3.0, 0.0,
            ],
        );
        let pca = Pca::new(3).fitted(&x).unwrap();
        let variance = pca.explained_variance().unwrap();
        assert!(variance[0] >= variance[1]);
        assert!(variance[1] >= variance[2]);
        let ratio_sum: f64 = pca.explained_variance_ratio().unwrap().iter().sum();
        assert!(f64_approx_equal(ratio_sum, 1.0));
    }

    #[test]
    fn transform_applies_fitted_state_to_new_rows() {
        let mut pca = Pca::new(1).fitted(&line_data()).unwrap();
        let new_rows = DMatrix::from_row_slice(1, 2, &[2.0, 4.0]);
        let embedding = pca.transform(&new_rows).unwrap();
        assert!(f64_approx_equal(embedding[(0, 0)], 0.0));
    }

    #[test]
    fn transform_before_fit_fails() {
        let mut pca = Pca::new(2);
        assert_eq!(
            pca.transform(&line_data()),
            Err(ManifoldError::NotFitted)
        );
    }

    #[test]
    fn transform_rejects_a_different_feature_width() {
        let mut pca = Pca::new(1).fitted(&line_data()).unwrap();
        assert_eq!(
            pca.transform(&DMatrix::zeros(2, 3)),
            Err(ManifoldError::FeatureMismatch {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn fit_rejects_too_many_components() {
        let mut pca = Pca::new(3);
        assert!(matches!(
            pca.fit(&line_data()),
            Err(ManifoldError::InvalidParameter {
                name: "n_components",
                ..
            })
        ));
        assert!(!pca.is_fitted());
    }
}
