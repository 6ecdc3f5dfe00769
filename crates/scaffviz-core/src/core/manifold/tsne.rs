use super::error::ManifoldError;
use super::pca::Pca;
use super::{Manifold, validate_input};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const IDENTITY: &str = "TSNE";

const EXPLORATION_ITERATIONS: usize = 250;
const EXPLORATION_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const CHECK_INTERVAL: usize = 50;
const MIN_GAIN: f64 = 0.01;
const INIT_SCALE: f64 = 1e-4;

const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const MAX_BINARY_SEARCH_STEPS: usize = 100;
const MACHINE_EPSILON: f64 = f64::EPSILON;

/// Initialisation of the low-dimensional coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsneInit {
    /// Leading principal components, rescaled to a standard deviation of `1e-4`.
    Pca,
    /// Uniform noise in `[-1e-4, 1e-4]`.
    Random,
}

#[derive(Debug, Error)]
#[error("Invalid t-SNE initialisation '{0}'. Expected 'pca' or 'random'.")]
pub struct ParseTsneInitError(String);

impl FromStr for TsneInit {
    type Err = ParseTsneInitError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pca" => Ok(TsneInit::Pca),
            "random" => Ok(TsneInit::Random),
            _ => Err(ParseTsneInitError(s.to_string())),
        }
    }
}

/// Hyperparameters of [`Tsne`].
#[derive(Debug, Clone, PartialEq)]
pub struct TsneParams {
    pub n_components: usize,
    pub perplexity: f64,
    pub early_exaggeration: f64,
    /// `None` selects `max(n_samples / early_exaggeration / 4, 50)`.
    pub learning_rate: Option<f64>,
    pub max_iter: usize,
    pub n_iter_without_progress: usize,
    pub min_grad_norm: f64,
    pub init: TsneInit,
    /// `None` seeds from system entropy.
    pub seed: Option<u64>,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            n_components: 2,
            perplexity: 30.0,
            early_exaggeration: 12.0,
            learning_rate: None,
            max_iter: 1000,
            n_iter_without_progress: 300,
            min_grad_norm: 1e-7,
            init: TsneInit::Pca,
            seed: None,
        }
    }
}

/// Exact t-distributed stochastic neighbour embedding.
///
/// t-SNE has no out-of-sample mapping: [`Manifold::transform`] computes a fresh embedding
/// of its input (replacing the stored one) rather than projecting it with the fitted
/// state. [`Manifold::fit_transform`] runs the optimisation once.
///
/// Memory and time are quadratic in the number of rows.
#[derive(Debug, Clone, Default)]
pub struct Tsne {
    params: TsneParams,
    embedding: Option<DMatrix<f64>>,
    kl_divergence: Option<f64>,
    n_iter: usize,
}

impl Tsne {
    pub fn new(params: TsneParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn params(&self) -> &TsneParams {
        &self.params
    }

    /// The embedding produced by the last fit.
    pub fn embedding(&self) -> Option<&DMatrix<f64>> {
        self.embedding.as_ref()
    }

    /// Kullback-Leibler divergence of the last fit, without exaggeration.
    pub fn kl_divergence(&self) -> Option<f64> {
        self.kl_divergence
    }

    /// Number of gradient steps taken by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn validate(&self, n_samples: usize) -> Result<(), ManifoldError> {
        let p = &self.params;
        let invalid = |name: &'static str, reason: String| {
            Err(ManifoldError::InvalidParameter { name, reason })
        };
        if p.n_components == 0 {
            return invalid("n_components", "must be at least 1".to_string());
        }
        if !(p.perplexity > 0.0) {
            return invalid("perplexity", format!("must be positive, got {}", p.perplexity));
        }
        if p.perplexity >= n_samples as f64 {
            return invalid(
                "perplexity",
                format!(
                    "must be less than the number of samples ({}), got {}",
                    n_samples, p.perplexity
                ),
            );
        }
        if !(p.early_exaggeration >= 1.0) {
            return invalid(
                "early_exaggeration",
                format!("must be at least 1, got {}", p.early_exaggeration),
            );
        }
        if let Some(rate) = p.learning_rate {
            if !(rate > 0.0) {
                return invalid("learning_rate", format!("must be positive, got {}", rate));
            }
        }
        if p.max_iter == 0 {
            return invalid("max_iter", "must be at least 1".to_string());
        }
        Ok(())
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(rows = x.nrows(), perplexity = self.params.perplexity)
    )]
    fn run(&self, x: &DMatrix<f64>) -> Result<Optimized, ManifoldError> {
        validate_input(x)?;
        let n = x.nrows();
        self.validate(n)?;

        let p = &self.params;
        let k = p.n_components;
        let mut rng = match p.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let distances = squared_distances(x);
        let joint = joint_probabilities(&distances, n, p.perplexity);
        let mut y = initial_embedding(x, k, p.init, &mut rng);

        let learning_rate = p
            .learning_rate
            .unwrap_or_else(|| (n as f64 / p.early_exaggeration / 4.0).max(50.0));
        let dof = (k as f64 - 1.0).max(1.0);
        debug!(learning_rate, dof, "Starting t-SNE optimisation");

        let mut optimizer = GradientDescent::new(n, k, dof, learning_rate, p);
        let exploration = EXPLORATION_ITERATIONS.min(p.max_iter);
        optimizer.run_phase(
            &joint,
            &mut y,
            0..exploration,
            EXPLORATION_MOMENTUM,
            p.early_exaggeration,
        );
        optimizer.reset_progress();
        optimizer.run_phase(&joint, &mut y, exploration..p.max_iter, FINAL_MOMENTUM, 1.0);

        let mut scratch = vec![0.0; n * k];
        let kl = kl_gradient(&joint, &y, n, k, dof, 1.0, &mut scratch);

        if let Some(i) = y.iter().position(|v| !v.is_finite()) {
            return Err(ManifoldError::Numerical(format!(
                "optimisation diverged: non-finite coordinate for row {}",
                i / k
            )));
        }

        Ok(Optimized {
            embedding: DMatrix::from_row_slice(n, k, &y),
            kl_divergence: kl,
            n_iter: optimizer.iterations,
        })
    }
}

impl Manifold for Tsne {
    fn fit(&mut self, x: &DMatrix<f64>) -> Result<(), ManifoldError> {
        let result = self.run(x)?;
        info!(
            kl_divergence = result.kl_divergence,
            iterations = result.n_iter,
            "t-SNE embedding of {} rows finished",
            x.nrows()
        );
        self.kl_divergence = Some(result.kl_divergence);
        self.n_iter = result.n_iter;
        self.embedding = Some(result.embedding);
        Ok(())
    }

    /// Recomputes the embedding of `x` from scratch; see the type documentation.
    fn transform(&mut self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ManifoldError> {
        self.fit_transform(x)
    }

    fn fit_transform(&mut self, x: &DMatrix<f64>) -> Result<DMatrix<f64>, ManifoldError> {
        self.fit(x)?;
        self.embedding.clone().ok_or(ManifoldError::NotFitted)
    }

    fn identity(&self) -> &str {
        IDENTITY
    }
}

struct Optimized {
    embedding: DMatrix<f64>,
    kl_divergence: f64,
    n_iter: usize,
}

/// Momentum gradient descent with per-coordinate adaptive gains.
struct GradientDescent {
    n: usize,
    k: usize,
    dof: f64,
    learning_rate: f64,
    min_grad_norm: f64,
    n_iter_without_progress: usize,
    update: Vec<f64>,
    gains: Vec<f64>,
    grad: Vec<f64>,
    best_error: f64,
    best_iter: usize,
    iterations: usize,
}

impl GradientDescent {
    fn new(n: usize, k: usize, dof: f64, learning_rate: f64, params: &TsneParams) -> Self {
        Self {
            n,
            k,
            dof,
            learning_rate,
            min_grad_norm: params.min_grad_norm,
            n_iter_without_progress: params.n_iter_without_progress,
            update: vec![0.0; n * k],
            gains: vec![1.0; n * k],
            grad: vec![0.0; n * k],
            best_error: f64::INFINITY,
            best_iter: 0,
            iterations: 0,
        }
    }

    fn reset_progress(&mut self) {
        self.best_error = f64::INFINITY;
        self.best_iter = self.iterations;
    }

    fn run_phase(
        &mut self,
        joint: &[f64],
        y: &mut [f64],
        iterations: std::ops::Range<usize>,
        momentum: f64,
        exaggeration: f64,
    ) {
        for it in iterations {
            let error = kl_gradient(
                joint,
                y,
                self.n,
                self.k,
                self.dof,
                exaggeration,
                &mut self.grad,
            );

            let mut grad_norm_sq = 0.0;
            for idx in 0..y.len() {
                let g = self.grad[idx];
                if self.update[idx] * g < 0.0 {
                    self.gains[idx] += 0.2;
                } else {
                    self.gains[idx] *= 0.8;
                }
                self.gains[idx] = self.gains[idx].max(MIN_GAIN);
                self.update[idx] =
                    momentum * self.update[idx] - self.learning_rate * self.gains[idx] * g;
                y[idx] += self.update[idx];
                grad_norm_sq += g * g;
            }
            self.iterations = it + 1;

            if (it + 1) % CHECK_INTERVAL == 0 {
                let grad_norm = grad_norm_sq.sqrt();
                debug!(
                    iteration = it + 1,
                    kl_divergence = error,
                    grad_norm,
                    "t-SNE progress"
                );
                if error < self.best_error {
                    self.best_error = error;
                    self.best_iter = it;
                } else if it - self.best_iter > self.n_iter_without_progress {
                    debug!(iteration = it + 1, "No progress, stopping phase early");
                    break;
                }
                if grad_norm <= self.min_grad_norm {
                    debug!(iteration = it + 1, grad_norm, "Gradient norm below threshold");
                    break;
                }
            }
        }
    }
}

/// Pairwise squared Euclidean distances, row-major `n x n`.
fn squared_distances(x: &DMatrix<f64>) -> Vec<f64> {
    let n = x.nrows();
    let rows: Vec<Vec<f64>> = (0..n).map(|i| x.row(i).iter().copied().collect()).collect();
    let mut distances = vec![0.0; n * n];
    distances
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, out)| {
            for (j, d) in out.iter_mut().enumerate() {
                *d = rows[i]
                    .iter()
                    .zip(&rows[j])
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
            }
        });
    distances
}

/// Symmetric joint probabilities `P`, row-major `n x n`, summing to one.
fn joint_probabilities(distances: &[f64], n: usize, perplexity: f64) -> Vec<f64> {
    let desired_entropy = perplexity.ln();
    let mut conditional = vec![0.0; n * n];
    conditional
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, out)| {
            conditional_row(&distances[i * n..(i + 1) * n], i, desired_entropy, out);
        });

    let mut joint = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            joint[i * n + j] = conditional[i * n + j] + conditional[j * n + i];
        }
    }
    let total: f64 = joint.iter().sum::<f64>().max(MACHINE_EPSILON);
    for i in 0..n {
        for j in 0..n {
            let v = &mut joint[i * n + j];
            *v = if i == j {
                0.0
            } else {
                (*v / total).max(MACHINE_EPSILON)
            };
        }
    }
    joint
}

/// Binary search for the Gaussian precision of row `i` matching the target entropy.
fn conditional_row(distances: &[f64], i: usize, desired_entropy: f64, out: &mut [f64]) {
    let mut beta = 1.0;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;

    for _ in 0..MAX_BINARY_SEARCH_STEPS {
        let mut sum_p = 0.0;
        for (j, (&d, p)) in distances.iter().zip(out.iter_mut()).enumerate() {
            *p = if j == i { 0.0 } else { (-d * beta).exp() };
            sum_p += *p;
        }
        if sum_p == 0.0 {
            sum_p = 1e-8;
        }

        let mut sum_dp = 0.0;
        for (&d, p) in distances.iter().zip(out.iter_mut()) {
            *p /= sum_p;
            sum_dp += d * *p;
        }

        let entropy = sum_p.ln() + beta * sum_dp;
        let diff = entropy - desired_entropy;
        if diff.abs() <= PERPLEXITY_TOLERANCE {
            break;
        }

        if diff > 0.0 {
            beta_min = beta;
            beta = if beta_max == f64::INFINITY {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min == f64::NEG_INFINITY {
                beta / 2.0
            } else {
                (beta + beta_min) / 2.0
            };
        }
    }
}

/// Computes the KL divergence between `P` (scaled by `exaggeration`) and the Student-t
/// similarities of `y`, writing its gradient into `grad`.
fn kl_gradient(
    joint: &[f64],
    y: &[f64],
    n: usize,
    k: usize,
    dof: f64,
    exaggeration: f64,
    grad: &mut [f64],
) -> f64 {
    let exponent = (dof + 1.0) / -2.0;
    let mut numerators = vec![0.0; n * n];
    numerators
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, out)| {
            let yi = &y[i * k..(i + 1) * k];
            for (j, q) in out.iter_mut().enumerate() {
                if i == j {
                    *q = 0.0;
                    continue;
                }
                let yj = &y[j * k..(j + 1) * k];
                let d: f64 = yi.iter().zip(yj).map(|(a, b)| (a - b) * (a - b)).sum();
                *q = (1.0 + d / dof).powf(exponent);
            }
        });
    // Summed sequentially; rayon reduction order is not deterministic.
    let total: f64 = numerators.iter().sum::<f64>().max(MACHINE_EPSILON);

    let scale = 2.0 * (dof + 1.0) / dof;
    grad.par_chunks_mut(k).enumerate().for_each(|(i, g)| {
        g.fill(0.0);
        let yi = &y[i * k..(i + 1) * k];
        for j in 0..n {
            if i == j {
                continue;
            }
            let idx = i * n + j;
            let q = (numerators[idx] / total).max(MACHINE_EPSILON);
            let multiplier = (exaggeration * joint[idx] - q) * numerators[idx];
            let yj = &y[j * k..(j + 1) * k];
            for c in 0..k {
                g[c] += multiplier * (yi[c] - yj[c]);
            }
        }
        for c in g.iter_mut() {
            *c *= scale;
        }
    });

    let row_divergence: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let idx = i * n + j;
                    let p = exaggeration * joint[idx];
                    let q = (numerators[idx] / total).max(MACHINE_EPSILON);
                    p * (p.max(MACHINE_EPSILON) / q).ln()
                })
                .sum::<f64>()
        })
        .collect();
    row_divergence.iter().sum()
}

/// Row-major `n x k` starting coordinates.
fn initial_embedding(x: &DMatrix<f64>, k: usize, init: TsneInit, rng: &mut StdRng) -> Vec<f64> {
    let n = x.nrows();
    if init == TsneInit::Pca {
        match pca_initialisation(x, k) {
            Some(y) => return y,
            None => warn!(
                "PCA initialisation is not possible for a {}x{} matrix with {} components; falling back to random initialisation.",
                x.nrows(),
                x.ncols(),
                k
            ),
        }
    }
    (0..n * k)
        .map(|_| rng.gen_range(-1.0..=1.0) * INIT_SCALE)
        .collect()
}

fn pca_initialisation(x: &DMatrix<f64>, k: usize) -> Option<Vec<f64>> {
    if k > x.nrows().min(x.ncols()) {
        return None;
    }
    let projected = Pca::new(k).fit_transform(x).ok()?;
    let first = projected.column(0);
    let mean = first.mean();
    let std = (first.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / first.len() as f64)
        .sqrt();
    if !(std > 0.0) {
        return None;
    }
    let factor = INIT_SCALE / std;
    let n = projected.nrows();
    let mut y = Vec::with_capacity(n * k);
    for i in 0..n {
        for c in 0..k {
            y.push(projected[(i, c)] * factor);
        }
    }
    Some(y)
}
