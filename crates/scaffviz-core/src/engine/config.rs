use crate::core::manifold::Manifold;
use crate::core::manifold::pca::Pca;
use crate::core::manifold::tsne::{Tsne, TsneInit, TsneParams};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// The embedding algorithm variants that can be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifoldKind {
    Pca,
    Tsne,
}

#[derive(Debug, Error)]
#[error("Invalid manifold '{0}'. Expected 'pca' or 'tsne'.")]
pub struct ParseManifoldKindError(String);

impl FromStr for ManifoldKind {
    type Err = ParseManifoldKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "").as_str() {
            "pca" => Ok(ManifoldKind::Pca),
            "tsne" => Ok(ManifoldKind::Tsne),
            _ => Err(ParseManifoldKindError(s.to_string())),
        }
    }
}

impl fmt::Display for ManifoldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ManifoldKind::Pca => "pca",
                ManifoldKind::Tsne => "tsne",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManifoldConfig {
    Pca { n_components: usize },
    Tsne(TsneParams),
}

impl ManifoldConfig {
    pub fn kind(&self) -> ManifoldKind {
        match self {
            ManifoldConfig::Pca { .. } => ManifoldKind::Pca,
            ManifoldConfig::Tsne(_) => ManifoldKind::Tsne,
        }
    }

    /// Instantiates the configured algorithm.
    pub fn build(&self) -> Box<dyn Manifold> {
        match self {
            ManifoldConfig::Pca { n_components } => Box::new(Pca::new(*n_components)),
            ManifoldConfig::Tsne(params) => Box::new(Tsne::new(params.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub manifold: ManifoldConfig,
    pub recalculate: bool,
}

#[derive(Default)]
pub struct EmbeddingConfigBuilder {
    kind: Option<ManifoldKind>,
    n_components: Option<usize>,
    perplexity: Option<f64>,
    early_exaggeration: Option<f64>,
    learning_rate: Option<f64>,
    max_iter: Option<usize>,
    init: Option<TsneInit>,
    seed: Option<u64>,
    recalculate: Option<bool>,
}

impl EmbeddingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifold(mut self, kind: ManifoldKind) -> Self {
        self.kind = Some(kind);
        self
    }
    pub fn n_components(mut self, n: usize) -> Self {
        self.n_components = Some(n);
        self
    }
    pub fn perplexity(mut self, perplexity: f64) -> Self {
        self.perplexity = Some(perplexity);
        self
    }
    pub fn early_exaggeration(mut self, factor: f64) -> Self {
        self.early_exaggeration = Some(factor);
        self
    }
    pub fn learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = Some(rate);
        self
    }
    pub fn max_iter(mut self, iterations: usize) -> Self {
        self.max_iter = Some(iterations);
        self
    }
    pub fn init(mut self, init: TsneInit) -> Self {
        self.init = Some(init);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn recalculate(mut self, recalculate: bool) -> Self {
        self.recalculate = Some(recalculate);
        self
    }

    /// Builds the configuration; unset algorithm parameters take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if no manifold kind was chosen or a parameter is out of range.
    pub fn build(self) -> Result<EmbeddingConfig, ConfigError> {
        let kind = self.kind.ok_or(ConfigError::MissingParameter("manifold"))?;
        let n_components = self.n_components.unwrap_or(2);
        if n_components == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "n_components",
                reason: "must be at least 1".to_string(),
            });
        }

        let manifold = match kind {
            ManifoldKind::Pca => ManifoldConfig::Pca { n_components },
            ManifoldKind::Tsne => {
                let defaults = TsneParams::default();
                let perplexity = self.perplexity.unwrap_or(defaults.perplexity);
                if !(perplexity > 0.0) {
                    return Err(ConfigError::InvalidValue {
                        parameter: "perplexity",
                        reason: format!("must be positive, got {}", perplexity),
                    });
                }
                let max_iter = self.max_iter.unwrap_or(defaults.max_iter);
                if max_iter == 0 {
                    return Err(ConfigError::InvalidValue {
                        parameter: "max_iter",
                        reason: "must be at least 1".to_string(),
                    });
                }
                ManifoldConfig::Tsne(TsneParams {
                    n_components,
                    perplexity,
                    early_exaggeration: self
                        .early_exaggeration
                        .unwrap_or(defaults.early_exaggeration),
                    learning_rate: self.learning_rate.or(defaults.learning_rate),
                    max_iter,
                    init: self.init.unwrap_or(defaults.init),
                    seed: self.seed.or(defaults.seed),
                    ..defaults
                })
            }
        };

        Ok(EmbeddingConfig {
            manifold,
            recalculate: self.recalculate.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_a_manifold_kind() {
        assert_eq!(
            EmbeddingConfigBuilder::new().build(),
            Err(ConfigError::MissingParameter("manifold"))
        );
    }

    #[test]
    fn build_applies_defaults() {
        let config = EmbeddingConfigBuilder::new()
            .manifold(ManifoldKind::Tsne)
            .build()
            .unwrap();
        assert!(!config.recalculate);
        assert_eq!(config.manifold, ManifoldConfig::Tsne(TsneParams::default()));
    }

    #[test]
    fn build_carries_overrides_into_tsne_params() {
        let config = EmbeddingConfigBuilder::new()
            .manifold(ManifoldKind::Tsne)
            .n_components(3)
            .perplexity(15.0)
            .max_iter(400)
            .init(TsneInit::Random)
            .seed(42)
            .recalculate(true)
            .build()
            .unwrap();
        let ManifoldConfig::Tsne(params) = &config.manifold else {
            panic!("expected t-SNE configuration");
        };
        assert_eq!(params.n_components, 3);
        assert_eq!(params.perplexity, 15.0);
        assert_eq!(params.max_iter, 400);
        assert_eq!(params.init, TsneInit::Random);
        assert_eq!(params.seed, Some(42));
        assert!(config.recalculate);
    }

    #[test]
    fn build_rejects_invalid_values() {
        let zero_components = EmbeddingConfigBuilder::new()
            .manifold(ManifoldKind::Pca)
            .n_components(0)
            .build();
        assert!(matches!(
            zero_components,
            Err(ConfigError::InvalidValue {
                parameter: "n_components",
                ..
            })
        ));

        let negative_perplexity = EmbeddingConfigBuilder::new()
            .manifold(ManifoldKind::Tsne)
            .perplexity(-1.0)
            .build();
        assert!(matches!(
            negative_perplexity,
            Err(ConfigError::InvalidValue {
                parameter: "perplexity",
                ..
            })
        ));
    }

    #[test]
    fn built_manifolds_report_their_identity() {
        let pca = ManifoldConfig::Pca { n_components: 2 }.build();
        let tsne = ManifoldConfig::Tsne(TsneParams::default()).build();
        assert_eq!(pca.identity(), "PCA");
        assert_eq!(tsne.identity(), "TSNE");
    }

    #[test]
    fn manifold_kind_parses_common_spellings() {
        assert_eq!("PCA".parse::<ManifoldKind>().unwrap(), ManifoldKind::Pca);
        assert_eq!("t-SNE".parse::<ManifoldKind>().unwrap(), ManifoldKind::Tsne);
        assert_eq!("tsne".parse::<ManifoldKind>().unwrap(), ManifoldKind::Tsne);
        assert!("umap".parse::<ManifoldKind>().is_err());
        assert_eq!(ManifoldKind::Tsne.to_string(), "tsne");
    }
}
