pub mod defaults;

use crate::cli::EmbedArgs;
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use scaffviz::core::manifold::tsne::TsneInit;
use scaffviz::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialManifoldConfig {
    #[serde(rename = "type")]
    kind: Option<String>,
    n_components: Option<usize>,
    recalculate: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialTsneConfig {
    perplexity: Option<f64>,
    early_exaggeration: Option<f64>,
    learning_rate: Option<f64>,
    max_iter: Option<usize>,
    init: Option<String>,
    seed: Option<u64>,
}

/// Embedding settings read from a TOML file; every field may be overridden on the command line.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialEmbedConfig {
    manifold: Option<PartialManifoldConfig>,
    tsne: Option<PartialTsneConfig>,
}

impl PartialEmbedConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn merge_with_cli(self, args: &EmbedArgs) -> Result<core_config::EmbeddingConfig> {
        let defaults = DefaultsConfig::default();
        let manifold_config = self.manifold.unwrap_or_default();
        let tsne_config = self.tsne.unwrap_or_default();

        let file_kind = manifold_config
            .kind
            .as_deref()
            .map(|s| {
                s.parse::<core_config::ManifoldKind>()
                    .map_err(|e| CliError::Config(e.to_string()))
            })
            .transpose()?;
        let file_init = tsne_config
            .init
            .as_deref()
            .map(|s| s.parse::<TsneInit>().map_err(|e| CliError::Config(e.to_string())))
            .transpose()?;

        let kind = args.manifold.or(file_kind).unwrap_or(defaults.manifold);
        let recalculate = match (args.recalculate, args.no_recalculate) {
            (true, _) => true,
            (_, true) => false,
            _ => manifold_config.recalculate.unwrap_or(false),
        };
        let mut builder = core_config::EmbeddingConfigBuilder::new()
            .manifold(kind)
            .recalculate(recalculate);

        if let Some(n) = args.components.or(manifold_config.n_components) {
            builder = builder.n_components(n);
        }
        if let Some(p) = args.perplexity.or(tsne_config.perplexity) {
            builder = builder.perplexity(p);
        }
        if let Some(ee) = tsne_config.early_exaggeration {
            builder = builder.early_exaggeration(ee);
        }
        if let Some(rate) = tsne_config.learning_rate {
            builder = builder.learning_rate(rate);
        }
        if let Some(n) = args.max_iter.or(tsne_config.max_iter) {
            builder = builder.max_iter(n);
        }
        if let Some(init) = args.init.or(file_init) {
            builder = builder.init(init);
        }
        if let Some(seed) = args.seed.or(tsne_config.seed) {
            builder = builder.seed(seed);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }
}
