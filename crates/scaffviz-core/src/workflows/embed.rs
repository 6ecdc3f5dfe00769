use crate::engine::config::EmbeddingConfig;
use crate::engine::error::EngineError;
use crate::engine::manifold_table::ManifoldTable;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedResult {
    pub identity: String,
    /// Embedding column names ordered by dimension.
    pub columns: Vec<String>,
    /// Whether the algorithm ran, as opposed to cached columns being reused.
    pub recomputed: bool,
}

/// Builds the configured manifold and ensures its embedding columns exist in `table`.
#[instrument(skip_all, name = "embedding_workflow", fields(manifold = %config.manifold.kind()))]
pub fn run(
    table: &mut ManifoldTable,
    config: &EmbeddingConfig,
    reporter: &ProgressReporter,
) -> Result<EmbedResult, EngineError> {
    let mut manifold = config.manifold.build();
    let identity = manifold.identity().to_string();
    let recomputed =
        config.recalculate || table.manifold_data_by_identity(&identity).is_none();

    reporter.report(Progress::PhaseStart {
        name: if recomputed {
            format!("Computing {} embedding", identity)
        } else {
            format!("Loading cached {} embedding", identity)
        },
    });
    info!(
        "Embedding table '{}' ({} molecules) with {}.",
        table.name(),
        table.row_count(),
        identity
    );

    let columns =
        table.add_manifold_data_with_progress(manifold.as_mut(), config.recalculate, reporter)?;
    reporter.report(Progress::PhaseFinish);

    info!("Embedding columns: {}", columns.join(", "));
    Ok(EmbedResult {
        identity,
        columns,
        recomputed,
    })
}
