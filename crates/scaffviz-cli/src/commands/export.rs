use crate::cli::ExportArgs;
use crate::config::defaults::DefaultsConfig;
use crate::error::{CliError, Result};
use scaffviz::{
    core::io::store::TableStore,
    engine::{config::EmbeddingConfigBuilder, manifold_table::ManifoldTable},
    workflows::scatter::{ScatterData, ScatterOptions},
};
use tracing::info;

/// Number of groups listed in the summary after export.
const SUMMARY_GROUPS: usize = 10;

pub fn run(args: ExportArgs) -> Result<()> {
    let store = TableStore::new(&args.table.store);
    let table = ManifoldTable::from(store.load(&args.table.name)?);

    let config = EmbeddingConfigBuilder::new()
        .manifold(args.manifold)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    let manifold = config.manifold.build();
    let identity = manifold.identity();

    let options = ScatterOptions {
        group_by: args.group_by.clone(),
        mols_per_group: args
            .mols_per_group
            .unwrap_or(DefaultsConfig::default().mols_per_group),
        extra_columns: args.columns.clone(),
    };
    info!(
        "Exporting '{}' embedding of table '{}' with options {:?}",
        identity,
        table.name(),
        &options
    );

    let scatter = ScatterData::build(&table, identity, &options)?;
    scatter.write_csv_path(&args.output)?;

    println!(
        "✓ Wrote {} points to: {}",
        scatter.points().len(),
        args.output.display()
    );
    if options.group_by.is_some() {
        let sizes = scatter.group_sizes();
        println!("  {} group(s):", sizes.len());
        for (label, size) in sizes.iter().take(SUMMARY_GROUPS) {
            println!("    {:<40} {}", label, size);
        }
        if sizes.len() > SUMMARY_GROUPS {
            println!("    ... and {} more", sizes.len() - SUMMARY_GROUPS);
        }
    }
    Ok(())
}
