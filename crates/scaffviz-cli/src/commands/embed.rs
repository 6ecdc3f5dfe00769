use crate::cli::EmbedArgs;
use crate::config::PartialEmbedConfig;
use crate::config::defaults::DefaultsConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use scaffviz::{
    core::io::{csv_table::CsvTable, store::TableStore, traits::TableFile},
    engine::{error::EngineError, manifold_table::ManifoldTable, progress::ProgressReporter},
    workflows,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

pub fn run(args: EmbedArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialEmbedConfig::from_file(path)?,
        None => PartialEmbedConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_with_cli(&args)?;

    let store = TableStore::new(&args.table.store);
    let mut table = load_or_create(&store, &args)?;

    for path in &args.descriptors {
        attach_descriptors(&mut table, path, args.id_column.as_deref())?;
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Embedding {} molecules of '{}'...",
        table.row_count(),
        table.name()
    );
    let result = workflows::embed::run(&mut table, &final_config, &reporter)?;

    store.save(table.table())?;

    if result.recomputed {
        println!("✓ Computed {} embedding.", result.identity);
    } else {
        println!("✓ Reused cached {} embedding.", result.identity);
    }
    println!("  Columns: {}", result.columns.join(", "));
    println!("  Saved to: {}", store.root().display());
    Ok(())
}

fn load_or_create(store: &TableStore, args: &EmbedArgs) -> Result<ManifoldTable> {
    let name = &args.table.name;
    if store.contains(name) {
        if args.input.is_some() {
            warn!(
                "Table '{}' already exists in the store; ignoring --input.",
                name
            );
        }
        info!("Loading table '{}' from {:?}", name, store.root());
        return Ok(ManifoldTable::from(store.load(name)?));
    }

    let input = args.input.as_ref().ok_or_else(|| {
        CliError::Argument(format!(
            "Table '{}' is not in the store; provide --input to create it.",
            name
        ))
    })?;
    let defaults = DefaultsConfig::default();
    let id_column = args.id_column.as_deref().unwrap_or(&defaults.id_column);

    info!("Creating table '{}' from {:?}", name, input);
    let table = CsvTable::read_from_path(input, name, id_column).map_err(|e| {
        CliError::TableFile {
            path: input.clone(),
            source: e,
        }
    })?;
    Ok(ManifoldTable::from(table))
}

fn attach_descriptors(
    table: &mut ManifoldTable,
    path: &Path,
    id_column: Option<&str>,
) -> Result<()> {
    let set_name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .ok_or_else(|| {
            CliError::Argument(format!("Cannot derive a descriptor set name from {:?}", path))
        })?;
    let id_column = id_column.unwrap_or(table.id_column()).to_string();

    info!("Attaching descriptor set '{}' from {:?}", set_name, path);
    let mut reader = BufReader::new(File::open(path)?);
    let set = CsvTable::read_descriptors(&mut reader, &set_name, &id_column).map_err(|e| {
        CliError::TableFile {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    table
        .table_mut()
        .add_descriptors(set)
        .map_err(EngineError::from)?;
    Ok(())
}
