use clap::{Args, Parser, Subcommand};
use scaffviz::core::manifold::tsne::TsneInit;
use scaffviz::engine::config::ManifoldKind;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Martin Sicho",
    version,
    about = "scaffviz CLI - Compute cached 2D embeddings (PCA, t-SNE) of molecular descriptors and export scaffold-grouped scatter data.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute (or reuse) an embedding of a stored table's descriptors.
    Embed(EmbedArgs),
    /// Export an embedding as scatter-plot records grouped by a scaffold column.
    Export(ExportArgs),
    /// List the property columns and descriptor sets of a stored table.
    Columns(ColumnsArgs),
}

/// Location of a table inside a store directory.
#[derive(Args, Debug, Clone)]
pub struct TableLocation {
    /// Directory holding persisted tables.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub store: PathBuf,

    /// Name of the table within the store.
    #[arg(short, long, required = true, value_name = "NAME")]
    pub name: String,
}

/// Arguments for the `embed` subcommand.
#[derive(Args, Debug)]
pub struct EmbedArgs {
    #[command(flatten)]
    pub table: TableLocation,

    // --- Table Creation ---
    /// CSV file to build the table from when it is not yet in the store.
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Column of the input and descriptor files holding molecule identifiers.
    #[arg(long, value_name = "COLUMN")]
    pub id_column: Option<String>,

    /// Descriptor CSV file to attach; the file stem names the set. Can be used multiple times.
    #[arg(short, long = "descriptors", value_name = "PATH")]
    pub descriptors: Vec<PathBuf>,

    // --- Embedding Configuration ---
    /// Path to an embedding configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the embedding algorithm.
    #[arg(short, long, value_name = "pca|tsne")]
    pub manifold: Option<ManifoldKind>,

    /// Override the number of embedding dimensions.
    #[arg(short = 'k', long, value_name = "INT")]
    pub components: Option<usize>,

    /// Override the t-SNE perplexity.
    #[arg(long, value_name = "FLOAT")]
    pub perplexity: Option<f64>,

    /// Override the maximum number of t-SNE iterations.
    #[arg(long, value_name = "INT")]
    pub max_iter: Option<usize>,

    /// Override the t-SNE initialisation.
    #[arg(long, value_name = "pca|random")]
    pub init: Option<TsneInit>,

    /// Seed for t-SNE initialisation.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Recompute the embedding even if cached columns exist.
    #[arg(long, conflicts_with = "no_recalculate")]
    pub recalculate: bool,

    /// Reuse cached columns even if the configuration file asks to recalculate.
    #[arg(long)]
    pub no_recalculate: bool,
}

/// Arguments for the `export` subcommand.
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub table: TableLocation,

    /// Embedding to export.
    #[arg(short, long, required = true, value_name = "pca|tsne")]
    pub manifold: ManifoldKind,

    /// Output CSV path.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Column to group points by, typically a scaffold.
    #[arg(short, long, value_name = "COLUMN")]
    pub group_by: Option<String>,

    /// Groups with fewer molecules are merged into 'Other'.
    #[arg(long, value_name = "INT")]
    pub mols_per_group: Option<usize>,

    /// Additional columns to include, comma separated.
    #[arg(long, value_name = "C1,C2", value_delimiter = ',')]
    pub columns: Vec<String>,
}

/// Arguments for the `columns` subcommand.
#[derive(Args, Debug)]
pub struct ColumnsArgs {
    #[command(flatten)]
    pub table: TableLocation,
}
