use crate::cli::ColumnsArgs;
use crate::error::Result;
use scaffviz::core::io::store::TableStore;
use scaffviz::engine::config::{EmbeddingConfigBuilder, ManifoldKind};
use scaffviz::engine::manifold_table::ManifoldTable;

pub fn run(args: ColumnsArgs) -> Result<()> {
    let store = TableStore::new(&args.table.store);
    let table = ManifoldTable::from(store.load(&args.table.name)?);

    println!(
        "Table '{}': {} molecules, identifier column '{}'",
        table.name(),
        table.row_count(),
        table.id_column()
    );

    println!("Properties:");
    for column in table.properties() {
        println!("  {:<40} {}", column.name(), column.data().kind());
    }

    println!("Descriptor sets:");
    if table.descriptor_sets().is_empty() {
        println!("  (none)");
    }
    for set in table.descriptor_sets() {
        println!("  {:<40} {} features", set.name(), set.n_features());
    }

    println!("Embeddings:");
    let mut found = false;
    for kind in [ManifoldKind::Pca, ManifoldKind::Tsne] {
        let Ok(config) = EmbeddingConfigBuilder::new().manifold(kind).build() else {
            continue;
        };
        let manifold = config.manifold.build();
        if let Some(data) = table.get_manifold_data(manifold.as_ref()) {
            found = true;
            println!("  {:<40} {}", data.identity(), data.column_names().join(", "));
        }
    }
    if !found {
        println!("  (none)");
    }
    Ok(())
}
