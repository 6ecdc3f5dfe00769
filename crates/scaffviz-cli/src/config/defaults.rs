use scaffviz::engine::config::ManifoldKind;

/// Fallback values for settings given neither on the command line nor in a config file.
pub struct DefaultsConfig {
    pub manifold: ManifoldKind,
    pub id_column: String,
    pub mols_per_group: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            manifold: ManifoldKind::Tsne,
            id_column: "ID".to_string(),
            mols_per_group: 5,
        }
    }
}
