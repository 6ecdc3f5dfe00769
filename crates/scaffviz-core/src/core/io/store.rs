use super::csv_table::{CsvTable, TableFileError};
use super::traits::TableFile;
use crate::core::models::column::ColumnKind;
use crate::core::models::table::MoleculeTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const META_SUFFIX: &str = "_meta.toml";
const DESCRIPTORS_SUFFIX: &str = "_descriptors";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    TomlRead {
        path: String,
        source: toml::de::Error,
    },
    #[error("TOML serialization error for '{path}': {source}")]
    TomlWrite {
        path: String,
        source: toml::ser::Error,
    },
    #[error("Table file error for '{path}': {source}")]
    TableFile {
        path: String,
        source: TableFileError,
    },
    #[error("No table named '{name}' in store '{root}'")]
    NotFound { name: String, root: String },
    #[error("Invalid table name '{0}': names may not be empty or contain path separators")]
    InvalidName(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct TableMeta {
    name: String,
    id_column: String,
    #[serde(default)]
    descriptor_sets: Vec<String>,
    #[serde(default)]
    column_kinds: BTreeMap<String, ColumnKind>,
}

/// A directory of persisted molecule tables.
///
/// Each table `name` is stored as:
///
/// - `{name}_meta.toml` with the identifier column, descriptor set names and the kind of
///   every property column,
/// - `{name}_df.csv` with the identifier and property columns,
/// - `{name}_descriptors/{set}.csv` for each descriptor set.
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, name: &str) -> bool {
        self.meta_path(name).is_file()
    }

    /// Names of all tables in the store, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if let Some(name) = file_name.strip_suffix(META_SUFFIX) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Writes a table and all its descriptor sets, replacing any previous version.
    pub fn save(&self, table: &MoleculeTable) -> Result<(), StoreError> {
        let name = table.name();
        validate_name(name)?;
        fs::create_dir_all(&self.root).map_err(|e| io_error(&self.root, e))?;

        let df_path = self.df_path(name);
        CsvTable::write_to_path(table, &df_path).map_err(|e| table_file_error(&df_path, e))?;

        if !table.descriptor_sets().is_empty() {
            let dir = self.descriptor_dir(name);
            fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        }
        for set in table.descriptor_sets() {
            validate_name(set.name())?;
            let path = self.descriptor_path(name, set.name());
            let file = File::create(&path).map_err(|e| io_error(&path, e))?;
            let mut writer = BufWriter::new(file);
            CsvTable::write_descriptors(set, table.id_column(), &mut writer)
                .map_err(|e| table_file_error(&path, e))?;
            writer.flush().map_err(|e| io_error(&path, e))?;
        }

        let meta = TableMeta {
            name: name.to_string(),
            id_column: table.id_column().to_string(),
            descriptor_sets: table
                .descriptor_sets()
                .iter()
                .map(|set| set.name().to_string())
                .collect(),
            column_kinds: table
                .properties()
                .iter()
                .map(|column| (column.name().to_string(), column.data().kind()))
                .collect(),
        };
        let meta_path = self.meta_path(name);
        let content = toml::to_string(&meta).map_err(|e| StoreError::TomlWrite {
            path: display(&meta_path),
            source: e,
        })?;
        fs::write(&meta_path, content).map_err(|e| io_error(&meta_path, e))?;

        info!(
            table = name,
            rows = table.row_count(),
            descriptor_sets = meta.descriptor_sets.len(),
            "Saved table to {:?}",
            &self.root
        );
        Ok(())
    }

    /// Loads a table and re-attaches its descriptor sets.
    pub fn load(&self, name: &str) -> Result<MoleculeTable, StoreError> {
        validate_name(name)?;
        if !self.contains(name) {
            return Err(StoreError::NotFound {
                name: name.to_string(),
                root: display(&self.root),
            });
        }

        let meta_path = self.meta_path(name);
        let content = fs::read_to_string(&meta_path).map_err(|e| io_error(&meta_path, e))?;
        let meta: TableMeta = toml::from_str(&content).map_err(|e| StoreError::TomlRead {
            path: display(&meta_path),
            source: e,
        })?;
        debug!("Loaded table metadata: {:?}", &meta);

        let df_path = self.df_path(name);
        let file = File::open(&df_path).map_err(|e| io_error(&df_path, e))?;
        let mut table = CsvTable::read_with_kinds(
            &mut BufReader::new(file),
            &meta.name,
            &meta.id_column,
            &meta.column_kinds,
        )
        .map_err(|e| table_file_error(&df_path, e))?;

        for set_name in &meta.descriptor_sets {
            let path = self.descriptor_path(name, set_name);
            let file = File::open(&path).map_err(|e| io_error(&path, e))?;
            let set =
                CsvTable::read_descriptors(&mut BufReader::new(file), set_name, &meta.id_column)
                    .map_err(|e| table_file_error(&path, e))?;
            table
                .add_descriptors(set)
                .map_err(|e| table_file_error(&path, e.into()))?;
        }

        info!(
            table = name,
            rows = table.row_count(),
            "Loaded table from {:?}",
            &self.root
        );
        Ok(table)
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{META_SUFFIX}"))
    }

    fn df_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}_df.csv"))
    }

    fn descriptor_dir(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{DESCRIPTORS_SUFFIX}"))
    }

    fn descriptor_path(&self, name: &str, set: &str) -> PathBuf {
        self.descriptor_dir(name).join(format!("{set}.csv"))
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: display(path),
        source,
    }
}

fn table_file_error(path: &Path, source: TableFileError) -> StoreError {
    StoreError::TableFile {
        path: display(path),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::column::ColumnData;
    use crate::core::models::descriptors::DescriptorSet;
    use nalgebra::DMatrix;
    use tempfile::tempdir;

    fn sample_table() -> MoleculeTable {
        let mut table = MoleculeTable::from_columns(
            "ligands",
            vec![
                ("ID".to_string(), ColumnData::from(vec!["a", "b"])),
                ("Scaffold".to_string(), ColumnData::from(vec!["c1ccccc1", "C1CC1"])),
            ],
            "ID",
        )
        .unwrap();
        table
            .add_descriptors(
                DescriptorSet::new(
                    "morgan",
                    vec!["b".to_string(), "a".to_string()],
                    vec!["bit0".to_string(), "bit1".to_string()],
                    DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]),
                )
                .unwrap(),
            )
            .unwrap();
        table.add_property("PCA_1", vec![0.5, -0.5]).unwrap();
        table
    }

    #[test]
    fn save_then_load_restores_properties_and_descriptors() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let table = sample_table();

        store.save(&table).unwrap();
        assert!(store.contains("ligands"));
        assert!(dir.path().join("ligands_df.csv").is_file());
        assert!(dir.path().join("ligands_descriptors/morgan.csv").is_file());

        let loaded = store.load("ligands").unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn numeric_looking_text_columns_stay_text_after_reload() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let mut table = sample_table();
        table.add_property("code", vec!["007", "010"]).unwrap();
        table.add_property("PCA_2", vec!["1", "2"]).unwrap();
        table.add_property("pIC50", vec![f64::NAN, f64::NAN]).unwrap();

        store.save(&table).unwrap();
        let meta = fs::read_to_string(dir.path().join("ligands_meta.toml")).unwrap();
        assert!(meta.contains("code = \"text\""));

        let loaded = store.load("ligands").unwrap();
        assert_eq!(
            loaded.property("code").unwrap().data(),
            &ColumnData::from(vec!["007", "010"])
        );
        assert!(loaded.numeric_property("PCA_2").is_none());
        assert_eq!(loaded.property("pIC50").unwrap().data().kind(), ColumnKind::Numeric);
        assert_eq!(loaded.numeric_property("PCA_1").unwrap(), &[0.5, -0.5]);
    }

    #[test]
    fn metadata_without_column_kinds_falls_back_to_inference() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("legacy_meta.toml"),
            "name = \"legacy\"\nid-column = \"ID\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("legacy_df.csv"), "ID,score\na,1.5\nb,2\n").unwrap();

        let loaded = TableStore::new(dir.path()).load("legacy").unwrap();
        assert_eq!(loaded.numeric_property("score").unwrap(), &[1.5, 2.0]);
    }

    #[test]
    fn underscored_table_and_set_names_do_not_share_files() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let single = |table: &str, set: &str, value: f64| {
            let ids = vec!["m1".to_string()];
            let mut table = MoleculeTable::new(table, "ID", ids.clone()).unwrap();
            let values = DMatrix::from_element(1, 1, value);
            let set = DescriptorSet::new(set, ids, vec!["f".to_string()], values).unwrap();
            table.add_descriptors(set).unwrap();
            table
        };
        let first = single("a", "b_c", 1.0);
        let second = single("a_b", "c", 2.0);

        store.save(&first).unwrap();
        store.save(&second).unwrap();

        assert_eq!(store.load("a").unwrap(), first);
        assert_eq!(store.load("a_b").unwrap(), second);
    }

    #[test]
    fn list_returns_saved_table_names() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path().join("nested"));
        assert!(store.list().unwrap().is_empty());

        let mut table = sample_table();
        store.save(&table).unwrap();
        table.rename("decoys");
        store.save(&table).unwrap();

        assert_eq!(store.list().unwrap(), vec!["decoys", "ligands"]);
    }

    #[test]
    fn load_reports_missing_tables() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path());
        assert!(matches!(
            store.load("absent"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn names_with_separators_are_rejected() {
        let dir = tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let mut table = sample_table();
        table.rename("../escape");
        assert!(matches!(store.save(&table), Err(StoreError::InvalidName(_))));
    }
}
