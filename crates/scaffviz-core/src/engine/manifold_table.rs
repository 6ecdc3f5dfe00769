use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::manifold::Manifold;
use crate::core::models::column::{Column, ColumnData};
use crate::core::models::table::{MoleculeTable, TableError};
use nalgebra::DMatrix;
use std::ops::Deref;
use tracing::{debug, info, instrument};

/// The embedding columns stored under one manifold identity.
#[derive(Debug, Clone)]
pub struct ManifoldData<'a> {
    identity: String,
    columns: Vec<&'a Column>,
}

impl<'a> ManifoldData<'a> {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Columns ordered by dimension index.
    pub fn columns(&self) -> &[&'a Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn dimensions(&self) -> usize {
        self.columns.len()
    }

    /// The stored coordinates as a `rows x dimensions` matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        let rows = self.columns.first().map_or(0, |c| c.len());
        DMatrix::from_fn(rows, self.columns.len(), |i, j| {
            self.columns[j]
                .data()
                .as_numeric()
                .map_or(f64::NAN, |values| values[i])
        })
    }
}

/// Returns the dimension index if `name` is `{identity}_{n}` with `n >= 1`.
fn dimension_of(name: &str, identity: &str) -> Option<usize> {
    let suffix = name.strip_prefix(identity)?.strip_prefix('_')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok().filter(|&n| n >= 1)
}

fn column_name(identity: &str, dimension: usize) -> String {
    format!("{}_{}", identity, dimension + 1)
}

/// A molecule table that caches manifold embeddings as property columns.
///
/// Embedding columns are named `{identity}_{dimension}` (1-based), where `identity` is
/// [`Manifold::identity`]. The identity names the algorithm variant only, so embeddings of
/// two differently parameterised instances of the same variant share one set of columns.
/// Cached columns are reused whenever they exist, even if a freshly configured manifold
/// would produce a different number of dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifoldTable {
    table: MoleculeTable,
}

impl ManifoldTable {
    /// Builds a table from raw named columns, one of which holds molecule identifiers.
    pub fn from_records(
        name: impl Into<String>,
        columns: Vec<(String, ColumnData)>,
        id_column: &str,
    ) -> Result<Self, TableError> {
        Ok(Self {
            table: MoleculeTable::from_columns(name, columns, id_column)?,
        })
    }

    /// Copies an existing table, including its descriptors, optionally under a new name.
    pub fn from_mol_table(table: &MoleculeTable, name: Option<&str>) -> Self {
        let mut table = table.clone();
        if let Some(name) = name {
            table.rename(name);
        }
        Self { table }
    }

    pub fn table(&self) -> &MoleculeTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut MoleculeTable {
        &mut self.table
    }

    pub fn into_inner(self) -> MoleculeTable {
        self.table
    }

    /// Returns the cached embedding of `manifold`, or `None` if no columns exist for it.
    pub fn get_manifold_data(&self, manifold: &dyn Manifold) -> Option<ManifoldData<'_>> {
        self.manifold_data_by_identity(manifold.identity())
    }

    /// Looks up cached embedding columns by identity string.
    pub fn manifold_data_by_identity(&self, identity: &str) -> Option<ManifoldData<'_>> {
        let mut indexed: Vec<(usize, &Column)> = self
            .table
            .get_subset(identity)
            .into_iter()
            .filter(|column| column.data().as_numeric().is_some())
            .filter_map(|column| dimension_of(column.name(), identity).map(|d| (d, column)))
            .collect();
        if indexed.is_empty() {
            return None;
        }
        indexed.sort_by_key(|&(dimension, _)| dimension);
        Some(ManifoldData {
            identity: identity.to_string(),
            columns: indexed.into_iter().map(|(_, column)| column).collect(),
        })
    }

    /// Ensures embedding columns for `manifold` exist and returns their names.
    ///
    /// Existing columns are returned untouched unless `recalculate` is set. Otherwise the
    /// descriptor matrix is embedded with [`Manifold::fit_transform`] and every dimension is
    /// written, overwriting columns of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingDescriptors`] if a computation is needed but the table
    /// has no descriptors, and passes algorithm failures through. The table is unchanged on
    /// error.
    pub fn add_manifold_data(
        &mut self,
        manifold: &mut dyn Manifold,
        recalculate: bool,
    ) -> Result<Vec<String>, EngineError> {
        self.add_manifold_data_with_progress(manifold, recalculate, &ProgressReporter::new())
    }

    #[instrument(
        skip_all,
        fields(
            table = %self.table.name(),
            identity = %manifold.identity(),
            recalculate = recalculate
        )
    )]
    pub fn add_manifold_data_with_progress(
        &mut self,
        manifold: &mut dyn Manifold,
        recalculate: bool,
        reporter: &ProgressReporter,
    ) -> Result<Vec<String>, EngineError> {
        let identity = manifold.identity().to_string();

        if !recalculate {
            if let Some(existing) = self.manifold_data_by_identity(&identity) {
                let names = existing.column_names();
                debug!("Reusing {} cached columns for '{}'", names.len(), identity);
                reporter.report(Progress::Cached {
                    identity,
                    columns: names.len(),
                });
                return Ok(names);
            }
        }

        let descriptors =
            self.table
                .descriptor_matrix()
                .ok_or_else(|| EngineError::MissingDescriptors {
                    table: self.table.name().to_string(),
                })?;

        info!(
            "Computing {} embedding of {}x{} descriptor matrix",
            identity,
            descriptors.nrows(),
            descriptors.ncols()
        );
        let embedding = manifold.fit_transform(&descriptors)?;

        if embedding.nrows() != self.table.row_count() {
            return Err(EngineError::EmbeddingShape {
                expected: self.table.row_count(),
                found: embedding.nrows(),
            });
        }
        let names: Vec<String> = (0..embedding.ncols())
            .map(|dimension| column_name(&identity, dimension))
            .collect();
        if let Some(protected) = names.iter().find(|name| *name == self.table.id_column()) {
            return Err(TableError::ProtectedColumn(protected.clone()).into());
        }

        for (dimension, name) in names.iter().enumerate() {
            let values: Vec<f64> = embedding.column(dimension).iter().copied().collect();
            self.table.add_property(name, values)?;
            reporter.report(Progress::ColumnWritten { name: name.clone() });
        }

        info!("Stored {} embedding columns for '{}'", names.len(), identity);
        Ok(names)
    }
}

impl From<MoleculeTable> for ManifoldTable {
    fn from(table: MoleculeTable) -> Self {
        Self { table }
    }
}

impl Deref for ManifoldTable {
    type Target = MoleculeTable;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifold::error::ManifoldError;
    use crate::core::manifold::pca::Pca;
    use crate::core::models::descriptors::DescriptorSet;
    use std::sync::Mutex;

    /// Returns `[offset + i, -(offset + i), ...]` per row and counts `fit` calls.
    struct StubManifold {
        identity: &'static str,
        width: usize,
        offset: f64,
        rows_override: Option<usize>,
        fits: usize,
        rows: usize,
    }

    impl StubManifold {
        fn new(identity: &'static str, width: usize) -> Self {
            Self {
                identity,
                width,
                offset: 0.0,
                rows_override: None,
                fits: 0,
                rows: 0,
            }
        }
    }

    impl Manifold for StubManifold {
        fn fit(&mut self, x: &DMatrix<f64>) -> Result<(), ManifoldError> {
            self.fits += 1;
            self.rows = x.nrows();
            Ok(())
        }

        fn transform(&mut self, _x: &DMatrix<f64>) -> Result<DMatrix<f64>, ManifoldError> {
            let rows = self.rows_override.unwrap_or(self.rows);
            let offset = self.offset;
            Ok(DMatrix::from_fn(rows, self.width, |i, j| {
                let value = offset + i as f64;
                if j % 2 == 0 { value } else { -value }
            }))
        }

        fn identity(&self) -> &str {
            self.identity
        }
    }

    struct FailingManifold;

    impl Manifold for FailingManifold {
        fn fit(&mut self, _x: &DMatrix<f64>) -> Result<(), ManifoldError> {
            Err(ManifoldError::Numerical("did not converge".to_string()))
        }

        fn transform(&mut self, _x: &DMatrix<f64>) -> Result<DMatrix<f64>, ManifoldError> {
            Err(ManifoldError::NotFitted)
        }

        fn identity(&self) -> &str {
            "FAIL"
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("mol{}", i)).collect()
    }

    fn bare_table(n: usize) -> ManifoldTable {
        ManifoldTable::from(MoleculeTable::new("test", "ID", ids(n)).unwrap())
    }

    fn table_with_descriptors(n: usize, features: usize) -> ManifoldTable {
        let mut table = bare_table(n);
        let names = (0..features).map(|j| format!("d{}", j)).collect();
        let values = DMatrix::from_fn(n, features, |i, j| (i * features + j) as f64);
        let set = DescriptorSet::new("desc", ids(n), names, values).unwrap();
        table.table_mut().add_descriptors(set).unwrap();
        table
    }

    mod caching {
        use super::*;

        #[test]
        fn first_call_writes_one_column_per_dimension() {
            let mut table = table_with_descriptors(10, 5);
            let mut stub = StubManifold::new("stub", 3);

            let names = table.add_manifold_data(&mut stub, false).unwrap();

            assert_eq!(names, vec!["stub_1", "stub_2", "stub_3"]);
            assert_eq!(stub.fits, 1);
            for name in &names {
                assert!(table.has_property(name));
            }
        }

        #[test]
        fn second_call_reuses_cached_columns_without_recomputing() {
            let mut table = table_with_descriptors(10, 5);
            let mut stub = StubManifold::new("stub", 2);

            let first = table.add_manifold_data(&mut stub, false).unwrap();
            let snapshot = table.clone();
            let second = table.add_manifold_data(&mut stub, false).unwrap();

            assert_eq!(first, second);
            assert_eq!(stub.fits, 1);
            assert_eq!(table, snapshot);
        }

        #[test]
        fn recalculate_recomputes_and_overwrites() {
            let mut table = table_with_descriptors(10, 5);
            let mut stub = StubManifold::new("stub", 2);
            table.add_manifold_data(&mut stub, false).unwrap();

            stub.offset = 100.0;
            let names = table.add_manifold_data(&mut stub, true).unwrap();

            assert_eq!(stub.fits, 2);
            assert_eq!(names, vec!["stub_1", "stub_2"]);
            assert_eq!(table.numeric_property("stub_1").unwrap()[0], 100.0);
            assert_eq!(table.property_names().count(), 2);
        }

        #[test]
        fn stale_subset_is_reused_regardless_of_dimensionality() {
            let mut table = table_with_descriptors(10, 5);
            table
                .add_manifold_data(&mut StubManifold::new("stub", 2), false)
                .unwrap();

            let mut wider = StubManifold::new("stub", 3);
            let names = table.add_manifold_data(&mut wider, false).unwrap();

            assert_eq!(names, vec!["stub_1", "stub_2"]);
            assert_eq!(wider.fits, 0);
        }

        #[test]
        fn progress_reports_cache_hits_and_written_columns() {
            let mut table = table_with_descriptors(4, 2);
            let mut stub = StubManifold::new("stub", 2);
            let events = Mutex::new(Vec::new());
            let reporter = ProgressReporter::with_callback(Box::new(|event| {
                events.lock().unwrap().push(event);
            }));

            table
                .add_manifold_data_with_progress(&mut stub, false, &reporter)
                .unwrap();
            table
                .add_manifold_data_with_progress(&mut stub, false, &reporter)
                .unwrap();
            drop(reporter);

            let events = events.into_inner().unwrap();
            assert_eq!(events.len(), 3);
            assert!(matches!(&events[0], Progress::ColumnWritten { name } if name == "stub_1"));
            assert!(matches!(&events[1], Progress::ColumnWritten { name } if name == "stub_2"));
            assert!(matches!(
                &events[2],
                Progress::Cached { identity, columns: 2 } if identity == "stub"
            ));
        }
    }

    mod failures {
        use super::*;

        #[test]
        fn missing_descriptors_fails_and_leaves_table_unchanged() {
            let mut table = bare_table(5);
            let snapshot = table.clone();
            let mut stub = StubManifold::new("stub", 2);

            let result = table.add_manifold_data(&mut stub, false);

            assert!(matches!(
                &result,
                Err(EngineError::MissingDescriptors { table }) if table == "test"
            ));
            assert_eq!(stub.fits, 0);
            assert_eq!(table, snapshot);
        }

        #[test]
        fn cached_columns_are_returned_even_without_descriptors() {
            let mut table = bare_table(3);
            table
                .table_mut()
                .add_property("stub_1", vec![1.0, 2.0, 3.0])
                .unwrap();
            let mut stub = StubManifold::new("stub", 2);

            let names = table.add_manifold_data(&mut stub, false).unwrap();
            assert_eq!(names, vec!["stub_1"]);

            let forced = table.add_manifold_data(&mut stub, true);
            assert!(matches!(forced, Err(EngineError::MissingDescriptors { .. })));
        }

        #[test]
        fn algorithm_errors_pass_through_unmodified() {
            let mut table = table_with_descriptors(4, 2);
            let snapshot = table.clone();

            let result = table.add_manifold_data(&mut FailingManifold, false);

            assert!(matches!(
                result,
                Err(EngineError::Algorithm {
                    source: ManifoldError::Numerical(_)
                })
            ));
            assert_eq!(table, snapshot);
        }

        #[test]
        fn embedding_with_wrong_row_count_writes_nothing() {
            let mut table = table_with_descriptors(6, 2);
            let snapshot = table.clone();
            let mut stub = StubManifold::new("stub", 2);
            stub.rows_override = Some(5);

            let result = table.add_manifold_data(&mut stub, false);

            assert!(matches!(
                result,
                Err(EngineError::EmbeddingShape {
                    expected: 6,
                    found: 5
                })
            ));
            assert_eq!(table, snapshot);
        }

        #[test]
        fn embedding_column_clashing_with_id_column_writes_nothing() {
            let mut table = ManifoldTable::from_records(
                "clash",
                vec![("stub_2".to_string(), ColumnData::from(vec!["a", "b"]))],
                "stub_2",
            )
            .unwrap();
            let set = DescriptorSet::new(
                "desc",
                vec!["a".to_string(), "b".to_string()],
                vec!["x".to_string()],
                DMatrix::from_row_slice(2, 1, &[1.0, 2.0]),
            )
            .unwrap();
            table.table_mut().add_descriptors(set).unwrap();
            let snapshot = table.clone();

            let result = table.add_manifold_data(&mut StubManifold::new("stub", 2), false);

            assert!(matches!(
                result,
                Err(EngineError::Table {
                    source: TableError::ProtectedColumn(_)
                })
            ));
            assert_eq!(table, snapshot);
        }
    }

    mod identities {
        use super::*;

        #[test]
        fn distinct_identities_never_overwrite_each_other() {
            let mut table = table_with_descriptors(5, 2);
            let mut first = StubManifold::new("alpha", 2);
            let mut second = StubManifold::new("beta", 2);
            second.offset = 50.0;

            table.add_manifold_data(&mut first, false).unwrap();
            table.add_manifold_data(&mut second, false).unwrap();

            assert_eq!(table.numeric_property("alpha_1").unwrap()[0], 0.0);
            assert_eq!(table.numeric_property("beta_1").unwrap()[0], 50.0);
            assert_eq!(second.fits, 1);
        }

        #[test]
        fn shared_identity_overwrites_despite_different_parameters() {
            let mut table = table_with_descriptors(5, 2);
            table
                .add_manifold_data(&mut StubManifold::new("stub", 2), false)
                .unwrap();

            let mut reconfigured = StubManifold::new("stub", 2);
            reconfigured.offset = 7.0;
            table.add_manifold_data(&mut reconfigured, true).unwrap();

            assert_eq!(table.numeric_property("stub_1").unwrap()[0], 7.0);
            assert_eq!(table.property_names().count(), 2);
        }

        #[test]
        fn lookup_ignores_columns_that_only_share_a_prefix() {
            let mut table = bare_table(2);
            for name in ["stub_2", "stubby_1", "stub_x", "stub_0", "stub_1", "stub_10"] {
                table.table_mut().add_property(name, vec![0.0, 0.0]).unwrap();
            }
            table
                .table_mut()
                .add_property("stub_3", vec!["text", "text"])
                .unwrap();

            let data = table.manifold_data_by_identity("stub").unwrap();
            assert_eq!(data.column_names(), vec!["stub_1", "stub_2", "stub_10"]);
            assert!(table.manifold_data_by_identity("alpha").is_none());
        }

        #[test]
        fn dimension_parsing_requires_a_positive_index() {
            assert_eq!(dimension_of("PCA_1", "PCA"), Some(1));
            assert_eq!(dimension_of("PCA_12", "PCA"), Some(12));
            assert_eq!(dimension_of("PCA_0", "PCA"), None);
            assert_eq!(dimension_of("PCA_", "PCA"), None);
            assert_eq!(dimension_of("PCA_+1", "PCA"), None);
            assert_eq!(dimension_of("PCAX_1", "PCA"), None);
        }
    }

    mod end_to_end {
        use super::*;

        #[test]
        fn stub_embedding_of_ten_molecules() {
            let mut table = table_with_descriptors(10, 5);
            let mut stub = StubManifold::new("stub", 2);

            let names = table.add_manifold_data(&mut stub, false).unwrap();
            assert_eq!(names, vec!["stub_1", "stub_2"]);

            let expected_x: Vec<f64> = (0..10).map(|i| i as f64).collect();
            let expected_y: Vec<f64> = (0..10).map(|i| -(i as f64)).collect();
            assert_eq!(table.numeric_property("stub_1").unwrap(), &expected_x[..]);
            assert_eq!(table.numeric_property("stub_2").unwrap(), &expected_y[..]);

            let data = table.get_manifold_data(&stub).unwrap();
            assert_eq!(data.identity(), "stub");
            assert_eq!(data.column_names(), vec!["stub_1", "stub_2"]);
            let matrix = data.to_matrix();
            assert_eq!(matrix.shape(), (10, 2));
            assert_eq!(matrix[(9, 1)], -9.0);
        }

        #[test]
        fn pca_embedding_is_cached_under_its_identity() {
            let mut table = table_with_descriptors(6, 3);
            let mut pca = Pca::new(2);

            let names = table.add_manifold_data(&mut pca, false).unwrap();

            assert_eq!(names, vec!["PCA_1", "PCA_2"]);
            assert!(pca.is_fitted());
            assert_eq!(table.get_manifold_data(&pca).unwrap().dimensions(), 2);
        }

        #[test]
        fn from_mol_table_preserves_descriptors_and_renames() {
            let source = table_with_descriptors(3, 2);
            let copy = ManifoldTable::from_mol_table(source.table(), Some("copy"));
            assert_eq!(copy.name(), "copy");
            assert!(copy.has_descriptors());
            assert_eq!(source.name(), "test");

            let same = ManifoldTable::from_mol_table(source.table(), None);
            assert_eq!(same, source);
        }

        #[test]
        fn from_records_builds_a_table_keyed_by_the_id_column() {
            let table = ManifoldTable::from_records(
                "records",
                vec![
                    ("SMILES".to_string(), ColumnData::from(vec!["C", "CC"])),
                    ("ID".to_string(), ColumnData::from(vec!["a", "b"])),
                ],
                "ID",
            )
            .unwrap();
            assert_eq!(table.id_column(), "ID");
            assert_eq!(table.row_count(), 2);
            assert!(table.get_manifold_data(&Pca::default()).is_none());
        }
    }
}
