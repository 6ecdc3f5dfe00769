use super::column::{Column, ColumnData};
use super::descriptors::{DescriptorSet, first_duplicate};
use nalgebra::DMatrix;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("Identifier column '{0}' is not present in the input data")]
    MissingIdColumn(String),

    #[error("Column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Molecule identifier '{0}' is not unique")]
    DuplicateId(String),

    #[error("Molecule identifier in row {row} is empty")]
    EmptyId { row: usize },

    #[error("Column '{0}' holds molecule identifiers and cannot be overwritten")]
    ProtectedColumn(String),

    #[error("Invalid descriptor set '{set}': {reason}")]
    InvalidDescriptorSet { set: String, reason: String },

    #[error("Descriptor set '{set}' contains molecule '{id}' which is not in the table")]
    UnknownMolecule { set: String, id: String },

    #[error("Descriptor set '{set}' has no row for molecule '{id}'")]
    MissingDescriptorRow { set: String, id: String },
}

/// A tabular store of molecules keyed by a unique identifier.
///
/// The table owns three kinds of data:
///
/// - the identifier column, fixed at construction,
/// - property columns (metadata such as SMILES or scaffolds, and derived columns such as
///   embedding coordinates), kept in insertion order,
/// - descriptor sets, numeric feature blocks aligned to the table's row order.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeTable {
    name: String,
    id_column: String,
    ids: Vec<String>,
    row_index: HashMap<String, usize>,
    columns: Vec<Column>,
    column_index: HashMap<String, usize>,
    descriptors: Vec<DescriptorSet>,
}

impl MoleculeTable {
    /// Creates a table from a list of molecule identifiers with no properties.
    pub fn new(
        name: impl Into<String>,
        id_column: impl Into<String>,
        ids: Vec<String>,
    ) -> Result<Self, TableError> {
        let id_column = id_column.into();
        Self::from_columns(name, vec![(id_column.clone(), ColumnData::Text(ids))], &id_column)
    }

    /// Creates a table from named columns, one of which holds the molecule identifiers.
    ///
    /// A numeric identifier column is converted to text.
    ///
    /// # Errors
    ///
    /// Fails if the identifier column is absent, if column names repeat, if the columns
    /// differ in length, or if identifiers are empty or not unique.
    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<(String, ColumnData)>,
        id_column: &str,
    ) -> Result<Self, TableError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for (column_name, _) in &columns {
            if !seen.insert(column_name.as_str()) {
                return Err(TableError::DuplicateColumn(column_name.clone()));
            }
        }

        let id_position = columns
            .iter()
            .position(|(column_name, _)| column_name == id_column)
            .ok_or_else(|| TableError::MissingIdColumn(id_column.to_string()))?;
        let expected = columns[id_position].1.len();

        if let Some((column_name, data)) = columns.iter().find(|(_, data)| data.len() != expected)
        {
            return Err(TableError::ColumnLength {
                column: column_name.clone(),
                expected,
                found: data.len(),
            });
        }

        let mut ids = Vec::new();
        let mut properties = Vec::with_capacity(columns.len().saturating_sub(1));
        for (position, (column_name, data)) in columns.into_iter().enumerate() {
            if position == id_position {
                ids = data.into_text();
            } else {
                properties.push(Column::new(column_name, data));
            }
        }

        if let Some(row) = ids.iter().position(|id| id.trim().is_empty()) {
            return Err(TableError::EmptyId { row });
        }
        if let Some(dup) = first_duplicate(&ids) {
            return Err(TableError::DuplicateId(dup.clone()));
        }

        let row_index = ids
            .iter()
            .enumerate()
            .map(|(row, id)| (id.clone(), row))
            .collect();
        let column_index = properties
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name.clone(), i))
            .collect();

        Ok(Self {
            name: name.into(),
            id_column: id_column.to_string(),
            ids,
            row_index,
            columns: properties,
            column_index,
            descriptors: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn row_count(&self) -> usize {
        self.ids.len()
    }

    /// Returns the row position of a molecule identifier.
    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.row_index.get(id).copied()
    }

    /// Names of all property columns in insertion order, excluding the identifier column.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn properties(&self) -> &[Column] {
        &self.columns
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    pub fn property(&self, name: &str) -> Option<&Column> {
        self.column_index.get(name).map(|&i| &self.columns[i])
    }

    pub fn numeric_property(&self, name: &str) -> Option<&[f64]> {
        self.property(name).and_then(|column| column.data.as_numeric())
    }

    /// Adds a property column, or replaces an existing column of the same name in place.
    ///
    /// # Errors
    ///
    /// Fails if the value count differs from the row count or if `name` is the
    /// identifier column.
    pub fn add_property(
        &mut self,
        name: &str,
        data: impl Into<ColumnData>,
    ) -> Result<(), TableError> {
        let data = data.into();
        if name == self.id_column {
            return Err(TableError::ProtectedColumn(name.to_string()));
        }
        if data.len() != self.row_count() {
            return Err(TableError::ColumnLength {
                column: name.to_string(),
                expected: self.row_count(),
                found: data.len(),
            });
        }

        match self.column_index.get(name) {
            Some(&i) => self.columns[i].data = data,
            None => {
                self.column_index.insert(name.to_string(), self.columns.len());
                self.columns.push(Column::new(name, data));
            }
        }
        Ok(())
    }

    /// Returns the property columns whose names start with `prefix`, in insertion order.
    pub fn get_subset(&self, prefix: &str) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|column| column.name.starts_with(prefix))
            .collect()
    }

    /// Attaches a descriptor set, reordering its rows to the table's row order.
    ///
    /// A set with the same name as an attached one replaces it.
    ///
    /// # Errors
    ///
    /// Fails if the set does not cover exactly the molecules of this table.
    pub fn add_descriptors(&mut self, set: DescriptorSet) -> Result<(), TableError> {
        let aligned = set.aligned_to(&self.ids)?;
        match self
            .descriptors
            .iter_mut()
            .find(|existing| existing.name() == aligned.name())
        {
            Some(existing) => *existing = aligned,
            None => self.descriptors.push(aligned),
        }
        Ok(())
    }

    pub fn descriptor_sets(&self) -> &[DescriptorSet] {
        &self.descriptors
    }

    /// Whether at least one descriptor feature is attached.
    pub fn has_descriptors(&self) -> bool {
        self.descriptors.iter().any(|set| set.n_features() > 0)
    }

    /// Feature names of all descriptor sets, in attachment order.
    pub fn descriptor_names(&self) -> Vec<&str> {
        self.descriptors
            .iter()
            .flat_map(|set| set.feature_names().iter().map(String::as_str))
            .collect()
    }

    /// Concatenates all descriptor sets horizontally into one `rows x features` matrix.
    ///
    /// Returns `None` if no descriptor features are attached.
    pub fn descriptor_matrix(&self) -> Option<DMatrix<f64>> {
        if !self.has_descriptors() {
            return None;
        }
        let width = self.descriptors.iter().map(DescriptorSet::n_features).sum();
        let mut matrix = DMatrix::zeros(self.row_count(), width);
        let mut offset = 0;
        for set in &self.descriptors {
            let k = set.n_features();
            matrix.columns_mut(offset, k).copy_from(set.values());
            offset += k;
        }
        Some(matrix)
    }
}
