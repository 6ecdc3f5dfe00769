use super::table::TableError;
use nalgebra::DMatrix;
use std::collections::{HashMap, HashSet};

/// A named block of numeric descriptor features, one row per molecule.
///
/// Rows are keyed by molecule identifier; when the set is attached to a
/// [`MoleculeTable`](super::table::MoleculeTable) the rows are reordered to follow the
/// table's row order.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSet {
    name: String,
    ids: Vec<String>,
    features: Vec<String>,
    values: DMatrix<f64>,
}

impl DescriptorSet {
    /// Creates a descriptor set after checking that the matrix shape matches the
    /// identifiers and feature names.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidDescriptorSet`] on shape mismatches, empty names,
    /// or duplicated identifiers or feature names.
    pub fn new(
        name: impl Into<String>,
        ids: Vec<String>,
        features: Vec<String>,
        values: DMatrix<f64>,
    ) -> Result<Self, TableError> {
        let name = name.into();
        let invalid = |reason: String| TableError::InvalidDescriptorSet {
            set: name.clone(),
            reason,
        };

        if name.trim().is_empty() {
            return Err(invalid("descriptor set name cannot be empty".to_string()));
        }
        if values.nrows() != ids.len() {
            return Err(invalid(format!(
                "matrix has {} rows but {} molecule identifiers were given",
                values.nrows(),
                ids.len()
            )));
        }
        if values.ncols() != features.len() {
            return Err(invalid(format!(
                "matrix has {} columns but {} feature names were given",
                values.ncols(),
                features.len()
            )));
        }

        if let Some(dup) = first_duplicate(&ids) {
            return Err(invalid(format!("duplicate molecule identifier '{}'", dup)));
        }
        if let Some(dup) = first_duplicate(&features) {
            return Err(invalid(format!("duplicate feature name '{}'", dup)));
        }

        Ok(Self {
            name,
            ids,
            features,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn feature_names(&self) -> &[String] {
        &self.features
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns a copy of this set whose rows follow `order` exactly.
    ///
    /// Every identifier in `order` must be present in the set, and the set may not carry
    /// identifiers that are absent from `order`.
    pub(crate) fn aligned_to(&self, order: &[String]) -> Result<Self, TableError> {
        let position: HashMap<&str, usize> = self
            .ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let wanted: HashSet<&str> = order.iter().map(String::as_str).collect();
        if let Some(extra) = self.ids.iter().find(|id| !wanted.contains(id.as_str())) {
            return Err(TableError::UnknownMolecule {
                set: self.name.clone(),
                id: extra.clone(),
            });
        }

        let mut rows = Vec::with_capacity(order.len());
        for id in order {
            let row = position
                .get(id.as_str())
                .copied()
                .ok_or_else(|| TableError::MissingDescriptorRow {
                    set: self.name.clone(),
                    id: id.clone(),
                })?;
            rows.push(row);
        }

        let values = DMatrix::from_fn(rows.len(), self.values.ncols(), |r, c| {
            self.values[(rows[r], c)]
        });

        Ok(Self {
            name: self.name.clone(),
            ids: order.to_vec(),
            features: self.features.clone(),
            values,
        })
    }
}

pub(crate) fn first_duplicate(values: &[String]) -> Option<&String> {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().find(|value| !seen.insert(value.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn new_rejects_shape_mismatch() {
        let result = DescriptorSet::new(
            "fp",
            ids(&["a", "b"]),
            ids(&["f1"]),
            DMatrix::zeros(3, 1),
        );
        assert!(matches!(
            result,
            Err(TableError::InvalidDescriptorSet { .. })
        ));
    }

    #[test]
    fn new_rejects_duplicate_identifiers() {
        let result = DescriptorSet::new(
            "fp",
            ids(&["a", "a"]),
            ids(&["f1"]),
            DMatrix::zeros(2, 1),
        );
        assert!(matches!(
            result,
            Err(TableError::InvalidDescriptorSet { .. })
        ));
    }

    #[test]
    fn aligned_to_reorders_rows_by_identifier() {
        let set = DescriptorSet::new(
            "fp",
            ids(&["b", "a"]),
            ids(&["f1", "f2"]),
            DMatrix::from_row_slice(2, 2, &[2.0, 20.0, 1.0, 10.0]),
        )
        .unwrap();

        let aligned = set.aligned_to(&ids(&["a", "b"])).unwrap();
        assert_eq!(aligned.ids(), &ids(&["a", "b"])[..]);
        assert_eq!(aligned.values()[(0, 0)], 1.0);
        assert_eq!(aligned.values()[(0, 1)], 10.0);
        assert_eq!(aligned.values()[(1, 1)], 20.0);
    }

    #[test]
    fn aligned_to_reports_missing_and_unknown_rows() {
        let set = DescriptorSet::new(
            "fp",
            ids(&["a", "x"]),
            ids(&["f1"]),
            DMatrix::zeros(2, 1),
        )
        .unwrap();

        assert!(matches!(
            set.aligned_to(&ids(&["a", "b", "x"])),
            Err(TableError::MissingDescriptorRow { ref id, .. }) if id == "b"
        ));
        assert!(matches!(
            set.aligned_to(&ids(&["a"])),
            Err(TableError::UnknownMolecule { ref id, .. }) if id == "x"
        ));
    }
}
