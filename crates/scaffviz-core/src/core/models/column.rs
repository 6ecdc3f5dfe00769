use serde::{Deserialize, Serialize};
use std::fmt;

/// The storage type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ColumnKind::Numeric => "numeric",
                ColumnKind::Text => "text",
            }
        )
    }
}

/// Row-aligned values of a single column.
///
/// Missing numeric values are stored as `NaN`, missing text values as empty strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Numeric(values) => Some(values),
            ColumnData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            ColumnData::Text(values) => Some(values),
            ColumnData::Numeric(_) => None,
        }
    }

    /// Formats the value at `row` the way it is written to CSV.
    ///
    /// Numeric values use the shortest representation that parses back to the same `f64`;
    /// `NaN` becomes an empty cell.
    pub fn cell(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Numeric(values) => values.get(row).map(|v| format_number(*v)),
            ColumnData::Text(values) => values.get(row).cloned(),
        }
    }

    /// Builds a column from raw text cells, choosing the numeric representation when every
    /// non-empty cell parses as a number.
    pub(crate) fn infer(cells: Vec<String>) -> Self {
        let mut saw_value = false;
        let numeric = cells.iter().all(|cell| {
            let trimmed = cell.trim();
            if trimmed.is_empty() {
                return true;
            }
            saw_value = true;
            trimmed.parse::<f64>().is_ok()
        });

        if numeric && saw_value {
            ColumnData::Numeric(
                cells
                    .iter()
                    .map(|cell| cell.trim().parse::<f64>().unwrap_or(f64::NAN))
                    .collect(),
            )
        } else {
            ColumnData::Text(cells)
        }
    }

    /// Builds a column of a known kind from raw text cells.
    ///
    /// Empty cells of a numeric column become `NaN`. Fails with the row and content of the
    /// first cell that is not a number.
    pub(crate) fn parse(cells: Vec<String>, kind: ColumnKind) -> Result<Self, (usize, String)> {
        match kind {
            ColumnKind::Text => Ok(ColumnData::Text(cells)),
            ColumnKind::Numeric => cells
                .into_iter()
                .enumerate()
                .map(|(row, cell)| {
                    let trimmed = cell.trim();
                    if trimmed.is_empty() {
                        Ok(f64::NAN)
                    } else {
                        trimmed.parse::<f64>().map_err(|_| (row, cell.clone()))
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ColumnData::Numeric),
        }
    }

    pub(crate) fn into_text(self) -> Vec<String> {
        match self {
            ColumnData::Text(values) => values,
            ColumnData::Numeric(values) => values.into_iter().map(format_number).collect(),
        }
    }
}

impl From<Vec<f64>> for ColumnData {
    fn from(values: Vec<f64>) -> Self {
        ColumnData::Numeric(values)
    }
}

impl From<Vec<String>> for ColumnData {
    fn from(values: Vec<String>) -> Self {
        ColumnData::Text(values)
    }
}

impl From<Vec<&str>> for ColumnData {
    fn from(values: Vec<&str>) -> Self {
        ColumnData::Text(values.into_iter().map(str::to_string).collect())
    }
}

/// A named property column of a [`MoleculeTable`](super::table::MoleculeTable).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) data: ColumnData,
}

impl Column {
    pub(crate) fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
