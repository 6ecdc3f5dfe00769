use crate::core::models::column::format_number;
use crate::engine::manifold_table::ManifoldTable;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Label of the group that collects molecules from undersized groups.
pub const OTHER_GROUP: &str = "Other";

#[derive(Debug, Error)]
pub enum ScatterError {
    #[error("No embedding columns found for '{identity}'")]
    NoEmbedding { identity: String },

    #[error("Embedding '{identity}' has {found} dimension(s); at least 2 are required")]
    InsufficientDimensions { identity: String, found: usize },

    #[error("Column '{0}' is not present in the table")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ScatterOptions {
    /// Column whose values group the points, typically a scaffold.
    pub group_by: Option<String>,
    /// Groups smaller than this are merged into [`OTHER_GROUP`].
    pub mols_per_group: usize,
    /// Additional columns carried along with each point.
    pub extra_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub group: Option<String>,
    pub extra: Vec<String>,
}

/// Plot-ready points of a two-dimensional embedding.
#[derive(Debug, Clone)]
pub struct ScatterData {
    identity: String,
    id_column: String,
    axis_columns: [String; 2],
    group_column: Option<String>,
    extra_columns: Vec<String>,
    points: Vec<ScatterPoint>,
}

impl ScatterData {
    /// Collects one point per molecule from the two lowest dimensions cached for `identity`.
    ///
    /// # Errors
    ///
    /// Fails if the embedding is absent or one-dimensional, or if a requested column does
    /// not exist.
    #[instrument(skip(table, options), fields(table = %table.name()))]
    pub fn build(
        table: &ManifoldTable,
        identity: &str,
        options: &ScatterOptions,
    ) -> Result<Self, ScatterError> {
        let data = table
            .manifold_data_by_identity(identity)
            .ok_or_else(|| ScatterError::NoEmbedding {
                identity: identity.to_string(),
            })?;
        if data.dimensions() < 2 {
            return Err(ScatterError::InsufficientDimensions {
                identity: identity.to_string(),
                found: data.dimensions(),
            });
        }
        let coordinates = data.to_matrix();
        let names = data.column_names();
        let axis_columns = [names[0].clone(), names[1].clone()];

        let groups = match &options.group_by {
            Some(column) => Some(merged_groups(
                &column_cells(table, column)?,
                options.mols_per_group,
            )),
            None => None,
        };
        let extras = options
            .extra_columns
            .iter()
            .map(|column| column_cells(table, column))
            .collect::<Result<Vec<_>, _>>()?;

        let points = table
            .ids()
            .iter()
            .enumerate()
            .map(|(row, id)| ScatterPoint {
                id: id.clone(),
                x: coordinates[(row, 0)],
                y: coordinates[(row, 1)],
                group: groups.as_ref().map(|labels| labels[row].clone()),
                extra: extras.iter().map(|cells| cells[row].clone()).collect(),
            })
            .collect::<Vec<_>>();

        info!(
            "Prepared {} scatter points from '{}' embedding.",
            points.len(),
            identity
        );
        Ok(Self {
            identity: identity.to_string(),
            id_column: table.id_column().to_string(),
            axis_columns,
            group_column: options.group_by.clone(),
            extra_columns: options.extra_columns.clone(),
            points,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn points(&self) -> &[ScatterPoint] {
        &self.points
    }

    /// Names of the embedding columns holding the `x` and `y` coordinates.
    pub fn axis_columns(&self) -> [&str; 2] {
        [&self.axis_columns[0], &self.axis_columns[1]]
    }

    /// Group labels with their sizes, largest first and ties by label.
    pub fn group_sizes(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for group in self.points.iter().filter_map(|p| p.group.as_deref()) {
            *counts.entry(group).or_default() += 1;
        }
        let mut sizes: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(label, count)| (label.to_string(), count))
            .collect();
        sizes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sizes
    }

    /// Writes the points as CSV: identifier, the two axis columns, the group column and extra
    /// columns.
    pub fn write_csv(&self, writer: &mut impl Write) -> Result<(), ScatterError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let [x_name, y_name] = self.axis_columns();
        let mut header = vec![self.id_column.as_str(), x_name, y_name];
        header.extend(self.group_column.as_deref());
        header.extend(self.extra_columns.iter().map(String::as_str));
        csv_writer.write_record(&header)?;

        for point in &self.points {
            let mut record = Vec::with_capacity(header.len());
            record.push(point.id.clone());
            record.push(format_number(point.x));
            record.push(format_number(point.y));
            record.extend(point.group.iter().cloned());
            record.extend(point.extra.iter().cloned());
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ScatterError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Returns the cells of a property column, or the identifiers for the id column.
fn column_cells(table: &ManifoldTable, column: &str) -> Result<Vec<String>, ScatterError> {
    if column == table.id_column() {
        return Ok(table.ids().to_vec());
    }
    let property = table
        .property(column)
        .ok_or_else(|| ScatterError::MissingColumn(column.to_string()))?;
    Ok((0..property.len())
        .map(|row| property.data().cell(row).unwrap_or_default())
        .collect())
}

/// Replaces labels of groups with fewer than `min_size` members, and empty labels, by
/// [`OTHER_GROUP`].
fn merged_groups(labels: &[String], min_size: usize) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let merged = counts
        .values()
        .filter(|&&count| count < min_size)
        .count();
    debug!(
        "{} of {} groups have fewer than {} molecules.",
        merged,
        counts.len(),
        min_size
    );
    labels
        .iter()
        .map(|label| {
            if label.is_empty() || counts[label.as_str()] < min_size {
                OTHER_GROUP.to_string()
            } else {
                label.clone()
            }
        })
        .collect()
}
