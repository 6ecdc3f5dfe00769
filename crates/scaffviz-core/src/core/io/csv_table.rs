use super::traits::TableFile;
use crate::core::models::column::{ColumnData, ColumnKind, format_number};
use crate::core::models::descriptors::DescriptorSet;
use crate::core::models::table::{MoleculeTable, TableError};
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid table: {0}")]
    Table(#[from] TableError),

    #[error("Column '{0}' is not present in the input data")]
    MissingColumn(String),

    #[error("Descriptor '{column}' has a non-numeric value '{value}' in row {row}")]
    NonNumericDescriptor {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Numeric column '{column}' has a non-numeric value '{value}' in row {row}")]
    NonNumericCell {
        column: String,
        row: usize,
        value: String,
    },
}

/// Comma-separated tables with a header row.
pub struct CsvTable;

impl CsvTable {
    /// Reads a table whose property column kinds are known.
    ///
    /// Columns listed in `kinds` are built with that kind; any other property column has its
    /// kind inferred from its cells. The identifier column is always text.
    pub fn read_with_kinds(
        reader: &mut impl Read,
        name: &str,
        id_column: &str,
        kinds: &BTreeMap<String, ColumnKind>,
    ) -> Result<MoleculeTable, TableFileError> {
        let (headers, columns) = read_raw_columns(reader)?;
        let columns = headers
            .into_iter()
            .zip(columns)
            .map(|(header, cells)| {
                let data = if header == id_column {
                    ColumnData::Text(cells)
                } else if let Some(kind) = kinds.get(&header) {
                    ColumnData::parse(cells, *kind).map_err(|(row, value)| {
                        TableFileError::NonNumericCell {
                            column: header.clone(),
                            row,
                            value,
                        }
                    })?
                } else {
                    ColumnData::infer(cells)
                };
                Ok((header, data))
            })
            .collect::<Result<Vec<_>, TableFileError>>()?;
        Ok(MoleculeTable::from_columns(name, columns, id_column)?)
    }

    /// Reads a descriptor file: one identifier column plus numeric feature columns.
    ///
    /// Empty cells are read as `NaN`; any other unparseable cell is an error.
    pub fn read_descriptors(
        reader: &mut impl Read,
        set_name: &str,
        id_column: &str,
    ) -> Result<DescriptorSet, TableFileError> {
        let (headers, columns) = read_raw_columns(reader)?;
        let id_position = headers
            .iter()
            .position(|header| header == id_column)
            .ok_or_else(|| TableFileError::MissingColumn(id_column.to_string()))?;

        let rows = columns[id_position].len();
        let mut ids = Vec::new();
        let mut features = Vec::with_capacity(headers.len().saturating_sub(1));
        let mut values = Vec::with_capacity(rows * headers.len().saturating_sub(1));

        for (position, (header, cells)) in headers.into_iter().zip(columns).enumerate() {
            if position == id_position {
                ids = cells;
                continue;
            }
            for (row, cell) in cells.into_iter().enumerate() {
                let trimmed = cell.trim();
                let value = if trimmed.is_empty() {
                    f64::NAN
                } else {
                    trimmed
                        .parse::<f64>()
                        .map_err(|_| TableFileError::NonNumericDescriptor {
                            column: header.clone(),
                            row,
                            value: cell.clone(),
                        })?
                };
                values.push(value);
            }
            features.push(header);
        }

        let matrix = DMatrix::from_vec(rows, features.len(), values);
        Ok(DescriptorSet::new(set_name, ids, features, matrix)?)
    }

    /// Writes a descriptor set with its identifier column first.
    pub fn write_descriptors(
        set: &DescriptorSet,
        id_column: &str,
        writer: &mut impl Write,
    ) -> Result<(), TableFileError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let mut header = Vec::with_capacity(set.n_features() + 1);
        header.push(id_column);
        header.extend(set.feature_names().iter().map(String::as_str));
        csv_writer.write_record(&header)?;

        for (row, id) in set.ids().iter().enumerate() {
            let mut record = Vec::with_capacity(set.n_features() + 1);
            record.push(id.clone());
            record.extend(set.values().row(row).iter().map(|v| format_number(*v)));
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

impl TableFile for CsvTable {
    type Error = TableFileError;

    fn read_from(
        reader: &mut impl Read,
        name: &str,
        id_column: &str,
    ) -> Result<MoleculeTable, Self::Error> {
        Self::read_with_kinds(reader, name, id_column, &BTreeMap::new())
    }

    fn write_to(table: &MoleculeTable, writer: &mut impl Write) -> Result<(), Self::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let mut header = Vec::with_capacity(table.properties().len() + 1);
        header.push(table.id_column());
        header.extend(table.property_names());
        csv_writer.write_record(&header)?;

        for (row, id) in table.ids().iter().enumerate() {
            let mut record = Vec::with_capacity(header.len());
            record.push(id.clone());
            record.extend(
                table
                    .properties()
                    .iter()
                    .map(|column| column.data().cell(row).unwrap_or_default()),
            );
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Reads a headed CSV into column-major raw cells.
fn read_raw_columns(
    reader: &mut impl Read,
) -> Result<(Vec<String>, Vec<Vec<String>>), TableFileError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut columns = vec![Vec::new(); headers.len()];
    for record in csv_reader.records() {
        let record = record?;
        for (column, cell) in columns.iter_mut().zip(record.iter()) {
            column.push(cell.to_string());
        }
    }
    Ok((headers, columns))
}
