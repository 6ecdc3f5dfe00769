use crate::core::models::table::MoleculeTable;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Defines the interface for reading and writing tabular molecule files.
///
/// Implementors handle one concrete file format. Reading requires the name of the column
/// that holds the molecule identifiers; writing emits the identifier column first,
/// followed by the table's property columns.
pub trait TableFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a molecule table from a reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The reader to read from.
    /// * `name` - The name given to the resulting table.
    /// * `id_column` - The column holding the molecule identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the identifier column is invalid.
    fn read_from(
        reader: &mut impl Read,
        name: &str,
        id_column: &str,
    ) -> Result<MoleculeTable, Self::Error>;

    /// Writes the identifier and property columns of a table to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(table: &MoleculeTable, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads a molecule table from a file path.
    fn read_from_path<P: AsRef<Path>>(
        path: P,
        name: &str,
        id_column: &str,
    ) -> Result<MoleculeTable, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, name, id_column)
    }

    /// Writes a molecule table to a file path, creating or truncating the file.
    fn write_to_path<P: AsRef<Path>>(table: &MoleculeTable, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(table, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
