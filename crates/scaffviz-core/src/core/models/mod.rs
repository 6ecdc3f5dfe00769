//! # Core Models Module
//!
//! Data structures for tabular molecule data.
//!
//! - [`table`] - [`MoleculeTable`](table::MoleculeTable), rows keyed by molecule identifier
//!   with property columns and attached descriptor sets
//! - [`column`] - Typed, row-aligned property columns
//! - [`descriptors`] - Numeric descriptor blocks used as embedding input
//!
//! ```ignore
//! use scaffviz::core::models::{column::ColumnData, table::MoleculeTable};
//!
//! let mut table = MoleculeTable::from_columns(
//!     "ligands",
//!     vec![
//!         ("ID".to_string(), ColumnData::from(vec!["m1", "m2"])),
//!         ("Scaffold".to_string(), ColumnData::from(vec!["c1ccccc1", "C1CC1"])),
//!     ],
//!     "ID",
//! )?;
//! table.add_property("pchembl", vec![6.2, 7.9])?;
//! ```

pub mod column;
pub mod descriptors;
pub mod table;
