//! Provides input/output for tabular molecule data.
//!
//! Tables are exchanged as CSV files with a header row. A [`store::TableStore`] groups the
//! property table, the descriptor sets, and a small TOML metadata file of each table in one
//! directory so that derived columns such as embedding coordinates survive between runs.

pub mod csv_table;
pub mod store;
pub mod traits;
