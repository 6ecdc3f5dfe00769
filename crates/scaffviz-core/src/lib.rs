//! # scaffviz Core Library
//!
//! Low-dimensional embeddings of molecular descriptor matrices, cached as columns of a
//! tabular molecule store and exported for scaffold-grouped scatter plots.
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Molecule tables and descriptor sets, the
//!   [`Manifold`](core::manifold::Manifold) trait with PCA and t-SNE, and CSV/store I/O.
//!
//! - **[`engine`]: The Caching Layer.** [`ManifoldTable`](engine::manifold_table::ManifoldTable)
//!   decides whether an embedding's columns can be reused or must be recomputed, and writes
//!   them back under the manifold's identity. Configuration, progress reporting, and error
//!   types live here as well.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures: building the configured
//!   manifold and embedding a table, and preparing plot-ready scatter data.

pub mod core;
pub mod engine;
pub mod workflows;
