//! # Core Module
//!
//! The foundation of scaffviz: stateless data models for molecule tables, the embedding
//! algorithms, and table I/O.
//!
//! - **Molecule Tables** ([`models`]) - Molecules keyed by identifier, their property
//!   columns, and descriptor sets
//! - **Embedding Algorithms** ([`manifold`]) - The [`Manifold`](manifold::Manifold) trait
//!   with PCA and t-SNE implementations
//! - **File I/O** ([`io`]) - CSV tables and descriptor files, and the on-disk table store

pub mod io;
pub mod manifold;
pub mod models;
