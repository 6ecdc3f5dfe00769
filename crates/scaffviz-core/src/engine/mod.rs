//! # Engine Module
//!
//! The embedding cache adapter and its supporting types.
//!
//! [`manifold_table::ManifoldTable`] wraps a molecule table and decides, per manifold, whether
//! previously computed embedding columns can be reused or must be recomputed from the
//! attached descriptors. Computed coordinates are written back as property columns named
//! `{identity}_{dimension}`.
//!
//! - **Adapter** ([`manifold_table`]) - Cache lookup, recomputation and column persistence
//! - **Configuration** ([`config`]) - Algorithm selection and parameters via a builder
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod config;
pub mod error;
pub mod manifold_table;
pub mod progress;
