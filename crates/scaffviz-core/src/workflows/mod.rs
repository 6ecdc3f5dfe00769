//! # Workflows Module
//!
//! High-level entry points that combine the engine and I/O layers.
//!
//! - **Embedding Workflow** ([`embed`]) - Builds the configured manifold and ensures its
//!   embedding columns exist in a table, reusing cached columns where allowed.
//! - **Scatter Export** ([`scatter`]) - Turns a two-dimensional embedding into plot-ready
//!   points grouped by a scaffold column, with small groups merged into `"Other"`.

pub mod embed;
pub mod scatter;
