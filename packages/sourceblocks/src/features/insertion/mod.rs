//! Source-block insertion.
//!
//! `inserter` handles one method; `pass` drives the whole scope in parallel
//! and `artifacts` flushes the deterministic output files.

pub mod artifacts;
pub mod inserter;
pub mod pass;

pub use artifacts::PassArtifacts;
pub use inserter::{insert_source_blocks, InsertResult, InsertionOptions};
pub use pass::{InsertSourceBlocksPass, PassOutput, PassStats};
