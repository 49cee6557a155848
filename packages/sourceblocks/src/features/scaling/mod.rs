//! Profile-preserving glue for transformations that copy or merge blocks.

pub mod dedup;
pub mod inlining;

pub use dedup::{merge_parallel_source_blocks, SYNTHETIC_OWNER};
pub use inlining::{call_site_representative, scale_inlined_body};
