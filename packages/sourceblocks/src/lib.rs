/*
 * Source-Block Subsystem
 *
 * Profile annotations on CFG basic blocks for a whole-program bytecode
 * optimizer, feature-first layout:
 * - shared/      : Core models (MethodId, SourceBlock, ControlFlowGraph)
 * - features/    : Vertical slices (traversal → serialization → profiles →
 *                  insertion → consistency → scaling → repair)
 * - config/      : Pass configuration
 *
 * Performance:
 * - Method-parallel execution via Rayon work-stealing
 * - Memory-mapped profile files, zero-copy value strings
 * - Content-only traversal order, stable across block renumbering
 */

#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed

/// Shared models and utilities
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::InsertionConfig;
pub use errors::{Result, SourceBlockError};
pub use features::consistency::{ConsistencyChecker, ConsistencyOptions, Violation};
pub use features::insertion::{
    insert_source_blocks, InsertResult, InsertSourceBlocksPass, InsertionOptions, PassArtifacts,
    PassOutput, PassStats,
};
pub use features::profiles::{
    attribute, load_profiles, CallGraph, InteractionProfile, InteractionStats, MethodProfiles,
    MethodTable, ProfileData,
};
pub use features::scaling::{
    call_site_representative, merge_parallel_source_blocks, scale_inlined_body, SYNTHETIC_OWNER,
};
pub use features::serialization::{parse_node, serialize_cfg, SbNode};
pub use features::traversal::{traversal_order, traverse, TraversalVisitor};
pub use shared::models::{
    BlockId, ControlFlowGraph, EdgeKind, Instruction, MethodId, SbValue, Scope, ScopeMethod,
    SourceBlock, SourceBlockInfo, TypeId,
};
pub use shared::Interner;
