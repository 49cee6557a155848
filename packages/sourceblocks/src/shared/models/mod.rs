pub mod cfg;
pub mod method;
pub mod scope;
pub mod source_block;

pub use cfg::{compare_edges, Block, BlockId, ControlFlowGraph, Edge, EdgeKind, Instruction};
pub use method::{
    classify_access_name, hashed_access_name, split_method_key, AccessNameKind, MethodId, TypeId,
    ACCESS_PREFIX,
};
pub use scope::{Scope, ScopeMethod};
pub use source_block::{SbValue, SourceBlock, SourceBlockInfo};
