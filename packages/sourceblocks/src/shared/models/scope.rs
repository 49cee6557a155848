//! The unit of work: one method with code.

use crate::shared::models::cfg::ControlFlowGraph;
use crate::shared::models::method::MethodId;

/// One method in the optimization scope. Methods without code never enter a
/// scope.
#[derive(Debug, Clone)]
pub struct ScopeMethod {
    pub method: MethodId,
    pub cfg: ControlFlowGraph,
}

impl ScopeMethod {
    pub fn new(method: MethodId, cfg: ControlFlowGraph) -> Self {
        Self { method, cfg }
    }
}

/// All methods a pass runs over.
pub type Scope = Vec<ScopeMethod>;
