//! Opaque collaborator interfaces consumed by attribution and insertion.
//!
//! The method-profile store, the call graph and the global method/type
//! tables are built elsewhere in the toolchain; this subsystem only needs
//! lookups. In-memory implementations back the tests.

use crate::shared::interner::Interner;
use crate::shared::models::{MethodId, TypeId};
use rustc_hash::FxHashMap;

/// Method-level profile entry for one interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionStats {
    pub call_count: f64,
    pub appear_percent: f32,
}

pub trait MethodProfiles: Send + Sync {
    fn interactions(&self) -> Vec<String>;
    fn stats(&self, interaction_id: &str, method: &MethodId) -> Option<InteractionStats>;
}

/// Global method/type reference tables.
pub trait MethodTable: Send + Sync {
    fn resolve(&self, key: &str) -> Option<MethodId>;
    fn resolve_type(&self, name: &str) -> Option<TypeId>;
}

pub trait CallGraph: Send + Sync {
    /// Callers of `method` with the invoke-site instruction index.
    fn callers(&self, method: &MethodId) -> Vec<(MethodId, u32)>;
}

#[derive(Default)]
pub struct InMemoryMethodTable {
    methods: FxHashMap<String, MethodId>,
    types: FxHashMap<String, TypeId>,
}

impl InMemoryMethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_method(&mut self, interner: &Interner, key: &str) -> MethodId {
        let id = MethodId::new(interner, key);
        self.methods.insert(key.to_string(), id.clone());
        if let Some(owner) = key.split_once('.').map(|(o, _)| o) {
            self.add_type(interner, owner);
        }
        id
    }

    pub fn add_type(&mut self, interner: &Interner, name: &str) -> TypeId {
        let id = TypeId::new(interner, name);
        self.types.insert(name.to_string(), id.clone());
        id
    }
}

impl MethodTable for InMemoryMethodTable {
    fn resolve(&self, key: &str) -> Option<MethodId> {
        self.methods.get(key).cloned()
    }

    fn resolve_type(&self, name: &str) -> Option<TypeId> {
        self.types.get(name).cloned()
    }
}

#[derive(Default)]
pub struct InMemoryMethodProfiles {
    order: Vec<String>,
    stats: FxHashMap<(String, MethodId), InteractionStats>,
}

impl InMemoryMethodProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, interaction_id: &str, method: MethodId, stats: InteractionStats) {
        if !self.order.iter().any(|i| i == interaction_id) {
            self.order.push(interaction_id.to_string());
        }
        self.stats.insert((interaction_id.to_string(), method), stats);
    }
}

impl MethodProfiles for InMemoryMethodProfiles {
    fn interactions(&self) -> Vec<String> {
        self.order.clone()
    }

    fn stats(&self, interaction_id: &str, method: &MethodId) -> Option<InteractionStats> {
        self.stats
            .get(&(interaction_id.to_string(), method.clone()))
            .copied()
    }
}

#[derive(Default)]
pub struct InMemoryCallGraph {
    callers: FxHashMap<MethodId, Vec<(MethodId, u32)>>,
}

impl InMemoryCallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_call(&mut self, caller: MethodId, invoke_site: u32, callee: MethodId) {
        self.callers
            .entry(callee)
            .or_default()
            .push((caller, invoke_site));
    }
}

impl CallGraph for InMemoryCallGraph {
    fn callers(&self, method: &MethodId) -> Vec<(MethodId, u32)> {
        self.callers.get(method).cloned().unwrap_or_default()
    }
}
