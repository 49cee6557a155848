//! Cross-pass source-block accounting.
//!
//! After insertion the checker snapshots every method's source-block
//! identities and dominator tree. Later runs compare the live set against
//! that baseline: a disappearance is fine as long as it can be explained by
//! a sequence of leaf removals from the dominator tree (dead branch arms,
//! trimmed handler blocks), and a violation otherwise.

use crate::errors::{Result, SourceBlockError};
use crate::features::consistency::dom_info::SourceBlockDomInfo;
use crate::shared::models::{MethodId, Scope, ScopeMethod, SourceBlockInfo};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug)]
struct ConsistencyContext {
    baseline: BTreeSet<SourceBlockInfo>,
    known_removed: BTreeSet<SourceBlockInfo>,
    dom_info: SourceBlockDomInfo,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyOptions {
    /// Turn violations into a hard error instead of a warning.
    pub fail_hard: bool,
}

/// One method whose source blocks vanished without a legal explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub method: MethodId,
    pub missing: Vec<SourceBlockInfo>,
}

#[derive(Debug, Default)]
pub struct ConsistencyChecker {
    contexts: DashMap<MethodId, ConsistencyContext>,
    options: ConsistencyOptions,
}

impl ConsistencyChecker {
    pub fn new(options: ConsistencyOptions) -> Self {
        Self {
            contexts: DashMap::new(),
            options,
        }
    }

    /// Snapshot the post-insertion state of every method. Runs once.
    pub fn initialize(&self, scope: &Scope) {
        for ScopeMethod { method, cfg } in scope {
            let baseline: BTreeSet<SourceBlockInfo> =
                cfg.source_block_infos().into_iter().collect();
            if baseline.is_empty() {
                continue;
            }
            self.contexts.insert(
                method.clone(),
                ConsistencyContext {
                    baseline,
                    known_removed: BTreeSet::new(),
                    dom_info: SourceBlockDomInfo::build(cfg),
                },
            );
        }
    }

    /// Compare the scope against the baseline. Returns the violations in
    /// deterministic method order; errors instead when `fail_hard` is set
    /// and any exist.
    pub fn run(&self, scope: &Scope) -> Result<Vec<Violation>> {
        let mut violations: Vec<Violation> = scope
            .par_iter()
            .filter_map(|sm| self.check_method(sm))
            .collect();
        violations.sort_by(|a, b| a.method.cmp(&b.method));

        for v in &violations {
            tracing::warn!(
                method = %v.method.as_str(),
                missing = v.missing.len(),
                "source blocks lost without a dominated removal path"
            );
        }
        if self.options.fail_hard && !violations.is_empty() {
            return Err(SourceBlockError::ConsistencyViolated {
                method_count: violations.len(),
            });
        }
        Ok(violations)
    }

    fn check_method(&self, sm: &ScopeMethod) -> Option<Violation> {
        let mut ctx = self.contexts.get_mut(&sm.method)?;
        let current = sm.cfg.source_block_infos();

        let mut missing: BTreeSet<SourceBlockInfo> = ctx
            .baseline
            .iter()
            .filter(|sbi| !current.contains(sbi) && !ctx.known_removed.contains(sbi))
            .cloned()
            .collect();
        if missing.is_empty() {
            return None;
        }

        // Peel leaves until no missing block is removable. Each sweep takes
        // the current removable frontier in sorted order, so the outcome
        // does not depend on set iteration order.
        loop {
            let peelable: Vec<SourceBlockInfo> = ctx
                .dom_info
                .removable()
                .iter()
                .filter(|sbi| missing.contains(*sbi))
                .cloned()
                .collect();
            if peelable.is_empty() {
                break;
            }
            for sbi in peelable {
                ctx.dom_info.remove(&sbi);
                missing.remove(&sbi);
                ctx.known_removed.insert(sbi);
            }
        }

        if missing.is_empty() {
            None
        } else {
            Some(Violation {
                method: sm.method.clone(),
                missing: missing.into_iter().collect(),
            })
        }
    }
}
