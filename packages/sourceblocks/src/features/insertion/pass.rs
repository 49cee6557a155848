//! The insertion pass driver.
//!
//! Loads every interaction profile, runs attribution and insertion over the
//! scope method-parallel, then gathers the deterministic artifact rows
//! single-threaded. Profiles and lookup tables are read-only for the whole
//! run; each worker mutates only its own method.

use crate::config::InsertionConfig;
use crate::errors::{Result, SourceBlockError};
use crate::features::consistency::SourceBlockDomInfo;
use crate::features::insertion::artifacts::PassArtifacts;
use crate::features::insertion::inserter::{insert_source_blocks, InsertionOptions};
use crate::features::profiles::attribution::attribute;
use crate::features::profiles::ports::{CallGraph, MethodProfiles, MethodTable};
use crate::features::profiles::reader::load_profiles;
use crate::features::repair::repair;
use crate::features::serialization::serialize_cfg;
use crate::shared::models::{MethodId, Scope};
use rayon::prelude::*;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub methods: usize,
    pub blocks: u64,
    /// Source blocks whose vals came from a parsed profile string.
    pub normalized_count: usize,
    /// Source blocks filled from the attribution fallback.
    pub denormalized_count: usize,
    pub elided_vals: usize,
    pub unelided_vals: usize,
    /// Methods with at least one discarded interaction profile.
    pub profile_failures: usize,
    /// Vals touched by the repair passes.
    pub repaired_vals: usize,
}

#[derive(Debug)]
pub struct PassOutput {
    pub stats: PassStats,
    pub artifacts: PassArtifacts,
}

struct MethodOutcome {
    method: MethodId,
    serialized: Option<String>,
    idom_map: String,
    profile_failed: bool,
    block_count: u32,
    normalized_count: usize,
    denormalized_count: usize,
    elided_vals: usize,
    unelided_vals: usize,
    repaired_vals: usize,
}

pub struct InsertSourceBlocksPass {
    config: InsertionConfig,
}

impl InsertSourceBlocksPass {
    pub fn new(config: InsertionConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        scope: &mut Scope,
        table: &dyn MethodTable,
        method_profiles: &dyn MethodProfiles,
        call_graph: Option<&dyn CallGraph>,
    ) -> Result<PassOutput> {
        let profiles = load_profiles(
            &self.config.profile_paths(),
            table,
            &self.config.ordered_interactions,
        )?;
        let unresolved_methods: Vec<String> = profiles
            .iter()
            .flat_map(|p| p.unresolved.iter().cloned())
            .collect();

        // Serialized strings feed the artifact only when there is a profile
        // to validate against, unless forced.
        let want_serialized = self.config.force_serialize || !profiles.is_empty();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_cpus::get())
            .build()
            .map_err(|e| SourceBlockError::config(format!("thread pool: {e}")))?;

        let config = &self.config;
        let outcomes: Vec<MethodOutcome> = pool.install(|| {
            scope
                .par_iter_mut()
                .map(|sm| {
                    let data = attribute(
                        &sm.method,
                        &sm.cfg,
                        &profiles,
                        method_profiles,
                        table,
                        config.always_inject,
                    );
                    let options = InsertionOptions {
                        serialize: false,
                        insert_after_throwing: config.insert_after_excs,
                        enable_fuzzing: config.enable_fuzzing,
                        appear100_threshold: config.block_appear100_threshold,
                        call_graph,
                    };
                    let result = insert_source_blocks(&sm.method, &mut sm.cfg, &data, &options);

                    let repaired_vals = if config.fix_violations {
                        repair(&mut sm.cfg).total()
                    } else {
                        0
                    };
                    // Serialize after repair so the artifact sees final vals.
                    let serialized = want_serialized.then(|| serialize_cfg(&sm.cfg).0);
                    let idom_map = SourceBlockDomInfo::build(&sm.cfg).serialize_idom_map();

                    MethodOutcome {
                        method: sm.method.clone(),
                        serialized,
                        idom_map,
                        profile_failed: !result.profile_success,
                        block_count: result.block_count,
                        normalized_count: result.normalized_count,
                        denormalized_count: result.denormalized_count,
                        elided_vals: result.elided_vals,
                        unelided_vals: result.unelided_vals,
                        repaired_vals,
                    }
                })
                .collect()
        });

        let mut stats = PassStats::default();
        let mut artifacts = PassArtifacts {
            unresolved_methods,
            ..Default::default()
        };
        for outcome in outcomes {
            stats.methods += 1;
            stats.blocks += u64::from(outcome.block_count);
            stats.normalized_count += outcome.normalized_count;
            stats.denormalized_count += outcome.denormalized_count;
            stats.elided_vals += outcome.elided_vals;
            stats.unelided_vals += outcome.unelided_vals;
            stats.repaired_vals += outcome.repaired_vals;
            if outcome.profile_failed {
                stats.profile_failures += 1;
                artifacts
                    .failed_methods
                    .push(outcome.method.as_str().to_string());
            }
            if let Some(serialized) = outcome.serialized {
                artifacts.serialized.push((outcome.method.clone(), serialized));
            }
            artifacts.idom_maps.push((outcome.method, outcome.idom_map));
        }
        artifacts.finalize();

        info!(
            methods = stats.methods,
            blocks = stats.blocks,
            normalized = stats.normalized_count,
            denormalized = stats.denormalized_count,
            failures = stats.profile_failures,
            "insert-source-blocks pass done"
        );
        Ok(PassOutput { stats, artifacts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::profiles::ports::{InMemoryMethodProfiles, InMemoryMethodTable};
    use crate::shared::interner::Interner;
    use crate::shared::models::{ControlFlowGraph, EdgeKind, Instruction, ScopeMethod};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;

    fn diamond() -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::new();
        let b: Vec<_> = (0..5)
            .map(|_| cfg.add_block_with(vec![Instruction::Nop]))
            .collect();
        cfg.add_edge(b[0], b[1], EdgeKind::Goto);
        cfg.add_edge(b[0], b[2], EdgeKind::Branch { case_key: None });
        cfg.add_edge(b[1], b[3], EdgeKind::Goto);
        cfg.add_edge(
            b[1],
            b[4],
            EdgeKind::Throw {
                catch_type: None,
                index: 0,
            },
        );
        cfg.add_edge(b[2], b[3], EdgeKind::Goto);
        cfg.add_edge(b[4], b[3], EdgeKind::Goto);
        cfg
    }

    fn write_profile(dir: &std::path::Path, rows: &[(&str, &str)]) -> PathBuf {
        let path = dir.join("cold.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "interaction,appear#").unwrap();
        writeln!(f, "ColdStart,5").unwrap();
        writeln!(f, "name,profiled_srcblks_exprs").unwrap();
        for (key, serialized) in rows {
            writeln!(f, "{key},{serialized}").unwrap();
        }
        path
    }

    #[test]
    fn end_to_end_over_a_profiled_scope() {
        let dir = tempfile::tempdir().unwrap();
        let interner = Interner::new();
        let mut table = InMemoryMethodTable::new();
        let m = table.add_method(&interner, "LFoo;.bar:()V");

        let raw = "(0.1:0.5 g(0.2:0.4 g(0.3:0.3) t(0.4:0.2 g)) b(0.5:0.1 g))";
        let path = write_profile(dir.path(), &[("LFoo;.bar:()V", raw), ("LGone;.x:()V", "(x)")]);

        let config = InsertionConfig {
            profile_files: path.display().to_string(),
            insert_after_excs: false,
            ..Default::default()
        };
        let mut scope = vec![ScopeMethod::new(m.clone(), diamond())];
        let output = InsertSourceBlocksPass::new(config)
            .run(&mut scope, &table, &InMemoryMethodProfiles::new(), None)
            .unwrap();

        assert_eq!(output.stats.methods, 1);
        assert_eq!(output.stats.blocks, 5);
        assert_eq!(output.stats.normalized_count, 5);
        assert_eq!(output.stats.profile_failures, 0);
        assert_eq!(
            output.artifacts.serialized,
            vec![(
                m,
                "(0 0.1:0.5 g(1 0.2:0.4 g(2 0.3:0.3) t(3 0.4:0.2 g)) b(4 0.5:0.1 g))".to_string()
            )]
        );
        assert_eq!(
            output.artifacts.unresolved_methods,
            vec!["LGone;.x:()V".to_string()]
        );
        assert_eq!(output.artifacts.idom_maps.len(), 1);
    }

    #[test]
    fn unprofiled_scope_without_forcing_writes_no_serialized_rows() {
        let interner = Interner::new();
        let mut table = InMemoryMethodTable::new();
        let m = table.add_method(&interner, "LFoo;.bar:()V");
        let mut scope = vec![ScopeMethod::new(m, diamond())];

        let output = InsertSourceBlocksPass::new(InsertionConfig::default())
            .run(&mut scope, &table, &InMemoryMethodProfiles::new(), None)
            .unwrap();

        assert!(output.artifacts.serialized.is_empty());
        assert_eq!(output.stats.methods, 1);
        // Source blocks are still injected under always_inject.
        assert_eq!(scope[0].cfg.source_block_infos().len(), 5);
    }

    #[test]
    fn force_serialize_emits_rows_without_profiles() {
        let interner = Interner::new();
        let mut table = InMemoryMethodTable::new();
        let m = table.add_method(&interner, "LFoo;.bar:()V");
        let mut scope = vec![ScopeMethod::new(m.clone(), diamond())];

        let config = InsertionConfig {
            force_serialize: true,
            insert_after_excs: false,
            ..Default::default()
        };
        let output = InsertSourceBlocksPass::new(config)
            .run(&mut scope, &table, &InMemoryMethodProfiles::new(), None)
            .unwrap();

        assert_eq!(
            output.artifacts.serialized,
            vec![(m, "(0 g(1 g(2) t(3 g)) b(4 g))".to_string())]
        );
    }

    #[test]
    fn mismatched_profile_lands_in_failed_methods() {
        let dir = tempfile::tempdir().unwrap();
        let interner = Interner::new();
        let mut table = InMemoryMethodTable::new();
        let m = table.add_method(&interner, "LFoo;.bar:()V");

        // Profile shaped like a straight line against a diamond CFG.
        let path = write_profile(dir.path(), &[("LFoo;.bar:()V", "(1:1 g(1:1))")]);
        let config = InsertionConfig {
            profile_files: path.display().to_string(),
            insert_after_excs: false,
            ..Default::default()
        };
        let mut scope = vec![ScopeMethod::new(m, diamond())];
        let output = InsertSourceBlocksPass::new(config)
            .run(&mut scope, &table, &InMemoryMethodProfiles::new(), None)
            .unwrap();

        assert_eq!(output.stats.profile_failures, 1);
        assert_eq!(
            output.artifacts.failed_methods,
            vec!["LFoo;.bar:()V".to_string()]
        );
    }
}
