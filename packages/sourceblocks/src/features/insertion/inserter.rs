//! Source-block insertion over one method's CFG.
//!
//! Walks the canonical traversal, assigning sequential ids and consuming one
//! val group per interaction per source block in lockstep with each
//! interaction's profile string. A structure mismatch in any interaction
//! discards that interaction's profile for the whole method: every source
//! block gets the attribution-time fallback val instead, and blocks are
//! still emitted.

use crate::features::profiles::attribution::ProfileData;
use crate::features::profiles::ports::CallGraph;
use crate::features::serialization::{serialize_cfg, ProfileParser};
use crate::features::traversal::{traverse, TraversalVisitor};
use crate::shared::models::{
    BlockId, ControlFlowGraph, Edge, MethodId, SbValue, SourceBlock,
};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

#[derive(Default, Clone, Copy)]
pub struct InsertionOptions<'g> {
    /// Compute and return the serialized string.
    pub serialize: bool,
    /// Also insert a source block after each potentially-throwing
    /// instruction.
    pub insert_after_throwing: bool,
    /// Synthesize hot/cold vals from caller reachability when an
    /// interaction has no profile at all.
    pub enable_fuzzing: bool,
    /// If positive, zero any val whose `appear100` is below this.
    pub appear100_threshold: f32,
    pub call_graph: Option<&'g dyn CallGraph>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertResult {
    pub block_count: u32,
    pub serialized: Option<String>,
    /// False when any interaction's profile string diverged from the CFG.
    pub profile_success: bool,
    /// Source blocks whose vals came from a parsed profile string.
    pub normalized_count: usize,
    /// Source blocks whose vals came from the attribution fallback.
    pub denormalized_count: usize,
    /// `x` entries in the serialized output.
    pub elided_vals: usize,
    /// Concrete entries in the serialized output.
    pub unelided_vals: usize,
}

enum Cursor<'a> {
    /// Live profile string being consumed in lockstep.
    Parser(ProfileParser<'a>),
    /// No raw string; every source block gets the fallback val.
    Fallback,
    /// Raw string diverged; vals are rewritten to the fallback afterwards.
    Failed,
}

struct CollectVisitor<'c, 'a> {
    cfg: &'c ControlFlowGraph,
    owner: MethodId,
    next_id: u32,
    cursors: Vec<Cursor<'a>>,
    /// Attribution-time fallback per interaction.
    attr_fallback: Vec<Option<SbValue>>,
    /// Fallback applied to emitted blocks (fuzz-substituted where enabled).
    block_fallback: Vec<Option<SbValue>>,
    failed: Vec<bool>,
    insert_after_throwing: bool,
    insertions: Vec<(BlockId, usize, SourceBlock)>,
}

impl<'a> CollectVisitor<'_, 'a> {
    fn fail(&mut self, interaction: usize, err: &crate::errors::SourceBlockError) {
        if !self.failed[interaction] {
            warn!(
                method = %self.owner,
                interaction,
                "profile discarded for method: {err}"
            );
        }
        self.failed[interaction] = true;
        self.cursors[interaction] = Cursor::Failed;
    }

    /// Consume one val per interaction; `entering` marks the block-leading
    /// group (which also consumes the `(`).
    fn consume_group(&mut self, entering: bool) -> Vec<Option<SbValue>> {
        let n = self.cursors.len();
        let mut vals = Vec::with_capacity(n);
        for i in 0..n {
            let outcome = match &mut self.cursors[i] {
                Cursor::Parser(parser) => {
                    let group = if entering {
                        parser.enter_block()
                    } else {
                        parser.val_group()
                    };
                    group.map(|g| g.into_iter().next().flatten())
                }
                Cursor::Fallback => Ok(self.block_fallback[i]),
                Cursor::Failed => Ok(self.attr_fallback[i]),
            };
            let val = match outcome {
                Ok(val) => val,
                Err(err) => {
                    self.fail(i, &err);
                    self.attr_fallback[i]
                }
            };
            vals.push(val);
        }
        vals
    }

    fn emit(&mut self, block: BlockId, pos: usize, entering: bool) {
        let vals = self.consume_group(entering);
        let id = self.next_id;
        self.next_id += 1;
        let sb = SourceBlock::new(self.owner.clone(), id, vals);
        self.insertions.push((block, pos, sb));
    }
}

impl TraversalVisitor for CollectVisitor<'_, '_> {
    fn on_block_start(&mut self, block: BlockId) {
        let lead_pos = self.cfg.block(block).first_eligible_position();
        self.emit(block, lead_pos, true);

        if self.insert_after_throwing {
            // A throwing instruction does not end the block here; the extra
            // blocks share the group and follow the leading one.
            let throw_sites: Vec<usize> = self
                .cfg
                .block(block)
                .instructions
                .iter()
                .enumerate()
                .filter(|(_, insn)| insn.may_throw())
                .map(|(k, _)| k)
                .collect();
            for k in throw_sites {
                self.emit(block, k + 1, false);
            }
        }
    }

    fn on_edge(&mut self, _src: BlockId, edge: &Edge) {
        let tag = edge.kind.tag().unwrap();
        for i in 0..self.cursors.len() {
            let res = match &mut self.cursors[i] {
                Cursor::Parser(parser) => parser.edge(tag),
                _ => Ok(()),
            };
            if let Err(err) = res {
                self.fail(i, &err);
            }
        }
    }

    fn on_block_end(&mut self, _block: BlockId) {
        for i in 0..self.cursors.len() {
            let res = match &mut self.cursors[i] {
                Cursor::Parser(parser) => parser.exit_block(),
                _ => Ok(()),
            };
            if let Err(err) = res {
                self.fail(i, &err);
            }
        }
    }
}

/// Insert source blocks into `cfg` per the traversal order, attaching
/// profile vals from `profile_data` (one entry per interaction).
pub fn insert_source_blocks(
    method: &MethodId,
    cfg: &mut ControlFlowGraph,
    profile_data: &[ProfileData<'_>],
    options: &InsertionOptions<'_>,
) -> InsertResult {
    let fuzz_val = options.enable_fuzzing.then(|| {
        let reachable = options
            .call_graph
            .map(|g| !g.callers(method).is_empty())
            .unwrap_or(false);
        if reachable {
            SbValue::new(1.0, 100.0)
        } else {
            SbValue::ZERO
        }
    });

    let attr_fallback: Vec<Option<SbValue>> =
        profile_data.iter().map(|d| d.fallback).collect();
    let block_fallback: Vec<Option<SbValue>> = profile_data
        .iter()
        .map(|d| match (d.raw, d.fallback) {
            (None, None) => fuzz_val,
            (_, fallback) => fallback,
        })
        .collect();
    let cursors: Vec<Cursor<'_>> = profile_data
        .iter()
        .map(|d| match d.raw {
            Some(raw) => Cursor::Parser(ProfileParser::new(raw, 1)),
            None => Cursor::Fallback,
        })
        .collect();

    let mut visitor = CollectVisitor {
        cfg,
        owner: method.clone(),
        next_id: 0,
        cursors,
        attr_fallback,
        block_fallback,
        failed: vec![false; profile_data.len()],
        insert_after_throwing: options.insert_after_throwing,
        insertions: Vec::new(),
    };
    traverse(cfg, &mut visitor);

    // Every interaction's profile must be exhausted exactly.
    for i in 0..visitor.cursors.len() {
        let res = match &mut visitor.cursors[i] {
            Cursor::Parser(parser) => parser.finish(),
            _ => Ok(()),
        };
        if let Err(err) = res {
            visitor.fail(i, &err);
        }
    }

    let CollectVisitor {
        next_id,
        attr_fallback,
        failed,
        mut insertions,
        ..
    } = visitor;

    // Hard invariant: ids are dense and unique within the method.
    let ids: FxHashSet<u32> = insertions.iter().map(|(_, _, sb)| sb.id).collect();
    assert!(
        ids.len() == insertions.len() && insertions.iter().all(|(_, _, sb)| sb.id < next_id),
        "source-block id collision in {method}"
    );

    let profile_success = !failed.iter().any(|f| *f);
    let had_profile = profile_data.iter().any(|d| d.raw.is_some());

    // Discarded interactions: every block falls back.
    for (i, failed) in failed.iter().enumerate() {
        if *failed {
            for (_, _, sb) in &mut insertions {
                sb.vals[i] = attr_fallback[i];
            }
        }
    }

    if options.appear100_threshold > 0.0 {
        for (_, _, sb) in &mut insertions {
            for val in sb.vals.iter_mut().flatten() {
                if val.appear100 < options.appear100_threshold {
                    val.value = 0.0;
                }
            }
        }
    }

    let sb_count = insertions.len();
    let mut elided_vals = 0;
    let mut unelided_vals = 0;
    for (_, _, sb) in &insertions {
        elided_vals += sb.vals.iter().filter(|v| v.is_none()).count();
        unelided_vals += sb.vals.iter().filter(|v| v.is_some()).count();
    }

    // Attach, keeping original positions valid as the list grows.
    insertions.sort_by_key(|(block, pos, sb)| (block.index(), *pos, sb.id));
    let mut block_count = 0u32;
    let mut cur_block: Option<BlockId> = None;
    let mut offset = 0usize;
    for (block, pos, sb) in insertions {
        if cur_block != Some(block) {
            cur_block = Some(block);
            offset = 0;
            block_count += 1;
        }
        cfg.insert_source_block(block, pos + offset, sb);
        offset += 1;
    }

    let serialized = options.serialize.then(|| serialize_cfg(cfg).0);
    let normalized = had_profile && profile_success;

    debug!(
        method = %method,
        blocks = block_count,
        source_blocks = sb_count,
        profile_success,
        "inserted source blocks"
    );

    InsertResult {
        block_count,
        serialized,
        profile_success,
        normalized_count: if normalized { sb_count } else { 0 },
        denormalized_count: if normalized { 0 } else { sb_count },
        elided_vals,
        unelided_vals,
    }
}
