//! Control-flow graph model.
//!
//! Blocks are identified by a per-method dense integer whose value is
//! unstable across rewrites; nothing in this subsystem may order on it.
//! Edges carry enough content to define the canonical traversal order
//! (`Goto < Branch < Throw < Ghost`, then payload-based tie-breaks), so the
//! walk is a function of edge contents only, never of insertion order.

use crate::shared::models::method::{MethodId, TypeId};
use crate::shared::models::source_block::{SourceBlock, SourceBlockInfo};
use rustc_hash::FxHashSet;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// Dense per-method block index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Typed CFG edge payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// Unconditional fallthrough/jump; at most one per source block.
    Goto,
    /// Switch/branch case; `None` is the unconditional branch target.
    Branch { case_key: Option<i32> },
    /// Exceptional edge; `None` catch type is catch-all.
    Throw {
        catch_type: Option<TypeId>,
        index: u32,
    },
    /// Synthetic entry/exit plumbing; never visible to consumers.
    Ghost,
}

impl EdgeKind {
    fn rank(&self) -> u8 {
        match self {
            EdgeKind::Goto => 0,
            EdgeKind::Branch { .. } => 1,
            EdgeKind::Throw { .. } => 2,
            EdgeKind::Ghost => 3,
        }
    }

    /// Serialization tag; ghost edges have none.
    pub fn tag(&self) -> Option<char> {
        match self {
            EdgeKind::Goto => Some('g'),
            EdgeKind::Branch { .. } => Some('b'),
            EdgeKind::Throw { .. } => Some('t'),
            EdgeKind::Ghost => None,
        }
    }

    pub fn is_ghost(&self) -> bool {
        matches!(self, EdgeKind::Ghost)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub src: BlockId,
    pub dst: BlockId,
    pub kind: EdgeKind,
}

/// Total order over edge contents (§ traversal contract).
///
/// `Goto < Branch < Throw < Ghost`; branch no-case before keyed cases in
/// ascending key order; catch-all throws before typed ones, typed ones by
/// the deterministic type comparator, then handler index.
pub fn compare_edges(a: &Edge, b: &Edge) -> Ordering {
    match (&a.kind, &b.kind) {
        (EdgeKind::Branch { case_key: ka }, EdgeKind::Branch { case_key: kb }) => {
            match (ka, kb) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(ka), Some(kb)) => ka.cmp(kb),
            }
        }
        (
            EdgeKind::Throw {
                catch_type: ca,
                index: ia,
            },
            EdgeKind::Throw {
                catch_type: cb,
                index: ib,
            },
        ) => match (ca, cb) {
            (None, None) => ia.cmp(ib),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(ca), Some(cb)) => ca.cmp(cb).then_with(|| ia.cmp(ib)),
        },
        _ => a.kind.rank().cmp(&b.kind.rank()),
    }
}

/// Minimal instruction model: just enough shape for source-block placement.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Parameter-loading prologue entry.
    LoadParam(u16),
    /// Leading `move-exception` in a catch handler.
    MoveException,
    /// Second half of an invoke/move-result pair.
    MoveResultPseudo,
    Const(i64),
    Binop,
    ArrayAccess,
    FieldAccess,
    NewInstance,
    Invoke(MethodId),
    Throw,
    Return,
    Nop,
    /// IR position holding a source-block chain head.
    SourceBlocks(SourceBlock),
}

impl Instruction {
    /// Whether this instruction can raise at runtime.
    pub fn may_throw(&self) -> bool {
        matches!(
            self,
            Instruction::ArrayAccess
                | Instruction::FieldAccess
                | Instruction::NewInstance
                | Instruction::Invoke(_)
                | Instruction::Throw
        )
    }

    /// Positions a source block must not be attached at.
    pub fn is_insertion_barrier(&self) -> bool {
        matches!(
            self,
            Instruction::LoadParam(_) | Instruction::MoveException | Instruction::MoveResultPseudo
        )
    }

    fn hash_tag(&self) -> u8 {
        match self {
            Instruction::LoadParam(_) => 1,
            Instruction::MoveException => 2,
            Instruction::MoveResultPseudo => 3,
            Instruction::Const(_) => 4,
            Instruction::Binop => 5,
            Instruction::ArrayAccess => 6,
            Instruction::FieldAccess => 7,
            Instruction::NewInstance => 8,
            Instruction::Invoke(_) => 9,
            Instruction::Throw => 10,
            Instruction::Return => 11,
            Instruction::Nop => 12,
            Instruction::SourceBlocks(_) => 13,
        }
    }
}

/// One basic block: an ordered instruction list.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instructions: Vec<Instruction>,
}

impl Block {
    /// First position a source block may be attached at: past the parameter
    /// prologue, a leading `move-exception`, and move-result halves.
    pub fn first_eligible_position(&self) -> usize {
        self.instructions
            .iter()
            .position(|insn| {
                !insn.is_insertion_barrier() && !matches!(insn, Instruction::SourceBlocks(_))
            })
            .unwrap_or(self.instructions.len())
    }

    /// Source-block chain heads in instruction order.
    pub fn source_blocks(&self) -> impl Iterator<Item = &SourceBlock> {
        self.instructions.iter().filter_map(|insn| match insn {
            Instruction::SourceBlocks(sb) => Some(sb),
            _ => None,
        })
    }

    pub fn source_blocks_mut(&mut self) -> impl Iterator<Item = &mut SourceBlock> {
        self.instructions.iter_mut().filter_map(|insn| match insn {
            Instruction::SourceBlocks(sb) => Some(sb),
            _ => None,
        })
    }

    /// Last source block strictly before `pos`, chain-resolved to its tail.
    pub fn last_source_block_before(&self, pos: usize) -> Option<&SourceBlock> {
        self.instructions[..pos.min(self.instructions.len())]
            .iter()
            .rev()
            .find_map(|insn| match insn {
                Instruction::SourceBlocks(sb) => Some(sb.chain_last()),
                _ => None,
            })
    }
}

/// Directed graph of basic blocks with typed edges and a single entry.
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    blocks: Vec<Block>,
    out_edges: Vec<Vec<Edge>>,
    entry: BlockId,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty block; the first block added becomes the entry.
    pub fn add_block(&mut self) -> BlockId {
        self.add_block_with(Vec::new())
    }

    pub fn add_block_with(&mut self, instructions: Vec<Instruction>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block { instructions });
        self.out_edges.push(Vec::new());
        id
    }

    pub fn add_edge(&mut self, src: BlockId, dst: BlockId, kind: EdgeKind) {
        self.out_edges[src.index()].push(Edge { src, dst, kind });
    }

    pub fn set_entry(&mut self, entry: BlockId) {
        self.entry = entry;
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Outgoing edges in insertion order; callers that need determinism use
    /// [`ControlFlowGraph::sorted_out_edges`].
    pub fn out_edges(&self, src: BlockId) -> &[Edge] {
        &self.out_edges[src.index()]
    }

    /// Outgoing edges in the canonical content order.
    pub fn sorted_out_edges(&self, src: BlockId) -> Vec<Edge> {
        let mut edges = self.out_edges[src.index()].clone();
        edges.sort_by(compare_edges);
        edges
    }

    /// Insert a source-block chain head at `pos` in `block`'s instructions.
    pub fn insert_source_block(&mut self, block: BlockId, pos: usize, sb: SourceBlock) {
        self.blocks[block.index()]
            .instructions
            .insert(pos, Instruction::SourceBlocks(sb));
    }

    /// All source blocks in the graph, chains included, in block-index then
    /// instruction then chain order. Block-index order is fine here: callers
    /// only ever build identity *sets* from this.
    pub fn all_source_blocks(&self) -> impl Iterator<Item = &SourceBlock> {
        self.blocks
            .iter()
            .flat_map(|b| b.source_blocks().flat_map(|sb| sb.chain()))
    }

    /// Current set of source-block identities in the graph.
    pub fn source_block_infos(&self) -> FxHashSet<SourceBlockInfo> {
        self.all_source_blocks().map(|sb| sb.info()).collect()
    }

    /// 8-byte content hash of the method body, used for hashed access-method
    /// names. Source-block positions are excluded so the hash is stable
    /// across insertion.
    pub fn body_hash(&self) -> u64 {
        let mut hasher = Sha256::new();
        for block in &self.blocks {
            for insn in &block.instructions {
                if matches!(insn, Instruction::SourceBlocks(_)) {
                    continue;
                }
                hasher.update([insn.hash_tag()]);
                match insn {
                    Instruction::LoadParam(reg) => hasher.update(reg.to_le_bytes()),
                    Instruction::Const(lit) => hasher.update(lit.to_le_bytes()),
                    Instruction::Invoke(callee) => hasher.update(callee.as_str().as_bytes()),
                    _ => {}
                }
            }
            hasher.update([0xff]);
        }
        let digest = hasher.finalize();
        u64::from_be_bytes(digest[..8].try_into().unwrap())
    }
}
