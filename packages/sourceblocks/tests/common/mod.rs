//! Common test utilities for sourceblocks
//!
//! Shared CFG builders and profile-file fixtures for integration tests.

#![allow(dead_code)]

use sourceblocks::{
    BlockId, ControlFlowGraph, EdgeKind, Instruction, Interner, MethodId, SbValue, SourceBlock,
};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn mid(interner: &Interner, s: &str) -> MethodId {
    MethodId::new(interner, s)
}

/// The five-block diamond used throughout the scenario suite:
/// `B0 -g-> B1`, `B0 -b-> B2`, `B1 -g-> B3`, `B1 -t(0)-> B4`,
/// `B2 -g-> B3`, `B4 -g-> B3`.
pub fn diamond() -> ControlFlowGraph {
    let mut cfg = ControlFlowGraph::new();
    let b: Vec<BlockId> = (0..5)
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

/// First source block of a block, by raw block index.
pub fn block_sb(cfg: &ControlFlowGraph, b: u32) -> SourceBlock {
    cfg.block(BlockId(b))
        .source_blocks()
        .next()
        .expect("block has a source block")
        .clone()
}

pub fn sb_with_val(owner: &MethodId, id: u32, val: SbValue) -> SourceBlock {
    SourceBlock::new(owner.clone(), id, vec![Some(val)])
}

/// Write a well-formed profile file and return its path.
pub fn write_profile_file(
    dir: &Path,
    file_name: &str,
    interaction: &str,
    rows: &[(&str, &str)],
) -> PathBuf {
    let path = dir.join(file_name);
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "interaction,appear#").unwrap();
    writeln!(f, "{interaction},10").unwrap();
    writeln!(f, "name,profiled_srcblks_exprs").unwrap();
    for (key, serialized) in rows {
        writeln!(f, "{key},{serialized}").unwrap();
    }
    path
}
