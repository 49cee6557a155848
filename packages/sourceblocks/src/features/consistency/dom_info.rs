//! Source-block dominator tree for one method.
//!
//! The tree is flipped: an edge means "is dominated by", so a node's
//! `in_degree` counts the source blocks it immediately dominates. A leaf
//! (`in_degree == 0`, not removed) dominates nothing and may be removed
//! without stranding any other block's justification.

use crate::features::consistency::dom::{immediate_dominators, DomDirection};
use crate::shared::models::{BlockId, ControlFlowGraph, SourceBlock, SourceBlockInfo};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmDom {
    None,
    Node(SourceBlockInfo),
    /// Sentinel for removed nodes.
    Removed,
}

#[derive(Debug, Clone)]
pub struct DomTreeNode {
    pub imm_dom: ImmDom,
    pub in_degree: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SourceBlockDomInfo {
    nodes: FxHashMap<SourceBlockInfo, DomTreeNode>,
    leaves: BTreeSet<SourceBlockInfo>,
}

fn block_sbs(cfg: &ControlFlowGraph, b: BlockId) -> Vec<&SourceBlock> {
    cfg.block(b)
        .source_blocks()
        .flat_map(|head| head.chain())
        .collect()
}

impl SourceBlockDomInfo {
    /// Build the tree from the current CFG state.
    ///
    /// Source blocks within a block chain onto each other in IR order; the
    /// first one hangs off the last source block of the block's idom, when
    /// that block has any.
    pub fn build(cfg: &ControlFlowGraph) -> Self {
        let idom = immediate_dominators(cfg, DomDirection::Forward);
        let mut info = Self::default();

        for b in cfg.block_ids() {
            let sbs = block_sbs(cfg, b);
            let mut prev: Option<SourceBlockInfo> = None;
            for sb in sbs {
                let sbi = sb.info();
                let imm_dom = match prev.take() {
                    Some(prev) => ImmDom::Node(prev),
                    None => match idom.get(&b).and_then(|d| block_sbs(cfg, *d).last().copied()) {
                        Some(dom_sb) => ImmDom::Node(dom_sb.info()),
                        None => ImmDom::None,
                    },
                };
                if let ImmDom::Node(dom) = &imm_dom {
                    info.bump_in_degree(dom.clone());
                }
                info.nodes.entry(sbi.clone()).or_insert(DomTreeNode {
                    imm_dom: ImmDom::None,
                    in_degree: 0,
                }).imm_dom = imm_dom;
                prev = Some(sbi);
            }
        }

        for (sbi, node) in &info.nodes {
            if node.in_degree == 0 {
                info.leaves.insert(sbi.clone());
            }
        }
        info
    }

    fn bump_in_degree(&mut self, sbi: SourceBlockInfo) {
        let node = self.nodes.entry(sbi.clone()).or_insert(DomTreeNode {
            imm_dom: ImmDom::None,
            in_degree: 0,
        });
        node.in_degree += 1;
        self.leaves.remove(&sbi);
    }

    /// Source blocks whose removal is currently legal, in deterministic
    /// order.
    pub fn removable(&self) -> &BTreeSet<SourceBlockInfo> {
        &self.leaves
    }

    pub fn contains(&self, sbi: &SourceBlockInfo) -> bool {
        self.nodes.contains_key(sbi)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove a leaf, exposing its dominator when it was the last dominated
    /// node. Removing a non-leaf is a programming error and aborts.
    pub fn remove(&mut self, sbi: &SourceBlockInfo) {
        let node = self
            .nodes
            .get_mut(sbi)
            .unwrap_or_else(|| panic!("removing unknown source block {sbi:?}"));
        assert!(
            node.in_degree == 0 && node.imm_dom != ImmDom::Removed,
            "illegal leaf removal of {sbi:?} (in_degree {})",
            node.in_degree
        );
        let old_dom = std::mem::replace(&mut node.imm_dom, ImmDom::Removed);
        node.in_degree = u32::MAX;
        self.leaves.remove(sbi);

        if let ImmDom::Node(dom) = old_dom {
            let dom_node = self.nodes.get_mut(&dom).expect("dominator tracked");
            dom_node.in_degree -= 1;
            if dom_node.in_degree == 0 && dom_node.imm_dom != ImmDom::Removed {
                self.leaves.insert(dom);
            }
        }
    }

    /// Render the idom map as `id:dom` pairs sorted by id (`-` for roots),
    /// for the unique-idom-maps artifact.
    pub fn serialize_idom_map(&self) -> String {
        let mut entries: Vec<(&SourceBlockInfo, &DomTreeNode)> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.imm_dom != ImmDom::Removed)
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut out = String::new();
        for (sbi, node) in entries {
            if !out.is_empty() {
                out.push(' ');
            }
            match &node.imm_dom {
                ImmDom::Node(dom) => {
                    let _ = write!(out, "{}:{}", sbi.id, dom.id);
                }
                _ => {
                    let _ = write!(out, "{}:-", sbi.id);
                }
            }
        }
        out
    }
}
