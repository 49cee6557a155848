//! Immediate-dominator computation over a CFG.
//!
//! One algorithm, parameterized by graph direction: `Forward` yields the
//! dominator tree, `Backward` the post-dominator tree over a virtual exit.
//! The checker only consumes `Forward`.

use crate::shared::models::{BlockId, ControlFlowGraph};
use petgraph::algo::dominators::simple_fast;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomDirection {
    /// Dominance from the entry block.
    Forward,
    /// Post-dominance toward a virtual exit.
    Backward,
}

/// Immediate dominator per reachable block. The root has no entry. Ghost
/// edges are synthetic plumbing and do not contribute.
pub fn immediate_dominators(
    cfg: &ControlFlowGraph,
    direction: DomDirection,
) -> FxHashMap<BlockId, BlockId> {
    let mut result = FxHashMap::default();
    if cfg.num_blocks() == 0 {
        return result;
    }

    let mut graph: DiGraph<BlockId, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = cfg.block_ids().map(|b| graph.add_node(b)).collect();
    for src in cfg.block_ids() {
        for edge in cfg.out_edges(src) {
            if edge.kind.is_ghost() {
                continue;
            }
            match direction {
                DomDirection::Forward => {
                    graph.add_edge(nodes[src.index()], nodes[edge.dst.index()], ());
                }
                DomDirection::Backward => {
                    graph.add_edge(nodes[edge.dst.index()], nodes[src.index()], ());
                }
            }
        }
    }

    let root = match direction {
        DomDirection::Forward => nodes[cfg.entry().index()],
        DomDirection::Backward => {
            // Virtual exit fed by every block without non-ghost successors.
            let exit = graph.add_node(BlockId(u32::MAX));
            for src in cfg.block_ids() {
                let terminal = !cfg
                    .out_edges(src)
                    .iter()
                    .any(|e| !e.kind.is_ghost());
                if terminal {
                    graph.add_edge(exit, nodes[src.index()], ());
                }
            }
            exit
        }
    };

    let dominators = simple_fast(&graph, root);
    for (i, node) in nodes.iter().enumerate() {
        if let Some(idom) = dominators.immediate_dominator(*node) {
            let idom_block = graph[idom];
            if idom_block.0 != u32::MAX {
                result.insert(BlockId(i as u32), idom_block);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::EdgeKind;
    use pretty_assertions::assert_eq;

    fn diamond() -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::new();
        let b: Vec<BlockId> = (0..4).map(|_| cfg.add_block()).collect();
        cfg.add_edge(b[0], b[1], EdgeKind::Goto);
        cfg.add_edge(b[0], b[2], EdgeKind::Branch { case_key: None });
        cfg.add_edge(b[1], b[3], EdgeKind::Goto);
        cfg.add_edge(b[2], b[3], EdgeKind::Goto);
        cfg
    }

    #[test]
    fn forward_idoms_of_diamond() {
        let idom = immediate_dominators(&diamond(), DomDirection::Forward);
        assert_eq!(idom.get(&BlockId(1)), Some(&BlockId(0)));
        assert_eq!(idom.get(&BlockId(2)), Some(&BlockId(0)));
        // The join point is dominated by the fork, not either arm.
        assert_eq!(idom.get(&BlockId(3)), Some(&BlockId(0)));
        assert_eq!(idom.get(&BlockId(0)), None);
    }

    #[test]
    fn backward_idoms_of_diamond() {
        let pidom = immediate_dominators(&diamond(), DomDirection::Backward);
        assert_eq!(pidom.get(&BlockId(0)), Some(&BlockId(3)));
        assert_eq!(pidom.get(&BlockId(1)), Some(&BlockId(3)));
    }

    #[test]
    fn unreachable_blocks_have_no_idom() {
        let mut cfg = ControlFlowGraph::new();
        let b0 = cfg.add_block();
        let b1 = cfg.add_block();
        let island = cfg.add_block();
        cfg.add_edge(b0, b1, EdgeKind::Goto);
        let idom = immediate_dominators(&cfg, DomDirection::Forward);
        assert_eq!(idom.get(&island), None);
        assert_eq!(idom.get(&b1), Some(&b0));
    }
}
