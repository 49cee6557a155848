//! Canonical deterministic CFG traversal.
//!
//! Preorder depth-first walk from the entry block. Outgoing edges are
//! visited in the content-only total order of
//! [`compare_edges`](crate::shared::models::compare_edges), so the visit
//! sequence is stable under edge-insertion permutation and block-id
//! renumbering. `on_edge` fires for every non-ghost edge in that order;
//! only the first visit of a target (a tree edge) descends into it. Ghost
//! edges are fully elided: no callback, no descent.
//!
//! The walk uses an explicit frame stack; methods can be large enough that
//! self-recursion would overflow the thread stack.

use crate::shared::models::{BlockId, ControlFlowGraph, Edge};
use rustc_hash::FxHashSet;

/// Callbacks fired by [`traverse`] in visit order.
pub trait TraversalVisitor {
    fn on_block_start(&mut self, block: BlockId);
    fn on_edge(&mut self, src: BlockId, edge: &Edge);
    fn on_block_end(&mut self, block: BlockId);
}

struct Frame {
    block: BlockId,
    edges: Vec<Edge>,
    next: usize,
}

/// Walk `cfg` from its entry block, firing `visitor` callbacks.
///
/// Unreachable blocks are never visited; a malformed graph is a caller bug,
/// not an error.
pub fn traverse<V: TraversalVisitor>(cfg: &ControlFlowGraph, visitor: &mut V) {
    if cfg.num_blocks() == 0 {
        return;
    }

    let entry = cfg.entry();
    let mut visited: FxHashSet<BlockId> = FxHashSet::default();
    visited.insert(entry);
    visitor.on_block_start(entry);

    let mut stack = vec![Frame {
        block: entry,
        edges: cfg.sorted_out_edges(entry),
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        if frame.next >= frame.edges.len() {
            visitor.on_block_end(frame.block);
            stack.pop();
            continue;
        }

        let edge = frame.edges[frame.next].clone();
        frame.next += 1;
        let src = frame.block;

        if edge.kind.is_ghost() {
            continue;
        }
        visitor.on_edge(src, &edge);

        if visited.insert(edge.dst) {
            visitor.on_block_start(edge.dst);
            stack.push(Frame {
                block: edge.dst,
                edges: cfg.sorted_out_edges(edge.dst),
                next: 0,
            });
        }
    }
}

/// Flat record of a traversal, for comparison and round-trip checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    BlockStart(BlockId),
    Edge(BlockId, BlockId, Option<char>),
    BlockEnd(BlockId),
}

/// Visitor recording every callback as a [`TraceEvent`].
#[derive(Default)]
pub struct RecordingVisitor {
    pub events: Vec<TraceEvent>,
}

impl TraversalVisitor for RecordingVisitor {
    fn on_block_start(&mut self, block: BlockId) {
        self.events.push(TraceEvent::BlockStart(block));
    }

    fn on_edge(&mut self, src: BlockId, edge: &Edge) {
        self.events
            .push(TraceEvent::Edge(src, edge.dst, edge.kind.tag()));
    }

    fn on_block_end(&mut self, block: BlockId) {
        self.events.push(TraceEvent::BlockEnd(block));
    }
}

/// Blocks in traversal (preorder) sequence.
pub fn traversal_order(cfg: &ControlFlowGraph) -> Vec<BlockId> {
    let mut rec = RecordingVisitor::default();
    traverse(cfg, &mut rec);
    rec.events
        .into_iter()
        .filter_map(|ev| match ev {
            TraceEvent::BlockStart(b) => Some(b),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::EdgeKind;
    use pretty_assertions::assert_eq;

    /// Reference implementation by self-recursion; the iterative walk must
    /// produce the identical trace.
    fn traverse_recursive<V: TraversalVisitor>(cfg: &ControlFlowGraph, visitor: &mut V) {
        fn go<V: TraversalVisitor>(
            cfg: &ControlFlowGraph,
            block: BlockId,
            visited: &mut FxHashSet<BlockId>,
            visitor: &mut V,
        ) {
            visitor.on_block_start(block);
            for edge in cfg.sorted_out_edges(block) {
                if edge.kind.is_ghost() {
                    continue;
                }
                visitor.on_edge(block, &edge);
                if visited.insert(edge.dst) {
                    go(cfg, edge.dst, visited, visitor);
                }
            }
            visitor.on_block_end(block);
        }
        if cfg.num_blocks() == 0 {
            return;
        }
        let mut visited = FxHashSet::default();
        visited.insert(cfg.entry());
        go(cfg, cfg.entry(), &mut visited, visitor);
    }

    fn diamond() -> ControlFlowGraph {
        // B0 -g-> B1, B0 -b-> B2, B1 -g-> B3, B1 -t-> B4, B2 -g-> B3,
        // B4 -g-> B3
        let mut cfg = ControlFlowGraph::new();
        let b: Vec<BlockId> = (0..5).map(|_| cfg.add_block()).collect();
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

    #[test]
    fn diamond_preorder() {
        let order = traversal_order(&diamond());
        assert_eq!(
            order,
            vec![BlockId(0), BlockId(1), BlockId(3), BlockId(4), BlockId(2)]
        );
    }

    #[test]
    fn trace_is_insertion_order_independent() {
        let base = {
            let mut rec = RecordingVisitor::default();
            traverse(&diamond(), &mut rec);
            rec.events
        };

        // Same graph, edges added in a different order.
        let mut cfg = ControlFlowGraph::new();
        let b: Vec<BlockId> = (0..5).map(|_| cfg.add_block()).collect();
        cfg.add_edge(b[4], b[3], EdgeKind::Goto);
        cfg.add_edge(b[0], b[2], EdgeKind::Branch { case_key: None });
        cfg.add_edge(
            b[1],
            b[4],
            EdgeKind::Throw {
                catch_type: None,
                index: 0,
            },
        );
        cfg.add_edge(b[2], b[3], EdgeKind::Goto);
        cfg.add_edge(b[1], b[3], EdgeKind::Goto);
        cfg.add_edge(b[0], b[1], EdgeKind::Goto);

        let mut rec = RecordingVisitor::default();
        traverse(&cfg, &mut rec);
        assert_eq!(rec.events, base);
    }

    #[test]
    fn iterative_matches_recursive() {
        let cfg = diamond();
        let mut it = RecordingVisitor::default();
        traverse(&cfg, &mut it);
        let mut rc = RecordingVisitor::default();
        traverse_recursive(&cfg, &mut rc);
        assert_eq!(it.events, rc.events);
    }

    #[test]
    fn ghost_edges_are_elided() {
        let mut cfg = ControlFlowGraph::new();
        let b0 = cfg.add_block();
        let b1 = cfg.add_block();
        let exit = cfg.add_block();
        cfg.add_edge(b0, b1, EdgeKind::Goto);
        cfg.add_edge(b1, exit, EdgeKind::Ghost);

        let mut rec = RecordingVisitor::default();
        traverse(&cfg, &mut rec);
        assert!(!rec
            .events
            .iter()
            .any(|ev| matches!(ev, TraceEvent::BlockStart(b) if *b == exit)));
        assert!(!rec
            .events
            .iter()
            .any(|ev| matches!(ev, TraceEvent::Edge(_, dst, _) if *dst == exit)));
    }

    #[test]
    fn unreachable_blocks_are_skipped() {
        let mut cfg = ControlFlowGraph::new();
        let b0 = cfg.add_block();
        let b1 = cfg.add_block();
        let _island = cfg.add_block();
        cfg.add_edge(b0, b1, EdgeKind::Goto);
        assert_eq!(traversal_order(&cfg), vec![b0, b1]);
    }

    #[test]
    fn back_edges_fire_on_edge_but_do_not_descend() {
        let mut cfg = ControlFlowGraph::new();
        let b0 = cfg.add_block();
        let b1 = cfg.add_block();
        cfg.add_edge(b0, b1, EdgeKind::Goto);
        cfg.add_edge(b1, b0, EdgeKind::Goto);

        let mut rec = RecordingVisitor::default();
        traverse(&cfg, &mut rec);
        assert_eq!(
            rec.events,
            vec![
                TraceEvent::BlockStart(b0),
                TraceEvent::Edge(b0, b1, Some('g')),
                TraceEvent::BlockStart(b1),
                TraceEvent::Edge(b1, b0, Some('g')),
                TraceEvent::BlockEnd(b1),
                TraceEvent::BlockEnd(b0),
            ]
        );
    }
}
