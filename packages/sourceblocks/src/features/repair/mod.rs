//! Best-effort profile repair.
//!
//! Opt-in fixups for profiles that are internally inconsistent after
//! attribution: a method that is hot somewhere but cold at entry, chains
//! with unprofiled members, blocks whose dominator is hot but which carry
//! no value of their own. Each pass only ever adds or raises values; none
//! of them invents heat in a method with no profiled value at all.

use crate::features::consistency::{immediate_dominators, DomDirection};
use crate::features::traversal::traversal_order;
use crate::shared::models::{ControlFlowGraph, SbValue};

/// Damping applied when a block inherits its dominator's value; reaching
/// the dominator does not imply reaching every block it dominates.
const IDOM_DAMPING: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub entry_fixes: usize,
    pub chain_fixes: usize,
    pub idom_fixes: usize,
}

impl RepairStats {
    pub fn total(&self) -> usize {
        self.entry_fixes + self.chain_fixes + self.idom_fixes
    }
}

/// Run the three repair passes in order and report what each touched.
pub fn repair(cfg: &mut ControlFlowGraph) -> RepairStats {
    let stats = RepairStats {
        entry_fixes: warm_cold_entry(cfg),
        chain_fixes: propagate_chains(cfg),
        idom_fixes: inherit_from_idoms(cfg),
    };
    if stats.total() > 0 {
        tracing::debug!(
            entry = stats.entry_fixes,
            chain = stats.chain_fixes,
            idom = stats.idom_fixes,
            "repaired profile values"
        );
    }
    stats
}

/// Per-interaction maximum over every source block in the graph.
fn interaction_maxima(cfg: &ControlFlowGraph) -> Vec<Option<SbValue>> {
    let width = cfg
        .all_source_blocks()
        .map(|sb| sb.vals.len())
        .max()
        .unwrap_or(0);
    let mut maxima: Vec<Option<SbValue>> = vec![None; width];
    for sb in cfg.all_source_blocks() {
        for (i, val) in sb.vals.iter().enumerate() {
            if let Some(val) = val {
                match &maxima[i] {
                    Some(cur) if cur.value >= val.value => {}
                    _ => maxima[i] = Some(*val),
                }
            }
        }
    }
    maxima
}

/// A method that is hot in some interaction must not report a cold entry;
/// execution reached the hot block through it. Warm the entry's first
/// source block up to the method's maximum for that interaction.
fn warm_cold_entry(cfg: &mut ControlFlowGraph) -> usize {
    let maxima = interaction_maxima(cfg);
    let entry = cfg.entry();
    let mut fixes = 0;
    if let Some(first) = cfg.block_mut(entry).source_blocks_mut().next() {
        for (i, val) in first.vals.iter_mut().enumerate() {
            let Some(max) = maxima.get(i).copied().flatten() else {
                continue;
            };
            if max.value > 0.0 && val.map_or(true, |v| v.value <= 0.0) {
                *val = Some(max);
                fixes += 1;
            }
        }
    }
    fixes
}

/// Coalesced chain members share an IR position, so an unprofiled member
/// inherits the value of the member before it.
fn propagate_chains(cfg: &mut ControlFlowGraph) -> usize {
    let mut fixes = 0;
    for b in cfg.block_ids().collect::<Vec<_>>() {
        for head in cfg.block_mut(b).source_blocks_mut() {
            let mut prev_vals = head.vals.clone();
            let mut cur = head.next.as_deref_mut();
            while let Some(sb) = cur {
                for (i, val) in sb.vals.iter_mut().enumerate() {
                    if val.is_none() {
                        if let Some(prev) = prev_vals.get(i).copied().flatten() {
                            *val = Some(prev);
                            fixes += 1;
                        }
                    }
                }
                prev_vals = sb.vals.clone();
                cur = sb.next.as_deref_mut();
            }
        }
    }
    fixes
}

/// A block whose immediate dominator ends hot but which carries no value of
/// its own inherits a damped copy. Blocks are processed in preorder, so a
/// dominator is always repaired before the blocks it dominates.
fn inherit_from_idoms(cfg: &mut ControlFlowGraph) -> usize {
    let idom = immediate_dominators(cfg, DomDirection::Forward);
    let mut fixes = 0;
    for b in traversal_order(cfg) {
        let Some(dom) = idom.get(&b) else {
            continue;
        };
        let dom_vals = match cfg.block(*dom).last_source_block_before(usize::MAX) {
            Some(sb) => sb.vals.clone(),
            None => continue,
        };
        if let Some(first) = cfg.block_mut(b).source_blocks_mut().next() {
            for (i, val) in first.vals.iter_mut().enumerate() {
                if val.is_some() {
                    continue;
                }
                if let Some(dv) = dom_vals.get(i).copied().flatten() {
                    if dv.value > 0.0 {
                        *val = Some(SbValue::new(dv.value * IDOM_DAMPING, dv.appear100));
                        fixes += 1;
                    }
                }
            }
        }
    }
    fixes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::interner::Interner;
    use crate::shared::models::{EdgeKind, Instruction, MethodId, SourceBlock};
    use pretty_assertions::assert_eq;

    fn sb(owner: &MethodId, id: u32, vals: Vec<Option<SbValue>>) -> Instruction {
        Instruction::SourceBlocks(SourceBlock::new(owner.clone(), id, vals))
    }

    #[test]
    fn cold_entry_of_hot_method_is_warmed() {
        let interner = Interner::new();
        let owner = MethodId::new(&interner, "LFoo;.bar:()V");
        let mut cfg = ControlFlowGraph::new();
        let b0 = cfg.add_block_with(vec![sb(&owner, 0, vec![Some(SbValue::ZERO)])]);
        let b1 = cfg.add_block_with(vec![sb(&owner, 1, vec![Some(SbValue::new(3.0, 60.0))])]);
        cfg.add_edge(b0, b1, EdgeKind::Goto);

        let stats = repair(&mut cfg);
        assert_eq!(stats.entry_fixes, 1);
        let entry_val = cfg.block(b0).source_blocks().next().unwrap().vals[0];
        assert_eq!(entry_val, Some(SbValue::new(3.0, 60.0)));
    }

    #[test]
    fn cold_method_stays_cold() {
        let interner = Interner::new();
        let owner = MethodId::new(&interner, "LFoo;.bar:()V");
        let mut cfg = ControlFlowGraph::new();
        let b0 = cfg.add_block_with(vec![sb(&owner, 0, vec![Some(SbValue::ZERO)])]);
        let b1 = cfg.add_block_with(vec![sb(&owner, 1, vec![None])]);
        cfg.add_edge(b0, b1, EdgeKind::Goto);

        let stats = repair(&mut cfg);
        assert_eq!(stats, RepairStats::default());
        assert_eq!(
            cfg.block(b0).source_blocks().next().unwrap().vals[0],
            Some(SbValue::ZERO)
        );
    }

    #[test]
    fn chain_members_inherit_predecessor_values() {
        let interner = Interner::new();
        let owner = MethodId::new(&interner, "LFoo;.bar:()V");
        let mut head = SourceBlock::new(owner.clone(), 0, vec![Some(SbValue::new(1.0, 25.0))]);
        head.append_chain(SourceBlock::new(owner.clone(), 1, vec![None]));
        head.append_chain(SourceBlock::new(owner, 2, vec![None]));
        let mut cfg = ControlFlowGraph::new();
        cfg.add_block_with(vec![Instruction::SourceBlocks(head)]);

        let stats = repair(&mut cfg);
        assert_eq!(stats.chain_fixes, 2);
        let vals: Vec<Option<SbValue>> = cfg.all_source_blocks().map(|sb| sb.vals[0]).collect();
        assert_eq!(vals, vec![Some(SbValue::new(1.0, 25.0)); 3]);
    }

    #[test]
    fn unprofiled_block_inherits_damped_dominator_value() {
        let interner = Interner::new();
        let owner = MethodId::new(&interner, "LFoo;.bar:()V");
        let mut cfg = ControlFlowGraph::new();
        let b0 = cfg.add_block_with(vec![sb(&owner, 0, vec![Some(SbValue::new(4.0, 80.0))])]);
        let b1 = cfg.add_block_with(vec![sb(&owner, 1, vec![None])]);
        cfg.add_edge(b0, b1, EdgeKind::Goto);

        let stats = repair(&mut cfg);
        assert_eq!(stats.idom_fixes, 1);
        assert_eq!(
            cfg.block(b1).source_blocks().next().unwrap().vals[0],
            Some(SbValue::new(2.0, 80.0))
        );
    }

    #[test]
    fn explicit_zero_is_not_overwritten_by_idom_inheritance() {
        let interner = Interner::new();
        let owner = MethodId::new(&interner, "LFoo;.bar:()V");
        let mut cfg = ControlFlowGraph::new();
        let b0 = cfg.add_block_with(vec![sb(&owner, 0, vec![Some(SbValue::new(4.0, 80.0))])]);
        let b1 = cfg.add_block_with(vec![sb(&owner, 1, vec![Some(SbValue::ZERO)])]);
        cfg.add_edge(b0, b1, EdgeKind::Goto);

        let stats = repair(&mut cfg);
        assert_eq!(stats.idom_fixes, 0);
        assert_eq!(
            cfg.block(b1).source_blocks().next().unwrap().vals[0],
            Some(SbValue::ZERO)
        );
    }
}
