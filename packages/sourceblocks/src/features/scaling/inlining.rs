//! Profile scaling for inlined bodies.
//!
//! When a callee body is cloned into a caller, the clone's source blocks
//! must not claim more heat than the call site itself saw. The call site's
//! representative is the last source block strictly before the invoke.

use crate::shared::models::{Block, ControlFlowGraph, SbValue, SourceBlock};

/// Representative source block for an invoke at `invoke_pos` in `block`:
/// the chain tail of the last source-block position strictly before it.
pub fn call_site_representative(block: &Block, invoke_pos: usize) -> Option<&SourceBlock> {
    block.last_source_block_before(invoke_pos)
}

fn scaled(rep: Option<SbValue>, callee: Option<SbValue>) -> Option<SbValue> {
    let rep = rep?;
    let callee = callee?;
    // A callee value <= 1 is a probability, capped by the call site's; a
    // larger one is a count, attenuated by it. Zero on either side zeroes
    // the product either way.
    let value = if callee.value <= 1.0 {
        rep.value.min(callee.value)
    } else {
        rep.value * callee.value
    };
    Some(SbValue::new(value, callee.appear100))
}

/// Rewrite every source block in the cloned callee body against the call
/// site's representative. With no representative every val becomes `None`.
pub fn scale_inlined_body(representative: Option<&SourceBlock>, callee: &mut ControlFlowGraph) {
    let rep_vals: Option<Vec<Option<SbValue>>> = representative.map(|sb| sb.vals.clone());
    for b in callee.block_ids().collect::<Vec<_>>() {
        for head in callee.block_mut(b).source_blocks_mut() {
            let mut cur: Option<&mut SourceBlock> = Some(head);
            while let Some(sb) = cur {
                for (i, val) in sb.vals.iter_mut().enumerate() {
                    *val = match &rep_vals {
                        Some(rep) => scaled(rep.get(i).copied().flatten(), *val),
                        None => None,
                    };
                }
                cur = sb.next.as_deref_mut();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::interner::Interner;
    use crate::shared::models::{Instruction, MethodId};
    use pretty_assertions::assert_eq;

    fn callee_cfg(owner: &MethodId, vals: &[Option<SbValue>]) -> ControlFlowGraph {
        let mut cfg = ControlFlowGraph::new();
        let insns = vals
            .iter()
            .enumerate()
            .map(|(id, v)| {
                Instruction::SourceBlocks(SourceBlock::new(owner.clone(), id as u32, vec![*v]))
            })
            .collect();
        cfg.add_block_with(insns);
        cfg
    }

    fn vals_of(cfg: &ControlFlowGraph) -> Vec<Option<SbValue>> {
        cfg.all_source_blocks().map(|sb| sb.vals[0]).collect()
    }

    #[test]
    fn call_site_heat_caps_cloned_values() {
        let interner = Interner::new();
        let caller = MethodId::new(&interner, "LFoo;.bar:()V");
        let callee = MethodId::new(&interner, "LFoo;.baz:()V");

        let rep = SourceBlock::new(caller, 0, vec![Some(SbValue::new(1.0, 0.1))]);
        let mut cfg = callee_cfg(
            &callee,
            &[Some(SbValue::new(0.5, 0.1)), Some(SbValue::new(0.2, 0.2))],
        );
        scale_inlined_body(Some(&rep), &mut cfg);
        assert_eq!(
            vals_of(&cfg),
            vec![Some(SbValue::new(0.5, 0.1)), Some(SbValue::new(0.2, 0.2))]
        );
    }

    #[test]
    fn counts_above_one_attenuate_by_call_site() {
        let interner = Interner::new();
        let caller = MethodId::new(&interner, "LFoo;.bar:()V");
        let callee = MethodId::new(&interner, "LFoo;.baz:()V");

        let rep = SourceBlock::new(caller, 0, vec![Some(SbValue::new(0.5, 50.0))]);
        let mut cfg = callee_cfg(&callee, &[Some(SbValue::new(4.0, 80.0))]);
        scale_inlined_body(Some(&rep), &mut cfg);
        assert_eq!(vals_of(&cfg), vec![Some(SbValue::new(2.0, 80.0))]);
    }

    #[test]
    fn zero_and_none_dominate() {
        let interner = Interner::new();
        let caller = MethodId::new(&interner, "LFoo;.bar:()V");
        let callee = MethodId::new(&interner, "LFoo;.baz:()V");

        let rep = SourceBlock::new(caller, 0, vec![Some(SbValue::ZERO)]);
        let mut cfg = callee_cfg(&callee, &[Some(SbValue::new(1.0, 30.0)), None]);
        scale_inlined_body(Some(&rep), &mut cfg);
        assert_eq!(vals_of(&cfg), vec![Some(SbValue::new(0.0, 30.0)), None]);
    }

    #[test]
    fn missing_representative_clears_everything() {
        let interner = Interner::new();
        let callee = MethodId::new(&interner, "LFoo;.baz:()V");
        let mut cfg = callee_cfg(&callee, &[Some(SbValue::new(1.0, 1.0))]);
        scale_inlined_body(None, &mut cfg);
        assert_eq!(vals_of(&cfg), vec![None]);
    }

    #[test]
    fn chains_are_scaled_too() {
        let interner = Interner::new();
        let caller = MethodId::new(&interner, "LFoo;.bar:()V");
        let callee = MethodId::new(&interner, "LFoo;.baz:()V");

        let rep = SourceBlock::new(caller, 0, vec![Some(SbValue::new(0.3, 10.0))]);
        let mut head = SourceBlock::new(callee.clone(), 0, vec![Some(SbValue::new(0.9, 20.0))]);
        head.append_chain(SourceBlock::new(callee, 1, vec![Some(SbValue::new(0.1, 5.0))]));
        let mut cfg = ControlFlowGraph::new();
        cfg.add_block_with(vec![Instruction::SourceBlocks(head)]);

        scale_inlined_body(Some(&rep), &mut cfg);
        assert_eq!(
            vals_of(&cfg),
            vec![Some(SbValue::new(0.3, 20.0)), Some(SbValue::new(0.1, 5.0))]
        );
    }

    #[test]
    fn representative_is_last_before_invoke() {
        let interner = Interner::new();
        let owner = MethodId::new(&interner, "LFoo;.bar:()V");
        let callee = MethodId::new(&interner, "LFoo;.baz:()V");
        let block = Block {
            instructions: vec![
                Instruction::SourceBlocks(SourceBlock::new(owner.clone(), 0, vec![])),
                Instruction::Const(1),
                Instruction::SourceBlocks(SourceBlock::new(owner, 3, vec![])),
                Instruction::Invoke(callee),
            ],
        };
        assert_eq!(call_site_representative(&block, 3).map(|sb| sb.id), Some(3));
        assert_eq!(call_site_representative(&block, 1).map(|sb| sb.id), Some(0));
    }
}
