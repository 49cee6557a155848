//! Profile merging for deduplicated blocks.
//!
//! When parallel blocks collapse into one canonical block, the survivor's
//! source block must account for every path that used to flow through the
//! originals: values add, appearance takes the most frequently seen input.

use crate::shared::interner::Interner;
use crate::shared::models::{MethodId, SbValue, SourceBlock};

/// Owner name for merged source blocks; merged identity belongs to no
/// single method anymore.
pub const SYNTHETIC_OWNER: &str = "<synthetic>";

fn merge_vals(inputs: &[Option<&SourceBlock>], len: usize) -> Vec<Option<SbValue>> {
    (0..len)
        .map(|i| {
            let mut acc: Option<SbValue> = None;
            for sb in inputs.iter().flatten() {
                if let Some(val) = sb.vals.get(i).copied().flatten() {
                    let cur = acc.get_or_insert(SbValue::ZERO);
                    cur.value += val.value;
                    cur.appear100 = cur.appear100.max(val.appear100);
                }
            }
            acc
        })
        .collect()
}

/// Merge the source-block chains of `k` parallel blocks into one synthetic
/// chain for the canonical block. Chain length is the longest input chain;
/// shorter chains contribute nothing at the missing depths. Returns `None`
/// when no input carries a source block.
pub fn merge_parallel_source_blocks(
    interner: &Interner,
    inputs: &[&SourceBlock],
) -> Option<SourceBlock> {
    if inputs.is_empty() {
        return None;
    }
    let owner = MethodId::new(interner, SYNTHETIC_OWNER);
    let depth = inputs.iter().map(|sb| sb.chain_len()).max()?;
    let width = inputs
        .iter()
        .flat_map(|sb| sb.chain().map(|n| n.vals.len()))
        .max()
        .unwrap_or(0);

    let mut merged: Option<SourceBlock> = None;
    for d in 0..depth {
        let at_depth: Vec<Option<&SourceBlock>> =
            inputs.iter().map(|sb| sb.chain().nth(d)).collect();
        let node = SourceBlock::new(owner.clone(), u32::MAX, merge_vals(&at_depth, width));
        match merged.as_mut() {
            Some(head) => head.append_chain(node),
            None => merged = Some(node),
        }
    }
    merged
}
