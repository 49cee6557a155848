//! Source blocks: per-position profile annotations.
//!
//! A source block carries one optional `(value, appear100)` pair per
//! interaction. Blocks coalesced onto the same IR position form a
//! singly-linked chain whose order survives cloning and serialization.

use crate::shared::models::method::MethodId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One interaction's profile entry: coverage value plus appearance percent
/// (fraction of profiled runs the block was seen executing, in `[0, 100]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SbValue {
    pub value: f32,
    pub appear100: f32,
}

impl SbValue {
    pub fn new(value: f32, appear100: f32) -> Self {
        Self { value, appear100 }
    }

    pub const ZERO: SbValue = SbValue {
        value: 0.0,
        appear100: 0.0,
    };
}

/// A source block attached to an IR position.
///
/// `vals.len()` equals the process-wide interaction count and is identical
/// for every source block in a run. `id` is unique within `owner`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBlock {
    pub owner: MethodId,
    pub id: u32,
    pub vals: Vec<Option<SbValue>>,
    /// Chain of coalesced source blocks sharing this IR position.
    pub next: Option<Box<SourceBlock>>,
}

impl SourceBlock {
    pub fn new(owner: MethodId, id: u32, vals: Vec<Option<SbValue>>) -> Self {
        Self {
            owner,
            id,
            vals,
            next: None,
        }
    }

    pub fn info(&self) -> SourceBlockInfo {
        SourceBlockInfo {
            owner: self.owner.clone(),
            id: self.id,
        }
    }

    /// Iterate this block and its chain in IR order.
    pub fn chain(&self) -> ChainIter<'_> {
        ChainIter { cur: Some(self) }
    }

    pub fn chain_len(&self) -> usize {
        self.chain().count()
    }

    /// Last element of the chain.
    pub fn chain_last(&self) -> &SourceBlock {
        let mut cur = self;
        while let Some(next) = cur.next.as_deref() {
            cur = next;
        }
        cur
    }

    /// Append `other`'s chain after this one, preserving IR order
    /// (coalescing two adjacent IR entries concatenates their chains).
    pub fn append_chain(&mut self, other: SourceBlock) {
        let mut cur = self;
        while cur.next.is_some() {
            cur = cur.next.as_deref_mut().unwrap();
        }
        cur.next = Some(Box::new(other));
    }

    /// Max `value` across interactions, ignoring unprofiled entries.
    pub fn max_value(&self) -> Option<f32> {
        self.vals
            .iter()
            .flatten()
            .map(|v| v.value)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
    }

    /// Whether any interaction recorded a strictly positive value.
    pub fn is_hot(&self) -> bool {
        self.max_value().is_some_and(|v| v > 0.0)
    }
}

pub struct ChainIter<'a> {
    cur: Option<&'a SourceBlock>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a SourceBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.cur?;
        self.cur = cur.next.as_deref();
        Some(cur)
    }
}

/// Identity of a source block across the whole run: `(owner, id)`.
///
/// The total order is lexicographic on the deterministic method comparator
/// and then the id, so sorted listings are stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceBlockInfo {
    pub owner: MethodId,
    pub id: u32,
}

impl SourceBlockInfo {
    pub fn new(owner: MethodId, id: u32) -> Self {
        Self { owner, id }
    }
}

impl PartialOrd for SourceBlockInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceBlockInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.owner
            .cmp(&other.owner)
            .then_with(|| self.id.cmp(&other.id))
    }
}
