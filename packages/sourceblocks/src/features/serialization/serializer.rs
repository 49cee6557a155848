//! Writer for the parenthesized source-block encoding.

use crate::features::traversal::{traverse, TraversalVisitor};
use crate::shared::models::{BlockId, ControlFlowGraph, Edge, SbValue, SourceBlock};
use std::fmt::Write as _;

/// Incremental serializer driven by the traversal: one `open_block` per
/// emitted block, one `edge` per followed non-ghost edge, one `close_block`
/// per block end.
#[derive(Default)]
pub struct SbSerializer {
    out: String,
    elided_vals: usize,
    unelided_vals: usize,
}

impl SbSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a block group. `vals` is empty when there are no interactions;
    /// additional source blocks in the same group use
    /// [`SbSerializer::val_group`].
    pub fn open_block(&mut self, id: u32, vals: &[Option<SbValue>]) {
        let _ = write!(self.out, "({id}");
        if !vals.is_empty() {
            self.out.push(' ');
            self.write_group(vals);
        }
    }

    /// Write one more val group inside the current block group.
    pub fn val_group(&mut self, vals: &[Option<SbValue>]) {
        self.out.push(' ');
        self.write_group(vals);
    }

    pub fn edge(&mut self, tag: char) {
        self.out.push(' ');
        self.out.push(tag);
    }

    pub fn close_block(&mut self) {
        self.out.push(')');
    }

    pub fn finish(self) -> String {
        self.out
    }

    /// `x` entries written so far.
    pub fn elided_vals(&self) -> usize {
        self.elided_vals
    }

    /// Concrete `value:appear100` entries written so far.
    pub fn unelided_vals(&self) -> usize {
        self.unelided_vals
    }

    fn write_group(&mut self, vals: &[Option<SbValue>]) {
        for (i, val) in vals.iter().enumerate() {
            if i > 0 {
                self.out.push('|');
            }
            match val {
                None => {
                    self.out.push('x');
                    self.elided_vals += 1;
                }
                Some(v) => {
                    let _ = write!(self.out, "{}:{}", v.value, v.appear100);
                    self.unelided_vals += 1;
                }
            }
        }
    }
}

struct SerializingVisitor<'c> {
    cfg: &'c ControlFlowGraph,
    ser: SbSerializer,
    counter: u32,
}

impl TraversalVisitor for SerializingVisitor<'_> {
    fn on_block_start(&mut self, block: BlockId) {
        // One val group per source block in the group, chains flattened in
        // IR order; the group id is the leading block's.
        let groups: Vec<&SourceBlock> = self
            .cfg
            .block(block)
            .source_blocks()
            .flat_map(|head| head.chain())
            .collect();
        let id = groups.first().map(|sb| sb.id).unwrap_or(self.counter);
        self.counter += 1;
        self.ser
            .open_block(id, groups.first().map(|sb| &sb.vals[..]).unwrap_or(&[]));
        for sb in groups.iter().skip(1) {
            self.ser.val_group(&sb.vals);
        }
    }

    fn on_edge(&mut self, _src: BlockId, edge: &Edge) {
        // Traversal never hands us ghost edges.
        self.ser.edge(edge.kind.tag().unwrap());
    }

    fn on_block_end(&mut self, _block: BlockId) {
        self.ser.close_block();
    }
}

/// Serialize a whole CFG's source-block structure in traversal order.
///
/// Returns the string plus the elided (`x`) and concrete val counts.
pub fn serialize_cfg(cfg: &ControlFlowGraph) -> (String, usize, usize) {
    let mut visitor = SerializingVisitor {
        cfg,
        ser: SbSerializer::new(),
        counter: 0,
    };
    traverse(cfg, &mut visitor);
    let elided = visitor.ser.elided_vals();
    let unelided = visitor.ser.unelided_vals();
    (visitor.ser.finish(), elided, unelided)
}
