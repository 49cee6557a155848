//! Serialized source-block encoding.
//!
//! Grammar (whitespace-separated tokens):
//!
//! ```text
//! node     ::= "(" id? value* edges ")"
//! edges    ::= ( edge_tag node? )*
//! edge_tag ::= "g" | "b" | "t"
//! value    ::= val ( "|" val )*
//! val      ::= "x" | float ":" float
//! ```
//!
//! Ids are sequential traversal-order integers and are present in the
//! subsystem's own output; profile files carry values only. A tag with no
//! following node marks a followed edge whose target was already emitted.
//! Ghost edges never appear.

mod parser;
mod serializer;

pub use parser::{parse_node, parse_val_group, ProfileParser, SbNode};
pub use serializer::{serialize_cfg, SbSerializer};
