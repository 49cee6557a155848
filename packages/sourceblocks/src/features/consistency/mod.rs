//! Source-block consistency checking.
//!
//! Dominator-based accounting that tells legal source-block removals (a
//! leaf of the dominator tree may go away) from accidental drops.

pub mod checker;
pub mod dom;
pub mod dom_info;

pub use checker::{ConsistencyChecker, ConsistencyOptions, Violation};
pub use dom::{immediate_dominators, DomDirection};
pub use dom_info::{DomTreeNode, ImmDom, SourceBlockDomInfo};
