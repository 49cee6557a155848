//! Feature modules, one vertical slice per subsystem concern.

pub mod consistency;
pub mod insertion;
pub mod profiles;
pub mod repair;
pub mod scaling;
pub mod serialization;
pub mod traversal;
