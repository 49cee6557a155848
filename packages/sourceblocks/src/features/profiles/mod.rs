//! Profile files: memory-mapped reading, indexing and attribution.

pub mod attribution;
pub mod ports;
pub mod reader;

pub use attribution::{attribute, ProfileData};
pub use ports::{
    CallGraph, InMemoryCallGraph, InMemoryMethodProfiles, InMemoryMethodTable, InteractionStats,
    MethodProfiles, MethodTable,
};
pub use reader::{load_profiles, InteractionProfile};
