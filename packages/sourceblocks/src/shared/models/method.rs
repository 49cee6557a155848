//! Method and type identifiers.
//!
//! A method identifier (`MethodId`) is the canonical fully-qualified
//! descriptor `<owner-type>.<name>:(<arg-types>)<return-type>`, interned
//! through the explicit [`Interner`]. Equality, hashing and ordering are
//! value-based on the canonical string; `Ord` on `MethodId` *is* the
//! deterministic method comparator used everywhere determinism matters.

use crate::shared::interner::Interner;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Matches the hashed access-method suffix: `redex` + 16 lowercase hex
/// digits (8-byte body hash) + `$` + two digits (access flag tag).
static HASHED_ACCESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^redex[0-9a-f]{16}\$[0-9]{2}$").unwrap());

macro_rules! interned_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(interner: &Interner, s: &str) -> Self {
                Self(interner.intern(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                // Fast path: interned strings usually share storage.
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.0.as_ref().cmp(other.0.as_ref())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), &self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

interned_id!(
    MethodId,
    "Canonical fully-qualified method descriptor, interned."
);
interned_id!(TypeId, "Canonical type descriptor, interned.");

impl MethodId {
    /// Owner-type part of the descriptor (everything before the first `.`).
    pub fn owner(&self) -> &str {
        self.0.split_once('.').map(|(o, _)| o).unwrap_or(&self.0)
    }

    /// Simple name part (between the first `.` and the first `:`).
    pub fn name(&self) -> &str {
        let rest = self.0.split_once('.').map(|(_, r)| r).unwrap_or(&self.0);
        rest.split_once(':').map(|(n, _)| n).unwrap_or(rest)
    }

    /// Proto descriptor part (everything after the first `:`).
    pub fn proto(&self) -> &str {
        self.0.split_once(':').map(|(_, p)| p).unwrap_or("")
    }

    /// Whether this is a synthetic accessor (`access$...`) method.
    pub fn is_access_method(&self) -> bool {
        self.name().starts_with(ACCESS_PREFIX)
    }
}

pub const ACCESS_PREFIX: &str = "access$";

/// The two accessor-name styles a profile file may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessNameKind {
    /// `access$<digits>` — positional, compiler-assigned.
    Exact,
    /// `access$redex<16 hex>$<2 digits>` — content-hashed, rename-stable.
    Hashed,
}

/// Classify a simple method name as an accessor key, if it is one.
pub fn classify_access_name(name: &str) -> Option<AccessNameKind> {
    let suffix = name.strip_prefix(ACCESS_PREFIX)?;
    if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Some(AccessNameKind::Exact);
    }
    if HASHED_ACCESS_RE.is_match(suffix) {
        return Some(AccessNameKind::Hashed);
    }
    None
}

/// Build the hashed accessor name for a method body hash and access tag.
pub fn hashed_access_name(body_hash: u64, access_tag: u8) -> String {
    format!("{ACCESS_PREFIX}redex{body_hash:016x}${access_tag:02}")
}

/// Split a profile method key into `(owner, name, proto)`.
///
/// Keys follow `<owner-type>.<name>:<proto-descriptor>`; returns `None` when
/// either separator is missing.
pub fn split_method_key(key: &str) -> Option<(&str, &str, &str)> {
    let (owner, rest) = key.split_once('.')?;
    let (name, proto) = rest.split_once(':')?;
    Some((owner, name, proto))
}
