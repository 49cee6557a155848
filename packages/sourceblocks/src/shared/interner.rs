//! Explicit string-interning table.
//!
//! Method and type identifiers are canonical fully-qualified descriptors.
//! Equality and ordering are value-based on the canonical string; the
//! interner only deduplicates storage so that a process-wide descriptor is
//! held once no matter how many methods reference it.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Deduplicating store for descriptor strings.
///
/// Thread-safe behind its own lock; callers never observe the locking.
#[derive(Default)]
pub struct Interner {
    strings: Mutex<FxHashSet<Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `s`, returning the shared canonical allocation.
    pub fn intern(&self, s: &str) -> Arc<str> {
        let mut strings = self.strings.lock();
        if let Some(existing) = strings.get(s) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(s);
        strings.insert(Arc::clone(&arc));
        arc
    }

    pub fn len(&self) -> usize {
        self.strings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates_storage() {
        let interner = Interner::new();
        let a = interner.intern("LFoo;.bar:()V");
        let b = interner.intern("LFoo;.bar:()V");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_stay_distinct() {
        let interner = Interner::new();
        let a = interner.intern("LFoo;.bar:()V");
        let b = interner.intern("LFoo;.baz:()V");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 2);
    }
}
