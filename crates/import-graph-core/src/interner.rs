//! Bidirectional string/id interner backing every module handle.

use indexmap::IndexSet;

use crate::module::ModuleId;

/// Maps dotted module name strings to small stable integer handles.
///
/// Ids are assigned in insertion order and are stable for the lifetime of
/// the interner: `intern` never invalidates a previously returned
/// [`ModuleId`]. Backed by an [`IndexSet`] so `resolve` is an O(1) index
/// lookup rather than a reverse hash map.
#[derive(Debug, Default, Clone)]
pub struct Interner {
    names: IndexSet<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning its handle. Idempotent: interning the same
    /// string twice returns the same id.
    pub fn intern(&mut self, name: &str) -> ModuleId {
        let (index, _) = self.names.insert_full(name.to_string());
        ModuleId(index as u32)
    }

    /// Look up an already-interned name without inserting it.
    pub fn lookup(&self, name: &str) -> Option<ModuleId> {
        self.names.get_index_of(name).map(|i| ModuleId(i as u32))
    }

    /// Resolve a handle back to its name.
    ///
    /// Panics if `id` was not produced by this interner; every id held by
    /// callers is expected to have come from [`Interner::intern`].
    pub fn resolve(&self, id: ModuleId) -> &str {
        self.names
            .get_index(id.0 as usize)
            .expect("ModuleId must come from this interner")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("pkg.a");
        let b = interner.intern("pkg.a");
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn ids_are_stable_and_round_trip() {
        let mut interner = Interner::new();
        let a = interner.intern("pkg.a");
        let b = interner.intern("pkg.b");
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "pkg.a");
        assert_eq!(interner.resolve(b), "pkg.b");
    }

    #[test]
    fn lookup_does_not_insert() {
        let mut interner = Interner::new();
        interner.intern("pkg.a");
        assert_eq!(interner.lookup("pkg.b"), None);
        assert_eq!(interner.len(), 1);
    }
}
