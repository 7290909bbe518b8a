//! Process-wide storage for types whose statics are shared by every context

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Which global table a field lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalTableKind {
    /// Integer and floating-point values
    Int,
    /// Untraced machine words
    Address,
    /// Object references
    Object,
}

#[derive(Debug, Default)]
struct GlobalTable {
    names: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, u32>,
    values: Vec<u64>,
}

/// Registry of global statics keyed by `"type.field"`
#[derive(Debug, Default)]
pub struct GlobalStatics {
    ints: RwLock<GlobalTable>,
    addresses: RwLock<GlobalTable>,
    objects: RwLock<GlobalTable>,
}

impl GlobalStatics {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: GlobalTableKind) -> &RwLock<GlobalTable> {
        match kind {
            GlobalTableKind::Int => &self.ints,
            GlobalTableKind::Address => &self.addresses,
            GlobalTableKind::Object => &self.objects,
        }
    }

    /// Register a field and return its index
    ///
    /// Registering a name twice returns the existing index and keeps the
    /// current value.
    pub fn register(&self, kind: GlobalTableKind, key: &str, initial: u64) -> u32 {
        let mut table = self.table(kind).write();
        if let Some(&index) = table.index.get(key) {
            return index;
        }
        let index = table.values.len() as u32;
        let key: Arc<str> = Arc::from(key);
        table.names.push(key.clone());
        table.index.insert(key, index);
        table.values.push(initial);
        index
    }

    /// Index of a registered field
    pub fn index_of(&self, kind: GlobalTableKind, key: &str) -> Option<u32> {
        self.table(kind).read().index.get(key).copied()
    }

    /// Current value at `index`
    pub fn get(&self, kind: GlobalTableKind, index: u32) -> Option<u64> {
        self.table(kind).read().values.get(index as usize).copied()
    }

    /// Store a value; returns false if `index` is not registered
    pub fn set(&self, kind: GlobalTableKind, index: u32, value: u64) -> bool {
        match self.table(kind).write().values.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Number of fields in a table
    pub fn len(&self, kind: GlobalTableKind) -> usize {
        self.table(kind).read().values.len()
    }

    /// Registered keys in index order
    pub fn names(&self, kind: GlobalTableKind) -> Vec<Arc<str>> {
        self.table(kind).read().names.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_access() {
        let globals = GlobalStatics::new();
        let a = globals.register(GlobalTableKind::Int, "vm.GC.count", 0);
        let b = globals.register(GlobalTableKind::Int, "vm.GC.limit", 100);

        assert_eq!((a, b), (0, 1));
        assert_eq!(globals.get(GlobalTableKind::Int, b), Some(100));
        assert!(globals.set(GlobalTableKind::Int, a, 7));
        assert_eq!(globals.get(GlobalTableKind::Int, a), Some(7));
        assert!(!globals.set(GlobalTableKind::Int, 9, 1));
    }

    #[test]
    fn test_register_is_idempotent() {
        let globals = GlobalStatics::new();
        let first = globals.register(GlobalTableKind::Object, "vm.Heap.roots", 0);
        globals.set(GlobalTableKind::Object, first, 42);
        let again = globals.register(GlobalTableKind::Object, "vm.Heap.roots", 0);

        assert_eq!(first, again);
        assert_eq!(globals.len(GlobalTableKind::Object), 1);
        assert_eq!(globals.get(GlobalTableKind::Object, first), Some(42));
    }

    #[test]
    fn test_tables_are_separate() {
        let globals = GlobalStatics::new();
        globals.register(GlobalTableKind::Address, "vm.Heap.start", 0);

        assert_eq!(globals.index_of(GlobalTableKind::Address, "vm.Heap.start"), Some(0));
        assert_eq!(globals.index_of(GlobalTableKind::Int, "vm.Heap.start"), None);
        assert_eq!(globals.names(GlobalTableKind::Address).len(), 1);
    }
}
