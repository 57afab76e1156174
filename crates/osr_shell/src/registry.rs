use std::collections::HashMap;
use std::hash::Hash;

/// Identity of one off-screen view. Ids are never reused, so a stale tick can
/// only miss in the registry, never hit a newer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct ViewIdAllocator {
    next: u64,
}

impl ViewIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> ViewId {
        let id = ViewId(self.next);
        self.next = self.next.checked_add(1).expect("view id overflow");
        id
    }
}

/// Handle-to-object lookup for windows, injected instead of a process global.
pub trait WindowRegistry<K, V> {
    /// Returns the previous entry when `key` was already registered.
    fn register(&mut self, key: K, value: V) -> Option<V>;
    fn lookup(&self, key: &K) -> Option<&V>;
    fn lookup_mut(&mut self, key: &K) -> Option<&mut V>;
    fn remove(&mut self, key: &K) -> Option<V>;
    fn len(&self) -> usize;
    fn for_each_mut(&mut self, visit: &mut dyn FnMut(&K, &mut V));

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct MapRegistry<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for MapRegistry<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> MapRegistry<K, V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: Eq + Hash, V> WindowRegistry<K, V> for MapRegistry<K, V> {
    fn register(&mut self, key: K, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    fn lookup(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn for_each_mut(&mut self, visit: &mut dyn FnMut(&K, &mut V)) {
        for (key, value) in &mut self.entries {
            visit(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_ids_are_distinct() {
        let mut allocator = ViewIdAllocator::new();
        let first = allocator.allocate();
        let second = allocator.allocate();
        assert_ne!(first, second);
        assert_eq!(second.raw(), first.raw() + 1);
    }

    #[test]
    fn removed_view_no_longer_resolves() {
        let mut allocator = ViewIdAllocator::new();
        let mut registry = MapRegistry::new();
        let gone = allocator.allocate();
        let live = allocator.allocate();
        registry.register(gone, "gone");
        registry.register(live, "live");

        assert_eq!(registry.remove(&gone), Some("gone"));
        assert!(registry.lookup(&gone).is_none());
        assert_eq!(registry.lookup(&live), Some(&"live"));

        // A replacement window gets a fresh id, so the old id stays dead.
        let replacement = allocator.allocate();
        registry.register(replacement, "replacement");
        assert!(registry.lookup_mut(&gone).is_none());
        assert_eq!(registry.len(), 2);
    }
}
