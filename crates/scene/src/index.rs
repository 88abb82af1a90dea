/// Registry of renderable datasets, iterated by the render pass.
///
/// Entries keep registration order so draw order is stable. Adding an entry
/// twice is a no-op and removing an absent one is harmless, which lets every
/// layer deregister unconditionally on teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIndex<K> {
    entries: Vec<K>,
}

impl<K> Default for DataIndex<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Copy + Eq> DataIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if `key` was already registered.
    pub fn add(&mut self, key: K) -> bool {
        if self.contains(key) {
            return false;
        }
        self.entries.push(key);
        true
    }

    /// Returns `true` if `key` was registered.
    pub fn remove(&mut self, key: K) -> bool {
        match self.entries.iter().position(|k| *k == key) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::DataIndex;

    #[test]
    fn keeps_registration_order() {
        let mut idx = DataIndex::new();
        assert!(idx.add(3));
        assert!(idx.add(1));
        assert!(idx.add(2));
        assert_eq!(idx.iter().collect::<Vec<_>>(), vec![3, 1, 2]);
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let mut idx = DataIndex::new();
        assert!(idx.add(1));
        assert!(!idx.add(1));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn remove_is_safe_for_absent_keys() {
        let mut idx = DataIndex::new();
        idx.add(1);
        idx.add(2);
        assert!(idx.remove(1));
        assert!(!idx.remove(1));
        assert!(!idx.remove(9));
        assert_eq!(idx.iter().collect::<Vec<_>>(), vec![2]);
    }
}
