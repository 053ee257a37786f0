use std::collections::HashMap;
use std::hash::Hash;

/// Map keyed by an unordered pair of ids.
///
/// `key(a, b) == key(b, a)` always holds, so lookups do not care which body
/// was "first" in a pair.
#[derive(Debug, Clone)]
pub struct TupleDictionary<K, V> {
    data: HashMap<(K, K), V>,
    keys: Vec<(K, K)>,
}

impl<K, V> Default for TupleDictionary<K, V> {
    fn default() -> Self {
        Self {
            data: HashMap::new(),
            keys: Vec::new(),
        }
    }
}

impl<K: Copy + Ord + Hash, V> TupleDictionary<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical key for the unordered pair.
    #[inline]
    pub fn key(a: K, b: K) -> (K, K) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn get(&self, a: K, b: K) -> Option<&V> {
        self.data.get(&Self::key(a, b))
    }

    pub fn contains(&self, a: K, b: K) -> bool {
        self.data.contains_key(&Self::key(a, b))
    }

    pub fn set(&mut self, a: K, b: K, value: V) {
        let key = Self::key(a, b);
        if self.data.insert(key, value).is_none() {
            self.keys.push(key);
        }
    }

    pub fn remove(&mut self, a: K, b: K) -> Option<V> {
        let key = Self::key(a, b);
        let removed = self.data.remove(&key);
        if removed.is_some() {
            self.keys.retain(|k| *k != key);
        }
        removed
    }

    /// Clears every entry while keeping allocated capacity.
    pub fn reset(&mut self) {
        self.data.clear();
        self.keys.clear();
    }

    /// Replaces the contents with a copy of `other`.
    pub fn copy_from(&mut self, other: &Self)
    where
        V: Clone,
    {
        self.reset();
        for key in &other.keys {
            if let Some(value) = other.data.get(key) {
                self.set(key.0, key.1, value.clone());
            }
        }
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> &[(K, K)] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
