use std::fmt;

use typed_index_collections::TiVec;

use crate::HasId;

// Slots are never compacted, so a removed key leaves a hole and every other key stays valid.
// Iteration follows key order, which is also insertion order when keys come from `push`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VecMap<K, V> {
    slots: TiVec<K, Option<V>>,
}

// TiVecのDebugはK: From<usize>を要求するので手で書く
impl<K, V: fmt::Debug> fmt::Debug for VecMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.slots
                    .raw
                    .iter()
                    .enumerate()
                    .filter_map(|(i, slot)| slot.as_ref().map(|value| (i, value))),
            )
            .finish()
    }
}

impl<K, V> Default for VecMap<K, V> {
    fn default() -> Self {
        Self {
            slots: TiVec::new(),
        }
    }
}

impl<K: From<usize> + Copy, V> VecMap<K, V>
where
    usize: From<K>,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let i = usize::from(key);
        if i >= self.slots.len() {
            self.slots.raw.resize_with(i + 1, || None);
        }
        self.slots[key].replace(value)
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.slots.get(key).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.slots.get_mut(key).and_then(Option::as_mut)
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: K) -> Option<V> {
        self.slots.get_mut(key).and_then(Option::take)
    }

    pub fn push(&mut self, value: V) -> K {
        self.slots.push_and_get_key(Some(value))
    }

    pub fn push_with(&mut self, f: impl FnOnce(K) -> V) -> K {
        let key = self.slots.next_key();
        self.slots.push(Some(f(key)));
        key
    }

    // O(n)
    pub fn len(&self) -> usize {
        self.values().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots
            .iter_enumerated()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.slots
            .iter_mut_enumerated()
            .filter_map(|(k, v)| v.as_mut().map(|v| (k, v)))
    }

    pub fn retain(&mut self, mut f: impl FnMut(K, &mut V) -> bool) {
        for (k, slot) in self.slots.iter_mut_enumerated() {
            let keep = match slot {
                Some(v) => f(k, v),
                None => true,
            };
            if !keep {
                *slot = None;
            }
        }
    }
}

impl<K: From<usize> + Copy, V> std::ops::Index<K> for VecMap<K, V>
where
    usize: From<K>,
{
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        self.get(index).expect("no entry found for key")
    }
}

impl<K: From<usize> + Copy, V> std::ops::IndexMut<K> for VecMap<K, V>
where
    usize: From<K>,
{
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        self.get_mut(index).expect("no entry found for key")
    }
}

impl<K: From<usize> + Copy, V> FromIterator<(K, V)> for VecMap<K, V>
where
    usize: From<K>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<K: From<usize> + Copy, V: HasId<Id = K>> VecMap<K, V>
where
    usize: From<K>,
{
    pub fn insert_node(&mut self, value: V) -> Option<V> {
        self.insert(value.id(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Key(usize);

    impl From<usize> for Key {
        fn from(i: usize) -> Self {
            Key(i)
        }
    }

    impl From<Key> for usize {
        fn from(k: Key) -> Self {
            k.0
        }
    }

    #[test]
    fn test_remove_leaves_hole() {
        let mut map = VecMap::<Key, &str>::new();
        let a = map.push("a");
        let b = map.push("b");
        let c = map.push("c");
        assert_eq!(map.remove(b), Some("b"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec![a, c]);
        assert_eq!(map[c], "c");
        assert_eq!(map.len(), 2);
        assert_eq!(map.push("d"), Key(3));
    }

    #[test]
    fn test_insert_past_end() {
        let mut map = VecMap::<Key, u32>::new();
        assert_eq!(map.insert(Key(3), 7), None);
        assert_eq!(map.insert(Key(3), 8), Some(7));
        assert!(!map.contains_key(Key(0)));
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(Key(3), &8)]);
    }

    #[test]
    fn test_debug_skips_holes() {
        let mut map = VecMap::<Key, &str>::new();
        map.push("a");
        let b = map.push("b");
        map.push("c");
        map.remove(b);
        assert_eq!(format!("{:?}", map), r#"{0: "a", 2: "c"}"#);
    }
}
