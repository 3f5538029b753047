//! Id table for live plugin instances.
//!
//! Ids are assigned monotonically from 0 and never reused within one
//! table, so a stale id can never resolve to a newer instance. Removal
//! leaves a tombstone behind; a lookup through a removed id returns `None`
//! and the caller turns that into a loud `UnknownInstance` rejection.

/// A monotonic `u32`-keyed table of owned values.
pub struct InstanceTable<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> InstanceTable<T> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    /// The id the next insert will receive, or `None` once the id space
    /// is exhausted.
    pub fn next_id(&self) -> Option<u32> {
        u32::try_from(self.slots.len()).ok()
    }

    /// Insert a value and return its id. `None` once the id space is
    /// exhausted; the value is dropped in that case.
    pub fn insert(&mut self, value: T) -> Option<u32> {
        let id = self.next_id()?;
        self.slots.push(Some(value));
        self.live += 1;
        Some(id)
    }

    /// Shared reference to the value behind `id`.
    pub fn get(&self, id: u32) -> Option<&T> {
        self.slots.get(id as usize)?.as_ref()
    }

    /// Remove and return the value behind `id`. A second remove returns `None`.
    pub fn remove(&mut self, id: u32) -> Option<T> {
        let value = self.slots.get_mut(id as usize)?.take()?;
        self.live -= 1;
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no values are live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Remove every live value, in id order. Ids stay consumed.
    pub fn drain(&mut self) -> Vec<(u32, T)> {
        self.live = 0;
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.take().map(|v| (i as u32, v)))
            .collect()
    }
}

impl<T> Default for InstanceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ids_start_at_zero_and_increase() {
        let mut table = InstanceTable::new();
        assert_eq!(table.insert('a'), Some(0));
        assert_eq!(table.insert('b'), Some(1));
        assert_eq!(table.insert('c'), Some(2));
        assert_eq!(table.get(1), Some(&'b'));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut table = InstanceTable::new();
        let a = table.insert(10).unwrap();
        assert_eq!(table.remove(a), Some(10));
        let b = table.insert(20).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.get(a), None);
        assert_eq!(table.get(b), Some(&20));
    }

    #[test]
    fn double_remove_returns_none() {
        let mut table = InstanceTable::new();
        let id = table.insert(1).unwrap();
        assert_eq!(table.remove(id), Some(1));
        assert_eq!(table.remove(id), None);
        assert!(table.is_empty());
    }

    #[test]
    fn unknown_id_returns_none() {
        let mut table: InstanceTable<i32> = InstanceTable::new();
        assert_eq!(table.get(999), None);
        assert_eq!(table.remove(999), None);
    }

    #[test]
    fn drain_empties_but_keeps_ids_consumed() {
        let mut table = InstanceTable::new();
        for v in 0..4 {
            table.insert(v);
        }
        table.remove(1);
        let drained: Vec<_> = table.drain().into_iter().map(|(id, _)| id).collect();
        assert_eq!(drained, vec![0, 2, 3]);
        assert!(table.is_empty());
        assert_eq!(table.insert(9), Some(4));
    }

    proptest! {
        #[test]
        fn ids_are_strictly_increasing(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let mut table = InstanceTable::new();
            let mut last: Option<u32> = None;
            for insert in ops {
                if insert || table.is_empty() {
                    let id = table.insert(()).unwrap();
                    if let Some(prev) = last {
                        prop_assert!(id > prev);
                    }
                    last = Some(id);
                } else if let Some(prev) = last {
                    table.remove(prev);
                }
            }
        }
    }
}
