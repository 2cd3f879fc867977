use crate::profiling::profile_function;
use std::num::NonZeroU64;

/// A generational index into a [`SparseSet`].
///
/// The low 32 bits hold the slot index and the high 32 bits the generation
/// the slot had when the value was inserted. A stale slot (one whose value
/// was removed) never resolves to the value that later reuses the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexSlot(NonZeroU64);

impl IndexSlot {
    pub fn new(generation: u32, idx: u32) -> Self {
        let packed = (u64::from(generation) << 32) | u64::from(idx);
        Self(NonZeroU64::MIN.saturating_add(packed))
    }

    pub fn generation(&self) -> u32 {
        ((self.0.get() - 1) >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        ((self.0.get() - 1) & u64::from(u32::MAX)) as u32
    }

    /// The packed representation, useful as an opaque integer id.
    pub fn to_bits(&self) -> u64 {
        self.0.get()
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// An arena of values addressed by [`IndexSlot`].
///
/// Removed slots are recycled; each reuse bumps the slot's generation.
pub struct SparseSet<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SparseSet<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn push(&mut self, value: T) -> IndexSlot {
        profile_function!();
        self.len += 1;
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.value = Some(value);
            IndexSlot::new(slot.generation, idx)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            IndexSlot::new(0, idx)
        }
    }

    fn live_slot(&self, idx: IndexSlot) -> Option<&Slot<T>> {
        self.slots
            .get(idx.index() as usize)
            .filter(|slot| slot.generation == idx.generation() && slot.value.is_some())
    }

    /// Get a value, panicking on a stale or out-of-range slot.
    pub fn get(&self, idx: IndexSlot) -> &T {
        self.try_get(idx)
            .unwrap_or_else(|| panic!("invalid generation, use after free! ({idx:?})"))
    }

    /// Get a value mutably, panicking on a stale or out-of-range slot.
    pub fn get_mut(&mut self, idx: IndexSlot) -> &mut T {
        self.try_get_mut(idx)
            .unwrap_or_else(|| panic!("invalid generation, use after free! ({idx:?})"))
    }

    pub fn try_get(&self, idx: IndexSlot) -> Option<&T> {
        self.live_slot(idx).and_then(|slot| slot.value.as_ref())
    }

    pub fn try_get_mut(&mut self, idx: IndexSlot) -> Option<&mut T> {
        self.slots
            .get_mut(idx.index() as usize)
            .filter(|slot| slot.generation == idx.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, idx: IndexSlot) -> bool {
        self.live_slot(idx).is_some()
    }

    /// Remove a value, panicking on a stale or out-of-range slot.
    pub fn remove(&mut self, idx: IndexSlot) -> T {
        self.try_remove(idx)
            .unwrap_or_else(|| panic!("invalid generation, use after free! ({idx:?})"))
    }

    /// Remove a value if the slot is still live.
    pub fn try_remove(&mut self, idx: IndexSlot) -> Option<T> {
        profile_function!();
        let index = idx.index();
        let slot = self
            .slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == idx.generation())?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    /// Remove every value, yielding them with the slot they occupied.
    pub fn drain(&mut self) -> Vec<(IndexSlot, T)> {
        let mut drained = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                drained.push((IndexSlot::new(slot.generation, index as u32), value));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
        drained
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (IndexSlot, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (IndexSlot::new(slot.generation, index as u32), value))
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }
}

static_assertions::assert_eq_size!(IndexSlot, Option<IndexSlot>);
