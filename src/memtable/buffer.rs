//! Write buffer implementation
//!
//! Arena-backed append buffer and its sealed, immutable form.

use std::mem;

use super::{BufferIter, BufferPolicy};

/// Location of one entry in the arena: key bytes followed by value bytes
#[derive(Debug, Clone, Copy)]
pub(super) struct Slot {
    offset: usize,
    key_len: u32,
    value_len: u32,
}

impl Slot {
    fn key<'a>(&self, arena: &'a [u8]) -> &'a [u8] {
        &arena[self.offset..self.offset + self.key_len as usize]
    }

    fn value<'a>(&self, arena: &'a [u8]) -> &'a [u8] {
        let start = self.offset + self.key_len as usize;
        &arena[start..start + self.value_len as usize]
    }
}

/// Mutable staging table for one (partition, epoch)
#[derive(Debug, Default)]
pub struct WriteBuffer {
    arena: Vec<u8>,
    slots: Vec<Slot>,
    policy: BufferPolicy,
}

impl WriteBuffer {
    /// Create an empty buffer that sorts and merges duplicate keys
    pub fn new() -> Self {
        Self::with_policy(BufferPolicy::default())
    }

    /// Create an empty buffer with the given ordering policy
    pub fn with_policy(policy: BufferPolicy) -> Self {
        Self {
            arena: Vec::new(),
            slots: Vec::new(),
            policy,
        }
    }

    /// Pre-size the buffer for roughly `entries` entries of `entry_bytes` each
    pub fn reserve(&mut self, entries: usize, entry_bytes: usize) {
        self.slots.reserve(entries);
        self.arena.reserve(entries.saturating_mul(entry_bytes));
    }

    /// Append an entry
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        let offset = self.arena.len();
        self.arena.extend_from_slice(key);
        self.arena.extend_from_slice(value);
        self.slots.push(Slot {
            offset,
            key_len: key.len() as u32,
            value_len: value.len() as u32,
        });
    }

    /// Entries added so far (before any merging)
    pub fn num_entries(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Key and value bytes held (the quantity charged against the budget)
    pub fn bytes(&self) -> usize {
        self.arena.len()
    }

    /// Approximate heap footprint including per-entry bookkeeping
    pub fn memory_usage(&self) -> usize {
        self.arena.capacity() + self.slots.capacity() * mem::size_of::<Slot>()
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// Seal the buffer: order entries and apply the dedup policy
    pub fn finish(self) -> SealedBuffer {
        let WriteBuffer {
            mut arena,
            mut slots,
            policy,
        } = self;

        if !policy.skip_sort {
            // Stable: equal keys keep insertion order
            slots.sort_by(|a, b| a.key(&arena).cmp(b.key(&arena)));
        }

        if policy.unique_keys {
            slots = merge_duplicates(&mut arena, slots);
        }

        SealedBuffer { arena, slots }
    }
}

/// Collapse runs of adjacent equal keys into one slot whose value is the
/// concatenation of the run's values. Merged entries are re-appended to the
/// arena; untouched slots keep pointing at their original bytes.
fn merge_duplicates(arena: &mut Vec<u8>, slots: Vec<Slot>) -> Vec<Slot> {
    let mut merged = Vec::with_capacity(slots.len());
    let mut i = 0;
    while i < slots.len() {
        let mut j = i + 1;
        while j < slots.len() && slots[j].key(arena) == slots[i].key(arena) {
            j += 1;
        }
        if j - i == 1 {
            merged.push(slots[i]);
        } else {
            let key = slots[i].key(arena).to_vec();
            let mut value = Vec::new();
            for slot in &slots[i..j] {
                value.extend_from_slice(slot.value(arena));
            }
            let offset = arena.len();
            arena.extend_from_slice(&key);
            arena.extend_from_slice(&value);
            merged.push(Slot {
                offset,
                key_len: key.len() as u32,
                value_len: value.len() as u32,
            });
        }
        i = j;
    }
    merged
}

/// Immutable, ordered view of a finished write buffer
#[derive(Debug, Default)]
pub struct SealedBuffer {
    arena: Vec<u8>,
    slots: Vec<Slot>,
}

impl SealedBuffer {
    /// Logical entries after merging
    pub fn num_entries(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Key and value bytes held
    pub fn bytes(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.key_len as usize + s.value_len as usize)
            .sum()
    }

    /// Create a cursor over the entries. Cursors do not mutate the buffer;
    /// any number may coexist.
    pub fn iter(&self) -> BufferIter<'_> {
        BufferIter::new(self)
    }

    /// Entries in order, as a plain iterator
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.slots
            .iter()
            .map(move |s| (s.key(&self.arena), s.value(&self.arena)))
    }

    pub(super) fn key_at(&self, index: usize) -> &[u8] {
        self.slots[index].key(&self.arena)
    }

    pub(super) fn value_at(&self, index: usize) -> &[u8] {
        self.slots[index].value(&self.arena)
    }
}
