//! A chained hash map over byte-string keys with incremental rehashing.
//!
//! Growing a hash table all at once stalls every caller behind a full
//! re-insertion of its contents. [`Dict`] instead keeps two slot arrays
//! while it grows: inserts go to the newer array, and every public
//! operation first migrates a bounded batch of entries out of the older
//! one. The worst-case cost of any single operation is therefore bounded
//! by the migration batch size, independent of the table size.

use std::hash::Hasher;

// capacity of the first allocated slot array
const MIN_CAPACITY: usize = 4;

// a table is promoted once it holds this many entries per slot
const MAX_LOAD_FACTOR: usize = 8;

// entries migrated from the older table per public operation
const REHASH_WORK: usize = 128;

/// Fowler–Noll–Vo style non-cryptographic hash over the key bytes.
///
/// Mixing is done in 32-bit arithmetic; the widened value keeps the
/// high 32 bits zero.
struct FnvHasher {
    hash: u32,
}

impl FnvHasher {
    const OFFSET_BASIS: u32 = 0x811C_9DC5;
    const PRIME: u32 = 0x0100_0193;

    fn new() -> Self {
        FnvHasher {
            hash: FnvHasher::OFFSET_BASIS,
        }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        u64::from(self.hash)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.hash = self
                .hash
                .wrapping_add(u32::from(byte))
                .wrapping_mul(FnvHasher::PRIME);
        }
    }
}

fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write(key);
    hasher.finish()
}

/// a chain link; the head link lives in a slot, the rest inside nodes
type Link = Option<Box<Node>>;

struct Node {
    next: Link,
    hash: u64,
    key: Vec<u8>,
    value: Vec<u8>,
}

/// A single slot array with singly-linked chains rooted at each slot.
///
/// An unallocated table is represented by an empty slot vector.
struct Table {
    slots: Vec<Link>,
    mask: usize,
    len: usize,
}

impl Table {
    fn unallocated() -> Table {
        Table {
            slots: Vec::new(),
            mask: 0,
            len: 0,
        }
    }

    fn with_capacity(capacity: usize) -> Table {
        debug_assert!(capacity >= MIN_CAPACITY && capacity.is_power_of_two());
        Table {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            mask: capacity - 1,
            len: 0,
        }
    }

    fn is_allocated(&self) -> bool {
        !self.slots.is_empty()
    }

    /// pushes a node at the head of its chain in O(1)
    fn push(&mut self, mut node: Box<Node>) {
        let pos = (node.hash as usize) & self.mask;
        node.next = self.slots[pos].take();
        self.slots[pos] = Some(node);
        self.len += 1;
    }

    fn find(&self, hash: u64, key: &[u8]) -> Option<&Node> {
        if !self.is_allocated() {
            return None;
        }
        let pos = (hash as usize) & self.mask;
        let mut cur = self.slots[pos].as_deref();
        while let Some(node) = cur {
            // the hash comparison filters almost all non-matching keys
            // before the byte-wise compare
            if node.hash == hash && node.key == key {
                return Some(node);
            }
            cur = node.next.as_deref();
        }
        None
    }

    fn find_mut(&mut self, hash: u64, key: &[u8]) -> Option<&mut Node> {
        if !self.is_allocated() {
            return None;
        }
        let pos = (hash as usize) & self.mask;
        let mut cur = self.slots[pos].as_deref_mut();
        while let Some(node) = cur {
            if node.hash == hash && node.key == key {
                return Some(node);
            }
            cur = node.next.as_deref_mut();
        }
        None
    }

    /// Unlinks and returns the matching node.
    ///
    /// The walk advances the mutable reference to the link that owns the
    /// current node, so rewiring on a match is a single pointer swap.
    fn detach(&mut self, hash: u64, key: &[u8]) -> Option<Box<Node>> {
        if !self.is_allocated() {
            return None;
        }
        let pos = (hash as usize) & self.mask;
        let mut link = &mut self.slots[pos];
        loop {
            match link {
                None => return None,
                Some(node) if node.hash == hash && node.key == key => break,
                Some(node) => link = &mut node.next,
            }
        }
        let mut node = link.take()?;
        *link = node.next.take();
        self.len -= 1;
        Some(node)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        // unlink chains iteratively; the derived recursive drop would
        // overflow the stack on a sufficiently long chain
        for slot in &mut self.slots {
            let mut cur = slot.take();
            while let Some(mut node) = cur {
                cur = node.next.take();
            }
        }
    }
}

/// A byte-string map that spreads the cost of growing over many operations.
///
/// Entries live in one of two slot arrays. In the steady state only the
/// newer array is allocated. When an insert pushes the newer array past
/// eight entries per slot it is demoted to the older array and a doubled
/// replacement takes its place; from then on every public operation moves
/// up to 128 entries across before doing its own work, until the older
/// array drains and its storage is released.
///
/// Lookups and removals probe the newer array first, then the older one,
/// so a key is found regardless of which side of the migration currently
/// holds it.
pub struct Dict {
    newer: Table,
    older: Table,
    migrate_pos: usize,
}

impl Dict {
    /// creates an empty map; no slots are allocated until the first insert
    pub fn new() -> Dict {
        Dict {
            newer: Table::unallocated(),
            older: Table::unallocated(),
            migrate_pos: 0,
        }
    }

    /// total number of entries across both slot arrays
    pub fn len(&self) -> usize {
        self.newer.len + self.older.len
    }

    /// returns true if the map holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value stored for `key`, or `None` if absent.
    ///
    /// Like every public operation this performs a bounded migration step
    /// as a side effect, which is why it takes `&mut self`.
    pub fn get(&mut self, key: &[u8]) -> Option<&[u8]> {
        self.help_rehash();
        let hash = hash_key(key);
        if let Some(node) = self.newer.find(hash, key) {
            return Some(&node.value);
        }
        self.older.find(hash, key).map(|node| node.value.as_slice())
    }

    /// returns a mutable reference to the value stored for `key`
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Vec<u8>> {
        self.help_rehash();
        let hash = hash_key(key);
        if let Some(node) = self.newer.find_mut(hash, key) {
            return Some(&mut node.value);
        }
        self.older.find_mut(hash, key).map(|node| &mut node.value)
    }

    /// Inserts a new entry.
    ///
    /// The key must not already be present; callers that replace values
    /// look the key up first and write through [`get_mut`].
    ///
    /// [`get_mut`]: Dict::get_mut
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        if !self.newer.is_allocated() {
            self.newer = Table::with_capacity(MIN_CAPACITY);
        }
        let hash = hash_key(&key);
        self.newer.push(Box::new(Node {
            next: None,
            hash,
            key,
            value,
        }));

        if !self.older.is_allocated() {
            let threshold = (self.newer.mask + 1) * MAX_LOAD_FACTOR;
            if self.newer.len >= threshold {
                self.promote();
            }
        }
        self.help_rehash();
    }

    /// Removes `key` and returns its value, or `None` if absent.
    ///
    /// The entry's storage moves out of the map; dropping the returned
    /// value releases it.
    pub fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.help_rehash();
        let hash = hash_key(key);
        if let Some(node) = self.newer.detach(hash, key) {
            return Some(node.value);
        }
        self.older.detach(hash, key).map(|node| node.value)
    }

    /// drops both slot arrays, and every entry with them, returning the
    /// map to its zero state
    pub fn clear(&mut self) {
        self.newer = Table::unallocated();
        self.older = Table::unallocated();
        self.migrate_pos = 0;
    }

    /// demotes the newer table and allocates a doubled replacement
    fn promote(&mut self) {
        debug_assert!(!self.older.is_allocated());
        let capacity = (self.newer.mask + 1) * 2;
        self.older = std::mem::replace(&mut self.newer, Table::with_capacity(capacity));
        self.migrate_pos = 0;
    }

    /// Moves up to `REHASH_WORK` entries from the older table into the
    /// newer one, then releases the older table's storage once it drains.
    ///
    /// Slots below `migrate_pos` are empty, so the cursor never revisits
    /// them; skipping an empty slot does not count as migration work.
    fn help_rehash(&mut self) {
        let mut moved = 0;
        while moved < REHASH_WORK && self.older.len > 0 {
            let link = &mut self.older.slots[self.migrate_pos];
            if let Some(mut node) = link.take() {
                *link = node.next.take();
                self.older.len -= 1;
                self.newer.push(node);
                moved += 1;
            } else {
                self.migrate_pos += 1;
            }
        }
        if self.older.len == 0 && self.older.is_allocated() {
            self.older = Table::unallocated();
        }
    }
}

impl Default for Dict {
    fn default() -> Dict {
        Dict::new()
    }
}
