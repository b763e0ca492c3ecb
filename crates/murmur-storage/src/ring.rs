//! Fixed-capacity ring store
//!
//! The hot-path view of a room: the most recent `capacity` messages in
//! insertion order. Storage is a slot arena allocated once; when the store is
//! full an insert overwrites the oldest slot and hands the evicted value back
//! to the caller. The store never emits events of its own.

/// Fixed-capacity FIFO buffer with oldest-first eviction
#[derive(Debug, Clone)]
pub struct RingStore<T> {
    /// Slot arena; exactly `capacity` entries, `Some` for the live range
    slots: Vec<Option<T>>,
    /// Index of the oldest live slot
    head: usize,
    /// Number of live slots
    len: usize,
}

impl<T> RingStore<T> {
    /// Create an empty store holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring store capacity must be non-zero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    /// Insert an item, evicting and returning the oldest one if full
    pub fn insert(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        if self.len < capacity {
            let idx = (self.head + self.len) % capacity;
            self.slots[idx] = Some(item);
            self.len += 1;
            None
        } else {
            let evicted = self.slots[self.head].replace(item);
            self.head = (self.head + 1) % capacity;
            evicted
        }
    }

    /// Iterate over the live items, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % capacity].as_ref())
    }

    /// Maximum number of items
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Current number of items
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the store holds no items
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the next insert will evict
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// The oldest item, if any
    pub fn oldest(&self) -> Option<&T> {
        self.iter().next()
    }

    /// The most recently inserted item, if any
    pub fn newest(&self) -> Option<&T> {
        self.iter().next_back()
    }

    /// Remove every item, keeping the allocation
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}

impl<T: Clone> RingStore<T> {
    /// Up to the last `k` items, oldest first
    ///
    /// `k == 0` yields nothing; `k` larger than the length yields everything.
    pub fn tail(&self, k: usize) -> Vec<T> {
        let k = k.min(self.len);
        self.iter().skip(self.len - k).cloned().collect()
    }

    /// Full current contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
