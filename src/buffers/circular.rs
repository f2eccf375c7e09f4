//! Fixed-capacity ring buffer, oldest element first.

/// Ring of at most `capacity` elements.
///
/// `head` is the oldest element, `tail` the next write position and `size`
/// the number of live elements. Once full, every insert overwrites the
/// oldest element and advances both `head` and `tail`. Index 0 is always the
/// oldest element regardless of the physical layout.
#[derive(Debug, Clone)]
pub struct CircularBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    head: usize,
    tail: usize,
    size: usize,
}

impl<T> CircularBuffer<T> {
    /// Create an empty ring. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            tail: 0,
            size: 0,
        }
    }

    /// Append `item`, evicting the oldest element when full.
    pub fn push(&mut self, item: T) {
        if self.data.len() < self.capacity {
            self.data.push(item);
        } else {
            self.data[self.tail] = item;
        }
        self.tail = (self.tail + 1) % self.capacity;
        if self.size < self.capacity {
            self.size += 1;
        } else {
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Element `index` positions after the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        (index < self.size).then(|| &self.data[(self.head + index) % self.capacity])
    }

    /// Most recently inserted element.
    pub fn last(&self) -> Option<&T> {
        self.size.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Number of live elements.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Maximum number of elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True when no element has been inserted since creation or reset.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// True once inserts start evicting.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Return to the empty state.
    pub fn reset(&mut self) {
        self.data.clear();
        self.head = 0;
        self.tail = 0;
        self.size = 0;
    }

    /// Elements from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.size).map(move |i| &self.data[(self.head + i) % self.capacity])
    }
}

impl<T: Clone> CircularBuffer<T> {
    /// Copy of the contents, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<X, Y> CircularBuffer<(X, Y)> {
    /// Append an `(x, y)` pair.
    pub fn add(&mut self, x: X, y: Y) {
        self.push((x, y));
    }
}
