use std::cmp::min;
use std::ops::Index;

use log::debug;

use crate::utils::MyHash;

#[derive(Clone, Default)]
struct Entry<T> {
    value: T,
    next: usize,
}

/// Hash-consing table: every distinct value is stored once and addressed by
/// a stable index. Index 0 is a sentry and never holds a value.
pub struct Table<T> {
    data: Vec<Entry<T>>,

    buckets: Vec<usize>,
    bitmask: u64,

    /// Index of the last occupied cell.
    last_index: usize,
    /// Fraction of cells that must stay free before the table doubles.
    min_free: f64,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with `2^bits` initial cells.
    pub fn new(bits: usize, min_free: f64) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");
        assert!(
            (0.0..1.0).contains(&min_free),
            "Minimum free fraction should be in the range [0, 1)"
        );

        let capacity = 1 << bits;
        let mut data: Vec<Entry<T>> = Vec::with_capacity(capacity);
        data.resize_with(capacity, Entry::default);

        let buckets_bits = min(bits, 16);
        let buckets_size = 1 << buckets_bits;
        let buckets = vec![0; buckets_size];
        let bitmask = (buckets_size - 1) as u64;

        Self {
            data,
            buckets,
            bitmask,
            last_index: 0,
            min_free,
        }
    }

    fn grow(&mut self) {
        let new_capacity = (self.data.len() * 2).max(2);
        debug!("Growing node table from {} to {} cells", self.data.len(), new_capacity);
        self.data.resize_with(new_capacity, Entry::default);
    }

    /// Allocate a new cell in the table and return its index.
    pub(crate) fn alloc(&mut self) -> usize {
        let used = (self.last_index + 1) as f64;
        if used >= self.data.len() as f64 * (1.0 - self.min_free) || self.last_index + 1 >= self.data.len() {
            self.grow();
        }
        self.last_index += 1;
        self.last_index
    }

    /// Add a new value to the table and return its index.
    pub fn add(&mut self, value: T) -> usize {
        let index = self.alloc();

        self.data[index].value = value;
        self.data[index].next = 0;

        index
    }
}

impl<T> Table<T> {
    /// Get the number of cells currently allocated.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
    /// Get the index of the last occupied cell.
    pub fn size(&self) -> usize {
        self.last_index
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        assert!(index <= self.last_index, "Index {} is not occupied", index);
        &self.data[index].value
    }

    /// Get the index of the next cell in the same bucket.
    pub fn next(&self, index: usize) -> usize {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next
    }
    /// Set the index of the next cell in the same bucket.
    pub fn set_next(&mut self, index: usize, next: usize) {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].next = next;
    }
}

impl<T> Table<T>
where
    T: MyHash + Default,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Put a value into the table, returning the index of the existing copy
    /// if there is one.
    pub fn put(&mut self, value: T) -> usize
    where
        T: Eq,
    {
        let bucket_index = self.bucket_index(&value);
        let mut index = self.buckets[bucket_index];

        if index == 0 {
            let i = self.add(value);
            self.buckets[bucket_index] = i;
            return i;
        }

        loop {
            assert!(index > 0);

            if &value == self.value(index) {
                return index;
            }

            let next = self.next(index);

            if next == 0 {
                let i = self.add(value);
                self.set_next(index, i);
                return i;
            } else {
                index = next;
            }
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}
