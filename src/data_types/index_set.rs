use bit_vec::BitVec;

/// A set of small non-negative integers (usually read ids), backed by a bit vector.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexSet {
    /// the membership bits, grows on demand
    bits: BitVec,
    /// cached number of set bits
    count: usize
}

impl Default for IndexSet {
    fn default() -> Self {
        IndexSet::new()
    }
}

impl IndexSet {
    pub fn new() -> IndexSet {
        IndexSet {
            bits: BitVec::new(),
            count: 0
        }
    }

    /// Adds an index, returns true if it was not already present
    pub fn add(&mut self, index: usize) -> bool {
        if index >= self.bits.len() {
            self.bits.grow(index + 1 - self.bits.len(), false);
        }
        if self.bits[index] {
            false
        } else {
            self.bits.set(index, true);
            self.count += 1;
            true
        }
    }

    /// Removes an index, returns true if it was present
    pub fn remove(&mut self, index: usize) -> bool {
        if self.contains(index) {
            self.bits.set(index, false);
            self.count -= 1;
            true
        } else {
            false
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.bits.get(index).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterates over the members in increasing order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter()
            .enumerate()
            .filter_map(|(i, b)| if b { Some(i) } else { None })
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut index_set = IndexSet::new();
        for index in iter {
            index_set.add(index);
        }
        index_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_set() {
        let mut index_set = IndexSet::new();
        assert!(index_set.is_empty());
        assert!(index_set.add(5));
        assert!(index_set.add(1));
        assert!(!index_set.add(5));
        assert_eq!(index_set.len(), 2);
        assert!(index_set.contains(1));
        assert!(!index_set.contains(2));
        assert!(!index_set.contains(1000));
        assert_eq!(index_set.iter().collect::<Vec<usize>>(), vec![1, 5]);

        assert!(index_set.remove(1));
        assert!(!index_set.remove(1));
        assert_eq!(index_set.len(), 1);

        let collected: IndexSet = vec![3, 3, 0].into_iter().collect();
        assert_eq!(collected.iter().collect::<Vec<usize>>(), vec![0, 3]);
    }
}
