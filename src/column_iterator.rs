
use crate::data_types::read_set::{Entry, ReadSet};

use bio::data_structures::interval_tree::IntervalTree;

/// All the entries active at one position of the sweep
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Column {
    /// index of the column in the position list
    index: usize,
    /// genomic position of the column
    position: u32,
    /// one entry per active read, sorted by read id; reads spanning the position without a call have a Blank entry
    entries: Vec<Entry>
}

impl Column {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Active read ids in increasing order
    pub fn read_ids(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.read_id()).collect()
    }
}

/// The column layout of a read set: which column range each read is active over
struct ColumnLayout {
    /// the column positions, sorted and unique
    positions: Vec<u32>,
    /// per read id, the first and last column with an informative entry
    spans: Vec<Option<(usize, usize)>>,
    /// per column, the reads whose span begins there
    starts: Vec<Vec<usize>>,
    /// per column, the reads whose span ends there
    ends: Vec<Vec<usize>>,
    /// read spans in column coordinates, for random access
    span_tree: IntervalTree<usize, usize>
}

impl ColumnLayout {
    fn new(read_set: &ReadSet, positions: &[u32]) -> ColumnLayout {
        let mut positions: Vec<u32> = positions.to_vec();
        positions.sort_unstable();
        positions.dedup();

        let num_columns = positions.len();
        let mut spans: Vec<Option<(usize, usize)>> = vec![None; read_set.len()];
        let mut starts: Vec<Vec<usize>> = vec![vec![]; num_columns];
        let mut ends: Vec<Vec<usize>> = vec![vec![]; num_columns];
        let mut span_tree: IntervalTree<usize, usize> = IntervalTree::new();

        for read in read_set.iter() {
            // informative entries that land on one of our columns
            let mut columns = read.informative_entries()
                .filter_map(|e| positions.binary_search(&e.position()).ok());
            if let Some(first) = columns.next() {
                let last = columns.last().unwrap_or(first);
                spans[read.id()] = Some((first, last));
                starts[first].push(read.id());
                ends[last].push(read.id());
                span_tree.insert(first..(last + 1), read.id());
            }
        }

        ColumnLayout {
            positions,
            spans,
            starts,
            ends,
            span_tree
        }
    }

    /// Builds the column at `index` given the sorted active read ids
    fn build_column(&self, read_set: &ReadSet, index: usize, active: &[usize]) -> Column {
        let position = self.positions[index];
        let entries: Vec<Entry> = active.iter()
            .map(|&read_id| {
                read_set.get(read_id).entry_at(position)
                    .cloned()
                    .unwrap_or_else(|| Entry::blank(read_id, position))
            })
            .collect();
        Column {
            index,
            position,
            entries
        }
    }

    fn column_at(&self, read_set: &ReadSet, index: usize) -> Column {
        let mut active: Vec<usize> = self.span_tree.find(index..(index + 1))
            .map(|entry| *entry.data())
            .collect();
        active.sort_unstable();
        self.build_column(read_set, index, &active)
    }
}

/// Sweeps over the columns of a read set from the first position to the last.
/// A read is active from the column of its first informative entry through the column of its last one.
pub struct ColumnIterator<'a> {
    /// the reads being swept
    read_set: &'a ReadSet,
    /// pre-computed read spans
    layout: ColumnLayout,
    /// currently active read ids, sorted
    active: Vec<usize>,
    /// index of the next column to produce
    next_column: usize
}

impl<'a> ColumnIterator<'a> {
    /// Sweeps over every position with at least one informative entry
    pub fn new(read_set: &'a ReadSet) -> ColumnIterator<'a> {
        ColumnIterator::with_positions(read_set, read_set.positions())
    }

    /// Sweeps over a caller-provided list of positions; entries at any other position are ignored.
    /// # Arguments
    /// * `read_set` - the reads to sweep over
    /// * `positions` - the column positions, will be sorted and de-duplicated
    pub fn with_positions(read_set: &'a ReadSet, positions: &[u32]) -> ColumnIterator<'a> {
        ColumnIterator {
            read_set,
            layout: ColumnLayout::new(read_set, positions),
            active: vec![],
            next_column: 0
        }
    }

    pub fn num_columns(&self) -> usize {
        self.layout.positions.len()
    }

    pub fn positions(&self) -> &[u32] {
        &self.layout.positions
    }

    /// First and last column of a read, None if the read has no informative entry on any column
    pub fn read_span(&self, read_id: usize) -> Option<(usize, usize)> {
        self.layout.spans.get(read_id).cloned().flatten()
    }

    /// Builds a single column without sweeping
    pub fn column_at(&self, index: usize) -> Column {
        self.layout.column_at(self.read_set, index)
    }

    /// Restarts the sweep at the first column
    pub fn reset(&mut self) {
        self.active.clear();
        self.next_column = 0;
    }

    /// Converts into a sweep over the same columns in reverse order
    pub fn backward(self) -> BackwardColumnIterator<'a> {
        BackwardColumnIterator {
            read_set: self.read_set,
            next_column: self.layout.positions.len(),
            layout: self.layout,
            active: vec![]
        }
    }
}

impl Iterator for ColumnIterator<'_> {
    type Item = Column;

    fn next(&mut self) -> Option<Column> {
        let index = self.next_column;
        if index >= self.layout.positions.len() {
            return None;
        }
        self.next_column += 1;

        if index > 0 {
            let ended = &self.layout.ends[index - 1];
            if !ended.is_empty() {
                self.active.retain(|read_id| !ended.contains(read_id));
            }
        }
        let started = &self.layout.starts[index];
        if !started.is_empty() {
            self.active.extend(started.iter().cloned());
            self.active.sort_unstable();
        }
        Some(self.layout.build_column(self.read_set, index, &self.active))
    }
}

/// Sweeps over the columns of a read set from the last position to the first, producing the same columns as ColumnIterator in reverse
pub struct BackwardColumnIterator<'a> {
    /// the reads being swept
    read_set: &'a ReadSet,
    /// pre-computed read spans
    layout: ColumnLayout,
    /// currently active read ids, sorted
    active: Vec<usize>,
    /// one past the index of the next column to produce
    next_column: usize
}

impl<'a> BackwardColumnIterator<'a> {
    pub fn new(read_set: &'a ReadSet) -> BackwardColumnIterator<'a> {
        ColumnIterator::new(read_set).backward()
    }

    pub fn with_positions(read_set: &'a ReadSet, positions: &[u32]) -> BackwardColumnIterator<'a> {
        ColumnIterator::with_positions(read_set, positions).backward()
    }

    pub fn num_columns(&self) -> usize {
        self.layout.positions.len()
    }

    pub fn positions(&self) -> &[u32] {
        &self.layout.positions
    }

    pub fn column_at(&self, index: usize) -> Column {
        self.layout.column_at(self.read_set, index)
    }
}

impl Iterator for BackwardColumnIterator<'_> {
    type Item = Column;

    fn next(&mut self) -> Option<Column> {
        if self.next_column == 0 {
            return None;
        }
        self.next_column -= 1;
        let index = self.next_column;

        if index + 1 < self.layout.positions.len() {
            let ended = &self.layout.starts[index + 1];
            if !ended.is_empty() {
                self.active.retain(|read_id| !ended.contains(read_id));
            }
        }
        let started = &self.layout.ends[index];
        if !started.is_empty() {
            self.active.extend(started.iter().cloned());
            self.active.sort_unstable();
        }
        Some(self.layout.build_column(self.read_set, index, &self.active))
    }
}
