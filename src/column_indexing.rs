
use crate::column_iterator::Column;
use crate::errors::{CapacityKind, PhasingError};
use crate::graycode::{GrayCodes, MAX_GRAYCODE_WIDTH};

/// The enumerable state space of one column: bit `b` of an index is the haplotype side of the `b`-th active read
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnIndexingScheme {
    /// the column this scheme belongs to
    column: usize,
    /// genomic position of the column, used in error reporting
    position: u32,
    /// the active read ids, sorted
    read_ids: Vec<usize>
}

impl ColumnIndexingScheme {
    /// Creates the scheme for a column.
    /// # Arguments
    /// * `column` - the column to index
    /// * `max_reads` - the maximum number of simultaneously active reads
    /// # Errors
    /// * if the column has more than `max_reads` active reads
    pub fn new(column: &Column, max_reads: usize) -> Result<ColumnIndexingScheme, PhasingError> {
        ColumnIndexingScheme::from_read_ids(column.index(), column.position(), column.read_ids(), max_reads)
    }

    pub fn from_read_ids(column: usize, position: u32, mut read_ids: Vec<usize>, max_reads: usize) -> Result<ColumnIndexingScheme, PhasingError> {
        // indices are stored in a usize, so the Gray-code width bounds the limit as well
        let max_reads = max_reads.min(MAX_GRAYCODE_WIDTH);
        if read_ids.len() > max_reads {
            return Err(PhasingError::CapacityExceeded {
                what: CapacityKind::ActiveReads,
                position,
                observed: read_ids.len(),
                limit: max_reads
            });
        }
        read_ids.sort_unstable();
        read_ids.dedup();
        Ok(ColumnIndexingScheme {
            column,
            position,
            read_ids
        })
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn read_ids(&self) -> &[usize] {
        &self.read_ids
    }

    /// Number of active reads, i.e. the number of bits in an index
    pub fn num_reads(&self) -> usize {
        self.read_ids.len()
    }

    /// Number of indices, `2^num_reads`
    pub fn size(&self) -> usize {
        1 << self.read_ids.len()
    }

    /// Returns the bit that encodes a given read
    pub fn bit_of(&self, read_id: usize) -> Option<usize> {
        self.read_ids.binary_search(&read_id).ok()
    }

    /// Iterates over all indices in Gray-code order without tracking any projection
    pub fn iter(&self) -> ColumnIndexingIterator<'_> {
        ColumnIndexingIterator::new(self.read_ids.len(), &[])
    }

    /// Iterates over all indices in Gray-code order while maintaining the projection described by `projection_bits`
    pub fn iter_projected<'a>(&self, projection_bits: &'a [Option<usize>]) -> ColumnIndexingIterator<'a> {
        debug_assert_eq!(projection_bits.len(), self.read_ids.len());
        ColumnIndexingIterator::new(self.read_ids.len(), projection_bits)
    }
}

/// Relates two adjacent schemes through the reads they share.
/// Both schemes project their indices onto a compact space with one bit per shared read (in read id order).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnLink {
    /// number of shared reads
    num_shared: usize,
    /// for each bit of the previous scheme, the projection bit (None if the read leaves)
    previous_bits: Vec<Option<usize>>,
    /// for each bit of the next scheme, the projection bit (None if the read joins)
    next_bits: Vec<Option<usize>>
}

impl ColumnLink {
    pub fn new(previous: &ColumnIndexingScheme, next: &ColumnIndexingScheme) -> ColumnLink {
        let mut previous_bits: Vec<Option<usize>> = vec![None; previous.num_reads()];
        let mut next_bits: Vec<Option<usize>> = vec![None; next.num_reads()];
        let mut num_shared: usize = 0;

        // both lists are sorted, so a single merge finds the shared reads in order
        let (mut i, mut j) = (0, 0);
        while i < previous.read_ids.len() && j < next.read_ids.len() {
            match previous.read_ids[i].cmp(&next.read_ids[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    previous_bits[i] = Some(num_shared);
                    next_bits[j] = Some(num_shared);
                    num_shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }

        ColumnLink {
            num_shared,
            previous_bits,
            next_bits
        }
    }

    /// The link for the first column, which shares nothing with a predecessor
    pub fn initial(next: &ColumnIndexingScheme) -> ColumnLink {
        ColumnLink {
            num_shared: 0,
            previous_bits: vec![],
            next_bits: vec![None; next.num_reads()]
        }
    }

    pub fn num_shared(&self) -> usize {
        self.num_shared
    }

    /// Number of projected indices, `2^num_shared`
    pub fn projection_size(&self) -> usize {
        1 << self.num_shared
    }

    /// True when both schemes have exactly the same reads
    pub fn is_identity(&self) -> bool {
        self.previous_bits.len() == self.num_shared && self.next_bits.len() == self.num_shared
    }

    pub fn previous_bits(&self) -> &[Option<usize>] {
        &self.previous_bits
    }

    pub fn next_bits(&self) -> &[Option<usize>] {
        &self.next_bits
    }

    /// Projects an index of the previous scheme
    pub fn project_previous(&self, index: usize) -> usize {
        project(index, &self.previous_bits)
    }

    /// Projects an index of the next scheme
    pub fn project_next(&self, index: usize) -> usize {
        project(index, &self.next_bits)
    }

    /// Gray-code walk over the previous scheme, tracking the projection
    pub fn iter_previous(&self) -> ColumnIndexingIterator<'_> {
        ColumnIndexingIterator::new(self.previous_bits.len(), &self.previous_bits)
    }

    /// Gray-code walk over the next scheme, tracking the projection
    pub fn iter_next(&self) -> ColumnIndexingIterator<'_> {
        ColumnIndexingIterator::new(self.next_bits.len(), &self.next_bits)
    }
}

fn project(index: usize, bits: &[Option<usize>]) -> usize {
    bits.iter().enumerate()
        .filter(|(b, _p)| (index >> b) & 1 == 1)
        .fold(0, |acc, (_b, p)| match p {
            Some(p) => acc | (1 << p),
            None => acc
        })
}

/// One step of a ColumnIndexingIterator
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnIndex {
    /// the index within the scheme
    pub index: usize,
    /// the bit (read) that flipped relative to the previous step, None on the first step
    pub changed_bit: Option<usize>,
    /// the index projected onto the shared reads
    pub projection: usize
}

/// Walks a scheme's indices in Gray-code order so that consecutive indices differ in one read
pub struct ColumnIndexingIterator<'a> {
    /// number of indices in the scheme
    size: usize,
    /// Gray-code rank of the next index
    rank: usize,
    /// per scheme bit, the projection bit; empty if no projection is tracked
    projection_bits: &'a [Option<usize>],
    /// current projection
    projection: usize
}

impl<'a> ColumnIndexingIterator<'a> {
    fn new(width: usize, projection_bits: &'a [Option<usize>]) -> ColumnIndexingIterator<'a> {
        ColumnIndexingIterator {
            size: 1 << width,
            rank: 0,
            projection_bits,
            projection: 0
        }
    }
}

impl Iterator for ColumnIndexingIterator<'_> {
    type Item = ColumnIndex;

    fn next(&mut self) -> Option<ColumnIndex> {
        if self.rank >= self.size {
            return None;
        }
        let rank = self.rank as u64;
        self.rank += 1;
        let code = GrayCodes::code_at(rank);
        let changed_bit = if rank == 0 { None } else { Some(GrayCodes::changed_bit_at(rank)) };
        if let Some(bit) = changed_bit {
            if let Some(Some(p)) = self.projection_bits.get(bit) {
                self.projection ^= 1 << p;
            }
        } else {
            self.projection = 0;
        }
        Some(ColumnIndex {
            index: code as usize,
            changed_bit,
            projection: self.projection
        })
    }
}

/// Carries the previous column's scheme through a sweep so each new scheme can be linked to it
#[derive(Clone, Debug)]
pub struct ColumnCursor {
    /// the scheme of the last column handed to `advance`
    previous: Option<ColumnIndexingScheme>,
    /// the maximum number of active reads per column
    max_reads: usize
}

impl ColumnCursor {
    pub fn new(max_reads: usize) -> ColumnCursor {
        ColumnCursor {
            previous: None,
            max_reads
        }
    }

    pub fn previous(&self) -> Option<&ColumnIndexingScheme> {
        self.previous.as_ref()
    }

    /// Moves the cursor to the next column, returning its scheme and the link to the previous one.
    /// # Errors
    /// * if the column has too many active reads
    pub fn advance(&mut self, column: &Column) -> Result<(ColumnIndexingScheme, ColumnLink), PhasingError> {
        let scheme = ColumnIndexingScheme::new(column, self.max_reads)?;
        let link = match self.previous.as_ref() {
            Some(previous) => ColumnLink::new(previous, &scheme),
            None => ColumnLink::initial(&scheme)
        };
        self.previous = Some(scheme.clone());
        Ok((scheme, link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme(column: usize, read_ids: Vec<usize>) -> ColumnIndexingScheme {
        ColumnIndexingScheme::from_read_ids(column, 100 * column as u32, read_ids, 20).unwrap()
    }

    #[test]
    fn test_scheme_size() {
        for num_reads in 0..10 {
            let s = scheme(0, (0..num_reads).collect());
            assert_eq!(s.size(), 1 << num_reads);
            let indices: Vec<usize> = s.iter().map(|i| i.index).collect();
            assert_eq!(indices.len(), s.size());
            let mut sorted = indices.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), s.size());
        }
        assert_eq!(scheme(0, vec![7, 3, 9]).bit_of(9), Some(2));
    }

    #[test]
    fn test_capacity() {
        let result = ColumnIndexingScheme::from_read_ids(4, 1000, (0..21).collect(), 20);
        assert_eq!(result, Err(PhasingError::CapacityExceeded {
            what: CapacityKind::ActiveReads, position: 1000, observed: 21, limit: 20
        }));
    }

    #[test]
    fn test_link() {
        let previous = scheme(0, vec![1, 2, 4, 6]);
        let next = scheme(1, vec![2, 3, 6, 8]);
        let link = ColumnLink::new(&previous, &next);
        assert_eq!(link.num_shared(), 2);
        assert_eq!(link.projection_size(), 4);
        assert!(!link.is_identity());
        assert_eq!(link.previous_bits(), &[None, Some(0), None, Some(1)]);
        assert_eq!(link.next_bits(), &[Some(0), None, Some(1), None]);

        // read 2 on side 1 and read 6 on side 0 in both encodings
        assert_eq!(link.project_previous(0b0011), 0b01);
        assert_eq!(link.project_next(0b1011), 0b01);

        assert!(ColumnLink::new(&next, &next).is_identity());
        assert_eq!(ColumnLink::initial(&next).projection_size(), 1);
    }

    #[test]
    fn test_incremental_projection() {
        let previous = scheme(0, vec![1, 2, 4, 6]);
        let next = scheme(1, vec![2, 3, 6, 8]);
        let link = ColumnLink::new(&previous, &next);
        for step in next.iter_projected(link.next_bits()) {
            assert_eq!(step.projection, link.project_next(step.index));
        }
        for step in previous.iter_projected(link.previous_bits()) {
            assert_eq!(step.projection, link.project_previous(step.index));
        }
    }

    #[test]
    fn test_cursor() {
        use crate::data_types::read_set::{AlleleType, Read, ReadSet};
        use crate::column_iterator::ColumnIterator;

        let mut reads = vec![];
        for (name, positions) in [("a", vec![10, 20]), ("b", vec![20, 30]), ("c", vec![30])] {
            let mut read = Read::new(name.to_string(), 0, 0, 60);
            for p in positions {
                read.add_observation(p, AlleleType::Alternate, 10);
            }
            reads.push(read);
        }
        let read_set = ReadSet::new(reads);

        let mut cursor = ColumnCursor::new(20);
        let mut links = vec![];
        for column in ColumnIterator::new(&read_set) {
            let (scheme, link) = cursor.advance(&column).unwrap();
            assert_eq!(scheme.size(), 1 << column.len());
            links.push(link);
        }
        assert_eq!(links.iter().map(|l| l.num_shared()).collect::<Vec<usize>>(), vec![0, 1, 1]);
        assert_eq!(cursor.previous().unwrap().read_ids(), &[1, 2]);
    }
}
