use crate::data_types::index_set::IndexSet;

use bio::data_structures::interval_tree::IntervalTree;
use log::debug;
use rustc_hash::FxHashMap as HashMap;

/// The allele observed by a read at a variant position
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, strum_macros::FromRepr)]
pub enum AlleleType {
    Reference=0,
    Alternate=1,
    /// the read supported both alleles equally, so it carries no information here
    Ambiguous=2,
    /// the read spans the position but has no call for it
    Blank=3
}

impl AlleleType {
    /// Returns true for Reference and Alternate, the only alleles that contribute any cost
    pub fn is_informative(&self) -> bool {
        *self < AlleleType::Ambiguous
    }
}

/// A single allele observation from one read at one position
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Entry {
    /// the id of the read in the owning ReadSet
    read_id: usize,
    /// genomic coordinate of the variant
    position: u32,
    /// the observed allele
    allele: AlleleType,
    /// Phred-scaled cost of flipping this allele; uninformative entries always have quality 0
    quality: u32
}

impl Entry {
    pub fn new(read_id: usize, position: u32, allele: AlleleType, quality: u32) -> Entry {
        let quality = if allele.is_informative() { quality } else { 0 };
        Entry {
            read_id,
            position,
            allele,
            quality
        }
    }

    /// Placeholder for a read that is active at a column without observing it
    pub fn blank(read_id: usize, position: u32) -> Entry {
        Entry::new(read_id, position, AlleleType::Blank, 0)
    }

    pub fn read_id(&self) -> usize {
        self.read_id
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn allele(&self) -> AlleleType {
        self.allele
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Cost of this entry if the underlying haplotype carries `allele` (0 or 1) at this position.
    pub fn mismatch_cost(&self, allele: u8) -> u64 {
        if self.allele.is_informative() && self.allele as u8 != allele {
            self.quality as u64
        } else {
            0
        }
    }
}

/// One sequenced fragment converted into allele observations, entries are kept sorted by position
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Read {
    /// the read name
    name: String,
    /// identifies the input the read came from
    source_id: u32,
    /// the individual the read was sequenced from
    sample_id: u32,
    /// mapping quality of the alignment
    mapq: u8,
    /// the observations, sorted by position with at most one per position
    entries: Vec<Entry>,
    /// index in the owning ReadSet; usize::MAX until the read is added to one
    id: usize
}

impl Read {
    pub fn new(name: String, source_id: u32, sample_id: u32, mapq: u8) -> Read {
        Read {
            name,
            source_id,
            sample_id,
            mapq,
            entries: vec![],
            id: usize::MAX
        }
    }

    /// Adds an observation to the read.
    /// A second observation at a position that is already set collapses with the first:
    /// matching alleles keep the higher quality and disagreeing alleles become ambiguous.
    /// # Arguments
    /// * `position` - the variant coordinate
    /// * `allele` - the observed allele
    /// * `quality` - the Phred-scaled cost of flipping the allele
    pub fn add_observation(&mut self, position: u32, allele: AlleleType, quality: u32) {
        match self.entries.binary_search_by_key(&position, |e| e.position) {
            Ok(index) => {
                let existing = self.entries[index];
                let collapsed = if existing.allele == AlleleType::Blank {
                    Entry::new(self.id, position, allele, quality)
                } else if allele == AlleleType::Blank || existing.allele == AlleleType::Ambiguous {
                    existing
                } else if existing.allele == allele {
                    Entry::new(self.id, position, allele, existing.quality.max(quality))
                } else {
                    // they don't match, change to ambiguous and clear the quality cost
                    Entry::new(self.id, position, AlleleType::Ambiguous, 0)
                };
                self.entries[index] = collapsed;
            },
            Err(index) => {
                self.entries.insert(index, Entry::new(self.id, position, allele, quality));
            }
        };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    pub fn sample_id(&self) -> u32 {
        self.sample_id
    }

    pub fn mapq(&self) -> u8 {
        self.mapq
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the number of informative (Reference or Alternate) entries
    pub fn get_num_set(&self) -> usize {
        self.entries.iter()
            .filter(|e| e.allele.is_informative())
            .count()
    }

    /// Iterates over the informative entries only
    pub fn informative_entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.allele.is_informative())
    }

    /// Position of the first informative entry
    pub fn first_position(&self) -> Option<u32> {
        self.informative_entries().next().map(|e| e.position)
    }

    /// Position of the last informative entry
    pub fn last_position(&self) -> Option<u32> {
        self.entries.iter().rev()
            .find(|e| e.allele.is_informative())
            .map(|e| e.position)
    }

    /// Returns the entry at a given position, if this read has one
    pub fn entry_at(&self, position: u32) -> Option<&Entry> {
        self.entries.binary_search_by_key(&position, |e| e.position)
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Re-assigns the read id, including the copy stored in each entry
    fn set_id(&mut self, id: usize) {
        self.id = id;
        for entry in self.entries.iter_mut() {
            entry.read_id = id;
        }
    }
}

/// All the reads used in one phasing run, read-only once constructed
#[derive(Debug)]
pub struct ReadSet {
    /// reads sorted by (first position, last position, name), index == read id
    reads: Vec<Read>,
    /// sorted unique positions with at least one informative entry
    positions: Vec<u32>,
    /// read spans, used for per-position lookups
    spans: IntervalTree<u32, usize>,
    /// (name, source) to read id
    name_lookup: HashMap<(String, u32), usize>
}

impl ReadSet {
    /// Builds a read set; reads without any informative entries are dropped.
    /// # Arguments
    /// * `reads` - the reads to include, in any order
    pub fn new(reads: Vec<Read>) -> ReadSet {
        let num_provided = reads.len();
        let mut reads: Vec<Read> = reads.into_iter()
            .filter(|r| r.get_num_set() > 0)
            .collect();
        if reads.len() < num_provided {
            debug!("Dropped {} of {} reads without informative alleles", num_provided - reads.len(), num_provided);
        }

        // informative reads always have a first/last position here
        reads.sort_by(|a, b| {
            (a.first_position(), a.last_position(), a.name(), a.source_id())
                .cmp(&(b.first_position(), b.last_position(), b.name(), b.source_id()))
        });

        let mut positions: Vec<u32> = vec![];
        let mut spans: IntervalTree<u32, usize> = IntervalTree::new();
        let mut name_lookup: HashMap<(String, u32), usize> = Default::default();
        for (read_id, read) in reads.iter_mut().enumerate() {
            read.set_id(read_id);
            positions.extend(read.informative_entries().map(|e| e.position));
            if let (Some(first), Some(last)) = (read.first_position(), read.last_position()) {
                spans.insert(first..(last + 1), read_id);
            }
            name_lookup.entry((read.name.clone(), read.source_id)).or_insert(read_id);
        }
        positions.sort_unstable();
        positions.dedup();

        ReadSet {
            reads,
            positions,
            spans,
            name_lookup
        }
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Returns the read with a given id
    /// # Panics
    /// * if `read_id` is out of bounds
    pub fn get(&self, read_id: usize) -> &Read {
        &self.reads[read_id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Read> {
        self.reads.iter()
    }

    /// Sorted, unique positions covered by at least one informative entry
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    /// Total number of informative entries over all reads
    pub fn num_entries(&self) -> usize {
        self.reads.iter().map(|r| r.get_num_set()).sum()
    }

    /// Returns the ids of all reads whose span (first to last informative entry) covers a position, in increasing order
    pub fn reads_covering(&self, position: u32) -> Vec<usize> {
        let mut read_ids: Vec<usize> = self.spans.find(position..(position + 1))
            .map(|entry| *entry.data())
            .collect();
        read_ids.sort_unstable();
        read_ids
    }

    pub fn get_by_name(&self, name: &str, source_id: u32) -> Option<&Read> {
        self.name_lookup.get(&(name.to_string(), source_id))
            .map(|&read_id| &self.reads[read_id])
    }

    /// Copies the selected reads into a new read set, ids are re-assigned
    pub fn subset(&self, read_ids: &IndexSet) -> ReadSet {
        let reads: Vec<Read> = read_ids.iter()
            .filter(|&read_id| read_id < self.reads.len())
            .map(|read_id| self.reads[read_id].clone())
            .collect();
        ReadSet::new(reads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_read(name: &str, observations: &[(u32, u8, u32)]) -> Read {
        let mut read = Read::new(name.to_string(), 0, 0, 60);
        for &(position, allele, quality) in observations.iter() {
            read.add_observation(position, AlleleType::from_repr(allele).unwrap(), quality);
        }
        read
    }

    #[test]
    fn test_add_observation_collapses() {
        let read = build_read("r1", &[(30, 1, 10), (10, 0, 5), (10, 0, 7), (20, 1, 4), (20, 0, 9), (40, 3, 0)]);
        let alleles: Vec<AlleleType> = read.entries().iter().map(|e| e.allele()).collect();
        assert_eq!(alleles, vec![AlleleType::Reference, AlleleType::Ambiguous, AlleleType::Alternate, AlleleType::Blank]);
        let quals: Vec<u32> = read.entries().iter().map(|e| e.quality()).collect();
        assert_eq!(quals, vec![7, 0, 10, 0]);
        assert_eq!(read.get_num_set(), 2);
        assert_eq!(read.first_position(), Some(10));
        assert_eq!(read.last_position(), Some(30));
        assert_eq!(read.entry_at(20).unwrap().allele(), AlleleType::Ambiguous);
        assert!(read.entry_at(25).is_none());
    }

    #[test]
    fn test_mismatch_cost() {
        let entry = Entry::new(0, 5, AlleleType::Alternate, 12);
        assert_eq!(entry.mismatch_cost(1), 0);
        assert_eq!(entry.mismatch_cost(0), 12);
        let entry = Entry::new(0, 5, AlleleType::Ambiguous, 12);
        assert_eq!(entry.quality(), 0);
        assert_eq!(entry.mismatch_cost(0), 0);
    }

    #[test]
    fn test_read_set() {
        let reads = vec![
            build_read("late", &[(50, 0, 10), (70, 1, 10)]),
            build_read("early", &[(10, 1, 10), (30, 0, 10), (50, 1, 10)]),
            build_read("empty", &[(10, 2, 0), (20, 3, 0)]),
            build_read("middle", &[(30, 1, 10), (40, 1, 10)])
        ];
        let read_set = ReadSet::new(reads);
        assert_eq!(read_set.len(), 3);
        let names: Vec<&str> = read_set.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["early", "middle", "late"]);
        for (i, read) in read_set.iter().enumerate() {
            assert_eq!(read.id(), i);
            assert!(read.entries().iter().all(|e| e.read_id() == i));
        }
        assert_eq!(read_set.positions(), &[10, 30, 40, 50, 70]);
        assert_eq!(read_set.num_entries(), 7);

        assert_eq!(read_set.reads_covering(10), vec![0]);
        assert_eq!(read_set.reads_covering(35), vec![0, 1]);
        assert_eq!(read_set.reads_covering(50), vec![0, 2]);
        assert_eq!(read_set.reads_covering(71), Vec::<usize>::new());

        assert_eq!(read_set.get_by_name("middle", 0).unwrap().id(), 1);
        assert!(read_set.get_by_name("middle", 1).is_none());

        let subset = read_set.subset(&vec![0, 2].into_iter().collect());
        let names: Vec<&str> = subset.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["early", "late"]);
        assert_eq!(subset.get(1).id(), 1);
    }
}
