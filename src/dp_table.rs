
use crate::INFINITE_COST;
use crate::column_indexing::{ColumnCursor, ColumnIndexingScheme, ColumnLink};
use crate::column_iterator::{Column, ColumnIterator};
use crate::cost_computer::{add_costs, map_reads_to_individuals, ColumnCostComputer, PedigreeColumnCostComputer};
use crate::data_types::genetic_map::GeneticMap;
use crate::data_types::pedigree::{Pedigree, PedigreePartitions};
use crate::data_types::read_set::{AlleleType, ReadSet};
use crate::errors::{CapacityKind, PhasingError};
use crate::transition::{RecombinationMap, TransitionProbabilityComputer};

use log::{debug, trace, warn};
use serde::Serialize;

/// Default for the maximum number of reads active in one column
pub const DEFAULT_MAX_READS_PER_COLUMN: usize = 20;
/// Default for the maximum number of state bits (active reads plus transmission bits) in one column
pub const DEFAULT_MAX_COMBINATORIAL_WIDTH: usize = 24;

/// Limits and model parameters shared by every DP table
#[derive(Clone, Debug, PartialEq)]
pub struct PhasingConfig {
    /// maximum number of simultaneously active reads in a column
    pub max_reads_per_column: usize,
    /// maximum number of state bits in a column, also the limit on transmission plus founder allele bits
    pub max_combinatorial_width: usize,
    /// uniform recombination rate in cM/Mb, used when no genetic map is provided
    pub recombination_rate: f64
}

impl Default for PhasingConfig {
    fn default() -> Self {
        PhasingConfig {
            max_reads_per_column: DEFAULT_MAX_READS_PER_COLUMN,
            max_combinatorial_width: DEFAULT_MAX_COMBINATORIAL_WIDTH,
            recombination_rate: crate::transition::DEFAULT_RECOMBINATION_RATE
        }
    }
}

impl PhasingConfig {
    /// The source of genetic distances: the map if one is given, extended with the configured rate, or the uniform rate alone
    pub fn recombination_map(&self, genetic_map: Option<GeneticMap>) -> RecombinationMap {
        match genetic_map {
            Some(map) => RecombinationMap::Map(map, self.recombination_rate),
            None => RecombinationMap::Uniform(self.recombination_rate)
        }
    }
}

/// Predecessor of a (projection, transmission) entry
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Backpointer {
    /// index of the predecessor in the previous column's scheme
    pub previous_index: usize,
    /// transmission index of the predecessor
    pub previous_transmission: usize,
    /// cost accumulated up to the previous column, including the transition
    pub incoming_cost: u64
}

/// The output of filling one column
pub(crate) struct FilledColumn {
    /// cumulative cost per state, indexed by `index * T + transmission`
    pub costs: Vec<u64>,
    /// per `projection * T + transmission`, the best predecessor
    pub backpointers: Vec<Backpointer>,
    /// true if the column had no admissible genotype assignment and was re-scored without constraints
    pub lifted: bool
}

/// Fills one column of the forward pass.
/// Previous states are first projected onto the reads shared with this column, keeping the best predecessor per projection,
/// then each (projection, transmission) picks its best predecessor transmission, and finally every state adds its column cost.
/// Ties always go to the lowest predecessor state index.
/// # Arguments
/// * `computer` - cost computer, it is reset to this column
/// * `column` - the column to fill
/// * `link` - the link from the previous scheme to this column's scheme
/// * `previous_costs` - the cumulative costs of the previous column, None for the first column
/// * `transitions` - the transition cost computer
pub(crate) fn fill_column<C: ColumnCostComputer>(
    computer: &mut C,
    column: &Column,
    link: &ColumnLink,
    previous_costs: Option<&[u64]>,
    transitions: &TransitionProbabilityComputer
) -> Result<FilledColumn, PhasingError> {
    let num_transmissions = transitions.num_transmissions();
    let overflow = || PhasingError::NumericOverflow { position: column.position() };

    computer.set_column(column, false);
    let lifted = computer.is_impossible();
    if lifted {
        computer.set_column(column, true);
    }

    let projection_size = link.projection_size();
    let backpointers: Vec<Backpointer> = match previous_costs {
        None => vec![Backpointer { previous_index: 0, previous_transmission: 0, incoming_cost: 0 }; projection_size * num_transmissions],
        Some(previous_costs) => {
            // best previous index per (projection, transmission)
            let mut projected: Vec<(u64, usize)> = vec![(INFINITE_COST, usize::MAX); projection_size * num_transmissions];
            for step in link.iter_previous() {
                for t in 0..num_transmissions {
                    let candidate = (previous_costs[step.index * num_transmissions + t], step.index);
                    let slot = &mut projected[step.projection * num_transmissions + t];
                    if candidate < *slot {
                        *slot = candidate;
                    }
                }
            }

            let mut backpointers: Vec<Backpointer> = Vec::with_capacity(projection_size * num_transmissions);
            for p in 0..projection_size {
                for t in 0..num_transmissions {
                    let mut best: (u64, usize) = (INFINITE_COST, usize::MAX);
                    let mut best_pointer = Backpointer { previous_index: 0, previous_transmission: 0, incoming_cost: INFINITE_COST };
                    for previous_t in 0..num_transmissions {
                        let (previous_cost, previous_index) = projected[p * num_transmissions + previous_t];
                        let cost = add_costs(previous_cost, transitions.cost(column.index(), previous_t, t)).ok_or_else(overflow)?;
                        let candidate = (cost, previous_index.saturating_mul(num_transmissions).saturating_add(previous_t));
                        if candidate < best {
                            best = candidate;
                            best_pointer = Backpointer {
                                previous_index,
                                previous_transmission: previous_t,
                                incoming_cost: cost
                            };
                        }
                    }
                    backpointers.push(best_pointer);
                }
            }
            backpointers
        }
    };

    let mut costs: Vec<u64> = vec![INFINITE_COST; (1 << link.next_bits().len()) * num_transmissions];
    for step in link.iter_next() {
        if let Some(bit) = step.changed_bit {
            computer.flip(bit);
        }
        for t in 0..num_transmissions {
            let incoming = backpointers[step.projection * num_transmissions + t].incoming_cost;
            costs[step.index * num_transmissions + t] = add_costs(computer.cost(t), incoming).ok_or_else(overflow)?;
        }
    }

    Ok(FilledColumn {
        costs,
        backpointers,
        lifted
    })
}

/// Returns (cost, state) of the cheapest state, lowest state index on ties
pub(crate) fn best_state(costs: &[u64]) -> (u64, usize) {
    costs.iter().enumerate()
        .map(|(state, &cost)| (cost, state))
        .min()
        .unwrap_or((0, 0))
}

/// Checks the per-column state width against the configured limit
pub(crate) fn check_width(scheme: &ColumnIndexingScheme, transmission_bits: usize, config: &PhasingConfig) -> Result<(), PhasingError> {
    let width = scheme.num_reads() + transmission_bits;
    if width > config.max_combinatorial_width {
        return Err(PhasingError::CapacityExceeded {
            what: CapacityKind::CombinatorialWidth,
            position: scheme.position(),
            observed: width,
            limit: config.max_combinatorial_width
        });
    }
    Ok(())
}

/// How a column of the optimal solution was resolved
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum_macros::Display)]
pub enum ColumnStatus {
    /// a unique best allele assignment
    Phased,
    /// the best allele assignment is tied with another one
    Tie,
    /// no assignment satisfied the genotype constraints, the column was solved without them
    Impossible
}

/// The optimal solution at one column
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnResult {
    /// genomic position
    pub position: u32,
    /// index of the selected read bipartition within the column scheme
    pub read_partition: usize,
    /// the selected transmission vector
    pub transmission_vector: u64,
    /// total cost of the optimal solution up to and including this column
    pub cumulative_cost: u64,
    /// cost of the selected allele assignment at this column
    pub assignment_cost: u64,
    /// cost of the second best allele assignment for the same read bipartition and transmission vector
    pub runner_up_cost: u64,
    /// resolution status
    pub status: ColumnStatus
}

/// Everything extracted from a backtracked table
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PhasingOutcome {
    /// cost of the optimal solution
    pub optimal_cost: u64,
    /// per column details, in position order
    pub columns: Vec<ColumnResult>,
    /// per individual index, the two haplotypes with one allele per column
    pub haplotypes: Vec<[Vec<AlleleType>; 2]>,
    /// per read id, the side the read was assigned to; None for reads with no column
    pub read_sides: Vec<Option<u8>>,
    /// non-fatal problems, currently only ImpossibleGenotype
    pub column_errors: Vec<PhasingError>
}

impl PhasingOutcome {
    /// The phase of an individual at a column: the allele on haplotype 0, None if the individual is homozygous there
    pub fn partition_bit(&self, individual: usize, column: usize) -> Option<u8> {
        let [h0, h1] = &self.haplotypes[individual];
        if h0[column] == h1[column] {
            None
        } else {
            Some(h0[column] as u8)
        }
    }

    pub fn positions(&self) -> Vec<u32> {
        self.columns.iter().map(|c| c.position).collect()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TableState {
    Uninitialized,
    Filled,
    Backtracked
}

/// The pedigree phasing DP over the columns of a read set.
/// A state is a read bipartition together with a transmission vector, encoded as `index * T + transmission index`.
pub struct PedigreeDPTable<'a> {
    /// the reads to phase
    read_set: &'a ReadSet,
    /// the family, with per-column genotype information
    pedigree: &'a Pedigree,
    /// column positions
    positions: Vec<u32>,
    /// limits
    config: PhasingConfig,
    /// founder partitions per transmission index
    partitions: Vec<PedigreePartitions>,
    /// number of transmission bits
    transmission_bits: usize,
    /// transition costs between columns
    transitions: TransitionProbabilityComputer,
    /// read id to individual index
    read_individual: Vec<usize>,
    /// per column scheme, kept for backtracking
    schemes: Vec<ColumnIndexingScheme>,
    /// per column link to the previous column
    links: Vec<ColumnLink>,
    /// append-only backpointer storage, one Vec per column
    backpointers: Vec<Vec<Backpointer>>,
    /// per column, true if genotype constraints had to be lifted
    lifted: Vec<bool>,
    /// (cost, state) of the best final state
    optimum: (u64, usize),
    /// state machine
    state: TableState
}

impl<'a> PedigreeDPTable<'a> {
    /// Prepares a table, nothing is computed until `fill()`.
    /// # Arguments
    /// * `read_set` - the reads to phase, every read sample must be in the pedigree
    /// * `pedigree` - the family, per-column genotypes are indexed by position in `positions`
    /// * `positions` - the column positions, None to use every position covered by the reads
    /// * `recombination_map` - source of genetic distances
    /// * `config` - limits
    /// # Errors
    /// * if there are too many transmission bits, or reads from individuals outside the pedigree
    pub fn new(
        read_set: &'a ReadSet, pedigree: &'a Pedigree, positions: Option<&[u32]>,
        recombination_map: &RecombinationMap, config: &PhasingConfig
    ) -> Result<PedigreeDPTable<'a>, PhasingError> {
        let (transmission_vectors, partitions): (Vec<u64>, Vec<PedigreePartitions>) =
            PedigreePartitions::enumerate(pedigree, config.max_combinatorial_width)?.into_iter().unzip();
        let read_individual = map_reads_to_individuals(read_set, pedigree)?;
        let positions: Vec<u32> = ColumnIterator::with_positions(read_set, positions.unwrap_or(read_set.positions()))
            .positions()
            .to_vec();
        let transitions = TransitionProbabilityComputer::new(&positions, recombination_map, transmission_vectors);

        Ok(PedigreeDPTable {
            read_set,
            pedigree,
            positions,
            config: config.clone(),
            partitions,
            transmission_bits: 2 * pedigree.num_trios(),
            transitions,
            read_individual,
            schemes: vec![],
            links: vec![],
            backpointers: vec![],
            lifted: vec![],
            optimum: (0, 0),
            state: TableState::Uninitialized
        })
    }

    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    /// Runs the forward pass over every column.
    /// # Errors
    /// * if a column exceeds a capacity limit or costs overflow
    pub fn fill(&mut self) -> Result<(), PhasingError> {
        if self.state != TableState::Uninitialized {
            return Ok(());
        }
        // a previous attempt may have failed part way through
        self.schemes.clear();
        self.links.clear();
        self.backpointers.clear();
        self.lifted.clear();
        let num_transmissions = self.transitions.num_transmissions();
        let mut computer = PedigreeColumnCostComputer::new(self.pedigree, &self.partitions, &self.read_individual);
        let mut cursor = ColumnCursor::new(self.config.max_reads_per_column);
        let mut previous_costs: Option<Vec<u64>> = None;
        let mut max_width: usize = 0;

        for column in ColumnIterator::with_positions(self.read_set, &self.positions) {
            let (scheme, link) = cursor.advance(&column)?;
            check_width(&scheme, self.transmission_bits, &self.config)?;
            max_width = max_width.max(scheme.num_reads());

            let filled = fill_column(&mut computer, &column, &link, previous_costs.as_deref(), &self.transitions)?;
            if filled.lifted {
                warn!("No consistent genotype assignment at position {}, solving column {} without genotype constraints", column.position(), column.index());
            }
            trace!("Column {} at {}: {} reads, {} states, {} shared", column.index(), column.position(), scheme.num_reads(), filled.costs.len(), link.num_shared());

            self.schemes.push(scheme);
            self.links.push(link);
            self.backpointers.push(filled.backpointers);
            self.lifted.push(filled.lifted);
            previous_costs = Some(filled.costs);
        }

        self.optimum = match previous_costs {
            Some(costs) => best_state(&costs),
            None => (0, 0)
        };
        debug!(
            "Filled {} columns with {} transmission vectors, max active reads {}, optimal cost {}",
            self.positions.len(), num_transmissions, max_width, self.optimum.0
        );
        self.state = TableState::Filled;
        Ok(())
    }

    /// Cost of the optimal solution
    pub fn optimal_cost(&self) -> Option<u64> {
        if self.state == TableState::Uninitialized {
            None
        } else {
            Some(self.optimum.0)
        }
    }

    /// Backtracks from the optimal final state and extracts haplotypes, read sides, and per-column details.
    /// Fills the table first if needed.
    pub fn backtrack(&mut self) -> Result<PhasingOutcome, PhasingError> {
        self.fill()?;
        let num_transmissions = self.transitions.num_transmissions();
        let num_columns = self.positions.len();

        // walk the backpointers to collect the (read partition, transmission, incoming cost) of each column
        let mut path: Vec<(usize, usize, u64)> = vec![(0, 0, 0); num_columns];
        let (mut index, mut t) = (self.optimum.1 / num_transmissions, self.optimum.1 % num_transmissions);
        for c in (0..num_columns).rev() {
            let pointer = self.backpointers[c][self.links[c].project_next(index) * num_transmissions + t];
            path[c] = (index, t, pointer.incoming_cost);
            index = pointer.previous_index;
            t = pointer.previous_transmission;
        }

        let mut computer = PedigreeColumnCostComputer::new(self.pedigree, &self.partitions, &self.read_individual);
        let mut columns: Vec<ColumnResult> = Vec::with_capacity(num_columns);
        let mut haplotypes: Vec<[Vec<AlleleType>; 2]> = vec![[Vec::with_capacity(num_columns), Vec::with_capacity(num_columns)]; self.pedigree.len()];
        let mut read_sides: Vec<Option<u8>> = vec![None; self.read_set.len()];
        let mut column_errors: Vec<PhasingError> = vec![];

        for column in ColumnIterator::with_positions(self.read_set, &self.positions) {
            let c = column.index();
            let (index, t, incoming_cost) = path[c];
            computer.set_column(&column, self.lifted[c]);
            computer.set_partitioning(index);
            let assignment = computer.assignment(t);

            let status = if self.lifted[c] {
                column_errors.push(PhasingError::ImpossibleGenotype { position: column.position(), column: c });
                ColumnStatus::Impossible
            } else if assignment.is_tie() {
                ColumnStatus::Tie
            } else {
                ColumnStatus::Phased
            };

            let partitions = &self.partitions[t];
            for (individual, individual_haplotypes) in haplotypes.iter_mut().enumerate() {
                for (h, haplotype) in individual_haplotypes.iter_mut().enumerate() {
                    let allele = (assignment.alleles >> partitions.haplotype_to_partition(individual, h)) & 1;
                    haplotype.push(if allele == 1 { AlleleType::Alternate } else { AlleleType::Reference });
                }
            }

            for (bit, &read_id) in self.schemes[c].read_ids().iter().enumerate() {
                if read_sides[read_id].is_none() {
                    read_sides[read_id] = Some(((index >> bit) & 1) as u8);
                }
            }

            columns.push(ColumnResult {
                position: column.position(),
                read_partition: index,
                transmission_vector: self.transitions.transmission_vector(t),
                cumulative_cost: add_costs(incoming_cost, assignment.cost)
                    .ok_or(PhasingError::NumericOverflow { position: column.position() })?,
                assignment_cost: assignment.cost,
                runner_up_cost: assignment.runner_up,
                status
            });
        }

        self.state = TableState::Backtracked;
        Ok(PhasingOutcome {
            optimal_cost: self.optimum.0,
            columns,
            haplotypes,
            read_sides,
            column_errors
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genotype::Genotype;
    use crate::data_types::read_set::Read;

    fn build_read(name: &str, sample_id: u32, observations: &[(u32, u8)]) -> Read {
        let mut read = Read::new(name.to_string(), 0, sample_id, 60);
        for &(position, allele) in observations.iter() {
            read.add_observation(position, AlleleType::from_repr(allele).unwrap(), 20);
        }
        read
    }

    fn single_individual() -> Pedigree {
        let mut pedigree = Pedigree::new();
        pedigree.add_individual(0, vec![], vec![]).unwrap();
        pedigree
    }

    fn solve(read_set: &ReadSet, pedigree: &Pedigree, positions: Option<&[u32]>) -> PhasingOutcome {
        let mut table = PedigreeDPTable::new(read_set, pedigree, positions, &RecombinationMap::default(), &PhasingConfig::default()).unwrap();
        table.fill().unwrap();
        table.backtrack().unwrap()
    }

    #[test]
    fn test_non_conflicting_reads() {
        let read_set = ReadSet::new(vec![
            build_read("a", 0, &[(100, 0), (200, 1)]),
            build_read("b", 0, &[(100, 0), (200, 1)])
        ]);
        let outcome = solve(&read_set, &single_individual(), None);
        assert_eq!(outcome.optimal_cost, 0);
        assert_eq!(outcome.read_sides[0], outcome.read_sides[1]);
        assert!(outcome.read_sides[0].is_some());
        assert!(outcome.column_errors.is_empty());
    }

    #[test]
    fn test_conflicting_reads() {
        let read_set = ReadSet::new(vec![
            build_read("a", 0, &[(100, 0), (200, 1)]),
            build_read("b", 0, &[(100, 1), (200, 0)])
        ]);
        let outcome = solve(&read_set, &single_individual(), None);
        assert_eq!(outcome.optimal_cost, 0);
        assert_ne!(outcome.read_sides[0], outcome.read_sides[1]);

        // lowest state index puts "a" on side 1, so haplotype 0 follows "b"
        assert_eq!(outcome.read_sides, vec![Some(1), Some(0)]);
        assert_eq!(outcome.partition_bit(0, 0), Some(1));
        assert_eq!(outcome.partition_bit(0, 1), Some(0));
        assert_eq!(outcome.columns.iter().map(|c| c.status).collect::<Vec<_>>(), vec![ColumnStatus::Phased; 2]);
    }

    #[test]
    fn test_error_correction() {
        // three reads agree, the fourth has one error which is the cheapest thing to correct
        let read_set = ReadSet::new(vec![
            build_read("a", 0, &[(100, 0), (200, 1), (300, 0)]),
            build_read("b", 0, &[(100, 1), (200, 0), (300, 1)]),
            build_read("c", 0, &[(100, 0), (200, 1), (300, 0)]),
            build_read("d", 0, &[(100, 1), (200, 1), (300, 1)])
        ]);
        let outcome = solve(&read_set, &single_individual(), None);
        assert_eq!(outcome.optimal_cost, 20);
        assert_eq!(outcome.read_sides[0], outcome.read_sides[2]);
        assert_eq!(outcome.read_sides[1], outcome.read_sides[3]);
        assert_ne!(outcome.read_sides[0], outcome.read_sides[1]);
        let last = outcome.columns.last().unwrap();
        assert_eq!(last.cumulative_cost, 20);
    }

    #[test]
    fn test_trio_transmission() {
        // father 0/1, mother 0/0, child 0/1 at two sites; only the father has reads
        let het = || vec![Some(Genotype::new(vec![0, 1])); 2];
        let mut pedigree = Pedigree::new();
        pedigree.add_individual(1, het(), vec![]).unwrap();
        pedigree.add_individual(2, vec![Some(Genotype::new(vec![0, 0])); 2], vec![]).unwrap();
        pedigree.add_individual(3, het(), vec![]).unwrap();
        pedigree.add_relationship(1, 2, 3).unwrap();

        let read_set = ReadSet::new(vec![
            build_read("f1", 1, &[(1000, 1), (2000, 1)]),
            build_read("f2", 1, &[(1000, 0), (2000, 0)])
        ]);
        let outcome = solve(&read_set, &pedigree, None);
        assert_eq!(outcome.optimal_cost, 0);
        assert!(outcome.column_errors.is_empty());

        let father = pedigree.index_of(1).unwrap();
        let mother = pedigree.index_of(2).unwrap();
        let child = pedigree.index_of(3).unwrap();
        assert_eq!(outcome.haplotypes[child][0], vec![AlleleType::Alternate; 2]);
        assert_eq!(outcome.haplotypes[child][1], vec![AlleleType::Reference; 2]);
        assert_eq!(outcome.haplotypes[mother][0], vec![AlleleType::Reference; 2]);

        // the father's haplotypes follow his reads
        let father_bits = (outcome.partition_bit(father, 0), outcome.partition_bit(father, 1));
        assert!(father_bits == (Some(0), Some(0)) || father_bits == (Some(1), Some(1)));
        assert_ne!(outcome.read_sides[0], outcome.read_sides[1]);

        // no recombination is needed, so the transmission vector never changes
        assert_eq!(outcome.columns[0].transmission_vector, outcome.columns[1].transmission_vector);
    }

    #[test]
    fn test_impossible_column() {
        let mut pedigree = Pedigree::new();
        pedigree.add_individual(1, vec![Some(Genotype::new(vec![1, 1]))], vec![]).unwrap();
        pedigree.add_individual(2, vec![Some(Genotype::new(vec![1, 1]))], vec![]).unwrap();
        pedigree.add_individual(3, vec![Some(Genotype::new(vec![0, 0]))], vec![]).unwrap();
        pedigree.add_relationship(1, 2, 3).unwrap();
        let read_set = ReadSet::new(vec![build_read("c", 3, &[(500, 0)])]);

        let outcome = solve(&read_set, &pedigree, None);
        assert_eq!(outcome.column_errors, vec![PhasingError::ImpossibleGenotype { position: 500, column: 0 }]);
        assert_eq!(outcome.columns[0].status, ColumnStatus::Impossible);
    }

    #[test]
    fn test_zero_read_columns() {
        let read_set = ReadSet::new(vec![
            build_read("a", 0, &[(100, 0), (200, 1)]),
            build_read("b", 0, &[(100, 1), (200, 0)])
        ]);
        let outcome = solve(&read_set, &single_individual(), Some(&[100, 200, 300, 400][..]));
        assert_eq!(outcome.columns.len(), 4);
        assert_eq!(outcome.optimal_cost, 0);
        assert_eq!(outcome.columns[3].cumulative_cost, 0);
        assert_eq!(outcome.columns[3].read_partition, 0);
    }

    #[test]
    fn test_determinism() {
        // symmetric input with many equal-cost solutions
        let read_set = ReadSet::new(vec![
            build_read("a", 0, &[(100, 0), (200, 1)]),
            build_read("b", 0, &[(100, 1), (200, 1)]),
            build_read("c", 0, &[(200, 0), (300, 0)]),
            build_read("d", 0, &[(200, 1), (300, 1)])
        ]);
        let pedigree = single_individual();
        let first = solve(&read_set, &pedigree, None);
        let second = solve(&read_set, &pedigree, None);
        assert_eq!(first, second);
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    #[test]
    fn test_capacity_errors() {
        let reads: Vec<Read> = (0..5).map(|i| build_read(&format!("r{i}"), 0, &[(100, 0), (200, 1)])).collect();
        let read_set = ReadSet::new(reads);
        let pedigree = single_individual();

        let config = PhasingConfig { max_reads_per_column: 4, ..Default::default() };
        let mut table = PedigreeDPTable::new(&read_set, &pedigree, None, &RecombinationMap::default(), &config).unwrap();
        assert_eq!(table.fill(), Err(PhasingError::CapacityExceeded {
            what: CapacityKind::ActiveReads, position: 100, observed: 5, limit: 4
        }));

        let config = PhasingConfig { max_combinatorial_width: 3, ..Default::default() };
        let mut table = PedigreeDPTable::new(&read_set, &pedigree, None, &RecombinationMap::default(), &config).unwrap();
        assert_eq!(table.fill(), Err(PhasingError::CapacityExceeded {
            what: CapacityKind::CombinatorialWidth, position: 100, observed: 5, limit: 3
        }));
    }

    #[test]
    fn test_many_founders() {
        // every sample without parents is a founder with two allele bits of its own
        let mut pedigree = Pedigree::new();
        for id in 0..32 {
            pedigree.add_individual(id, vec![], vec![]).unwrap();
        }
        let read_set = ReadSet::new(vec![build_read("a", 0, &[(100, 0), (200, 1)])]);
        let result = PedigreeDPTable::new(&read_set, &pedigree, None, &RecombinationMap::default(), &PhasingConfig::default());
        assert!(matches!(result, Err(PhasingError::CapacityExceeded { what: CapacityKind::CombinatorialWidth, observed: 64, limit: 24, .. })));
    }

    #[test]
    fn test_refill_after_failure() {
        // one read at 100, then five reads at 200
        let mut reads = vec![build_read("a", 0, &[(100, 0), (200, 1)])];
        for i in 0..4 {
            reads.push(build_read(&format!("r{i}"), 0, &[(200, 1), (300, 0)]));
        }
        let read_set = ReadSet::new(reads);
        let pedigree = single_individual();
        let config = PhasingConfig { max_reads_per_column: 4, ..Default::default() };
        let mut table = PedigreeDPTable::new(&read_set, &pedigree, None, &RecombinationMap::default(), &config).unwrap();

        for _attempt in 0..2 {
            assert!(matches!(table.fill(), Err(PhasingError::CapacityExceeded { position: 200, observed: 5, .. })));
            assert_eq!(table.schemes.len(), 1);
            assert_eq!(table.links.len(), 1);
            assert_eq!(table.backpointers.len(), 1);
            assert_eq!(table.lifted.len(), 1);
            assert_eq!(table.optimal_cost(), None);
        }
    }

    #[test]
    fn test_config_recombination_map() {
        let config = PhasingConfig { recombination_rate: 2.0, ..Default::default() };
        assert!((config.recombination_map(None).distance(0, 1_000_000) - 2.0).abs() < 1e-9);

        let map = GeneticMap::new(vec![(0, 0.0), (1_000_000, 5.0)]).unwrap();
        let distance = config.recombination_map(Some(map)).distance(0, 500_000);
        assert!((distance - 2.5).abs() < 1e-9);
    }
}
