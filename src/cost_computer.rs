
use crate::INFINITE_COST;
use crate::column_iterator::Column;
use crate::data_types::genotype::{Genotype, GenotypeDistribution};
use crate::data_types::pedigree::{Pedigree, PedigreePartitions};
use crate::data_types::read_set::{Entry, ReadSet};
use crate::errors::PhasingError;

/// Adds two costs, infinity absorbs everything else; None on a finite overflow
pub fn add_costs(a: u64, b: u64) -> Option<u64> {
    if a == INFINITE_COST || b == INFINITE_COST {
        Some(INFINITE_COST)
    } else {
        a.checked_add(b).filter(|&c| c != INFINITE_COST)
    }
}

/// Maps each read id to the pedigree index of the individual it was sequenced from.
/// # Errors
/// * if a read belongs to a sample that is not in the pedigree
pub fn map_reads_to_individuals(read_set: &ReadSet, pedigree: &Pedigree) -> Result<Vec<usize>, PhasingError> {
    read_set.iter()
        .map(|read| {
            pedigree.index_of(read.sample_id()).ok_or_else(|| PhasingError::UnknownIndividual {
                read_name: read.name().to_string(),
                sample_id: read.sample_id()
            })
        })
        .collect()
}

/// The best allele assignment to the founder partitions for one (read partitioning, transmission) state
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AssignmentCost {
    /// total cost of the best assignment
    pub cost: u64,
    /// total cost of the second best assignment, equal to `cost` on a tie
    pub runner_up: u64,
    /// bit `p` is the allele of partition `p` in the best assignment
    pub alleles: u64
}

impl AssignmentCost {
    pub const IMPOSSIBLE: AssignmentCost = AssignmentCost {
        cost: INFINITE_COST,
        runner_up: INFINITE_COST,
        alleles: 0
    };

    pub fn is_tie(&self) -> bool {
        self.cost != INFINITE_COST && self.cost == self.runner_up
    }
}

/// Per-column cost of a state, updated incrementally one flipped read at a time.
/// A column starts with every read on haplotype side 0, matching index 0 of its ColumnIndexingScheme.
pub trait ColumnCostComputer {
    /// Loads a new column and resets all reads to side 0.
    /// With `lift_constraints`, genotype constraints and priors are ignored.
    fn set_column(&mut self, column: &Column, lift_constraints: bool);

    /// True if no allele assignment is admissible for any transmission vector at the current column
    fn is_impossible(&self) -> bool;

    /// Moves the read encoded by `bit` to the other side
    fn flip(&mut self, bit: usize);

    /// Moves the reads so that their sides match an arbitrary index
    fn set_partitioning(&mut self, index: usize);

    /// The best and second best allele assignment under the current read sides
    fn assignment(&self, transmission_index: usize) -> AssignmentCost;

    fn cost(&self, transmission_index: usize) -> u64 {
        self.assignment(transmission_index).cost
    }
}

/// The shared machinery of both cost computers
struct ColumnCosts<'a> {
    /// founder partitions per transmission index
    partitions: &'a [PedigreePartitions],
    /// read id to individual index
    read_individual: &'a [usize],
    /// number of individuals in the pedigree
    num_individuals: usize,
    /// per active read bit, the owning individual and the mismatch cost under allele 0 and 1
    reads: Vec<(usize, [u64; 2])>,
    /// the current read sides
    index: usize,
    /// per individual, per haplotype, per allele: summed mismatch cost of the reads on that haplotype
    haplotype_costs: Vec<[[u64; 2]; 2]>,
    /// per transmission index, the admissible allele assignments and their prior cost
    admissible: Vec<Vec<(u64, u64)>>
}

impl<'a> ColumnCosts<'a> {
    fn new(num_individuals: usize, partitions: &'a [PedigreePartitions], read_individual: &'a [usize]) -> ColumnCosts<'a> {
        ColumnCosts {
            partitions,
            read_individual,
            num_individuals,
            reads: vec![],
            index: 0,
            haplotype_costs: vec![[[0; 2]; 2]; num_individuals],
            admissible: vec![vec![]; partitions.len()]
        }
    }

    /// Loads the reads of a column and enumerates the admissible assignments.
    /// # Arguments
    /// * `entries` - one entry per active read
    /// * `priors` - per individual and ALT count, the prior cost or None if that genotype is forbidden
    fn load(&mut self, entries: &[Entry], priors: &[[Option<u64>; 3]]) {
        self.reads = entries.iter()
            .map(|e| (self.read_individual[e.read_id()], [e.mismatch_cost(0), e.mismatch_cost(1)]))
            .collect();
        self.index = 0;
        for costs in self.haplotype_costs.iter_mut() {
            *costs = [[0; 2]; 2];
        }
        for &(individual, costs) in self.reads.iter() {
            for (allele, c) in costs.iter().enumerate() {
                self.haplotype_costs[individual][0][allele] += c;
            }
        }

        for (t, partitions) in self.partitions.iter().enumerate() {
            let admissible = &mut self.admissible[t];
            admissible.clear();
            'assignment: for alleles in 0..(1_u64 << partitions.count()) {
                let mut prior: u64 = 0;
                for (individual, individual_priors) in priors.iter().enumerate() {
                    let alt_count = alt_count(partitions, individual, alleles);
                    match individual_priors[alt_count] {
                        Some(c) => prior = prior.saturating_add(c),
                        None => continue 'assignment
                    };
                }
                admissible.push((alleles, prior));
            }
        }
    }

    fn flip(&mut self, bit: usize) {
        let (individual, costs) = self.reads[bit];
        let side = (self.index >> bit) & 1;
        for (allele, c) in costs.iter().enumerate() {
            self.haplotype_costs[individual][side][allele] -= c;
            self.haplotype_costs[individual][1 - side][allele] += c;
        }
        self.index ^= 1 << bit;
    }

    fn set_partitioning(&mut self, index: usize) {
        let mut diff = self.index ^ index;
        while diff != 0 {
            let bit = diff.trailing_zeros() as usize;
            self.flip(bit);
            diff &= diff - 1;
        }
    }

    /// Read cost of an allele assignment under the current sides
    fn read_cost(&self, partitions: &PedigreePartitions, alleles: u64) -> u64 {
        (0..self.num_individuals)
            .map(|individual| {
                let costs = &self.haplotype_costs[individual];
                let a0 = (alleles >> partitions.haplotype_to_partition(individual, 0)) & 1;
                let a1 = (alleles >> partitions.haplotype_to_partition(individual, 1)) & 1;
                costs[0][a0 as usize] + costs[1][a1 as usize]
            })
            .sum()
    }

    fn assignment(&self, t: usize) -> AssignmentCost {
        let partitions = &self.partitions[t];
        let mut best = AssignmentCost::IMPOSSIBLE;
        for &(alleles, prior) in self.admissible[t].iter() {
            let total = self.read_cost(partitions, alleles).saturating_add(prior);
            if total < best.cost {
                best = AssignmentCost {
                    cost: total,
                    runner_up: best.cost,
                    alleles
                };
            } else if total < best.runner_up {
                best.runner_up = total;
            }
        }
        best
    }

    /// Per individual, the best total cost of an admissible assignment giving that individual each ALT count
    fn conditional_costs(&self, t: usize) -> Vec<[u64; 3]> {
        let partitions = &self.partitions[t];
        let mut conditional: Vec<[u64; 3]> = vec![[INFINITE_COST; 3]; self.num_individuals];
        for &(alleles, prior) in self.admissible[t].iter() {
            let total = self.read_cost(partitions, alleles).saturating_add(prior);
            for (individual, costs) in conditional.iter_mut().enumerate() {
                let g = alt_count(partitions, individual, alleles);
                costs[g] = costs[g].min(total);
            }
        }
        conditional
    }

    fn is_impossible(&self) -> bool {
        self.admissible.iter().all(|a| a.is_empty())
    }
}

/// Number of ALT alleles an individual carries under an assignment of alleles to partitions
fn alt_count(partitions: &PedigreePartitions, individual: usize, alleles: u64) -> usize {
    (((alleles >> partitions.haplotype_to_partition(individual, 0)) & 1)
        + ((alleles >> partitions.haplotype_to_partition(individual, 1)) & 1)) as usize
}

/// Column costs for pedigree phasing.
/// Known genotypes are hard constraints, genotype likelihoods are added as a prior when present.
pub struct PedigreeColumnCostComputer<'a> {
    pedigree: &'a Pedigree,
    costs: ColumnCosts<'a>
}

impl<'a> PedigreeColumnCostComputer<'a> {
    /// # Arguments
    /// * `pedigree` - the family structure with per-column genotype information
    /// * `partitions` - founder partitions per transmission index
    /// * `read_individual` - read id to individual index, from `map_reads_to_individuals`
    pub fn new(pedigree: &'a Pedigree, partitions: &'a [PedigreePartitions], read_individual: &'a [usize]) -> PedigreeColumnCostComputer<'a> {
        PedigreeColumnCostComputer {
            pedigree,
            costs: ColumnCosts::new(pedigree.len(), partitions, read_individual)
        }
    }
}

impl ColumnCostComputer for PedigreeColumnCostComputer<'_> {
    fn set_column(&mut self, column: &Column, lift_constraints: bool) {
        let priors: Vec<[Option<u64>; 3]> = (0..self.pedigree.len())
            .map(|individual| {
                let mut priors = [Some(0); 3];
                if lift_constraints {
                    return priors;
                }
                for (alt, prior) in priors.iter_mut().enumerate() {
                    let genotype = Genotype::from_alt_count(alt as u8).unwrap_or_else(|| Genotype::new(vec![0, 0]));
                    if let Some(known) = self.pedigree.genotype(individual, column.index()) {
                        if known.alt_count() as usize != alt {
                            *prior = None;
                            continue;
                        }
                    }
                    if let Some(gl) = self.pedigree.genotype_likelihoods(individual, column.index()) {
                        let cost = gl.cost(&genotype);
                        *prior = if cost == INFINITE_COST { None } else { Some(cost) };
                    }
                }
                priors
            })
            .collect();
        self.costs.load(column.entries(), &priors);
    }

    fn is_impossible(&self) -> bool {
        self.costs.is_impossible()
    }

    fn flip(&mut self, bit: usize) {
        self.costs.flip(bit);
    }

    fn set_partitioning(&mut self, index: usize) {
        self.costs.set_partitioning(index);
    }

    fn assignment(&self, transmission_index: usize) -> AssignmentCost {
        self.costs.assignment(transmission_index)
    }
}

/// Column costs for genotyping.
/// Known genotypes are not enforced; each individual gets a genotype prior from its likelihoods when present,
/// otherwise from the pileup of its own reads at the column.
pub struct GenotypeColumnCostComputer<'a> {
    pedigree: &'a Pedigree,
    read_individual: &'a [usize],
    costs: ColumnCosts<'a>
}

impl<'a> GenotypeColumnCostComputer<'a> {
    pub fn new(pedigree: &'a Pedigree, partitions: &'a [PedigreePartitions], read_individual: &'a [usize]) -> GenotypeColumnCostComputer<'a> {
        GenotypeColumnCostComputer {
            pedigree,
            read_individual,
            costs: ColumnCosts::new(pedigree.len(), partitions, read_individual)
        }
    }

    /// Per individual, the cost of the best assignment that gives the individual each genotype (0, 1 or 2 ALT copies)
    pub fn conditional_costs(&self, transmission_index: usize) -> Vec<[u64; 3]> {
        self.costs.conditional_costs(transmission_index)
    }

    /// Prior costs from the individual's reads at this column
    fn pileup_prior(&self, column: &Column, individual: usize) -> [Option<u64>; 3] {
        let entries = column.entries().iter()
            .filter(|e| self.read_individual[e.read_id()] == individual);
        match GenotypeDistribution::from_entries(entries).to_phred_likelihoods() {
            Ok(gl) => [0, 1, 2].map(|alt| {
                Genotype::from_alt_count(alt)
                    .map(|g| gl.cost(&g))
                    .filter(|&c| c != INFINITE_COST)
            }),
            // all-zero pileups cannot happen with clipped error rates, fall back to a flat prior
            Err(_) => [Some(0); 3]
        }
    }
}

impl ColumnCostComputer for GenotypeColumnCostComputer<'_> {
    fn set_column(&mut self, column: &Column, lift_constraints: bool) {
        let priors: Vec<[Option<u64>; 3]> = (0..self.pedigree.len())
            .map(|individual| {
                if lift_constraints {
                    return [Some(0); 3];
                }
                match self.pedigree.genotype_likelihoods(individual, column.index()) {
                    Some(gl) => [0, 1, 2].map(|alt| {
                        Genotype::from_alt_count(alt)
                            .map(|g| gl.cost(&g))
                            .filter(|&c| c != INFINITE_COST)
                    }),
                    None => self.pileup_prior(column, individual)
                }
            })
            .collect();
        self.costs.load(column.entries(), &priors);
    }

    fn is_impossible(&self) -> bool {
        self.costs.is_impossible()
    }

    fn flip(&mut self, bit: usize) {
        self.costs.flip(bit);
    }

    fn set_partitioning(&mut self, index: usize) {
        self.costs.set_partitioning(index);
    }

    fn assignment(&self, transmission_index: usize) -> AssignmentCost {
        self.costs.assignment(transmission_index)
    }
}
