
use crate::INFINITE_COST;
use crate::column_iterator::ColumnIterator;
use crate::cost_computer::map_reads_to_individuals;
use crate::data_types::genotype::{Genotype, GenotypeDistribution, PhredGenotypeLikelihoods};
use crate::data_types::pedigree::Pedigree;
use crate::data_types::read_set::ReadSet;
use crate::dp_table::PhasingConfig;
use crate::errors::PhasingError;
use crate::genotype_dp_table::GenotypeDPTable;
use crate::transition::RecombinationMap;

/// Genotype qualities are capped here, matching the usual VCF GQ convention
pub const MAX_GENOTYPE_QUALITY: u64 = 99;

/// A genotype call for one individual at one position
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeCall {
    /// genomic position
    pub position: u32,
    /// sample id of the individual
    pub sample_id: u32,
    /// the most likely genotype, lowest ALT count on ties
    pub genotype: Genotype,
    /// Phred-scaled confidence, the cost gap to the runner-up genotype
    pub quality: u64,
    /// normalized likelihoods of every genotype
    pub likelihoods: PhredGenotypeLikelihoods
}

/// The result of genotyping one region
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypingOutcome {
    /// cost of the optimal solution of the genotype DP
    pub optimal_cost: u64,
    /// calls ordered by position, then by individual index
    pub calls: Vec<GenotypeCall>,
    /// columns that had no admissible genotype combination
    pub column_errors: Vec<PhasingError>
}

/// Converts the three genotype costs of one individual into a call
fn call_from_costs(position: u32, sample_id: u32, costs: &[u64; 3]) -> Result<GenotypeCall, PhasingError> {
    let mut order: [usize; 3] = [0, 1, 2];
    order.sort_by_key(|&g| (costs[g], g));
    let (best, runner_up) = (costs[order[0]], costs[order[1]]);
    if best == INFINITE_COST {
        return Err(PhasingError::NumericUnderflow {
            context: format!("genotype likelihoods of sample {sample_id} at position {position}")
        });
    }

    let phred: Vec<f64> = costs.iter()
        .map(|&c| if c == INFINITE_COST { f64::INFINITY } else { (c - best) as f64 })
        .collect();
    let likelihoods = PhredGenotypeLikelihoods::new(phred, 2, 2)?;
    Ok(GenotypeCall {
        position,
        sample_id,
        genotype: Genotype::from_alt_count(order[0] as u8).unwrap_or_else(|| Genotype::new(vec![0, 0])),
        quality: runner_up.saturating_sub(best).min(MAX_GENOTYPE_QUALITY),
        likelihoods
    })
}

/// Per-site genotyping of every individual in a pedigree, using the same column machinery as phasing
pub struct Genotyper<'a> {
    read_set: &'a ReadSet,
    pedigree: &'a Pedigree,
    positions: Option<&'a [u32]>,
    recombination_map: &'a RecombinationMap,
    config: PhasingConfig
}

impl<'a> Genotyper<'a> {
    /// # Arguments
    /// * `read_set` - the reads, every read sample must be in the pedigree
    /// * `pedigree` - the family, with optional genotype likelihood priors per column
    /// * `positions` - the positions to genotype, None for every position covered by the reads
    /// * `recombination_map` - source of genetic distances
    /// * `config` - limits
    pub fn new(
        read_set: &'a ReadSet, pedigree: &'a Pedigree, positions: Option<&'a [u32]>,
        recombination_map: &'a RecombinationMap, config: PhasingConfig
    ) -> Genotyper<'a> {
        Genotyper {
            read_set,
            pedigree,
            positions,
            recombination_map,
            config
        }
    }

    /// Runs the genotype DP and calls every individual at every column from the max-marginal costs.
    /// # Errors
    /// * if the DP fails on a capacity limit or a numeric problem
    pub fn genotype(&self) -> Result<GenotypingOutcome, PhasingError> {
        let mut table = GenotypeDPTable::new(
            self.read_set, self.pedigree, self.positions, self.recombination_map, &self.config
        )?;
        let marginals = table.max_marginals()?;
        let positions = table.positions().to_vec();

        let mut calls: Vec<GenotypeCall> = Vec::with_capacity(positions.len() * self.pedigree.len());
        for (&position, column_marginals) in positions.iter().zip(marginals.iter()) {
            for (individual, costs) in column_marginals.iter().enumerate() {
                calls.push(call_from_costs(position, self.pedigree.id_of(individual), costs)?);
            }
        }

        Ok(GenotypingOutcome {
            optimal_cost: table.optimal_cost().unwrap_or(0),
            calls,
            column_errors: table.impossible_columns()
        })
    }

    /// Calls every individual from its own pileup at each column, without any DP or priors.
    /// Individuals without reads at a column get a flat call.
    pub fn pileup_genotypes(&self) -> Result<Vec<GenotypeCall>, PhasingError> {
        let read_individual = map_reads_to_individuals(self.read_set, self.pedigree)?;
        let iterator = match self.positions {
            Some(positions) => ColumnIterator::with_positions(self.read_set, positions),
            None => ColumnIterator::new(self.read_set)
        };

        let mut calls: Vec<GenotypeCall> = vec![];
        for column in iterator {
            for individual in 0..self.pedigree.len() {
                let entries = column.entries().iter()
                    .filter(|e| read_individual[e.read_id()] == individual);
                let distribution = GenotypeDistribution::from_entries(entries);
                let likelihoods = distribution.to_phred_likelihoods()?;
                let costs: [u64; 3] = [0, 1, 2].map(|alt| {
                    Genotype::from_alt_count(alt)
                        .map(|g| likelihoods.cost(&g))
                        .unwrap_or(INFINITE_COST)
                });
                calls.push(call_from_costs(column.position(), self.pedigree.id_of(individual), &costs)?);
            }
        }
        Ok(calls)
    }
}
