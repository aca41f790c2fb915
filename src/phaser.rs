use crate::column_iterator::ColumnIterator;
use crate::data_types::pedigree::Pedigree;
use crate::data_types::read_set::ReadSet;
use crate::dp_table::{ColumnStatus, PedigreeDPTable, PhasingConfig, PhasingOutcome};
use crate::errors::PhasingError;
use crate::genotyper::{GenotypeCall, Genotyper};
use crate::transition::RecombinationMap;
use crate::writers::phase_stats::PhaseStats;

use log::{debug, warn};

/// An independent unit of work: one genomic region with its reads and the family they come from
pub struct PhaseProblem {
    /// Order of the region in the input, results are written in this order
    pub region_index: usize,
    /// The region label from the input
    pub region: String,
    /// All reads observed in the region
    pub read_set: ReadSet,
    /// The family, with any per-column genotypes aligned to `positions`
    pub pedigree: Pedigree,
    /// Explicit column positions; None to use every position covered by the reads
    pub positions: Option<Vec<u32>>
}

impl PhaseProblem {
    /// The positions that become columns of the DP
    pub fn column_positions(&self) -> &[u32] {
        match self.positions.as_ref() {
            Some(p) => p,
            None => self.read_set.positions()
        }
    }
}

/// Final side of one read in the optimal solution
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadAssignment {
    /// The read name
    pub read_name: String,
    /// The source (e.g. input file) the read came from
    pub source_id: u32,
    /// The sample the read belongs to
    pub sample_id: u32,
    /// The haplotype side, 0 or 1; None if the read never reached a column
    pub side: Option<u8>
}

/// A solved region, assumes diploid individuals.
pub struct PhaseResult {
    /// Order of the region in the input
    pub region_index: usize,
    /// The region label
    pub region: String,
    /// Sample ids, indexed like the haplotypes of `outcome`
    pub sample_ids: Vec<u32>,
    /// Everything extracted from the DP
    pub outcome: PhasingOutcome,
    /// Side of every read, in read id order
    pub reads: Vec<ReadAssignment>,
    /// Statistics from the problem
    pub statistics: PhaseStats
}

/// A genotyped region
pub struct GenotypeResult {
    /// Order of the region in the input
    pub region_index: usize,
    /// The region label
    pub region: String,
    /// Calls ordered by position, then by individual
    pub calls: Vec<GenotypeCall>,
    /// Columns that had to be genotyped without priors
    pub column_errors: Vec<PhasingError>,
    /// Statistics from the problem
    pub statistics: PhaseStats
}

/// Whatever a worker produced for one region
pub enum RegionResult {
    Phased(PhaseResult),
    Genotyped(GenotypeResult)
}

impl RegionResult {
    pub fn region_index(&self) -> usize {
        match self {
            RegionResult::Phased(r) => r.region_index,
            RegionResult::Genotyped(r) => r.region_index
        }
    }

    pub fn region(&self) -> &str {
        match self {
            RegionResult::Phased(r) => &r.region,
            RegionResult::Genotyped(r) => &r.region
        }
    }

    pub fn statistics(&self) -> &PhaseStats {
        match self {
            RegionResult::Phased(r) => &r.statistics,
            RegionResult::Genotyped(r) => &r.statistics
        }
    }
}

/// Largest number of reads simultaneously active in one column
fn max_active_reads(problem: &PhaseProblem) -> usize {
    ColumnIterator::with_positions(&problem.read_set, problem.column_positions())
        .map(|column| column.len())
        .max()
        .unwrap_or(0)
}

/// Adds a hint to capacity failures before they are passed up
fn report_failure(problem: &PhaseProblem, error: PhasingError) -> PhasingError {
    if let PhasingError::CapacityExceeded { .. } = error {
        warn!("Region {} cannot be solved with the current limits: {}", problem.region, error);
        warn!("Consider raising --max-reads-per-column or --max-combinatorial-width, or downsampling the reads");
    }
    error
}

/// Core structure of phasing that can be run on a single thread to solve a region.
/// Builds the pedigree DP table, fills it, and backtracks the optimal solution.
/// # Arguments
/// * `problem` - the region to solve
/// * `recombination_map` - source of genetic distances between columns
/// * `config` - capacity limits for the DP
/// # Errors
/// * if a column exceeds the configured limits
/// * if a read belongs to a sample missing from the pedigree
/// * if costs overflow
pub fn solve_region(
    problem: &PhaseProblem, recombination_map: &RecombinationMap, config: &PhasingConfig
) -> Result<PhaseResult, PhasingError> {
    debug!(
        "Solving region {}: {} reads, {} individuals, {} trios",
        problem.region, problem.read_set.len(), problem.pedigree.len(), problem.pedigree.num_trios()
    );
    let region_cpu_time = cpu_time::ThreadTime::now();

    let mut table = PedigreeDPTable::new(
        &problem.read_set, &problem.pedigree, problem.positions.as_deref(), recombination_map, config
    ).map_err(|e| report_failure(problem, e))?;
    table.fill().map_err(|e| report_failure(problem, e))?;
    let outcome = table.backtrack()?;

    for error in outcome.column_errors.iter() {
        warn!("Region {}: {}", problem.region, error);
    }

    let reads: Vec<ReadAssignment> = problem.read_set.iter()
        .map(|read| ReadAssignment {
            read_name: read.name().to_string(),
            source_id: read.source_id(),
            sample_id: read.sample_id(),
            side: outcome.read_sides[read.id()]
        })
        .collect();

    let tied_columns = outcome.columns.iter().filter(|c| c.status == ColumnStatus::Tie).count();
    let statistics = PhaseStats::new(
        problem.pedigree.len(),
        problem.pedigree.num_trios(),
        problem.read_set.len(),
        outcome.columns.len(),
        max_active_reads(problem),
        outcome.optimal_cost,
        tied_columns,
        outcome.column_errors.len(),
        region_cpu_time.elapsed().as_secs_f32()
    );
    debug!("Region {} solved: {:?}", problem.region, statistics);

    Ok(PhaseResult {
        region_index: problem.region_index,
        region: problem.region.clone(),
        sample_ids: (0..problem.pedigree.len()).map(|i| problem.pedigree.id_of(i)).collect(),
        outcome,
        reads,
        statistics
    })
}

/// Genotypes every individual at every column of a region from the genotype DP max-marginals.
/// # Arguments
/// * `problem` - the region to genotype
/// * `recombination_map` - source of genetic distances between columns
/// * `config` - capacity limits for the DP
/// # Errors
/// * same as `solve_region(...)`
pub fn genotype_region(
    problem: &PhaseProblem, recombination_map: &RecombinationMap, config: &PhasingConfig
) -> Result<GenotypeResult, PhasingError> {
    debug!("Genotyping region {}: {} reads, {} individuals", problem.region, problem.read_set.len(), problem.pedigree.len());
    let region_cpu_time = cpu_time::ThreadTime::now();

    let genotyper = Genotyper::new(
        &problem.read_set, &problem.pedigree, problem.positions.as_deref(), recombination_map, config.clone()
    );
    let outcome = genotyper.genotype().map_err(|e| report_failure(problem, e))?;
    for error in outcome.column_errors.iter() {
        warn!("Region {}: {}", problem.region, error);
    }

    let num_columns = if problem.pedigree.is_empty() { 0 } else { outcome.calls.len() / problem.pedigree.len() };
    let statistics = PhaseStats::new(
        problem.pedigree.len(),
        problem.pedigree.num_trios(),
        problem.read_set.len(),
        num_columns,
        max_active_reads(problem),
        outcome.optimal_cost,
        0,
        outcome.column_errors.len(),
        region_cpu_time.elapsed().as_secs_f32()
    );
    debug!("Region {} genotyped: {:?}", problem.region, statistics);

    Ok(GenotypeResult {
        region_index: problem.region_index,
        region: problem.region.clone(),
        calls: outcome.calls,
        column_errors: outcome.column_errors,
        statistics
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genotype::Genotype;
    use crate::data_types::read_set::{AlleleType, Read};

    fn build_read(name: &str, sample_id: u32, observations: &[(u32, u8)]) -> Read {
        let mut read = Read::new(name.to_string(), 0, sample_id, 60);
        for &(position, allele) in observations.iter() {
            read.add_observation(position, AlleleType::from_repr(allele).unwrap(), 20);
        }
        read
    }

    fn single_sample_problem() -> PhaseProblem {
        let read_set = ReadSet::new(vec![
            build_read("r1", 7, &[(100, 0), (200, 1), (300, 0)]),
            build_read("r2", 7, &[(100, 1), (200, 0)]),
            build_read("r3", 7, &[(200, 0), (300, 1)])
        ]);
        let mut pedigree = Pedigree::new();
        pedigree.add_individual(7, vec![], vec![]).unwrap();
        PhaseProblem {
            region_index: 3,
            region: "chr1".to_string(),
            read_set,
            pedigree,
            positions: None
        }
    }

    #[test]
    fn test_solve_region() {
        let problem = single_sample_problem();
        let result = solve_region(&problem, &RecombinationMap::default(), &PhasingConfig::default()).unwrap();
        assert_eq!(result.region_index, 3);
        assert_eq!(result.sample_ids, vec![7]);
        assert_eq!(result.outcome.optimal_cost, 0);
        assert_eq!(result.outcome.positions(), vec![100, 200, 300]);

        // r1 is alone on its side, the other two share the opposite one
        let side_of = |name: &str| -> Option<u8> {
            result.reads.iter().find(|r| r.read_name == name).and_then(|r| r.side)
        };
        assert_eq!(result.reads.len(), 3);
        assert!(side_of("r1").is_some());
        assert_eq!(side_of("r2"), side_of("r3"));
        assert_ne!(side_of("r1"), side_of("r2"));

        let stats = &result.statistics;
        assert_eq!(stats.num_columns(), 3);
        assert_eq!(stats.optimal_cost(), 0);
        assert_eq!(stats.max_active_reads(), 3);
        assert_eq!(stats.impossible_columns(), 0);
    }

    #[test]
    fn test_solve_region_capacity() {
        let problem = single_sample_problem();
        let config = PhasingConfig {
            max_reads_per_column: 2,
            ..Default::default()
        };
        let result = solve_region(&problem, &RecombinationMap::default(), &config);
        assert!(matches!(result, Err(PhasingError::CapacityExceeded { .. })));
    }

    #[test]
    fn test_genotype_region() {
        let mut problem = single_sample_problem();
        problem.positions = Some(vec![100, 200, 300, 400]);
        let result = genotype_region(&problem, &RecombinationMap::default(), &PhasingConfig::default()).unwrap();
        assert_eq!(result.calls.len(), 4);
        assert!(result.column_errors.is_empty());
        assert_eq!(result.statistics.num_columns(), 4);

        // one REF and one ALT observation at 100 and the phase is consistent across columns
        assert_eq!(result.calls[0].genotype, Genotype::new(vec![0, 1]));
        assert_eq!(result.calls[0].position, 100);
        assert_eq!(result.calls[3].position, 400);
    }
}
