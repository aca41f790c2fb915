
use crate::INFINITE_COST;
use crate::column_indexing::{ColumnCursor, ColumnLink};
use crate::column_iterator::{BackwardColumnIterator, ColumnIterator};
use crate::cost_computer::{add_costs, map_reads_to_individuals, ColumnCostComputer, GenotypeColumnCostComputer};
use crate::data_types::pedigree::{Pedigree, PedigreePartitions};
use crate::data_types::read_set::ReadSet;
use crate::dp_table::{best_state, check_width, fill_column, PhasingConfig};
use crate::errors::PhasingError;
use crate::transition::{RecombinationMap, TransitionProbabilityComputer};

use log::{debug, warn};

/// A DP over the same state space as the pedigree table, used for genotyping.
/// Every column's forward costs are kept so that a backward pass can compute,
/// for each individual and genotype, the cost of the best solution that assigns that genotype (max-marginals).
pub struct GenotypeDPTable<'a> {
    read_set: &'a ReadSet,
    pedigree: &'a Pedigree,
    positions: Vec<u32>,
    config: PhasingConfig,
    partitions: Vec<PedigreePartitions>,
    transmission_bits: usize,
    transitions: TransitionProbabilityComputer,
    read_individual: Vec<usize>,
    /// per column link to the previous column
    links: Vec<ColumnLink>,
    /// per column cumulative forward costs
    forward_costs: Vec<Vec<u64>>,
    /// per column, true if the column had to be solved without genotype priors
    lifted: Vec<bool>,
    /// optimal total cost, None until filled
    optimal_cost: Option<u64>
}

impl<'a> GenotypeDPTable<'a> {
    /// # Arguments
    /// * `read_set` - the reads, every read sample must be in the pedigree
    /// * `pedigree` - the family, per-column genotype likelihoods are indexed by position in `positions`
    /// * `positions` - the column positions, None to use every position covered by the reads
    /// * `recombination_map` - source of genetic distances
    /// * `config` - limits
    pub fn new(
        read_set: &'a ReadSet, pedigree: &'a Pedigree, positions: Option<&[u32]>,
        recombination_map: &RecombinationMap, config: &PhasingConfig
    ) -> Result<GenotypeDPTable<'a>, PhasingError> {
        let (transmission_vectors, partitions): (Vec<u64>, Vec<PedigreePartitions>) =
            PedigreePartitions::enumerate(pedigree, config.max_combinatorial_width)?.into_iter().unzip();
        let read_individual = map_reads_to_individuals(read_set, pedigree)?;
        let positions: Vec<u32> = ColumnIterator::with_positions(read_set, positions.unwrap_or(read_set.positions()))
            .positions()
            .to_vec();
        let transitions = TransitionProbabilityComputer::new(&positions, recombination_map, transmission_vectors);

        Ok(GenotypeDPTable {
            read_set,
            pedigree,
            positions,
            config: config.clone(),
            partitions,
            transmission_bits: 2 * pedigree.num_trios(),
            transitions,
            read_individual,
            links: vec![],
            forward_costs: vec![],
            lifted: vec![],
            optimal_cost: None
        })
    }

    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    pub fn optimal_cost(&self) -> Option<u64> {
        self.optimal_cost
    }

    /// Positions of the columns that had no admissible genotype assignment
    pub fn impossible_columns(&self) -> Vec<PhasingError> {
        self.lifted.iter().enumerate()
            .filter(|(_c, &lifted)| lifted)
            .map(|(c, _lifted)| PhasingError::ImpossibleGenotype { position: self.positions[c], column: c })
            .collect()
    }

    /// Runs the forward pass, keeping every column's costs
    pub fn fill(&mut self) -> Result<(), PhasingError> {
        if self.optimal_cost.is_some() {
            return Ok(());
        }
        // a previous attempt may have failed part way through
        self.links.clear();
        self.forward_costs.clear();
        self.lifted.clear();
        let mut computer = GenotypeColumnCostComputer::new(self.pedigree, &self.partitions, &self.read_individual);
        let mut cursor = ColumnCursor::new(self.config.max_reads_per_column);

        for column in ColumnIterator::with_positions(self.read_set, &self.positions) {
            let (scheme, link) = cursor.advance(&column)?;
            check_width(&scheme, self.transmission_bits, &self.config)?;
            let filled = fill_column(&mut computer, &column, &link, self.forward_costs.last().map(|c| c.as_slice()), &self.transitions)?;
            if filled.lifted {
                warn!("No admissible genotype at position {}, genotyping column {} without priors", column.position(), column.index());
            }
            self.links.push(link);
            self.forward_costs.push(filled.costs);
            self.lifted.push(filled.lifted);
        }

        let optimal_cost = self.forward_costs.last()
            .map(|costs| best_state(costs).0)
            .unwrap_or(0);
        debug!("Genotype table filled {} columns, optimal cost {}", self.positions.len(), optimal_cost);
        self.optimal_cost = Some(optimal_cost);
        Ok(())
    }

    /// Computes the max-marginal cost of every genotype.
    /// Returns, per column and per individual, the cost of the best complete solution in which the individual has 0, 1 or 2 ALT copies.
    pub fn max_marginals(&mut self) -> Result<Vec<Vec<[u64; 3]>>, PhasingError> {
        self.fill()?;
        let num_transmissions = self.transitions.num_transmissions();
        let num_columns = self.positions.len();
        let mut computer = GenotypeColumnCostComputer::new(self.pedigree, &self.partitions, &self.read_individual);
        let mut marginals: Vec<Vec<[u64; 3]>> = vec![vec![]; num_columns];

        // best cost of the columns after the current one, per state of the current column
        let mut backward: Vec<u64> = match self.forward_costs.last() {
            Some(costs) => vec![0; costs.len()],
            None => vec![]
        };

        for column in BackwardColumnIterator::with_positions(self.read_set, &self.positions) {
            let c = column.index();
            let overflow = || PhasingError::NumericOverflow { position: column.position() };
            let forward = &self.forward_costs[c];
            let link = &self.links[c];
            computer.set_column(&column, self.lifted[c]);

            let mut column_marginals: Vec<[u64; 3]> = vec![[INFINITE_COST; 3]; self.pedigree.len()];
            // per (projection, transmission), the best column cost plus suffix cost, used for the previous column
            let mut projected: Vec<u64> = vec![INFINITE_COST; link.projection_size() * num_transmissions];
            for step in link.iter_next() {
                if let Some(bit) = step.changed_bit {
                    computer.flip(bit);
                }
                for t in 0..num_transmissions {
                    let state = step.index * num_transmissions + t;
                    let column_cost = computer.cost(t);
                    if column_cost == INFINITE_COST || forward[state] == INFINITE_COST || backward[state] == INFINITE_COST {
                        continue;
                    }

                    // forward includes this column's cost, so take it out before conditioning
                    let outside = add_costs(forward[state] - column_cost, backward[state]).ok_or_else(overflow)?;
                    for (individual, conditional) in computer.conditional_costs(t).iter().enumerate() {
                        for (g, &cost) in conditional.iter().enumerate() {
                            let total = add_costs(outside, cost).ok_or_else(overflow)?;
                            column_marginals[individual][g] = column_marginals[individual][g].min(total);
                        }
                    }

                    let slot = &mut projected[step.projection * num_transmissions + t];
                    *slot = (*slot).min(add_costs(column_cost, backward[state]).ok_or_else(overflow)?);
                }
            }
            marginals[c] = column_marginals;

            if c > 0 {
                let mut previous_backward: Vec<u64> = vec![INFINITE_COST; self.forward_costs[c - 1].len()];
                for step in link.iter_previous() {
                    for previous_t in 0..num_transmissions {
                        let mut best = INFINITE_COST;
                        for t in 0..num_transmissions {
                            let cost = add_costs(projected[step.projection * num_transmissions + t], self.transitions.cost(c, previous_t, t))
                                .ok_or_else(overflow)?;
                            best = best.min(cost);
                        }
                        previous_backward[step.index * num_transmissions + previous_t] = best;
                    }
                }
                backward = previous_backward;
            }
        }

        Ok(marginals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::genotype::PhredGenotypeLikelihoods;
    use crate::data_types::read_set::{AlleleType, Read};

    fn build_read(name: &str, sample_id: u32, observations: &[(u32, u8)]) -> Read {
        let mut read = Read::new(name.to_string(), 0, sample_id, 60);
        for &(position, allele) in observations.iter() {
            read.add_observation(position, AlleleType::from_repr(allele).unwrap(), 30);
        }
        read
    }

    #[test]
    fn test_marginals_minimum_is_optimal() {
        let read_set = ReadSet::new(vec![
            build_read("a", 0, &[(100, 1), (200, 0), (300, 1)]),
            build_read("b", 0, &[(100, 1), (200, 1)]),
            build_read("c", 0, &[(200, 1), (300, 1)]),
            build_read("d", 0, &[(100, 0), (300, 0)])
        ]);
        let mut pedigree = Pedigree::new();
        pedigree.add_individual(0, vec![], vec![]).unwrap();

        let mut table = GenotypeDPTable::new(&read_set, &pedigree, None, &RecombinationMap::default(), &PhasingConfig::default()).unwrap();
        let marginals = table.max_marginals().unwrap();
        let optimal = table.optimal_cost().unwrap();
        assert_eq!(marginals.len(), 3);

        // at every column, the best genotype is consistent with the global optimum
        for column_marginals in marginals.iter() {
            let best = column_marginals[0].iter().min().cloned().unwrap();
            assert_eq!(best, optimal);
        }
        assert!(table.impossible_columns().is_empty());
    }

    #[test]
    fn test_refill_after_failure() {
        let mut reads = vec![build_read("a", 0, &[(100, 0), (200, 1)])];
        for i in 0..4 {
            reads.push(build_read(&format!("r{i}"), 0, &[(200, 1), (300, 0)]));
        }
        let read_set = ReadSet::new(reads);
        let mut pedigree = Pedigree::new();
        pedigree.add_individual(0, vec![], vec![]).unwrap();
        let config = PhasingConfig { max_reads_per_column: 4, ..Default::default() };
        let mut table = GenotypeDPTable::new(&read_set, &pedigree, None, &RecombinationMap::default(), &config).unwrap();

        for _attempt in 0..2 {
            assert!(matches!(table.max_marginals(), Err(PhasingError::CapacityExceeded { position: 200, .. })));
            assert_eq!(table.forward_costs.len(), 1);
            assert_eq!(table.links.len(), 1);
            assert_eq!(table.lifted.len(), 1);
            assert_eq!(table.optimal_cost(), None);
        }
    }

    #[test]
    fn test_likelihood_priors() {
        // no reads at 200, so the genotype there is decided by the prior
        let read_set = ReadSet::new(vec![
            build_read("a", 0, &[(100, 1)]),
            build_read("b", 0, &[(100, 0)])
        ]);
        let gls = vec![
            None,
            Some(PhredGenotypeLikelihoods::diploid([50.0, 50.0, 0.0]).unwrap())
        ];
        let mut pedigree = Pedigree::new();
        pedigree.add_individual(0, vec![None, None], gls).unwrap();

        let mut table = GenotypeDPTable::new(&read_set, &pedigree, Some(&[100, 200][..]), &RecombinationMap::default(), &PhasingConfig::default()).unwrap();
        let marginals = table.max_marginals().unwrap();
        let at_200 = marginals[1][0];
        assert!(at_200[2] < at_200[0]);
        assert!(at_200[2] < at_200[1]);

        // one REF and one ALT read at 100 favours the heterozygous call
        let at_100 = marginals[0][0];
        assert!(at_100[1] < at_100[0]);
        assert!(at_100[1] < at_100[2]);
    }
}
