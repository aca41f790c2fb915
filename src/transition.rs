
use crate::data_types::genetic_map::GeneticMap;

/// Default recombination rate, in cM per Mb
pub const DEFAULT_RECOMBINATION_RATE: f64 = 1.26;
/// Cost charged per recombination between two columns at (effectively) the same genetic position
pub const ZERO_DISTANCE_RECOMBINATION_COST: u64 = 1000;
/// Genetic distances below this (in cM) are treated as zero
const MIN_GENETIC_DISTANCE: f64 = 1e-10;

/// Source of genetic distances between adjacent columns
#[derive(Clone, Debug)]
pub enum RecombinationMap {
    /// constant rate in cM/Mb
    Uniform(f64),
    /// interpolated map, extrapolated with the uniform rate (cM/Mb) when the map has a single point
    Map(GeneticMap, f64)
}

impl Default for RecombinationMap {
    fn default() -> Self {
        RecombinationMap::Uniform(DEFAULT_RECOMBINATION_RATE)
    }
}

impl RecombinationMap {
    /// Genetic distance (cM) between two physical positions
    pub fn distance(&self, pos1: u32, pos2: u32) -> f64 {
        match self {
            RecombinationMap::Uniform(rate) => (pos2 as f64 - pos1 as f64).abs() * rate * 1e-6,
            RecombinationMap::Map(map, rate) => map.genetic_distance(pos1, pos2, rate * 1e-6)
        }
    }
}

/// Converts a genetic distance into a Phred-scaled recombination cost with Haldane's map function
pub fn recombination_cost(distance_cm: f64) -> u64 {
    if distance_cm < MIN_GENETIC_DISTANCE {
        return ZERO_DISTANCE_RECOMBINATION_COST;
    }
    let probability = (1.0 - (-2.0 * distance_cm / 100.0).exp()) / 2.0;
    (-10.0 * probability.log10()).round() as u64
}

/// Computes the cost of changing the transmission vector between adjacent columns.
/// The cost is the number of changed transmission bits times the recombination cost of the gap.
#[derive(Clone, Debug)]
pub struct TransitionProbabilityComputer {
    /// per column, the cost of one recombination since the previous column (0 for the first column)
    column_costs: Vec<u64>,
    /// transmission vectors in enumeration order
    transmission_vectors: Vec<u64>
}

impl TransitionProbabilityComputer {
    /// # Arguments
    /// * `positions` - the column positions in order
    /// * `map` - the source of genetic distances
    /// * `transmission_vectors` - the transmission vectors, indexed by transmission index
    pub fn new(positions: &[u32], map: &RecombinationMap, transmission_vectors: Vec<u64>) -> TransitionProbabilityComputer {
        let mut column_costs: Vec<u64> = Vec::with_capacity(positions.len());
        if !positions.is_empty() {
            column_costs.push(0);
        }
        for window in positions.windows(2) {
            column_costs.push(recombination_cost(map.distance(window[0], window[1])));
        }
        TransitionProbabilityComputer {
            column_costs,
            transmission_vectors
        }
    }

    pub fn num_transmissions(&self) -> usize {
        self.transmission_vectors.len()
    }

    pub fn transmission_vector(&self, transmission_index: usize) -> u64 {
        self.transmission_vectors[transmission_index]
    }

    /// Cost of a single recombination entering `column`
    pub fn recombination_cost(&self, column: usize) -> u64 {
        self.column_costs[column]
    }

    /// Cost of moving from transmission index `from` at `column - 1` to `to` at `column`
    pub fn cost(&self, column: usize, from: usize, to: usize) -> u64 {
        let changed = (self.transmission_vectors[from] ^ self.transmission_vectors[to]).count_ones() as u64;
        changed.saturating_mul(self.column_costs[column])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haldane() {
        assert_eq!(recombination_cost(0.0), ZERO_DISTANCE_RECOMBINATION_COST);
        // 1 cM is ~0.0099 recombination probability, 20 Phred
        assert_eq!(recombination_cost(1.0), 20);
        // far apart converges on 50%
        assert_eq!(recombination_cost(1000.0), 3);
        assert!(recombination_cost(0.001) > recombination_cost(0.1));
    }

    #[test]
    fn test_transition_costs() {
        let map = RecombinationMap::Uniform(1.0);
        assert!((map.distance(2_000_000, 1_000_000) - 1.0).abs() < 1e-9);

        let computer = TransitionProbabilityComputer::new(&[1_000_000, 2_000_000, 2_000_000], &map, vec![0, 1, 3, 2]);
        assert_eq!(computer.num_transmissions(), 4);
        assert_eq!(computer.recombination_cost(0), 0);
        assert_eq!(computer.recombination_cost(1), 20);
        assert_eq!(computer.recombination_cost(2), 1000);
        assert_eq!(computer.cost(1, 0, 0), 0);
        assert_eq!(computer.cost(1, 0, 2), 40);
        assert_eq!(computer.cost(2, 1, 2), 1000);
    }

    #[test]
    fn test_genetic_map_distances() {
        let genetic_map = GeneticMap::new(vec![(1000, 0.0), (2000, 1.0)]).unwrap();
        let map = RecombinationMap::Map(genetic_map, DEFAULT_RECOMBINATION_RATE);
        assert!((map.distance(1000, 2000) - 1.0).abs() < 1e-12);
        assert!((map.distance(1500, 3000) - 1.5).abs() < 1e-12);
    }
}
