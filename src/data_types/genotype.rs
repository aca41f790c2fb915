use crate::INFINITE_COST;
use crate::binomial::binomial_coefficient;
use crate::data_types::read_set::Entry;
use crate::errors::PhasingError;

/// Phred values at or above this are treated as an impossible genotype when converted to integer costs
const MAX_FINITE_PHRED: f64 = 1.0e15;

/// An unordered genotype, stored as a sorted list of allele indices (0 = REF)
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Genotype {
    alleles: Vec<u8>
}

impl Genotype {
    /// Creates a genotype from any ordering of allele indices
    pub fn new(mut alleles: Vec<u8>) -> Genotype {
        alleles.sort_unstable();
        Genotype {
            alleles
        }
    }

    /// Creates a diploid biallelic genotype from an ALT copy count, None if `alt_count > 2`
    pub fn from_alt_count(alt_count: u8) -> Option<Genotype> {
        match alt_count {
            0 => Some(Genotype::new(vec![0, 0])),
            1 => Some(Genotype::new(vec![0, 1])),
            2 => Some(Genotype::new(vec![1, 1])),
            _ => None
        }
    }

    /// Inverse of `get_index()`.
    /// # Arguments
    /// * `index` - the VCF-ordered genotype index
    /// * `ploidy` - the number of alleles in the genotype
    pub fn from_index(index: u64, ploidy: usize) -> Genotype {
        let mut remainder: u64 = index;
        let mut alleles: Vec<u8> = vec![0; ploidy];
        for m in (0..ploidy).rev() {
            // largest allele such that C(allele + m, m + 1) <= remainder
            let mut allele: usize = 0;
            while binomial_coefficient(allele + 1 + m, m + 1) <= remainder {
                allele += 1;
            }
            remainder -= binomial_coefficient(allele + m, m + 1);
            alleles[m] = allele as u8;
        }
        Genotype::new(alleles)
    }

    pub fn alleles(&self) -> &[u8] {
        &self.alleles
    }

    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    /// Number of non-reference alleles
    pub fn alt_count(&self) -> u8 {
        self.alleles.iter().filter(|&&a| a != 0).count() as u8
    }

    pub fn is_homozygous(&self) -> bool {
        self.alleles.windows(2).all(|w| w[0] == w[1])
    }

    /// Returns the index of this genotype in VCF GL/PL order (0/0, 0/1, 1/1, 0/2, 1/2, 2/2, ...)
    pub fn get_index(&self) -> u64 {
        self.alleles.iter().enumerate()
            .map(|(m, &a)| binomial_coefficient(a as usize + m, m + 1))
            .sum()
    }

    /// Number of distinct genotypes for a given number of alleles and ploidy
    pub fn num_genotypes(num_alleles: usize, ploidy: usize) -> usize {
        if num_alleles == 0 {
            return 0;
        }
        binomial_coefficient(num_alleles + ploidy - 1, ploidy) as usize
    }
}

impl std::fmt::Display for Genotype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let strings: Vec<String> = self.alleles.iter().map(|a| a.to_string()).collect();
        write!(f, "{}", strings.join("/"))
    }
}

/// Phred-scaled genotype likelihoods in VCF genotype order, normalized such that the probabilities sum to 1
#[derive(Clone, Debug, PartialEq)]
pub struct PhredGenotypeLikelihoods {
    /// -10 * log10(P(genotype)), `f64::INFINITY` for impossible genotypes
    values: Vec<f64>,
    /// ploidy of the genotypes
    ploidy: usize,
    /// number of alleles at the site
    num_alleles: usize
}

impl PhredGenotypeLikelihoods {
    /// Creates and normalizes a likelihood vector from Phred values.
    /// # Arguments
    /// * `values` - Phred-scaled likelihoods, one per genotype in VCF order
    /// * `num_alleles` - the number of alleles at this site
    /// * `ploidy` - the ploidy of the genotypes
    /// # Errors
    /// * if the number of values does not match the number of genotypes
    /// * if a value is negative or NaN
    /// * if every genotype has zero probability
    pub fn new(values: Vec<f64>, num_alleles: usize, ploidy: usize) -> Result<PhredGenotypeLikelihoods, PhasingError> {
        let expected: usize = Genotype::num_genotypes(num_alleles, ploidy);
        if values.len() != expected {
            return Err(PhasingError::NumericUnderflow {
                context: format!("genotype likelihoods: expected {} values, found {}", expected, values.len())
            });
        }
        if values.iter().any(|v| v.is_nan() || *v < 0.0) {
            return Err(PhasingError::NumericUnderflow {
                context: format!("genotype likelihoods: invalid Phred values {values:?}")
            });
        }

        // shifting by the minimum guarantees one term is exactly 1, so the sum cannot underflow
        let min_value: f64 = values.iter().cloned().fold(f64::INFINITY, f64::min);
        if !min_value.is_finite() {
            return Err(PhasingError::NumericUnderflow {
                context: "genotype likelihoods: every genotype has zero probability".to_string()
            });
        }
        let total: f64 = values.iter()
            .map(|v| 10.0_f64.powf(-(v - min_value) / 10.0))
            .sum();
        let offset: f64 = 10.0 * total.log10();
        let values: Vec<f64> = values.into_iter()
            .map(|v| v - min_value + offset)
            .collect();

        Ok(PhredGenotypeLikelihoods {
            values,
            ploidy,
            num_alleles
        })
    }

    /// Convenience constructor for diploid biallelic sites (0/0, 0/1, 1/1)
    pub fn diploid(values: [f64; 3]) -> Result<PhredGenotypeLikelihoods, PhasingError> {
        PhredGenotypeLikelihoods::new(values.to_vec(), 2, 2)
    }

    /// Builds from log10-scaled likelihoods, e.g. the VCF GL field
    pub fn from_log10(values: &[f64], num_alleles: usize, ploidy: usize) -> Result<PhredGenotypeLikelihoods, PhasingError> {
        PhredGenotypeLikelihoods::new(values.iter().map(|v| -10.0 * v).collect(), num_alleles, ploidy)
    }

    /// Builds from (possibly un-normalized) probabilities
    /// # Errors
    /// * if all probabilities are zero, which typically means they underflowed upstream
    pub fn from_probabilities(probabilities: &[f64], num_alleles: usize, ploidy: usize) -> Result<PhredGenotypeLikelihoods, PhasingError> {
        if probabilities.iter().all(|&p| p <= 0.0) {
            return Err(PhasingError::NumericUnderflow {
                context: format!("genotype probabilities {probabilities:?}")
            });
        }
        let values: Vec<f64> = probabilities.iter()
            .map(|&p| if p <= 0.0 { f64::INFINITY } else { -10.0 * p.log10() })
            .collect();
        PhredGenotypeLikelihoods::new(values, num_alleles, ploidy)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    pub fn num_alleles(&self) -> usize {
        self.num_alleles
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Returns the Phred value for a genotype; genotypes outside of this site are impossible
    pub fn get(&self, genotype: &Genotype) -> f64 {
        self.values.get(genotype.get_index() as usize)
            .cloned()
            .unwrap_or(f64::INFINITY)
    }

    /// Returns the Phred value rounded to an integer DP cost, infinite values map to `INFINITE_COST`
    pub fn cost(&self, genotype: &Genotype) -> u64 {
        let value: f64 = self.get(genotype);
        if value >= MAX_FINITE_PHRED {
            INFINITE_COST
        } else {
            value.round() as u64
        }
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.values.iter()
            .map(|v| 10.0_f64.powf(-v / 10.0))
            .collect()
    }

    /// The most likely genotype, lowest index on ties
    pub fn likeliest(&self) -> Genotype {
        let mut best_index: usize = 0;
        for (i, &v) in self.values.iter().enumerate() {
            if v < self.values[best_index] {
                best_index = i;
            }
        }
        Genotype::from_index(best_index as u64, self.ploidy)
    }
}

/// A probability distribution over the three diploid biallelic genotypes (0, 1 or 2 ALT copies), stored in natural log space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenotypeDistribution {
    log_probabilities: [f64; 3]
}

impl Default for GenotypeDistribution {
    fn default() -> Self {
        GenotypeDistribution::uniform()
    }
}

impl GenotypeDistribution {
    pub fn uniform() -> GenotypeDistribution {
        GenotypeDistribution {
            log_probabilities: [-(3.0_f64.ln()); 3]
        }
    }

    /// Creates a distribution from un-normalized probabilities
    pub fn from_probabilities(probabilities: [f64; 3]) -> GenotypeDistribution {
        GenotypeDistribution {
            log_probabilities: probabilities.map(|p| if p <= 0.0 { f64::NEG_INFINITY } else { p.ln() })
        }
    }

    /// Creates a distribution from Phred-scaled costs, `INFINITE_COST` maps to zero probability
    pub fn from_phred_costs(costs: [u64; 3]) -> GenotypeDistribution {
        GenotypeDistribution {
            log_probabilities: costs.map(|c| {
                if c == INFINITE_COST {
                    f64::NEG_INFINITY
                } else {
                    -(c as f64) * std::f64::consts::LN_10 / 10.0
                }
            })
        }
    }

    /// Aggregates the evidence of all informative entries at one position into a genotype likelihood surface.
    /// Each entry contributes P(observation | genotype) assuming each haplotype is sampled with equal probability.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> GenotypeDistribution {
        let mut log_probabilities: [f64; 3] = [0.0; 3];
        for entry in entries.into_iter().filter(|e| e.allele().is_informative()) {
            // error rates above 0.5 would make the read anti-informative, so clip there
            let error_rate: f64 = 10.0_f64.powf(-(entry.quality() as f64) / 10.0).min(0.5);
            let p_observed_from_alt: f64 = if entry.allele() as u8 == 1 { 1.0 - error_rate } else { error_rate };
            let p_observed_from_ref: f64 = 1.0 - p_observed_from_alt;
            for (alt_count, lp) in log_probabilities.iter_mut().enumerate() {
                let alt_fraction: f64 = alt_count as f64 / 2.0;
                *lp += (alt_fraction * p_observed_from_alt + (1.0 - alt_fraction) * p_observed_from_ref).ln();
            }
        }
        GenotypeDistribution {
            log_probabilities
        }
    }

    /// Product of two independent distributions
    pub fn combine(&self, other: &GenotypeDistribution) -> GenotypeDistribution {
        let mut log_probabilities = self.log_probabilities;
        for (lp, olp) in log_probabilities.iter_mut().zip(other.log_probabilities.iter()) {
            *lp += olp;
        }
        GenotypeDistribution {
            log_probabilities
        }
    }

    /// Rescales the distribution to sum to 1.
    /// # Errors
    /// * if every genotype has zero probability
    pub fn normalized(&self) -> Result<GenotypeDistribution, PhasingError> {
        let max_value: f64 = self.log_probabilities.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !max_value.is_finite() {
            return Err(PhasingError::NumericUnderflow {
                context: format!("genotype distribution {:?}", self.log_probabilities)
            });
        }
        let log_total: f64 = max_value + self.log_probabilities.iter()
            .map(|lp| (lp - max_value).exp())
            .sum::<f64>()
            .ln();
        Ok(GenotypeDistribution {
            log_probabilities: self.log_probabilities.map(|lp| lp - log_total)
        })
    }

    pub fn log_probabilities(&self) -> [f64; 3] {
        self.log_probabilities
    }

    /// Probability of a given ALT count; only meaningful on a normalized distribution
    pub fn probability(&self, alt_count: usize) -> f64 {
        self.log_probabilities[alt_count].exp()
    }

    /// The most likely genotype, lowest ALT count on ties
    pub fn likeliest(&self) -> Genotype {
        let mut best: usize = 0;
        for alt_count in 1..3 {
            if self.log_probabilities[alt_count] > self.log_probabilities[best] {
                best = alt_count;
            }
        }
        // best is always in 0..3
        Genotype::from_alt_count(best as u8).unwrap_or_else(|| Genotype::new(vec![0, 0]))
    }

    /// Probability that the likeliest genotype is wrong
    pub fn error_probability(&self) -> Result<f64, PhasingError> {
        let normalized = self.normalized()?;
        let best = normalized.likeliest().alt_count() as usize;
        Ok((1.0 - normalized.probability(best)).max(0.0))
    }

    /// Converts to normalized Phred-scaled likelihoods
    pub fn to_phred_likelihoods(&self) -> Result<PhredGenotypeLikelihoods, PhasingError> {
        let values: Vec<f64> = self.log_probabilities.iter()
            .map(|lp| -10.0 * lp / std::f64::consts::LN_10)
            .collect();
        PhredGenotypeLikelihoods::new(values, 2, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::read_set::AlleleType;

    #[test]
    fn test_genotype_index() {
        let expected_order = [
            vec![0, 0], vec![0, 1], vec![1, 1], vec![0, 2], vec![1, 2], vec![2, 2]
        ];
        for (index, alleles) in expected_order.iter().enumerate() {
            let genotype = Genotype::new(alleles.clone());
            assert_eq!(genotype.get_index(), index as u64);
            assert_eq!(Genotype::from_index(index as u64, 2), genotype);
        }

        // triploid round trip across every index
        for index in 0..Genotype::num_genotypes(3, 3) as u64 {
            assert_eq!(Genotype::from_index(index, 3).get_index(), index);
        }
        assert_eq!(Genotype::num_genotypes(2, 2), 3);
        assert_eq!(Genotype::num_genotypes(3, 2), 6);
    }

    #[test]
    fn test_genotype_basics() {
        let genotype = Genotype::new(vec![1, 0]);
        assert_eq!(genotype.alleles(), &[0, 1]);
        assert_eq!(genotype.alt_count(), 1);
        assert!(!genotype.is_homozygous());
        assert_eq!(genotype.to_string(), "0/1");
        assert_eq!(Genotype::from_alt_count(2), Some(Genotype::new(vec![1, 1])));
        assert_eq!(Genotype::from_alt_count(3), None);
    }

    #[test]
    fn test_phred_likelihoods() {
        let gl = PhredGenotypeLikelihoods::diploid([0.0, 0.0, f64::INFINITY]).unwrap();
        // two equally likely genotypes at 50% each is ~3.01 phred
        assert!((gl.values()[0] - 3.0103).abs() < 1e-3);
        assert_eq!(gl.cost(&Genotype::from_alt_count(1).unwrap()), 3);
        assert_eq!(gl.cost(&Genotype::from_alt_count(2).unwrap()), INFINITE_COST);
        assert_eq!(gl.likeliest(), Genotype::from_alt_count(0).unwrap());
        let total: f64 = gl.probabilities().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);

        let gl = PhredGenotypeLikelihoods::from_log10(&[-5.0, -0.1, -3.0], 2, 2).unwrap();
        assert_eq!(gl.likeliest(), Genotype::from_alt_count(1).unwrap());

        assert!(PhredGenotypeLikelihoods::new(vec![1.0, 2.0], 2, 2).is_err());
        assert!(PhredGenotypeLikelihoods::diploid([f64::INFINITY; 3]).is_err());
        assert!(PhredGenotypeLikelihoods::from_probabilities(&[0.0, 0.0, 0.0], 2, 2).is_err());
    }

    #[test]
    fn test_distribution_from_entries() {
        let entries = vec![
            Entry::new(0, 10, AlleleType::Alternate, 20),
            Entry::new(1, 10, AlleleType::Alternate, 20),
            Entry::new(2, 10, AlleleType::Reference, 20),
            Entry::new(3, 10, AlleleType::Blank, 0)
        ];
        let distribution = GenotypeDistribution::from_entries(entries.iter()).normalized().unwrap();
        assert_eq!(distribution.likeliest(), Genotype::from_alt_count(1).unwrap());
        let total: f64 = (0..3).map(|g| distribution.probability(g)).sum();
        assert!((total - 1.0).abs() < 1e-9);

        // lots of alt support should flip us to homozygous
        let alt_entries: Vec<Entry> = (0..10).map(|i| Entry::new(i, 10, AlleleType::Alternate, 30)).collect();
        let distribution = GenotypeDistribution::from_entries(alt_entries.iter());
        assert_eq!(distribution.likeliest(), Genotype::from_alt_count(2).unwrap());
        // het explains ten ALT reads with probability 0.5^10, so about 1e-3 of the mass stays off hom-ALT
        let error = distribution.error_probability().unwrap();
        assert!(error > 5e-4);
        assert!(error < 2e-3);

        // combining with a prior that forbids hom-alt moves us back to het
        let prior = GenotypeDistribution::from_phred_costs([0, 0, INFINITE_COST]);
        assert_eq!(distribution.combine(&prior).likeliest(), Genotype::from_alt_count(1).unwrap());

        let phred = distribution.to_phred_likelihoods().unwrap();
        assert_eq!(phred.likeliest(), Genotype::from_alt_count(2).unwrap());
    }

    #[test]
    fn test_distribution_underflow() {
        let impossible = GenotypeDistribution::from_phred_costs([INFINITE_COST; 3]);
        assert!(matches!(impossible.normalized(), Err(PhasingError::NumericUnderflow { .. })));
    }
}
