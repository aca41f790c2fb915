use crate::data_types::genotype::{Genotype, PhredGenotypeLikelihoods};
use crate::errors::{CapacityKind, PhasingError};
use crate::graycode::{GrayCodes, MAX_GRAYCODE_WIDTH};

use log::trace;
use priority_queue::PriorityQueue;
use rustc_hash::FxHashMap as HashMap;
use std::cmp::Reverse;

/// One member of the pedigree along with any genotype information for each column
#[derive(Clone, Debug)]
pub struct Individual {
    /// the external sample id
    id: u32,
    /// known genotype per column, None if unknown
    genotypes: Vec<Option<Genotype>>,
    /// genotype likelihoods per column, None if unavailable
    likelihoods: Vec<Option<PhredGenotypeLikelihoods>>
}

impl Individual {
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// A parent-child relationship, stored with internal individual indices
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Trio {
    pub father: usize,
    pub mother: usize,
    pub child: usize
}

/// A family structure made of individuals and trios.
/// Individuals are referenced by their index, which is their insertion order.
#[derive(Clone, Debug, Default)]
pub struct Pedigree {
    /// all individuals in insertion order
    individuals: Vec<Individual>,
    /// sample id to index
    id_to_index: HashMap<u32, usize>,
    /// trios in insertion order
    trios: Vec<Trio>,
    /// indices into `trios` such that any parent's own trio comes before the child's
    trio_order: Vec<usize>,
    /// for each individual, the trio in which it is the child
    child_trio: Vec<Option<usize>>
}

impl Pedigree {
    pub fn new() -> Pedigree {
        Default::default()
    }

    /// Adds an individual with optional per-column genotype information.
    /// # Arguments
    /// * `id` - the sample id, must be unique
    /// * `genotypes` - a hard diploid biallelic genotype per column, or None if unknown
    /// * `likelihoods` - diploid biallelic genotype likelihoods per column, or None if unavailable
    /// # Errors
    /// * if the id is already present
    /// * if a genotype is not diploid biallelic, or the two vectors have different lengths
    pub fn add_individual(
        &mut self, id: u32, genotypes: Vec<Option<Genotype>>, likelihoods: Vec<Option<PhredGenotypeLikelihoods>>
    ) -> Result<usize, PhasingError> {
        if self.id_to_index.contains_key(&id) {
            return Err(PhasingError::PedigreeInconsistency {
                individual: id,
                reason: "individual was added twice".to_string()
            });
        }
        if !likelihoods.is_empty() && !genotypes.is_empty() && likelihoods.len() != genotypes.len() {
            return Err(PhasingError::InvalidGenotype {
                individual: id,
                reason: format!("{} genotypes but {} likelihood vectors", genotypes.len(), likelihoods.len())
            });
        }
        for genotype in genotypes.iter().flatten() {
            if genotype.ploidy() != 2 || genotype.alleles().iter().any(|&a| a > 1) {
                return Err(PhasingError::InvalidGenotype {
                    individual: id,
                    reason: format!("genotype {genotype} is not diploid biallelic")
                });
            }
        }
        for gl in likelihoods.iter().flatten() {
            if gl.ploidy() != 2 || gl.num_alleles() != 2 {
                return Err(PhasingError::InvalidGenotype {
                    individual: id,
                    reason: format!("likelihoods for {} alleles with ploidy {}", gl.num_alleles(), gl.ploidy())
                });
            }
        }

        let index = self.individuals.len();
        self.individuals.push(Individual {
            id,
            genotypes,
            likelihoods
        });
        self.id_to_index.insert(id, index);
        self.child_trio.push(None);
        Ok(index)
    }

    /// Adds a trio relationship using sample ids.
    /// # Errors
    /// * if any id is unknown, if the parents are not distinct from each other and the child
    /// * if the child already has parents
    /// * if the relationship would create a cycle
    pub fn add_relationship(&mut self, father_id: u32, mother_id: u32, child_id: u32) -> Result<(), PhasingError> {
        let lookup = |id: u32| -> Result<usize, PhasingError> {
            self.id_to_index.get(&id).cloned().ok_or(PhasingError::PedigreeInconsistency {
                individual: id,
                reason: "individual is not in the pedigree".to_string()
            })
        };
        let father = lookup(father_id)?;
        let mother = lookup(mother_id)?;
        let child = lookup(child_id)?;

        if father == mother || father == child || mother == child {
            return Err(PhasingError::PedigreeInconsistency {
                individual: child_id,
                reason: format!("father ({father_id}), mother ({mother_id}) and child must be distinct")
            });
        }
        if self.child_trio[child].is_some() {
            return Err(PhasingError::PedigreeInconsistency {
                individual: child_id,
                reason: "individual already has parents".to_string()
            });
        }

        self.trios.push(Trio { father, mother, child });
        self.child_trio[child] = Some(self.trios.len() - 1);
        match self.topological_order() {
            Some(order) => {
                self.trio_order = order;
                Ok(())
            },
            None => {
                self.trios.pop();
                self.child_trio[child] = None;
                Err(PhasingError::PedigreeInconsistency {
                    individual: child_id,
                    reason: "relationship creates a cycle".to_string()
                })
            }
        }
    }

    /// Kahn ordering of the individuals (lowest index first among the ready ones), mapped to trio order.
    /// Returns None if the relationship graph has a cycle.
    fn topological_order(&self) -> Option<Vec<usize>> {
        let num_individuals = self.individuals.len();
        let mut in_degree: Vec<usize> = vec![0; num_individuals];
        let mut children: Vec<Vec<usize>> = vec![vec![]; num_individuals];
        for trio in self.trios.iter() {
            in_degree[trio.child] += 2;
            children[trio.father].push(trio.child);
            children[trio.mother].push(trio.child);
        }

        let mut ready: PriorityQueue<usize, Reverse<usize>> = PriorityQueue::new();
        for (index, &degree) in in_degree.iter().enumerate() {
            if degree == 0 {
                ready.push(index, Reverse(index));
            }
        }

        let mut trio_order: Vec<usize> = Vec::with_capacity(self.trios.len());
        let mut num_visited: usize = 0;
        while let Some((index, _priority)) = ready.pop() {
            num_visited += 1;
            if let Some(trio_index) = self.child_trio[index] {
                trio_order.push(trio_index);
            }
            for &child in children[index].iter() {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(child, Reverse(child));
                }
            }
        }

        if num_visited == num_individuals {
            Some(trio_order)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn num_trios(&self) -> usize {
        self.trios.len()
    }

    /// Trios in processing order, every parent's own trio (if any) comes before its children's
    pub fn trios(&self) -> impl Iterator<Item = &Trio> {
        self.trio_order.iter().map(|&t| &self.trios[t])
    }

    /// Individuals that are not the child of any trio, in insertion order
    pub fn founders(&self) -> Vec<usize> {
        (0..self.individuals.len())
            .filter(|&i| self.child_trio[i].is_none())
            .collect()
    }

    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.id_to_index.get(&id).cloned()
    }

    pub fn individual(&self, index: usize) -> &Individual {
        &self.individuals[index]
    }

    pub fn id_of(&self, index: usize) -> u32 {
        self.individuals[index].id
    }

    /// Known genotype of an individual at a column
    pub fn genotype(&self, index: usize, column: usize) -> Option<&Genotype> {
        self.individuals[index].genotypes.get(column).and_then(|g| g.as_ref())
    }

    /// Genotype likelihoods of an individual at a column
    pub fn genotype_likelihoods(&self, index: usize, column: usize) -> Option<&PhredGenotypeLikelihoods> {
        self.individuals[index].likelihoods.get(column).and_then(|g| g.as_ref())
    }
}

/// For one transmission vector, the assignment of every (individual, haplotype) pair to a founder haplotype partition
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PedigreePartitions {
    /// partition of haplotype 0 (paternal) and 1 (maternal) of each individual
    haplotype_to_partition: Vec<[usize; 2]>,
    /// number of partitions, two per founder
    count: usize
}

impl PedigreePartitions {
    /// Resolves the partitions for a transmission vector.
    /// # Arguments
    /// * `pedigree` - the family structure
    /// * `transmission_vector` - bit 2k selects the transmitted paternal haplotype of trio k (in processing order), bit 2k+1 the maternal one
    pub fn new(pedigree: &Pedigree, transmission_vector: u64) -> PedigreePartitions {
        let mut haplotype_to_partition: Vec<[usize; 2]> = vec![[usize::MAX; 2]; pedigree.len()];
        let founders = pedigree.founders();
        for (f, &founder) in founders.iter().enumerate() {
            haplotype_to_partition[founder] = [2 * f, 2 * f + 1];
        }
        for (k, trio) in pedigree.trios().enumerate() {
            let paternal = ((transmission_vector >> (2 * k)) & 1) as usize;
            let maternal = ((transmission_vector >> (2 * k + 1)) & 1) as usize;
            haplotype_to_partition[trio.child] = [
                haplotype_to_partition[trio.father][paternal],
                haplotype_to_partition[trio.mother][maternal]
            ];
        }
        PedigreePartitions {
            haplotype_to_partition,
            count: 2 * founders.len()
        }
    }

    /// Returns every transmission vector and its partitions, in Gray-code order.
    /// Every column enumerates the transmission vectors and, per vector, the allele assignments of the founder partitions,
    /// so both kinds of bits count against `max_width`.
    /// # Errors
    /// * if two bits per trio plus two bits per founder exceed `max_width` (or the Gray-code limit)
    pub fn enumerate(pedigree: &Pedigree, max_width: usize) -> Result<Vec<(u64, PedigreePartitions)>, PhasingError> {
        let transmission_bits: usize = 2 * pedigree.num_trios();
        let founder_bits: usize = 2 * pedigree.founders().len();
        let limit: usize = max_width.min(MAX_GRAYCODE_WIDTH);
        if transmission_bits + founder_bits > limit {
            return Err(PhasingError::CapacityExceeded {
                what: CapacityKind::CombinatorialWidth,
                position: 0,
                observed: transmission_bits + founder_bits,
                limit
            });
        }
        let codes = GrayCodes::new(transmission_bits)?;
        trace!("Enumerating {} transmission vectors", codes.len());
        Ok(codes
            .map(|(transmission_vector, _changed)| (transmission_vector, PedigreePartitions::new(pedigree, transmission_vector)))
            .collect())
    }

    pub fn haplotype_to_partition(&self, individual: usize, haplotype: usize) -> usize {
        self.haplotype_to_partition[individual][haplotype]
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// grandparents 1+2 -> 3, 3+4 -> 5, added in a shuffled order
    fn three_generation_pedigree() -> Pedigree {
        let mut pedigree = Pedigree::new();
        for id in [5, 3, 1, 2, 4] {
            pedigree.add_individual(id, vec![], vec![]).unwrap();
        }
        pedigree.add_relationship(3, 4, 5).unwrap();
        pedigree.add_relationship(1, 2, 3).unwrap();
        pedigree
    }

    #[test]
    fn test_founders_and_order() {
        let pedigree = three_generation_pedigree();
        assert_eq!(pedigree.len(), 5);
        let founder_ids: Vec<u32> = pedigree.founders().iter().map(|&i| pedigree.id_of(i)).collect();
        assert_eq!(founder_ids, vec![1, 2, 4]);

        // the trio with child 3 has to come first
        let children: Vec<u32> = pedigree.trios().map(|t| pedigree.id_of(t.child)).collect();
        assert_eq!(children, vec![3, 5]);
    }

    #[test]
    fn test_inconsistencies() {
        let mut pedigree = three_generation_pedigree();
        assert!(matches!(pedigree.add_individual(3, vec![], vec![]), Err(PhasingError::PedigreeInconsistency { individual: 3, .. })));
        assert!(matches!(pedigree.add_relationship(1, 2, 5), Err(PhasingError::PedigreeInconsistency { individual: 5, .. })));
        assert!(matches!(pedigree.add_relationship(1, 1, 4), Err(PhasingError::PedigreeInconsistency { .. })));
        assert!(matches!(pedigree.add_relationship(1, 9, 4), Err(PhasingError::PedigreeInconsistency { individual: 9, .. })));

        // 5 -> 1 would close a loop, and must leave the pedigree untouched
        assert!(matches!(pedigree.add_relationship(5, 4, 1), Err(PhasingError::PedigreeInconsistency { individual: 1, .. })));
        assert_eq!(pedigree.num_trios(), 2);
        assert_eq!(pedigree.founders().len(), 3);

        let bad = vec![Some(Genotype::new(vec![0, 2]))];
        assert!(matches!(pedigree.add_individual(10, bad, vec![]), Err(PhasingError::InvalidGenotype { .. })));
    }

    #[test]
    fn test_partitions() {
        let pedigree = three_generation_pedigree();
        let i3 = pedigree.index_of(3).unwrap();
        let i5 = pedigree.index_of(5).unwrap();
        let i4 = pedigree.index_of(4).unwrap();

        // founders in insertion order: 1 -> {0, 1}, 2 -> {2, 3}, 4 -> {4, 5}
        let partitions = PedigreePartitions::new(&pedigree, 0);
        assert_eq!(partitions.count(), 6);
        assert_eq!(partitions.haplotype_to_partition(i4, 1), 5);
        assert_eq!(partitions.haplotype_to_partition(i3, 0), 0);
        assert_eq!(partitions.haplotype_to_partition(i3, 1), 2);
        assert_eq!(partitions.haplotype_to_partition(i5, 0), 0);
        assert_eq!(partitions.haplotype_to_partition(i5, 1), 4);

        // trio 0 (child 3): paternal 1, maternal 1; trio 1 (child 5): paternal 1, maternal 0
        let partitions = PedigreePartitions::new(&pedigree, 0b0111);
        assert_eq!(partitions.haplotype_to_partition(i3, 0), 1);
        assert_eq!(partitions.haplotype_to_partition(i3, 1), 3);
        assert_eq!(partitions.haplotype_to_partition(i5, 0), 3);
        assert_eq!(partitions.haplotype_to_partition(i5, 1), 4);

        let all = PedigreePartitions::enumerate(&pedigree, 24).unwrap();
        assert_eq!(all.len(), 16);
        assert_eq!(all[0].0, 0);
        assert_eq!(all[2].0, 3);
        // 2 trios and 3 founders
        assert!(matches!(PedigreePartitions::enumerate(&pedigree, 9), Err(PhasingError::CapacityExceeded { observed: 10, limit: 9, .. })));
        assert_eq!(PedigreePartitions::enumerate(&pedigree, 10).unwrap().len(), 16);
    }

    #[test]
    fn test_many_founders() {
        let mut pedigree = Pedigree::new();
        for id in 0..32 {
            pedigree.add_individual(id, vec![], vec![]).unwrap();
        }
        assert_eq!(PedigreePartitions::enumerate(&pedigree, 24), Err(PhasingError::CapacityExceeded {
            what: CapacityKind::CombinatorialWidth, position: 0, observed: 64, limit: 24
        }));
        // a larger configured width is still capped below the 64-bit assignment space
        assert!(matches!(PedigreePartitions::enumerate(&pedigree, 100), Err(PhasingError::CapacityExceeded { limit: 63, .. })));

        let mut small = Pedigree::new();
        for id in 0..12 {
            small.add_individual(id, vec![], vec![]).unwrap();
        }
        assert!(PedigreePartitions::enumerate(&small, 23).is_err());
        assert_eq!(PedigreePartitions::enumerate(&small, 24).unwrap().len(), 1);
    }
}
