
/// Piecewise-linear physical to genetic position map
pub mod genetic_map;
/// Genotype, genotype likelihoods, and per-site genotype distributions
pub mod genotype;
/// Bit-vector backed set of small indices
pub mod index_set;
/// Family structure and the founder partitions induced by each transmission vector
pub mod pedigree;
/// Contains the Entry / Read / ReadSet observation types
pub mod read_set;
