
/// Phred cost used for impossible states and assignments; every finite cost is strictly below it
pub const INFINITE_COST: u64 = u64::MAX;

/// Pascal's triangle lookups for genotype indexing
pub mod binomial;
/// CLI functionality and checks
pub mod cli;
/// Per-column read index schemes and the links that project adjacent columns onto their shared reads
pub mod column_indexing;
/// Forward and backward sweeps that turn a read set into position-ordered columns
pub mod column_iterator;
/// Incremental per-column cost computation for read bipartitions and inheritance patterns
pub mod cost_computer;
/// Contains multiple wrappers for useful data types in pedphase
pub mod data_types;
/// The pedigree phasing dynamic program: forward fill and backtracking
pub mod dp_table;
/// Error types shared by the phasing core
pub mod errors;
/// Forward/backward DP that produces genotype max-marginals
pub mod genotype_dp_table;
/// Genotype calling on top of the genotype DP
pub mod genotyper;
/// Reflected binary Gray codes for enumerating column states
pub mod graycode;
/// Organizes primary workflow for a region: building the DP, running it, and bundling the results
pub mod phaser;
/// Loading of allele observations, pedigrees, genotypes and genetic maps from delimited text files
pub mod read_parsing;
/// Recombination costs between inheritance patterns of adjacent columns
pub mod transition;
/// Contains all the various output writer functionality
pub mod writers;
