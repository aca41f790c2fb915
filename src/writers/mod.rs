
/// Contains the writer for genotype calls
pub mod genotype_writer;
/// Contains the writer for phased haplotypes per individual
pub mod haplotype_writer;
/// Contains the writer that keeps region outputs in input order
pub mod ordered_writer;
/// Contains writer for per-region statistics of the phasing DP
pub mod phase_stats;
/// Contains the writer for read bipartitions
pub mod read_partition_writer;
