use crate::phaser::RegionResult;
use crate::writers::genotype_writer::GenotypeWriter;
use crate::writers::haplotype_writer::HaplotypeWriter;
use crate::writers::phase_stats::{PhaseStats, StatsWriter};
use crate::writers::read_partition_writer::ReadPartitionWriter;

use log::trace;
use rustc_hash::FxHashMap as HashMap;
use simple_error::bail;
use std::path::Path;

/// Writes region results in input order, no matter the order they finish in.
/// Results that arrive early are held until every region before them has been written.
pub struct OrderedResultWriter {
    /// Main output when phasing
    haplotype_writer: Option<HaplotypeWriter>,
    /// Main output when genotyping
    genotype_writer: Option<GenotypeWriter>,
    /// Optional read bipartitions, phasing only
    partition_writer: Option<ReadPartitionWriter>,
    /// Optional per-region statistics
    stats_writer: Option<StatsWriter>,
    /// Contains results that are waiting on earlier regions
    map_store: HashMap<usize, RegionResult>,
    /// The next region index to write
    current_index: usize,
    /// Totals over every written region
    total_stats: PhaseStats
}

impl OrderedResultWriter {
    /// Creates the writer and all of its output files.
    /// # Arguments
    /// * `output_filename` - the haplotype table, or the genotype table if `genotype_mode` is set
    /// * `genotype_mode` - if true, results are genotype calls
    /// * `partition_filename` - optional read bipartition output
    /// * `stats_filename` - optional per-region statistics output
    pub fn new(
        output_filename: &Path, genotype_mode: bool,
        partition_filename: Option<&Path>, stats_filename: Option<&Path>
    ) -> csv::Result<OrderedResultWriter> {
        let (haplotype_writer, genotype_writer) = if genotype_mode {
            (None, Some(GenotypeWriter::new(output_filename)?))
        } else {
            (Some(HaplotypeWriter::new(output_filename)?), None)
        };
        let partition_writer = match partition_filename {
            Some(filename) => Some(ReadPartitionWriter::new(filename)?),
            None => None
        };
        let stats_writer = match stats_filename {
            Some(filename) => Some(StatsWriter::new(filename)?),
            None => None
        };
        Ok(OrderedResultWriter {
            haplotype_writer,
            genotype_writer,
            partition_writer,
            stats_writer,
            map_store: Default::default(),
            current_index: 0,
            total_stats: Default::default()
        })
    }

    /// The region index the writer is waiting on
    pub fn get_wait_region(&self) -> usize {
        self.current_index
    }

    /// The number of results held back for earlier regions
    pub fn num_pending(&self) -> usize {
        self.map_store.len()
    }

    pub fn total_stats(&self) -> &PhaseStats {
        &self.total_stats
    }

    /// Stores a result and writes out everything that is now in order.
    /// # Errors
    /// * if the region index was already written or is already waiting
    /// * if any underlying writer fails
    pub fn write_result(&mut self, result: RegionResult) -> Result<(), Box<dyn std::error::Error>> {
        let region_index: usize = result.region_index();
        if region_index < self.current_index {
            bail!("Region index {} is smaller than next expected index {}", region_index, self.current_index);
        }
        if self.map_store.contains_key(&region_index) {
            bail!("Region index {} was already present in the map_store", region_index);
        }
        self.map_store.insert(region_index, result);
        self.drain_map_store()
    }

    /// Writes results until the next expected region is missing
    fn drain_map_store(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while let Some(result) = self.map_store.remove(&self.current_index) {
            trace!("Writing region {} ({})", self.current_index, result.region());
            match &result {
                RegionResult::Phased(phase_result) => {
                    if let Some(writer) = self.haplotype_writer.as_mut() {
                        writer.write_region(phase_result)?;
                    }
                    if let Some(writer) = self.partition_writer.as_mut() {
                        writer.write_region(phase_result)?;
                    }
                },
                RegionResult::Genotyped(genotype_result) => {
                    match self.genotype_writer.as_mut() {
                        Some(writer) => writer.write_region(genotype_result)?,
                        None => {
                            bail!("Received genotype calls for region {}, but the writer is in phasing mode", result.region());
                        }
                    };
                }
            };

            if let Some(writer) = self.stats_writer.as_mut() {
                writer.write_stats(result.region_index(), result.region(), result.statistics())?;
            }
            self.total_stats += result.statistics().clone();
            self.current_index += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::pedigree::Pedigree;
    use crate::data_types::read_set::{AlleleType, Read, ReadSet};
    use crate::dp_table::PhasingConfig;
    use crate::phaser::{PhaseProblem, solve_region};
    use crate::transition::RecombinationMap;

    fn solved_region(region_index: usize, region: &str) -> RegionResult {
        let mut read = Read::new(format!("{region}_read"), 0, 0, 60);
        read.add_observation(100, AlleleType::Reference, 20);
        read.add_observation(200, AlleleType::Alternate, 20);
        let mut pedigree = Pedigree::new();
        pedigree.add_individual(0, vec![], vec![]).unwrap();
        let problem = PhaseProblem {
            region_index,
            region: region.to_string(),
            read_set: ReadSet::new(vec![read]),
            pedigree,
            positions: None
        };
        RegionResult::Phased(solve_region(&problem, &RecombinationMap::default(), &PhasingConfig::default()).unwrap())
    }

    #[test]
    fn test_ordered_writing() {
        let output = std::env::temp_dir().join(format!("pedphase_{}_ordered.csv", std::process::id()));
        let partitions = std::env::temp_dir().join(format!("pedphase_{}_ordered_reads.tsv", std::process::id()));
        let mut writer = OrderedResultWriter::new(&output, false, Some(&partitions), None).unwrap();

        writer.write_result(solved_region(1, "chr2")).unwrap();
        assert_eq!(writer.get_wait_region(), 0);
        assert_eq!(writer.num_pending(), 1);
        assert!(writer.write_result(solved_region(1, "chr2")).is_err());

        writer.write_result(solved_region(0, "chr1")).unwrap();
        assert_eq!(writer.get_wait_region(), 2);
        assert_eq!(writer.num_pending(), 0);
        assert_eq!(writer.total_stats().num_columns(), 4);
        assert!(writer.write_result(solved_region(0, "chr1")).is_err());
        std::mem::drop(writer);

        let content = std::fs::read_to_string(&output).unwrap();
        let regions: Vec<&str> = content.lines().skip(1)
            .map(|line| line.split(',').nth(1).unwrap())
            .collect();
        assert_eq!(regions, vec!["chr1", "chr1", "chr2", "chr2"]);

        let content = std::fs::read_to_string(&partitions).unwrap();
        assert_eq!(content.lines().count(), 3);

        std::fs::remove_file(output).unwrap();
        std::fs::remove_file(partitions).unwrap();
    }
}
