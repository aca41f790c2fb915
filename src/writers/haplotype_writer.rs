use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::dp_table::ColumnStatus;
use crate::phaser::PhaseResult;

/// Writes the phased haplotypes of every individual, one row per column and individual
pub struct HaplotypeWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

#[derive(Serialize)]
struct HaplotypeRow {
    region_index: usize,
    region: String,
    sample: u32,
    position: u32,
    /// phased genotype, allele on haplotype 1 first
    genotype: String,
    /// the transmission vector selected at this column
    transmission: u64,
    status: ColumnStatus,
    assignment_cost: u64,
    runner_up_cost: u64,
    cumulative_cost: u64
}

impl HaplotypeWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write haplotypes to, ".csv" switches to comma delimited
    pub fn new(filename: &Path) -> csv::Result<HaplotypeWriter> {
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(HaplotypeWriter {
            csv_writer
        })
    }

    /// Writes all haplotypes of a solved region.
    /// # Arguments
    /// * `phase_result` - the solved region
    pub fn write_region(&mut self, phase_result: &PhaseResult) -> csv::Result<()> {
        let outcome = &phase_result.outcome;
        for (c, column) in outcome.columns.iter().enumerate() {
            for (individual, [haplotype_1, haplotype_2]) in outcome.haplotypes.iter().enumerate() {
                let row = HaplotypeRow {
                    region_index: phase_result.region_index,
                    region: phase_result.region.clone(),
                    sample: phase_result.sample_ids[individual],
                    position: column.position,
                    genotype: format!("{}|{}", haplotype_1[c] as u8, haplotype_2[c] as u8),
                    transmission: column.transmission_vector,
                    status: column.status,
                    assignment_cost: column.assignment_cost,
                    runner_up_cost: column.runner_up_cost,
                    cumulative_cost: column.cumulative_cost
                };
                self.csv_writer.serialize(&row)?;
            }
        }
        self.csv_writer.flush()?;
        Ok(())
    }
}
