use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::phaser::GenotypeResult;

/// Writes genotype calls, one row per position and individual
pub struct GenotypeWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

#[derive(Serialize)]
struct GenotypeRow {
    region_index: usize,
    region: String,
    sample: u32,
    position: u32,
    /// unphased genotype, e.g. "0/1"
    genotype: String,
    /// Phred-scaled genotype quality
    quality: u64,
    /// normalized Phred likelihoods of 0/0, 0/1 and 1/1, comma separated
    likelihoods: String
}

impl GenotypeWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write genotypes to, ".csv" switches to comma delimited
    pub fn new(filename: &Path) -> csv::Result<GenotypeWriter> {
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(GenotypeWriter {
            csv_writer
        })
    }

    /// Writes every call of a genotyped region
    pub fn write_region(&mut self, genotype_result: &GenotypeResult) -> csv::Result<()> {
        for call in genotype_result.calls.iter() {
            let likelihoods: Vec<String> = call.likelihoods.values().iter()
                .map(|v| format!("{v:.2}"))
                .collect();
            let row = GenotypeRow {
                region_index: genotype_result.region_index,
                region: genotype_result.region.clone(),
                sample: call.sample_id,
                position: call.position,
                genotype: call.genotype.to_string(),
                quality: call.quality,
                likelihoods: likelihoods.join(",")
            };
            self.csv_writer.serialize(&row)?;
        }
        self.csv_writer.flush()?;
        Ok(())
    }
}
