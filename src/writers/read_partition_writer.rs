use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::phaser::PhaseResult;

/// This is a wrapper for writing out the read bipartition of each solved region
pub struct ReadPartitionWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

/// Contains all the data written to each row of our partition file
#[derive(Serialize)]
struct ReadPartitionRow {
    /// The index of the region
    region_index: usize,
    /// the region label
    region: String,
    /// the sample the read belongs to
    sample: u32,
    /// the source the read was loaded from
    source: u32,
    /// the read name that is assigned
    read_name: String,
    /// the haplotype the read is assigned to, 1-based
    haplotag: u8
}

impl ReadPartitionWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write all partitions to
    pub fn new(filename: &Path) -> csv::Result<ReadPartitionWriter> {
        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(ReadPartitionWriter {
            csv_writer
        })
    }

    /// Writes the side of every assigned read in a region; reads that never reached a column are skipped.
    /// # Arguments
    /// * `phase_result` - the solved region
    /// # Errors
    /// * if the csv_writer has any errors
    pub fn write_region(&mut self, phase_result: &PhaseResult) -> csv::Result<()> {
        for read in phase_result.reads.iter() {
            let side: u8 = match read.side {
                Some(s) => s,
                None => continue
            };
            let row: ReadPartitionRow = ReadPartitionRow {
                region_index: phase_result.region_index,
                region: phase_result.region.clone(),
                sample: read.sample_id,
                source: read.source_id,
                read_name: read.read_name.clone(),
                haplotag: side + 1
            };
            self.csv_writer.serialize(&row)?;
        }
        self.csv_writer.flush()?;
        Ok(())
    }
}
