use serde::Serialize;
use std::fs::File;
use std::ops::AddAssign;
use std::path::Path;

/// Contains any statistics from solving one region that may be relevant
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseStats {
    /// The number of individuals in the pedigree
    num_individuals: usize,
    /// The number of trios in the pedigree
    num_trios: usize,
    /// The number of reads that were loaded
    num_reads: usize,
    /// The number of DP columns
    num_columns: usize,
    /// The largest number of reads active in one column
    max_active_reads: usize,
    /// The cost of the optimal solution
    optimal_cost: u64,
    /// The number of columns where the best allele assignment was tied
    tied_columns: usize,
    /// The number of columns solved without genotype constraints
    impossible_columns: usize,
    /// CPU time spent on the region, in seconds
    cpu_time: f32
}

impl PhaseStats {
    /// Creates the statistics for a solved region
    /// # Arguments
    /// * `num_individuals` - the number of individuals in the pedigree
    /// * `num_trios` - the number of trios in the pedigree
    /// * `num_reads` - the number of reads loaded for the region
    /// * `num_columns` - the number of columns in the DP
    /// * `max_active_reads` - the widest column, in reads
    /// * `optimal_cost` - the cost of the optimal solution
    /// * `tied_columns` - columns whose best allele assignment had an equal-cost runner-up
    /// * `impossible_columns` - columns that had no consistent genotype assignment
    /// * `cpu_time` - thread CPU time spent on the region
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_individuals: usize, num_trios: usize, num_reads: usize, num_columns: usize,
        max_active_reads: usize, optimal_cost: u64, tied_columns: usize, impossible_columns: usize,
        cpu_time: f32
    ) -> PhaseStats {
        PhaseStats {
            num_individuals,
            num_trios,
            num_reads,
            num_columns,
            max_active_reads,
            optimal_cost,
            tied_columns,
            impossible_columns,
            cpu_time
        }
    }

    pub fn num_reads(&self) -> usize {
        self.num_reads
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn max_active_reads(&self) -> usize {
        self.max_active_reads
    }

    pub fn optimal_cost(&self) -> u64 {
        self.optimal_cost
    }

    pub fn tied_columns(&self) -> usize {
        self.tied_columns
    }

    pub fn impossible_columns(&self) -> usize {
        self.impossible_columns
    }

    pub fn cpu_time(&self) -> f32 {
        self.cpu_time
    }
}

/// Accumulates region statistics into run totals; the pedigree size and column width keep the maximum
impl AddAssign for PhaseStats {
    fn add_assign(&mut self, rhs: Self) {
        self.num_individuals = self.num_individuals.max(rhs.num_individuals);
        self.num_trios = self.num_trios.max(rhs.num_trios);
        self.num_reads += rhs.num_reads;
        self.num_columns += rhs.num_columns;
        self.max_active_reads = self.max_active_reads.max(rhs.max_active_reads);
        self.optimal_cost = self.optimal_cost.saturating_add(rhs.optimal_cost);
        self.tied_columns += rhs.tied_columns;
        self.impossible_columns += rhs.impossible_columns;
        self.cpu_time += rhs.cpu_time;
    }
}

/// This is a wrapper for writing out any stats to a file
pub struct StatsWriter {
    /// Handle for the CSV writer
    csv_writer: csv::Writer<File>
}

/// Contains all the data written to each row of our stats file
#[derive(Serialize)]
struct CsvRow {
    /// The index of the region in the input
    region_index: usize,
    /// The region label
    region: String,
    num_individuals: usize,
    num_trios: usize,
    num_reads: usize,
    num_columns: usize,
    max_active_reads: usize,
    optimal_cost: u64,
    tied_columns: usize,
    impossible_columns: usize,
    /// CPU time in seconds
    cpu_time: f32
}

impl StatsWriter {
    /// Creates a new writer for a given filename
    /// # Arguments
    /// * `filename` - the path to write all stats to
    pub fn new(filename: &Path) -> csv::Result<StatsWriter> {
        // modify the delimiter to "," if it ends with .csv
        let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
        let delimiter: u8 = if is_csv { b',' } else { b'\t' };
        let csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(filename)?;
        Ok(StatsWriter {
            csv_writer
        })
    }

    /// Will write stats to a CSV file for us
    /// # Arguments
    /// * `region_index` - the order of the region in the input
    /// * `region` - the region label
    /// * `stats` - the statistics from solving the region
    pub fn write_stats(&mut self, region_index: usize, region: &str, stats: &PhaseStats) -> csv::Result<()> {
        let row: CsvRow = CsvRow {
            region_index,
            region: region.to_string(),
            num_individuals: stats.num_individuals,
            num_trios: stats.num_trios,
            num_reads: stats.num_reads,
            num_columns: stats.num_columns,
            max_active_reads: stats.max_active_reads,
            optimal_cost: stats.optimal_cost,
            tied_columns: stats.tied_columns,
            impossible_columns: stats.impossible_columns,
            cpu_time: stats.cpu_time
        };
        self.csv_writer.serialize(&row)?;
        self.csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assign() {
        let mut total: PhaseStats = Default::default();
        let first = PhaseStats::new(3, 1, 10, 5, 4, 20, 1, 0, 0.5);
        let second = PhaseStats::new(1, 0, 6, 7, 9, 40, 0, 2, 0.25);

        total += first.clone();
        assert_eq!(total, first);

        total += second;
        assert_eq!(total.num_reads(), 16);
        assert_eq!(total.num_columns(), 12);
        assert_eq!(total.max_active_reads(), 9);
        assert_eq!(total.optimal_cost(), 60);
        assert_eq!(total.tied_columns(), 1);
        assert_eq!(total.impossible_columns(), 2);
        assert_eq!(total.cpu_time(), 0.75);
        assert_eq!(total.num_individuals, 3);
    }
}
