use clap::Parser;
use chrono::Datelike;
use lazy_static::lazy_static;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use crate::dp_table::{DEFAULT_MAX_COMBINATORIAL_WIDTH, DEFAULT_MAX_READS_PER_COLUMN, PhasingConfig};
use crate::graycode::MAX_GRAYCODE_WIDTH;
use crate::transition::DEFAULT_RECOMBINATION_RATE;

lazy_static! {
    /// Stores the full version string we plan to use.
    /// # Examples
    /// * `0.4.0-6bb9635-dirty` - while on a dirty branch
    /// * `0.4.0-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));
}

#[derive(Clone, Parser)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = format!("Copyright (C) 2004-{}     Pacific Biosciences of California, Inc.
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year()))]
pub struct Settings {
    /// Input allele observations (csv/tsv, optionally gzipped)
    #[clap(required = true)]
    #[clap(short = 'i')]
    #[clap(long = "observations")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub observations_filename: PathBuf,

    /// Input pedigree with child, father, and mother columns (optional, csv/tsv)
    #[clap(short = 'p')]
    #[clap(long = "pedigree")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub pedigree_filename: Option<PathBuf>,

    /// Input per-site genotypes and likelihoods (optional, csv/tsv)
    #[clap(short = 'g')]
    #[clap(long = "genotypes")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub genotypes_filename: Option<PathBuf>,

    /// Input genetic map with position and cM columns (optional, csv/tsv)
    #[clap(short = 'm')]
    #[clap(long = "genetic-map")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub genetic_map_filename: Option<PathBuf>,

    /// Output haplotype table, or genotype table with --genotype (csv/tsv)
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_filename: PathBuf,

    /// Output read bipartition file (optional, csv/tsv)
    #[clap(long = "partition-file")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub partition_filename: Option<PathBuf>,

    /// Output per-region statistics file (optional, csv/tsv)
    #[clap(long = "stats-file")]
    #[clap(value_name = "FILE")]
    #[clap(help_heading = Some("Input/Output"))]
    pub stats_filename: Option<PathBuf>,

    /// Number of threads to use for phasing
    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Sets a minimum MAPQ to include an observation
    #[clap(long = "min-mapq")]
    #[clap(value_name = "MAPQ")]
    #[clap(default_value = "0")]
    #[clap(help_heading = Some("Read Filtering"))]
    pub min_mapping_quality: u8,

    /// Sets the maximum number of reads active in one column
    #[clap(long = "max-reads-per-column")]
    #[clap(value_name = "READS")]
    #[clap(default_value_t = DEFAULT_MAX_READS_PER_COLUMN)]
    #[clap(help_heading = Some("Phasing"))]
    pub max_reads_per_column: usize,

    /// Sets the maximum number of state bits per column (active reads plus two per trio), also bounding two bits per trio plus two per founder
    #[clap(long = "max-combinatorial-width")]
    #[clap(value_name = "BITS")]
    #[clap(default_value_t = DEFAULT_MAX_COMBINATORIAL_WIDTH)]
    #[clap(help_heading = Some("Phasing"))]
    pub max_combinatorial_width: usize,

    /// Sets the uniform recombination rate, also used to extend a genetic map past its ends
    #[clap(long = "recombination-rate")]
    #[clap(value_name = "CM_PER_MB")]
    #[clap(default_value_t = DEFAULT_RECOMBINATION_RATE)]
    #[clap(help_heading = Some("Phasing"))]
    pub recombination_rate: f64,

    /// Genotype every individual from the DP instead of phasing
    #[clap(long = "genotype")]
    #[clap(help_heading = Some("Genotyping"))]
    pub genotype: bool
}

/// Checks if a file exists and will otherwise exit
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
fn check_required_filename(filename: &Path, label: &str) {
    if !filename.exists() {
        error!("{} does not exist: \"{}\"", label, filename.display());
        std::process::exit(exitcode::NOINPUT);
    } else {
        info!("{}: \"{}\"", label, filename.display());
    }
}

impl Settings {
    /// Wrapper function to build the DP limits from our CLI settings
    pub fn phasing_config(&self) -> PhasingConfig {
        PhasingConfig {
            max_reads_per_column: self.max_reads_per_column,
            max_combinatorial_width: self.max_combinatorial_width,
            recombination_rate: self.recombination_rate
        }
    }
}

pub fn get_raw_settings() -> Settings {
    Settings::parse()
}

/// Do some additional checks here, we may increase these as we go.
/// Also can modify settings if needed since we're passing it around.
/// # Arguments
/// * `settings` - the raw settings, nothing has been checked other than what clap does for us.
pub fn check_settings(mut settings: Settings) -> Settings {
    //check for any of our required files
    check_required_filename(&settings.observations_filename, "Observation file");
    if let Some(ref filename) = settings.pedigree_filename {
        check_required_filename(filename, "Pedigree file");
    }
    if let Some(ref filename) = settings.genotypes_filename {
        check_required_filename(filename, "Genotype file");
    }
    if let Some(ref filename) = settings.genetic_map_filename {
        check_required_filename(filename, "Genetic map file");
    }

    // the state space is 2^width, so anything past the Gray code limit cannot be enumerated
    if settings.max_reads_per_column == 0 || settings.max_reads_per_column > MAX_GRAYCODE_WIDTH {
        error!("--max-reads-per-column must be in the range [1, {}]", MAX_GRAYCODE_WIDTH);
        std::process::exit(exitcode::USAGE);
    }
    if settings.max_combinatorial_width > MAX_GRAYCODE_WIDTH {
        error!("--max-combinatorial-width must be at most {}", MAX_GRAYCODE_WIDTH);
        std::process::exit(exitcode::USAGE);
    }
    if !settings.recombination_rate.is_finite() || settings.recombination_rate <= 0.0 {
        error!("--recombination-rate must be a positive number");
        std::process::exit(exitcode::USAGE);
    }

    // 0 doesn't make sense, so lets just error proof it up to 1
    if settings.threads == 0 {
        settings.threads = 1;
    }

    if settings.genotype && settings.partition_filename.is_some() {
        warn!("Read partitions are not produced with --genotype, ignoring --partition-file");
        settings.partition_filename = None;
    }

    // dump stuff to the logger
    info!("Mode: {}", if settings.genotype { "GENOTYPE" } else { "PHASE" });
    info!("Read filtering:");
    info!("\tMinimum mapping quality: {}", settings.min_mapping_quality);

    info!("Phasing:");
    info!("\tMaximum reads per column: {}", settings.max_reads_per_column);
    info!("\tMaximum combinatorial width: {}", settings.max_combinatorial_width);
    if settings.max_reads_per_column > 25 {
        warn!("\tColumns with more than 25 reads are very slow, consider downsampling instead");
    }
    if settings.genetic_map_filename.is_some() {
        info!("\tRecombination: genetic map, {} cM/Mb past the ends", settings.recombination_rate);
    } else {
        info!("\tRecombination: uniform {} cM/Mb", settings.recombination_rate);
    }

    info!("Processing threads: {}", settings.threads);

    //send the settings back
    settings
}
