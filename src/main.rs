use pedphase::cli::{Settings, check_settings, get_raw_settings};
use pedphase::data_types::genetic_map::GeneticMap;
use pedphase::dp_table::PhasingConfig;
use pedphase::errors::PhasingError;
use pedphase::phaser::{PhaseProblem, RegionResult, genotype_region, solve_region};
use pedphase::read_parsing::{build_problems, load_genetic_map, load_genotypes, load_observations, load_pedigree};
use pedphase::transition::RecombinationMap;
use pedphase::writers::ordered_writer::OrderedResultWriter;

use log::{LevelFilter, debug, error, info};
use std::sync::{Arc, mpsc};
use std::time::Instant;
use threadpool::ThreadPool;

fn main() {
    // get the settings
    let settings: Settings = get_raw_settings();
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };

    // immediately setup logging first
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    // okay, now we can check all the other settings
    let cli_settings: Settings = check_settings(settings);
    let config: PhasingConfig = cli_settings.phasing_config();
    let genotype_mode: bool = cli_settings.genotype;

    // load everything up front, regions are small compared to the DP cost
    let observations = match load_observations(&cli_settings.observations_filename, cli_settings.min_mapping_quality) {
        Ok(o) => o,
        Err(e) => {
            error!("Error while loading observations: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    };

    let relationships: Vec<(u32, u32, u32)> = match cli_settings.pedigree_filename {
        Some(ref filename) => {
            match load_pedigree(filename) {
                Ok(r) => r,
                Err(e) => {
                    error!("Error while loading pedigree: {}", e);
                    std::process::exit(exitcode::IOERR);
                }
            }
        },
        None => vec![]
    };

    let genotypes = match cli_settings.genotypes_filename {
        Some(ref filename) => {
            match load_genotypes(filename) {
                Ok(g) => Some(g),
                Err(e) => {
                    error!("Error while loading genotypes: {}", e);
                    std::process::exit(exitcode::IOERR);
                }
            }
        },
        None => None
    };

    let genetic_map: Option<GeneticMap> = match cli_settings.genetic_map_filename {
        Some(ref filename) => {
            match load_genetic_map(filename) {
                Ok(m) => Some(m),
                Err(e) => {
                    error!("Error while loading genetic map: {}", e);
                    std::process::exit(exitcode::IOERR);
                }
            }
        },
        None => None
    };
    let recombination_map: RecombinationMap = config.recombination_map(genetic_map);

    let problems: Vec<PhaseProblem> = match build_problems(observations, &relationships, genotypes.as_ref()) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while building phasing problems: {}", e);
            std::process::exit(exitcode::DATAERR);
        }
    };

    // this writer will write "in-order" provided we correctly pass the ordering of data to it
    let mut result_writer: OrderedResultWriter = match OrderedResultWriter::new(
        &cli_settings.output_filename,
        genotype_mode,
        cli_settings.partition_filename.as_deref(),
        cli_settings.stats_filename.as_deref()
    ) {
        Ok(rw) => rw,
        Err(e) => {
            error!("Error during writer creation: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    };

    let start_time: Instant = Instant::now();
    let total_regions: u64 = problems.len() as u64;
    let mut results_received: u64 = 0;

    // values related to printing
    const UPDATE_SPEED: u64 = 100;
    info!("Solving {} regions...", total_regions);

    if cli_settings.threads <= 1 {
        for problem in problems.iter() {
            let result: RegionResult = solve_problem(problem, &recombination_map, &config, genotype_mode);
            results_received += 1;
            process_result(result, &mut result_writer);

            if results_received % UPDATE_SPEED == 0 {
                let time_so_far: f64 = start_time.elapsed().as_secs_f64();
                let regions_per_sec: f64 = results_received as f64 / time_so_far;
                info!("Received results for {} / {} regions: {:.4} regions/sec", results_received, total_regions, regions_per_sec);
            }
        }
    } else {
        //set up job configuration
        info!("Starting job pool with {} threads...", cli_settings.threads);
        let job_slots: u64 = 40 * cli_settings.threads as u64;
        let mut jobs_queued: u64 = 0;

        //we need to set up the multiprocessing components now
        let pool = ThreadPool::new(cli_settings.threads);
        let (tx, rx) = mpsc::channel();
        let arc_recombination_map: Arc<RecombinationMap> = Arc::new(recombination_map);
        let arc_config: Arc<PhasingConfig> = Arc::new(config);

        for problem in problems.into_iter() {
            // make sure no panics encountered so far
            if pool.panic_count() > 0 {
                error!("Panic detected in ThreadPool, check above for details.");
                std::process::exit(exitcode::SOFTWARE);
            }

            if jobs_queued - results_received >= job_slots {
                let result: RegionResult = receive_result(&rx);
                results_received += 1;
                process_result(result, &mut result_writer);

                if results_received % UPDATE_SPEED == 0 {
                    let time_so_far: f64 = start_time.elapsed().as_secs_f64();
                    let regions_per_sec: f64 = results_received as f64 / time_so_far;
                    info!("Received results for {} / {} regions: {:.4} regions/sec, writer waiting on region {}", results_received, total_regions, regions_per_sec, result_writer.get_wait_region());
                }
            }

            jobs_queued += 1;
            let tx = tx.clone();
            let arc_recombination_map = arc_recombination_map.clone();
            let arc_config = arc_config.clone();
            pool.execute(move|| {
                // errors exit inside solve_problem, so only successful results come back
                let result: RegionResult = solve_problem(&problem, &arc_recombination_map, &arc_config, genotype_mode);
                tx.send(result).expect("channel will be there waiting for the pool");
            });
        }

        while results_received < jobs_queued {
            // make sure no panics encountered so far
            if pool.panic_count() > 0 {
                error!("Panic detected in ThreadPool, check above for details.");
                std::process::exit(exitcode::SOFTWARE);
            }

            let result: RegionResult = receive_result(&rx);
            results_received += 1;
            process_result(result, &mut result_writer);

            // do an update if we're on the mod of our speed OR it's the last one for a thread
            if results_received % UPDATE_SPEED == 0 || (jobs_queued - results_received) < cli_settings.threads as u64 {
                let time_so_far: f64 = start_time.elapsed().as_secs_f64();
                let regions_per_sec: f64 = results_received as f64 / time_so_far;
                info!("Received results for {} / {} regions: {:.4} regions/sec, writer waiting on region {}", results_received, jobs_queued, regions_per_sec, result_writer.get_wait_region());
            }
        }
    }

    if result_writer.num_pending() > 0 {
        error!("{} region results were never written, writer is waiting on region {}", result_writer.num_pending(), result_writer.get_wait_region());
        std::process::exit(exitcode::SOFTWARE);
    }

    let totals = result_writer.total_stats();
    info!(
        "Solved {} regions: {} reads, {} columns, total cost {}, {} tied columns, {} impossible columns, {:.3} CPU seconds",
        results_received, totals.num_reads(), totals.num_columns(), totals.optimal_cost(),
        totals.tied_columns(), totals.impossible_columns(), totals.cpu_time()
    );
    info!("All regions finished successfully after {} seconds.", start_time.elapsed().as_secs_f64());
}

/// Runs the requested algorithm on one region; any failure ends the process since results must be complete and in order.
/// # Arguments
/// * `problem` - the region to solve
/// * `recombination_map` - source of genetic distances
/// * `config` - DP limits
/// * `genotype_mode` - if true, genotype instead of phasing
fn solve_problem(
    problem: &PhaseProblem, recombination_map: &RecombinationMap, config: &PhasingConfig, genotype_mode: bool
) -> RegionResult {
    let result = if genotype_mode {
        genotype_region(problem, recombination_map, config).map(RegionResult::Genotyped)
    } else {
        solve_region(problem, recombination_map, config).map(RegionResult::Phased)
    };
    match result {
        Ok(r) => r,
        Err(e) => {
            error!("Error while processing region {}:", problem.region);
            error!("  {}", e);
            let code = match e {
                PhasingError::CapacityExceeded { .. } |
                PhasingError::PedigreeInconsistency { .. } |
                PhasingError::UnknownIndividual { .. } |
                PhasingError::InvalidGenotype { .. } => exitcode::DATAERR,
                _ => exitcode::SOFTWARE
            };
            std::process::exit(code);
        }
    }
}

/// Waits for the next finished region from the pool
fn receive_result(rx: &mpsc::Receiver<RegionResult>) -> RegionResult {
    match rx.recv() {
        Ok(r) => r,
        Err(e) => {
            error!("Error while waiting on region results: {}", e);
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

/// Sub-routine to make sure we are always consistently processing results in an identical manner
/// # Arguments
/// * `result` - the region result from a worker
/// * `result_writer` - mutable reference to the ordered output writer
fn process_result(result: RegionResult, result_writer: &mut OrderedResultWriter) {
    debug!("region {} ({}) finished: {:?}", result.region_index(), result.region(), result.statistics());
    match result_writer.write_result(result) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while saving region results: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    };
}
