use crate::data_types::genetic_map::GeneticMap;
use crate::data_types::genotype::{Genotype, PhredGenotypeLikelihoods};
use crate::data_types::pedigree::Pedigree;
use crate::data_types::read_set::{AlleleType, Read, ReadSet};
use crate::phaser::PhaseProblem;

use flate2::bufread::MultiGzDecoder;
use log::{debug, info, warn};
use rustc_hash::FxHashMap as HashMap;
use serde::Deserialize;
use simple_error::bail;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One allele observation: a read carries `allele` at `position`
#[derive(Debug, Deserialize)]
struct ObservationRow {
    region: String,
    read: String,
    sample: u32,
    position: u32,
    /// 0 = REF, 1 = ALT, 2 = ambiguous
    allele: u8,
    /// Phred-scaled confidence in the allele call
    quality: u32,
    #[serde(default)]
    mapq: Option<u8>,
    /// distinguishes reads with the same name from different inputs
    #[serde(default)]
    source: Option<u32>
}

#[derive(Debug, Deserialize)]
struct PedigreeRow {
    child: u32,
    father: u32,
    mother: u32
}

#[derive(Debug, Deserialize)]
struct GenotypeRow {
    region: String,
    sample: u32,
    position: u32,
    /// e.g. "0/1", "1|1", or "./." when unknown
    genotype: String,
    /// comma separated Phred likelihoods of 0/0, 0/1 and 1/1
    #[serde(default)]
    likelihoods: Option<String>
}

#[derive(Debug, Deserialize)]
struct GeneticMapRow {
    position: u32,
    #[serde(alias = "cM")]
    cm: f64
}

/// Per-site genotype information for one sample
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeRecord {
    pub sample: u32,
    pub position: u32,
    pub genotype: Option<Genotype>,
    pub likelihoods: Option<PhredGenotypeLikelihoods>
}

/// The reads of one region, in input order of first appearance
pub struct RegionReads {
    pub region: String,
    pub reads: Vec<Read>
}

/// Opens a delimited text file, gzip is allowed.
/// The delimiter is "," for ".csv" and ".csv.gz" files, and a tab otherwise.
/// # Arguments
/// * `filename` - the file to open, must have a header line
fn open_delimited(filename: &Path) -> Result<csv::Reader<Box<dyn BufRead>>, Box<dyn std::error::Error>> {
    let file: std::fs::File = std::fs::File::open(filename)?;
    let file_reader = BufReader::new(file);
    let is_gz: bool = filename.extension().unwrap_or_default() == "gz";
    let reader: Box<dyn BufRead> = if is_gz {
        debug!("Detected gzip extension, loading {:?} with MultiGzDecoder...", filename);
        Box::new(BufReader::new(MultiGzDecoder::new(file_reader)))
    } else {
        Box::new(file_reader)
    };

    let inner_path: &Path = if is_gz { Path::new(filename.file_stem().unwrap_or_default()) } else { filename };
    let is_csv: bool = inner_path.extension().unwrap_or_default() == "csv";
    let delimiter: u8 = if is_csv { b',' } else { b'\t' };
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader))
}

/// Parses a genotype string such as "0/1" or "1|0"; missing genotypes ("./.", ".") are None.
/// # Errors
/// * if the genotype is not diploid or an allele is not a number
pub fn parse_genotype(value: &str) -> Result<Option<Genotype>, Box<dyn std::error::Error>> {
    let alleles: Vec<&str> = value.split(['/', '|']).collect();
    if alleles.iter().all(|&a| a == "." || a.is_empty()) {
        return Ok(None);
    }
    if alleles.len() != 2 {
        bail!("Genotype {:?} is not diploid", value);
    }
    let mut parsed: Vec<u8> = Vec::with_capacity(2);
    for allele in alleles.iter() {
        match allele.parse::<u8>() {
            Ok(a) => parsed.push(a),
            Err(_) => {
                bail!("Genotype {:?} has a partially missing or malformed allele", value);
            }
        };
    }
    Ok(Some(Genotype::new(parsed)))
}

/// Parses comma separated Phred likelihoods for a diploid biallelic site; empty or "." is None.
fn parse_likelihoods(value: &str) -> Result<Option<PhredGenotypeLikelihoods>, Box<dyn std::error::Error>> {
    if value.is_empty() || value == "." {
        return Ok(None);
    }
    let values: Vec<f64> = value.split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()?;
    if values.len() != 3 {
        bail!("Expected 3 genotype likelihoods, found {} in {:?}", values.len(), value);
    }
    Ok(Some(PhredGenotypeLikelihoods::diploid([values[0], values[1], values[2]])?))
}

/// Loads all allele observations and groups them into reads per region.
/// Observations with the same (region, source, read name) belong to the same read.
/// # Arguments
/// * `filename` - columns: region, read, sample, position, allele, quality, and optionally mapq, source
/// * `min_mapq` - reads with a lower mapping quality are skipped
/// # Errors
/// * if the file cannot be parsed, an allele is unknown, or a read is assigned to two samples
pub fn load_observations(filename: &Path, min_mapq: u8) -> Result<Vec<RegionReads>, Box<dyn std::error::Error>> {
    info!("Loading {:?}...", filename);
    let mut csv_reader = open_delimited(filename)?;

    let mut regions: Vec<RegionReads> = vec![];
    let mut region_lookup: HashMap<String, usize> = Default::default();
    let mut read_lookup: HashMap<(usize, u32, String), usize> = Default::default();
    let mut num_observations: u64 = 0;
    let mut skipped_observations: u64 = 0;

    for row_result in csv_reader.deserialize() {
        let row: ObservationRow = row_result?;
        let mapq: u8 = row.mapq.unwrap_or(u8::MAX);
        if mapq < min_mapq {
            skipped_observations += 1;
            continue;
        }
        let allele: AlleleType = match AlleleType::from_repr(row.allele) {
            Some(AlleleType::Blank) | None => {
                bail!("Unknown allele {} for read {:?} at position {}", row.allele, row.read, row.position);
            },
            Some(a) => a
        };

        let region_index: usize = *region_lookup.entry(row.region.clone()).or_insert_with(|| {
            regions.push(RegionReads { region: row.region.clone(), reads: vec![] });
            regions.len() - 1
        });
        let source: u32 = row.source.unwrap_or(0);
        let region_reads: &mut Vec<Read> = &mut regions[region_index].reads;
        let read_index: usize = *read_lookup.entry((region_index, source, row.read.clone())).or_insert_with(|| {
            region_reads.push(Read::new(row.read.clone(), source, row.sample, mapq));
            region_reads.len() - 1
        });

        let read: &mut Read = &mut region_reads[read_index];
        if read.sample_id() != row.sample {
            bail!("Read {:?} in region {} is assigned to samples {} and {}", row.read, row.region, read.sample_id(), row.sample);
        }
        read.add_observation(row.position, allele, row.quality);
        num_observations += 1;
    }

    let num_reads: usize = regions.iter().map(|r| r.reads.len()).sum();
    info!("Loaded {} observations from {} reads in {} regions.", num_observations, num_reads, regions.len());
    if skipped_observations > 0 {
        info!("Skipped {} observations below minimum MAPQ {}.", skipped_observations, min_mapq);
    }
    Ok(regions)
}

/// Loads trios from a pedigree file.
/// Returns (father, mother, child) sample ids in file order.
/// # Arguments
/// * `filename` - columns: child, father, mother
pub fn load_pedigree(filename: &Path) -> Result<Vec<(u32, u32, u32)>, Box<dyn std::error::Error>> {
    info!("Loading {:?}...", filename);
    let mut csv_reader = open_delimited(filename)?;
    let mut relationships: Vec<(u32, u32, u32)> = vec![];
    for row_result in csv_reader.deserialize() {
        let row: PedigreeRow = row_result?;
        relationships.push((row.father, row.mother, row.child));
    }
    info!("Loaded {} trios.", relationships.len());
    Ok(relationships)
}

/// Loads per-site genotypes and likelihoods, grouped by region.
/// # Arguments
/// * `filename` - columns: region, sample, position, genotype, and optionally likelihoods
/// # Errors
/// * if a genotype or likelihood vector is malformed, or a (region, sample, position) repeats
pub fn load_genotypes(filename: &Path) -> Result<HashMap<String, Vec<GenotypeRecord>>, Box<dyn std::error::Error>> {
    info!("Loading {:?}...", filename);
    let mut csv_reader = open_delimited(filename)?;
    let mut genotypes: HashMap<String, Vec<GenotypeRecord>> = Default::default();
    let mut num_records: usize = 0;

    for row_result in csv_reader.deserialize() {
        let row: GenotypeRow = row_result?;
        let genotype = parse_genotype(&row.genotype)?;
        let likelihoods = parse_likelihoods(row.likelihoods.as_deref().unwrap_or_default())?;
        genotypes.entry(row.region).or_default().push(GenotypeRecord {
            sample: row.sample,
            position: row.position,
            genotype,
            likelihoods
        });
        num_records += 1;
    }

    for (region, records) in genotypes.iter_mut() {
        records.sort_by_key(|r| (r.position, r.sample));
        if let Some(pair) = records.windows(2).find(|w| (w[0].position, w[0].sample) == (w[1].position, w[1].sample)) {
            bail!("Sample {} has two genotypes at position {} in region {}", pair[0].sample, pair[0].position, region);
        }
    }
    info!("Loaded {} genotype records in {} regions.", num_records, genotypes.len());
    Ok(genotypes)
}

/// Loads a genetic map.
/// # Arguments
/// * `filename` - columns: position, cM (or cm), sorted by position
pub fn load_genetic_map(filename: &Path) -> Result<GeneticMap, Box<dyn std::error::Error>> {
    info!("Loading {:?}...", filename);
    let mut csv_reader = open_delimited(filename)?;
    let mut points: Vec<(u32, f64)> = vec![];
    for row_result in csv_reader.deserialize() {
        let row: GeneticMapRow = row_result?;
        points.push((row.position, row.cm));
    }
    info!("Loaded {} genetic map points.", points.len());
    Ok(GeneticMap::new(points)?)
}

/// Assembles one problem per region from the loaded inputs.
/// Every sample named in the pedigree or in the region's reads or genotypes becomes an individual.
/// When genotypes are provided for a region, its columns are the union of the read positions and the genotyped positions.
/// # Arguments
/// * `observations` - the reads of each region, in output order
/// * `relationships` - (father, mother, child) trios
/// * `genotypes` - optional per-region genotype records
/// # Errors
/// * if the pedigree is inconsistent or a genotype is not diploid biallelic
pub fn build_problems(
    observations: Vec<RegionReads>, relationships: &[(u32, u32, u32)],
    genotypes: Option<&HashMap<String, Vec<GenotypeRecord>>>
) -> Result<Vec<PhaseProblem>, Box<dyn std::error::Error>> {
    // pedigree members first in file order, so individual indices are stable across regions
    let mut pedigree_samples: Vec<u32> = vec![];
    for &(father, mother, child) in relationships.iter() {
        for sample in [father, mother, child] {
            if !pedigree_samples.contains(&sample) {
                pedigree_samples.push(sample);
            }
        }
    }

    let mut problems: Vec<PhaseProblem> = Vec::with_capacity(observations.len());
    let mut observed_regions: Vec<String> = vec![];
    for (region_index, region_reads) in observations.into_iter().enumerate() {
        let RegionReads { region, reads } = region_reads;
        let records: &[GenotypeRecord] = genotypes
            .and_then(|g| g.get(&region))
            .map(|r| r.as_slice())
            .unwrap_or_default();

        let mut samples: Vec<u32> = pedigree_samples.clone();
        let mut extra_samples: Vec<u32> = reads.iter().map(|r| r.sample_id())
            .chain(records.iter().map(|r| r.sample))
            .filter(|s| !pedigree_samples.contains(s))
            .collect();
        extra_samples.sort_unstable();
        extra_samples.dedup();
        samples.extend(extra_samples);

        let read_set: ReadSet = ReadSet::new(reads);
        let positions: Option<Vec<u32>> = if genotypes.is_some() {
            let mut p: Vec<u32> = read_set.positions().iter().cloned()
                .chain(records.iter().map(|r| r.position))
                .collect();
            p.sort_unstable();
            p.dedup();
            Some(p)
        } else {
            None
        };

        let mut pedigree: Pedigree = Pedigree::new();
        for &sample in samples.iter() {
            let (sample_genotypes, sample_likelihoods) = match positions.as_ref() {
                Some(p) => {
                    let mut sample_genotypes: Vec<Option<Genotype>> = vec![None; p.len()];
                    let mut sample_likelihoods: Vec<Option<PhredGenotypeLikelihoods>> = vec![None; p.len()];
                    for record in records.iter().filter(|r| r.sample == sample) {
                        // every record position was inserted into the position list above
                        if let Ok(column) = p.binary_search(&record.position) {
                            sample_genotypes[column] = record.genotype.clone();
                            sample_likelihoods[column] = record.likelihoods.clone();
                        }
                    }
                    (sample_genotypes, sample_likelihoods)
                },
                None => (vec![], vec![])
            };
            pedigree.add_individual(sample, sample_genotypes, sample_likelihoods)?;
        }
        for &(father, mother, child) in relationships.iter() {
            pedigree.add_relationship(father, mother, child)?;
        }

        debug!(
            "Region {}: {} reads, {} individuals, {} columns",
            region, read_set.len(), pedigree.len(),
            positions.as_ref().map(|p| p.len()).unwrap_or(read_set.positions().len())
        );
        observed_regions.push(region.clone());
        problems.push(PhaseProblem {
            region_index,
            region,
            read_set,
            pedigree,
            positions
        });
    }

    if let Some(g) = genotypes {
        let mut unobserved: Vec<&String> = g.keys().filter(|r| !observed_regions.contains(r)).collect();
        unobserved.sort();
        for region in unobserved {
            warn!("Genotypes were provided for region {} but no reads were observed there, skipping it", region);
        }
    }
    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    /// Writes a small fixture into the temp folder, named uniquely per test
    fn write_fixture(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pedphase_{}_{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_genotype() {
        assert_eq!(parse_genotype("0/1").unwrap(), Some(Genotype::new(vec![0, 1])));
        assert_eq!(parse_genotype("1|0").unwrap(), Some(Genotype::new(vec![0, 1])));
        assert_eq!(parse_genotype("./.").unwrap(), None);
        assert_eq!(parse_genotype(".").unwrap(), None);
        assert!(parse_genotype("0/1/1").is_err());
        assert!(parse_genotype("0/.").is_err());
        assert!(parse_genotype("a/b").is_err());
    }

    #[test]
    fn test_parse_likelihoods() {
        assert_eq!(parse_likelihoods("").unwrap(), None);
        let gl = parse_likelihoods("0,20,40").unwrap().unwrap();
        assert_eq!(gl.likeliest(), Genotype::new(vec![0, 0]));
        assert!(parse_likelihoods("0,20").is_err());
        assert!(parse_likelihoods("0,x,3").is_err());
    }

    #[test]
    fn test_load_and_build() {
        let observations = write_fixture("obs.tsv", "\
region\tread\tsample\tposition\tallele\tquality\tmapq
chr1\tr1\t3\t100\t0\t20\t60
chr1\tr1\t3\t200\t1\t20\t60
chr1\tr2\t3\t100\t1\t20\t60
chr1\tr3\t3\t100\t1\t20\t1
chr2\tr1\t1\t500\t1\t30\t60
");
        let pedigree = write_fixture("ped.csv", "child,father,mother\n3,1,2\n");
        let genotypes = write_fixture("gt.tsv", "\
region\tsample\tposition\tgenotype\tlikelihoods
chr1\t1\t150\t0/1\t
chr1\t2\t100\t0/0\t0,30,60
");

        let regions = load_observations(&observations, 5).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].region, "chr1");
        assert_eq!(regions[0].reads.len(), 2);
        assert_eq!(regions[1].reads.len(), 1);

        let relationships = load_pedigree(&pedigree).unwrap();
        assert_eq!(relationships, vec![(1, 2, 3)]);
        let genotype_records = load_genotypes(&genotypes).unwrap();
        assert_eq!(genotype_records.get("chr1").unwrap().len(), 2);

        let problems = build_problems(regions, &relationships, Some(&genotype_records)).unwrap();
        assert_eq!(problems.len(), 2);
        let chr1 = &problems[0];
        assert_eq!(chr1.region_index, 0);
        assert_eq!(chr1.positions, Some(vec![100, 150, 200]));
        assert_eq!(chr1.pedigree.len(), 3);
        assert_eq!(chr1.pedigree.num_trios(), 1);
        let father = chr1.pedigree.index_of(1).unwrap();
        assert_eq!(chr1.pedigree.genotype(father, 1), Some(&Genotype::new(vec![0, 1])));
        let mother = chr1.pedigree.index_of(2).unwrap();
        assert!(chr1.pedigree.genotype_likelihoods(mother, 0).is_some());

        // chr2 has no genotype records, its columns are the read positions
        assert_eq!(problems[1].positions, Some(vec![500]));

        for path in [observations, pedigree, genotypes] {
            std::fs::remove_file(path).unwrap();
        }
    }

    #[test]
    fn test_conflicting_samples() {
        let observations = write_fixture("conflict.tsv", "\
region\tread\tsample\tposition\tallele\tquality
chr1\tr1\t1\t100\t0\t20
chr1\tr1\t2\t200\t1\t20
");
        assert!(load_observations(&observations, 0).is_err());
        std::fs::remove_file(observations).unwrap();
    }
}
