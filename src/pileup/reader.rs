//! Reader for the textual pileup format produced by alignment preprocessing.
//!
//! One record per line:
//! `chromosome  position  coverage  bases  cell_ids  read_ids`
//! where `bases` is a string of `coverage` ACGT letters and the two id lists
//! are comma-separated, e.g.
//! `22  10719571  3  TAG  0,0,3  1047,1048,2191`
//! means that at position 10719571 of chromosome 22 we read 'T' and 'A' in
//! cell 0 and 'G' in cell 3. Files may be gzip-compressed.

use crate::pileup::{encode_base, CellData, PosData};
use crate::utils::Result;
use flate2::read::MultiGzDecoder;
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Parsed contents of one pileup file.
#[derive(Debug)]
pub struct Pileup {
    /// Position records grouped by chromosome, in file order.
    pub chromosomes: Vec<Vec<PosData>>,
    /// All cell ids observed in the file.
    pub cell_ids: HashSet<u32>,
    /// Largest genomic span of a single read, in positions.
    pub max_fragment_length: u32,
}

/// Reads one pileup file, keeping only records of the listed chromosomes
/// (an empty list keeps everything).
pub fn read_pileup(path: &Path, chromosomes: &[String]) -> Result<Pileup> {
    let file =
        File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let is_gzip = path.extension().and_then(|e| e.to_str()) == Some("gz");
    if is_gzip {
        parse_pileup(BufReader::new(MultiGzDecoder::new(file)), path, chromosomes)
    } else {
        parse_pileup(BufReader::new(file), path, chromosomes)
    }
}

/// Reads several pileup files in parallel and merges them into one dataset:
/// chromosome groups concatenated in file order, the cell count defined by
/// the largest observed id, and the fragment length bound taken as the
/// maximum over all files.
pub fn read_pileup_files(
    paths: &[PathBuf],
    chromosomes: &[String],
    pool: &rayon::ThreadPool,
) -> Result<(Vec<Vec<PosData>>, usize, u32)> {
    let pileups: Vec<Pileup> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| read_pileup(path, chromosomes))
            .collect::<Result<_>>()
    })?;

    let mut pos_data = Vec::new();
    let mut cell_ids = HashSet::new();
    let mut max_fragment_length = 0;
    for pileup in pileups {
        pos_data.extend(pileup.chromosomes);
        cell_ids.extend(pileup.cell_ids);
        max_fragment_length = max_fragment_length.max(pileup.max_fragment_length);
    }
    let num_cells = cell_ids.iter().max().map_or(0, |&id| id as usize + 1);
    Ok((pos_data, num_cells, max_fragment_length))
}

fn parse_pileup<R: BufRead>(reader: R, path: &Path, chromosomes: &[String]) -> Result<Pileup> {
    let mut groups: Vec<Vec<PosData>> = Vec::new();
    let mut current_chromosome = String::new();
    let mut cell_ids = HashSet::new();
    // first and last observed position per read, for the fragment length bound
    let mut read_spans: HashMap<u32, (u32, u32)> = HashMap::new();

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        if line.is_empty() {
            continue;
        }
        let (chromosome, pd) = parse_line(&line)
            .map_err(|e| format!("{}:{}: {}", path.display(), line_idx + 1, e))?;
        if !chromosomes.is_empty() && !chromosomes.iter().any(|c| *c == chromosome) {
            continue;
        }

        if chromosome != current_chromosome || groups.is_empty() {
            current_chromosome = chromosome;
            groups.push(Vec::new());
        }
        let group = groups.last_mut().unwrap();
        if let Some(last) = group.last() {
            if pd.position < last.position {
                return Err(format!(
                    "{}:{}: positions of chromosome {} are not sorted ({} after {})",
                    path.display(),
                    line_idx + 1,
                    current_chromosome,
                    pd.position,
                    last.position
                ));
            }
        }

        for cell in &pd.cells {
            cell_ids.insert(cell.cell_id);
            let span = read_spans
                .entry(cell.read_id)
                .or_insert((pd.position, pd.position));
            span.1 = pd.position;
        }
        group.push(pd);
    }

    let max_fragment_length = read_spans
        .values()
        .map(|&(first, last)| last - first + 1)
        .max()
        .unwrap_or(0);

    Ok(Pileup {
        chromosomes: groups,
        cell_ids,
        max_fragment_length,
    })
}

fn parse_line(line: &str) -> std::result::Result<(String, PosData), String> {
    let fields = line.split_whitespace().collect_vec();
    if fields.len() != 6 {
        return Err(format!("expected 6 fields, found {}", fields.len()));
    }
    let position: u32 = fields[1]
        .parse()
        .map_err(|_| format!("invalid position '{}'", fields[1]))?;
    let coverage: usize = fields[2]
        .parse()
        .map_err(|_| format!("invalid coverage '{}'", fields[2]))?;
    let bases = fields[3].as_bytes();
    let cell_ids = parse_ids(fields[4])?;
    let read_ids = parse_ids(fields[5])?;
    if bases.len() != coverage || cell_ids.len() != coverage || read_ids.len() != coverage {
        return Err(format!(
            "bases/cells/read_ids do not all match coverage {}",
            coverage
        ));
    }

    let mut cells = Vec::with_capacity(coverage);
    for ((&base, cell_id), read_id) in bases.iter().zip(cell_ids).zip(read_ids) {
        let base = encode_base(base).ok_or_else(|| format!("invalid base '{}'", base as char))?;
        cells.push(CellData {
            cell_id,
            read_id,
            base,
        });
    }
    Ok((fields[0].to_string(), PosData { position, cells }))
}

fn parse_ids(field: &str) -> std::result::Result<Vec<u32>, String> {
    field
        .split(',')
        .map(|id| id.parse().map_err(|_| format!("invalid id '{}'", id)))
        .collect()
}
