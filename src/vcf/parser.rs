use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::VariantRecord;

/// Errors raised while reading a variant file.
#[derive(Debug, Error)]
pub enum VcfError {
    /// The file could not be opened or read.
    #[error("failed to read variant file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Tolerant parser for line-oriented, tab-delimited variant files.
///
/// Malformed data rows are skipped with a warning rather than failing the
/// whole file; only I/O failures are fatal.
#[derive(Debug, Default)]
pub struct VcfParser;

impl VcfParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse every data row of `path` into records.
    ///
    /// Sample identifiers are taken from the `#CHROM` header line when
    /// present; the first sample column is used to render a genotype.
    pub fn parse_path(&self, path: &Path) -> Result<Vec<VariantRecord>, VcfError> {
        let file = File::open(path).map_err(|source| VcfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut has_samples = false;
        for line in reader.lines() {
            let line = line.map_err(|source| VcfError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if let Some(header) = line.strip_prefix('#') {
                if header.starts_with("CHROM") {
                    has_samples = header.split('\t').count() > 9;
                }
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if let Some(record) = self.parse_data_line(&line, has_samples) {
                records.push(record);
                if records.len() % 10_000 == 0 {
                    debug!(parsed = records.len(), "parsing variant file");
                }
            }
        }

        info!(path = %path.display(), variants = records.len(), "parsed variant file");
        Ok(records)
    }

    /// Parse a single line. Header lines and malformed rows yield `None`.
    pub fn parse_line(&self, line: &str) -> Option<VariantRecord> {
        if line.starts_with('#') {
            return None;
        }
        self.parse_data_line(line, true)
    }

    fn parse_data_line(&self, line: &str, has_samples: bool) -> Option<VariantRecord> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 8 {
            warn!(fields = fields.len(), "skipping malformed variant row");
            return None;
        }

        let chrom = fields[0].to_string();
        let pos: u64 = match fields[1].parse() {
            Ok(pos) => pos,
            Err(_) => {
                warn!(value = fields[1], "skipping row with invalid position");
                return None;
            }
        };
        let ref_allele = fields[3].to_string();
        let alt_allele = fields[4].to_string();
        let qual = if fields[5] == "." {
            0.0
        } else {
            fields[5].parse().unwrap_or(0.0)
        };

        let mut info = BTreeMap::new();
        if fields[7] != "." {
            for item in fields[7].split(';') {
                match item.split_once('=') {
                    Some((key, value)) => {
                        info.insert(key.to_string(), value.to_string());
                    }
                    None => {
                        info.insert(item.to_string(), "true".to_string());
                    }
                }
            }
        }

        let id = if fields[2] == "." {
            format!("{chrom}:{pos}")
        } else {
            fields[2].to_string()
        };

        let genotype = if has_samples && fields.len() > 9 {
            render_genotype(fields[8], fields[9], &ref_allele, &alt_allele)
        } else {
            None
        };

        Some(VariantRecord {
            chrom,
            pos,
            id,
            ref_allele,
            alt_allele,
            qual,
            filter: fields[6].to_string(),
            info,
            genotype,
        })
    }
}

/// Render the first sample's GT value against the record's alleles.
fn render_genotype(format: &str, sample: &str, ref_allele: &str, alt_allele: &str) -> Option<String> {
    let gt_index = format.split(':').position(|f| f == "GT")?;
    let gt = sample.split(':').nth(gt_index)?;
    match gt {
        "0/0" | "0|0" => Some(format!("{ref_allele}/{ref_allele}")),
        "0/1" | "0|1" | "1/0" | "1|0" => Some(format!("{ref_allele}/{alt_allele}")),
        "1/1" | "1|1" => Some(format!("{alt_allele}/{alt_allele}")),
        _ => None,
    }
}
