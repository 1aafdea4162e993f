use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// How the planner determines the number of data rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanMode {
    /// Count every data row. Exact, but reads the whole file.
    #[default]
    Exact,
    /// Sample up to 1,000 data rows and derive the count from the mean
    /// encoded row size. Falls back to exact counting when no data row is
    /// available to sample.
    Estimated,
}

/// Rows sampled by [`PlanMode::Estimated`].
const SAMPLE_ROWS: u64 = 1_000;

/// Errors raised while planning batches.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Batch size must be positive.
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    /// The input could not be read.
    #[error("failed to read {path} while planning: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PlanError + '_ {
    move |source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Count the data rows (non-`#` lines) of `path`.
pub fn count_data_rows(path: &Path) -> Result<u64, PlanError> {
    let reader = BufReader::new(File::open(path).map_err(io_err(path))?);
    let mut count = 0u64;
    for line in reader.lines() {
        let line = line.map_err(io_err(path))?;
        if !line.starts_with('#') {
            count += 1;
            if count % 100_000 == 0 {
                debug!(count, "counting data rows");
            }
        }
    }
    info!(path = %path.display(), count, "counted data rows");
    Ok(count)
}

/// Number of batches `path` decomposes into at `batch_size` rows per batch.
///
/// Non-empty input always yields at least one batch; an input with no data
/// rows yields zero.
pub fn plan(path: &Path, batch_size: u64, mode: PlanMode) -> Result<u64, PlanError> {
    if batch_size == 0 {
        return Err(PlanError::ZeroBatchSize);
    }
    let rows = match mode {
        PlanMode::Exact => count_data_rows(path)?,
        PlanMode::Estimated => match estimate_data_rows(path)? {
            Some(rows) => rows,
            None => {
                warn!("no data rows available to sample, falling back to exact counting");
                count_data_rows(path)?
            }
        },
    };
    let batches = rows.div_ceil(batch_size);
    info!(rows, batch_size, batches, "planned batches");
    Ok(batches)
}

/// Estimated data-row count, or `None` when zero rows were sampled.
fn estimate_data_rows(path: &Path) -> Result<Option<u64>, PlanError> {
    let file_size = std::fs::metadata(path).map_err(io_err(path))?.len();
    let reader = BufReader::new(File::open(path).map_err(io_err(path))?);

    let mut header_bytes = 0u64;
    let mut sample_rows = 0u64;
    let mut sample_bytes = 0u64;
    for line in reader.lines() {
        let line = line.map_err(io_err(path))?;
        // +1 for the newline stripped by lines().
        let encoded = line.len() as u64 + 1;
        if line.starts_with('#') {
            header_bytes += encoded;
        } else {
            sample_rows += 1;
            sample_bytes += encoded;
            if sample_rows >= SAMPLE_ROWS {
                break;
            }
        }
    }

    if sample_rows == 0 {
        return Ok(None);
    }

    let mean_row_size = sample_bytes as f64 / sample_rows as f64;
    let data_bytes = file_size.saturating_sub(header_bytes);
    let estimated = (data_bytes as f64 / mean_row_size) as u64;
    debug!(estimated, mean_row_size, "estimated data rows from sample");
    Ok(Some(estimated))
}
