use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Errors raised while materializing a batch slice.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// I/O failure while slicing; the partial output has been deleted.
    #[error("i/o failure while extracting batch {batch_index}: {source}")]
    Io {
        /// Batch that failed.
        batch_index: u64,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// One contiguous record range sliced into a self-contained temporary file.
///
/// Holds the header/preamble verbatim plus the data rows of the half-open
/// range `[batch_index * batch_size, (batch_index + 1) * batch_size)`. The
/// backing file is deleted when the slice is dropped, on every exit path.
#[derive(Debug)]
pub struct BatchSlice {
    file: NamedTempFile,
    batch_index: u64,
    rows: u64,
}

impl BatchSlice {
    /// Path of the materialized slice.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Index of the batch this slice covers.
    pub fn batch_index(&self) -> u64 {
        self.batch_index
    }

    /// Number of data rows copied into the slice.
    pub fn row_count(&self) -> u64 {
        self.rows
    }
}

/// Materialize batch `batch_index` of `input` into a [`BatchSlice`].
///
/// Header lines are copied verbatim; data rows are copied when their 0-based
/// row index falls inside the batch range. For a fixed `batch_size` the
/// slices over `0..batch_count` partition the input's rows exactly once, in
/// order.
pub fn extract(
    input: &Path,
    batch_index: u64,
    batch_size: u64,
) -> Result<BatchSlice, ExtractionError> {
    let io_err = |source| ExtractionError::Io {
        batch_index,
        source,
    };

    let start = batch_index * batch_size;
    let end = start + batch_size;
    debug!(batch_index, start, end, input = %input.display(), "extracting batch");

    let reader = BufReader::new(File::open(input).map_err(io_err)?);
    // NamedTempFile deletes itself on drop, so any early return below also
    // cleans up the partially written slice.
    let file = NamedTempFile::with_suffix(".vcf").map_err(io_err)?;
    let mut writer = BufWriter::new(file.as_file());

    let mut row = 0u64;
    let mut copied = 0u64;
    for line in reader.lines() {
        let line = line.map_err(io_err)?;
        if line.starts_with('#') {
            writer.write_all(line.as_bytes()).map_err(io_err)?;
            writer.write_all(b"\n").map_err(io_err)?;
            continue;
        }
        if row >= end {
            break;
        }
        if row >= start {
            writer.write_all(line.as_bytes()).map_err(io_err)?;
            writer.write_all(b"\n").map_err(io_err)?;
            copied += 1;
        }
        row += 1;
    }
    writer.flush().map_err(io_err)?;
    drop(writer);

    debug!(batch_index, rows = copied, "batch extracted");
    Ok(BatchSlice {
        file,
        batch_index,
        rows: copied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_input(rows: u64) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "##fileformat=VCFv4.2").unwrap();
        writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        for i in 0..rows {
            writeln!(file, "1\t{}\trow{}\tA\tG\t50\tPASS\t.", i + 1, i).unwrap();
        }
        file
    }

    fn slice_ids(slice: &BatchSlice) -> Vec<String> {
        let contents = std::fs::read_to_string(slice.path()).unwrap();
        contents
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(|line| line.split('\t').nth(2).unwrap().to_string())
            .collect()
    }

    #[test]
    fn slice_preserves_header_and_range() {
        let input = write_input(10);
        let slice = extract(input.path(), 1, 4).unwrap();
        let contents = std::fs::read_to_string(slice.path()).unwrap();
        assert!(contents.starts_with("##fileformat=VCFv4.2\n#CHROM"));
        assert_eq!(slice_ids(&slice), vec!["row4", "row5", "row6", "row7"]);
        assert_eq!(slice.row_count(), 4);
        assert_eq!(slice.batch_index(), 1);
    }

    #[test]
    fn final_slice_may_be_short() {
        let input = write_input(10);
        let slice = extract(input.path(), 2, 4).unwrap();
        assert_eq!(slice_ids(&slice), vec!["row8", "row9"]);
    }

    #[test]
    fn out_of_range_slice_is_empty_but_keeps_header() {
        let input = write_input(3);
        let slice = extract(input.path(), 5, 4).unwrap();
        assert_eq!(slice.row_count(), 0);
        let contents = std::fs::read_to_string(slice.path()).unwrap();
        assert!(contents.contains("#CHROM"));
    }

    #[test]
    fn slices_partition_rows_exactly() {
        let input = write_input(23);
        let mut seen = Vec::new();
        for batch_index in 0..6 {
            let slice = extract(input.path(), batch_index, 4).unwrap();
            seen.extend(slice_ids(&slice));
        }
        let expected: Vec<String> = (0..23).map(|i| format!("row{i}")).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn slice_file_is_deleted_on_drop() {
        let input = write_input(4);
        let slice = extract(input.path(), 0, 4).unwrap();
        let path = slice.path().to_path_buf();
        assert!(path.exists());
        drop(slice);
        assert!(!path.exists());
    }

    #[test]
    fn missing_input_reports_batch_index() {
        let err = extract(Path::new("/nonexistent.vcf"), 3, 10).unwrap_err();
        assert!(err.to_string().contains("batch 3"));
    }
}
