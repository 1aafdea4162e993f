//! # Batch pharmacogenomic analysis pipeline
//!
//! Decomposes a large variant file into fixed-size batches, runs each batch
//! through an isolated extract → parse → annotate → resolve pipeline on a
//! bounded worker pool, and merges the per-batch drug-gene interaction sets
//! into one deduplicated, evidence-ranked result.
//!
//! ## Usage Example
//!
//! ```ignore
//! use pgxpipe::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::new("cohort.vcf", vec!["warfarin".into()])
//!     .with_batch_size(50_000)
//!     .with_workers(4);
//! let interactions = Pipeline::new(config)?.run()?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod annotate; // Variant annotation seam (trait + passthrough)
pub mod batch; // Batch planning, extraction, workers, pool, merge
pub mod knowledge; // CPIC/PharmGKB loading and lookup
pub mod vcf; // Variant file parsing

pub use annotate::{AnnotatedVariant, AnnotationError, Annotator, PassthroughAnnotator};
pub use batch::{PartialResultHandle, PlanMode, WorkerPool};
pub use knowledge::{DrugGeneInteraction, KnowledgeSources, LookupIndex};
pub use vcf::{VcfParser, VariantRecord};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use batch::BatchWorker;
use knowledge::AiFallback;

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: u64 = 50_000;

/// Data rows inspected when sniffing for pre-annotated input.
const SNIFF_ROWS: usize = 20;

/// Configuration for a full pipeline run.
#[derive(Debug)]
pub struct PipelineConfig {
    /// Variant file to analyze.
    pub vcf_path: PathBuf,

    /// Drugs to resolve, in caller order.
    pub drugs: Vec<String>,

    /// Rows per batch.
    pub batch_size: u64,

    /// Worker threads; `0` selects the available parallelism.
    pub workers: usize,

    /// How the batch count is determined.
    pub plan_mode: PlanMode,

    /// Skip the annotation backend even when one is configured.
    pub skip_annotation: bool,

    /// Fail a batch on annotation errors instead of degrading to
    /// passthrough.
    pub propagate_annotation_errors: bool,

    /// Per-batch deadline; `None` disables the check.
    pub task_deadline: Option<Duration>,

    /// Knowledge-base dump locations.
    pub sources: KnowledgeSources,
}

impl PipelineConfig {
    /// Configuration with the default batch size and no deadline.
    pub fn new(vcf_path: impl Into<PathBuf>, drugs: Vec<String>) -> Self {
        Self {
            vcf_path: vcf_path.into(),
            drugs,
            batch_size: DEFAULT_BATCH_SIZE,
            workers: 0,
            plan_mode: PlanMode::Exact,
            skip_annotation: false,
            propagate_annotation_errors: false,
            task_deadline: None,
            sources: KnowledgeSources::default(),
        }
    }

    /// Set the rows-per-batch size.
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the worker count (`0` = available parallelism).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Select the planning mode.
    pub fn with_plan_mode(mut self, mode: PlanMode) -> Self {
        self.plan_mode = mode;
        self
    }

    /// Set the knowledge-base dump locations.
    pub fn with_sources(mut self, sources: KnowledgeSources) -> Self {
        self.sources = sources;
        self
    }

    /// Set a per-batch deadline.
    pub fn with_task_deadline(mut self, deadline: Duration) -> Self {
        self.task_deadline = Some(deadline);
        self
    }
}

/// Any failure that aborts a whole pipeline run.
///
/// Per-batch failures never surface here; they degrade to empty batch
/// contributions unless every batch fails.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The lookup index could not be built.
    #[error(transparent)]
    LookupBuild(#[from] knowledge::LookupBuildError),
    /// Batch planning failed.
    #[error(transparent)]
    Plan(#[from] batch::PlanError),
    /// The worker pool could not be constructed.
    #[error(transparent)]
    Pool(#[from] batch::PoolError),
    /// Workspace I/O failed outside any batch.
    #[error("pipeline i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// Every planned batch failed; there is no result to report.
    #[error("all {batch_count} batches failed, no partial results to merge")]
    AllBatchesFailed {
        /// Number of batches that were planned.
        batch_count: u64,
    },
}

/// Orchestrates a complete run: plan → dispatch → collect → merge.
pub struct Pipeline {
    config: PipelineConfig,
    index: LookupIndex,
    annotator: Option<Box<dyn Annotator>>,
    ai_fallback: Option<Box<dyn AiFallback>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("facts", &self.index.fact_count())
            .field("annotator", &self.annotator.as_ref().map(|a| a.name()))
            .field("ai_fallback", &self.ai_fallback.as_ref().map(|a| a.name()))
            .finish()
    }
}

impl Pipeline {
    /// Build the shared lookup index and an idle pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let index = LookupIndex::build(&config.sources)?;
        info!(facts = index.fact_count(), "lookup index ready");
        Ok(Self {
            config,
            index,
            annotator: None,
            ai_fallback: None,
        })
    }

    /// Install an annotation backend.
    pub fn with_annotator(mut self, annotator: Box<dyn Annotator>) -> Self {
        self.annotator = Some(annotator);
        self
    }

    /// Install an AI fallback for drugs the databases do not cover.
    pub fn with_ai_fallback(mut self, fallback: Box<dyn AiFallback>) -> Self {
        self.ai_fallback = Some(fallback);
        self
    }

    /// Shared lookup index.
    pub fn index(&self) -> &LookupIndex {
        &self.index
    }

    /// Run the full pipeline and return the merged interaction list.
    ///
    /// An input with no data rows yields an empty list without dispatching
    /// any work. Individual batch failures degrade to empty contributions;
    /// only a run where every batch fails is an error.
    pub fn run(&self) -> Result<Vec<DrugGeneInteraction>, PipelineError> {
        let batch_count = batch::plan(
            &self.config.vcf_path,
            self.config.batch_size,
            self.config.plan_mode,
        )?;
        if batch_count == 0 {
            info!("input has no data rows, nothing to analyze");
            return Ok(Vec::new());
        }

        let workdir = tempfile::tempdir()?;
        let worker = self.worker(workdir.path())?;

        let mut pool = WorkerPool::new(self.config.workers);
        if let Some(deadline) = self.config.task_deadline {
            pool = pool.with_task_deadline(deadline);
        }
        let handles = pool.run_all(batch_count, |batch_index, deadline| {
            worker.process(batch_index, deadline)
        })?;

        if handles.iter().all(PartialResultHandle::is_empty) {
            return Err(PipelineError::AllBatchesFailed { batch_count });
        }

        let partials: Vec<Vec<DrugGeneInteraction>> = handles
            .iter()
            .map(|handle| match &handle.output {
                Some(path) => batch::load_partial_or_empty(path),
                None => Vec::new(),
            })
            .collect();
        Ok(batch::merge(partials))
    }

    /// Run exactly one batch and return its (unmerged) interaction list.
    pub fn run_single_batch(
        &self,
        batch_index: u64,
    ) -> Result<Vec<DrugGeneInteraction>, PipelineError> {
        let workdir = tempfile::tempdir()?;
        let worker = self.worker(workdir.path())?;
        match worker.process(batch_index, None) {
            Ok(path) => Ok(batch::load_partial_or_empty(&path)),
            Err(err) => {
                warn!(batch_index, %err, "single-batch run failed");
                Ok(Vec::new())
            }
        }
    }

    fn worker<'a>(&'a self, output_dir: &'a Path) -> Result<BatchWorker<'a>, PipelineError> {
        let annotator = if self.config.skip_annotation {
            debug!("annotation disabled by configuration");
            None
        } else if input_is_pre_annotated(&self.config.vcf_path)? {
            info!("input carries gene annotations, skipping annotation backend");
            None
        } else {
            self.annotator.as_deref()
        };
        Ok(BatchWorker {
            input: &self.config.vcf_path,
            batch_size: self.config.batch_size,
            drugs: &self.config.drugs,
            index: &self.index,
            annotator,
            ai_fallback: self.ai_fallback.as_deref(),
            propagate_annotation_errors: self.config.propagate_annotation_errors,
            output_dir,
        })
    }
}

/// Sniff the first data rows for existing gene annotations.
///
/// A file that already carries `ANN=` or `GENE=` INFO entries does not need
/// an annotation pass.
fn input_is_pre_annotated(path: &Path) -> Result<bool, std::io::Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut inspected = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }
        if line.contains("ANN=") || line.contains("GENE=") {
            return Ok(true);
        }
        inspected += 1;
        if inspected >= SNIFF_ROWS {
            break;
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pre_annotation_sniff_detects_gene_info() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        writeln!(file, "10\t96702047\trs1799853\tC\tT\t50\tPASS\tGENE=CYP2C9").unwrap();
        assert!(input_is_pre_annotated(file.path()).unwrap());
    }

    #[test]
    fn pre_annotation_sniff_rejects_plain_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        for i in 0..SNIFF_ROWS + 5 {
            writeln!(file, "1\t{}\t.\tA\tG\t50\tPASS\tDP=30", i + 1).unwrap();
        }
        assert!(!input_is_pre_annotated(file.path()).unwrap());
    }
}
