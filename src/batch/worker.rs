use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::annotate::{AnnotatedVariant, Annotator, PassthroughAnnotator};
use crate::knowledge::{dedup_and_sort, AiFallback, DrugGeneInteraction, LookupIndex};
use crate::vcf::{VcfError, VcfParser};

use super::extract::{self, ExtractionError};

/// Any failure inside one batch task. Isolated per batch: the pool logs it
/// and records an empty result instead of aborting sibling batches.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Slicing the batch failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Parsing the sliced records failed.
    #[error(transparent)]
    Vcf(#[from] VcfError),
    /// Annotation failed and the pipeline is configured to propagate.
    #[error("annotation failed for batch {batch_index}: {message}")]
    Annotation {
        /// Batch that failed.
        batch_index: u64,
        /// Backend error text.
        message: String,
    },
    /// Persisting the partial result failed.
    #[error("failed to persist batch {batch_index} results: {source}")]
    Persist {
        /// Batch that failed.
        batch_index: u64,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The per-task deadline expired between stages.
    #[error("batch {batch_index} exceeded its deadline before the {stage} stage")]
    DeadlineExceeded {
        /// Batch that timed out.
        batch_index: u64,
        /// Stage that was about to start.
        stage: &'static str,
    },
}

/// A persisted partial result that could not be read back.
///
/// Always recovered locally: the batch contributes an empty list and a
/// warning is logged.
#[derive(Debug, Error)]
pub enum MergeParseError {
    /// The unit is missing.
    #[error("partial result {path} not found")]
    Missing {
        /// Expected location.
        path: PathBuf,
    },
    /// The unit exists but does not deserialize.
    #[error("partial result {path} is corrupt: {message}")]
    Corrupt {
        /// Location of the corrupt unit.
        path: PathBuf,
        /// Decoder error text.
        message: String,
    },
}

/// Write one batch's interactions to `path` as a JSON array.
pub fn save_partial(
    interactions: &[DrugGeneInteraction],
    path: &Path,
    batch_index: u64,
) -> Result<(), TaskError> {
    let persist_err = |source| TaskError::Persist {
        batch_index,
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(persist_err)?;
    }
    let file = File::create(path).map_err(persist_err)?;
    serde_json::to_writer(BufWriter::new(file), interactions)
        .map_err(|err| persist_err(std::io::Error::other(err)))?;
    debug!(batch_index, count = interactions.len(), path = %path.display(), "saved partial result");
    Ok(())
}

/// Read one batch's persisted interactions back.
pub fn load_partial(path: &Path) -> Result<Vec<DrugGeneInteraction>, MergeParseError> {
    if !path.is_file() {
        return Err(MergeParseError::Missing {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|err| MergeParseError::Corrupt {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| MergeParseError::Corrupt {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Read a persisted unit, degrading a missing or corrupt file to an empty
/// contribution with a logged warning.
pub fn load_partial_or_empty(path: &Path) -> Vec<DrugGeneInteraction> {
    match load_partial(path) {
        Ok(interactions) => interactions,
        Err(err) => {
            warn!(%err, "treating unreadable partial result as empty");
            Vec::new()
        }
    }
}

/// End-to-end pipeline for one batch: extract → parse → annotate → resolve →
/// persist. Shares the read-only [`LookupIndex`] with its siblings.
pub struct BatchWorker<'a> {
    /// Full input file.
    pub input: &'a Path,
    /// Rows per batch.
    pub batch_size: u64,
    /// Drugs to resolve, in caller order.
    pub drugs: &'a [String],
    /// Shared lookup index.
    pub index: &'a LookupIndex,
    /// Annotation backend; `None` selects passthrough.
    pub annotator: Option<&'a dyn Annotator>,
    /// Optional AI fallback for drugs the databases do not cover.
    pub ai_fallback: Option<&'a dyn AiFallback>,
    /// Fail the batch on annotation errors instead of degrading.
    pub propagate_annotation_errors: bool,
    /// Directory receiving `batch_<index>.json` units.
    pub output_dir: &'a Path,
}

impl std::fmt::Debug for BatchWorker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWorker")
            .field("input", &self.input)
            .field("batch_size", &self.batch_size)
            .field("drugs", &self.drugs)
            .field("annotator", &self.annotator.map(|a| a.name()))
            .field("ai_fallback", &self.ai_fallback.map(|a| a.name()))
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl BatchWorker<'_> {
    /// Path of the persisted unit for `batch_index`.
    pub fn partial_path(&self, batch_index: u64) -> PathBuf {
        self.output_dir.join(format!("batch_{batch_index}.json"))
    }

    /// Run the full per-batch pipeline and persist the result.
    ///
    /// The optional deadline is checked at each stage boundary (the only
    /// suspension points are I/O boundaries); a stage in progress is never
    /// interrupted.
    pub fn process(
        &self,
        batch_index: u64,
        deadline: Option<Instant>,
    ) -> Result<PathBuf, TaskError> {
        let started = Instant::now();
        check_deadline(deadline, batch_index, "extract")?;
        let slice = extract::extract(self.input, batch_index, self.batch_size)?;

        check_deadline(deadline, batch_index, "parse")?;
        let records = VcfParser::new().parse_path(slice.path())?;
        debug!(batch_index, records = records.len(), "parsed batch slice");

        check_deadline(deadline, batch_index, "annotate")?;
        let annotated = self.annotate(batch_index, &records)?;

        check_deadline(deadline, batch_index, "resolve")?;
        let genes = self.gene_set(&annotated);
        debug!(batch_index, genes = genes.len(), "extracted gene set");

        let mut interactions = Vec::new();
        for drug in self.drugs {
            let resolved = self.resolve_drug(drug, &genes, &annotated);
            interactions.extend(dedup_and_sort(resolved));
        }

        check_deadline(deadline, batch_index, "persist")?;
        let path = self.partial_path(batch_index);
        save_partial(&interactions, &path, batch_index)?;

        info!(
            batch_index,
            interactions = interactions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch processed"
        );
        Ok(path)
    }

    fn annotate(
        &self,
        batch_index: u64,
        records: &[crate::vcf::VariantRecord],
    ) -> Result<Vec<AnnotatedVariant>, TaskError> {
        let Some(annotator) = self.annotator else {
            return Ok(PassthroughAnnotator
                .annotate(records)
                .expect("passthrough annotation is infallible"));
        };
        match annotator.annotate(records) {
            Ok(annotated) => Ok(annotated),
            Err(err) if self.propagate_annotation_errors => Err(TaskError::Annotation {
                batch_index,
                message: err.to_string(),
            }),
            Err(err) => {
                warn!(batch_index, backend = annotator.name(), %err,
                    "annotation failed, degrading to passthrough");
                Ok(PassthroughAnnotator
                    .annotate(records)
                    .expect("passthrough annotation is infallible"))
            }
        }
    }

    fn gene_set(&self, annotated: &[AnnotatedVariant]) -> BTreeSet<String> {
        annotated
            .iter()
            .filter_map(|variant| variant.gene_symbol.as_deref())
            .map(|gene| self.index.normalize_gene(gene))
            .collect()
    }

    fn resolve_drug(
        &self,
        drug: &str,
        genes: &BTreeSet<String>,
        annotated: &[AnnotatedVariant],
    ) -> Vec<DrugGeneInteraction> {
        let resolved = self.index.resolve(drug, genes);
        if !resolved.is_empty() {
            return resolved;
        }
        let Some(fallback) = self.ai_fallback else {
            return resolved;
        };
        match fallback.suggest(drug, genes, annotated) {
            Ok(suggested) => {
                if !suggested.is_empty() {
                    info!(drug, backend = fallback.name(), count = suggested.len(),
                        "ai fallback suggested interactions");
                }
                suggested
            }
            Err(err) => {
                warn!(drug, backend = fallback.name(), %err, "ai fallback failed, continuing");
                Vec::new()
            }
        }
    }
}

fn check_deadline(
    deadline: Option<Instant>,
    batch_index: u64,
    stage: &'static str,
) -> Result<(), TaskError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(TaskError::DeadlineExceeded {
            batch_index,
            stage,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    use crate::annotate::AnnotationError;
    use crate::knowledge::KnowledgeSources;

    fn write_kb(dir: &Path) -> KnowledgeSources {
        let cpic = dir.join("cpic");
        std::fs::create_dir_all(&cpic).unwrap();
        std::fs::write(
            cpic.join("cpic_drugs.json"),
            r#"[{"name": "warfarin", "drugid": "D1"}]"#,
        )
        .unwrap();
        std::fs::write(
            cpic.join("cpic_pairs.json"),
            r#"[{"genesymbol": "CYP2C9", "drugid": "D1", "cpiclevel": "A", "citations": ["21900891"]}]"#,
        )
        .unwrap();
        KnowledgeSources {
            cpic_dir: Some(cpic),
            pharmgkb_dir: None,
        }
    }

    fn write_input(dir: &Path, rows: u64) -> PathBuf {
        let path = dir.join("input.vcf");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        for i in 0..rows {
            writeln!(file, "10\t{}\trs{}\tC\tT\t50\tPASS\tGENE=CYP2C9", i + 1, i).unwrap();
        }
        path
    }

    struct FailingAnnotator;
    impl Annotator for FailingAnnotator {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn annotate(
            &self,
            _variants: &[crate::vcf::VariantRecord],
        ) -> Result<Vec<AnnotatedVariant>, AnnotationError> {
            Err(AnnotationError::Backend("backend down".into()))
        }
    }

    #[test]
    fn worker_persists_resolved_interactions() {
        let dir = tempfile::tempdir().unwrap();
        let index = LookupIndex::build(&write_kb(dir.path())).unwrap();
        let input = write_input(dir.path(), 5);
        let drugs = vec!["Coumadin".to_string()];
        let worker = BatchWorker {
            input: &input,
            batch_size: 10,
            drugs: &drugs,
            index: &index,
            annotator: None,
            ai_fallback: None,
            propagate_annotation_errors: false,
            output_dir: dir.path(),
        };

        let path = worker.process(0, None).unwrap();
        let interactions = load_partial(&path).unwrap();
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].drug, "warfarin");
        assert_eq!(interactions[0].gene, "CYP2C9");
    }

    #[test]
    fn annotation_failure_degrades_to_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let index = LookupIndex::build(&write_kb(dir.path())).unwrap();
        let input = write_input(dir.path(), 3);
        let drugs = vec!["warfarin".to_string()];
        let worker = BatchWorker {
            input: &input,
            batch_size: 10,
            drugs: &drugs,
            index: &index,
            annotator: Some(&FailingAnnotator),
            ai_fallback: None,
            propagate_annotation_errors: false,
            output_dir: dir.path(),
        };

        // The INFO gene field still resolves through the passthrough path.
        let path = worker.process(0, None).unwrap();
        assert_eq!(load_partial(&path).unwrap().len(), 1);
    }

    #[test]
    fn annotation_failure_propagates_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let index = LookupIndex::build(&write_kb(dir.path())).unwrap();
        let input = write_input(dir.path(), 3);
        let drugs = vec!["warfarin".to_string()];
        let worker = BatchWorker {
            input: &input,
            batch_size: 10,
            drugs: &drugs,
            index: &index,
            annotator: Some(&FailingAnnotator),
            ai_fallback: None,
            propagate_annotation_errors: true,
            output_dir: dir.path(),
        };

        assert!(matches!(
            worker.process(0, None),
            Err(TaskError::Annotation { batch_index: 0, .. })
        ));
    }

    #[test]
    fn expired_deadline_fails_before_any_stage() {
        let dir = tempfile::tempdir().unwrap();
        let index = LookupIndex::build(&write_kb(dir.path())).unwrap();
        let input = write_input(dir.path(), 3);
        let drugs = vec!["warfarin".to_string()];
        let worker = BatchWorker {
            input: &input,
            batch_size: 10,
            drugs: &drugs,
            index: &index,
            annotator: None,
            ai_fallback: None,
            propagate_annotation_errors: false,
            output_dir: dir.path(),
        };

        let expired = Instant::now() - Duration::from_secs(1);
        assert!(matches!(
            worker.process(0, Some(expired)),
            Err(TaskError::DeadlineExceeded {
                stage: "extract",
                ..
            })
        ));
    }

    #[test]
    fn unreadable_partial_results_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("batch_9.json");
        assert!(load_partial_or_empty(&missing).is_empty());

        let corrupt = dir.path().join("batch_0.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert!(matches!(
            load_partial(&corrupt),
            Err(MergeParseError::Corrupt { .. })
        ));
        assert!(load_partial_or_empty(&corrupt).is_empty());
    }
}
