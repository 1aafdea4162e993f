//! Variant annotation capability.
//!
//! Annotation backends (SnpEff, VEP, ...) live behind the [`Annotator`]
//! trait; the pipeline depends only on the contract. When a backend fails or
//! none is configured, [`PassthroughAnnotator`] degrades to whatever gene
//! information is already present in each record's INFO map, so a batch is
//! never lost to annotation alone.

use thiserror::Error;
use tracing::debug;

use crate::vcf::VariantRecord;

/// One structured annotation entry, in SnpEff `ANN=` field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEntry {
    /// Annotated allele.
    pub allele: String,
    /// Predicted effect (e.g. `missense_variant`).
    pub effect: String,
    /// Impact class (e.g. `MODERATE`).
    pub impact: String,
    /// Gene symbol, when the entry names one.
    pub gene: Option<String>,
    /// Gene identifier, when the entry names one.
    pub gene_id: Option<String>,
}

/// A variant enriched with gene/consequence metadata.
///
/// Never mutated after creation; resolution only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedVariant {
    /// The underlying record.
    pub record: VariantRecord,
    /// Canonical gene symbol, when one is known.
    pub gene_symbol: Option<String>,
    /// Ordered annotation entries.
    pub annotations: Vec<AnnotationEntry>,
}

impl AnnotatedVariant {
    /// Build an annotated variant from information already in the record.
    ///
    /// Reads a `GENE` INFO key and any SnpEff-style `ANN` entries; used both
    /// for pre-annotated inputs and as the degraded fallback when a backend
    /// fails.
    pub fn from_record(record: VariantRecord) -> Self {
        let annotations = record
            .info
            .get("ANN")
            .map(|value| parse_ann_field(value))
            .unwrap_or_default();

        let gene_symbol = record
            .info
            .get("GENE")
            .cloned()
            .or_else(|| annotations.iter().find_map(|entry| entry.gene.clone()));

        Self {
            record,
            gene_symbol,
            annotations,
        }
    }
}

/// Errors raised by annotation backends.
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// The backend ran but failed.
    #[error("annotation backend failed: {0}")]
    Backend(String),
    /// The backend could not be reached at all.
    #[error("annotation i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability interface for variant annotation backends.
pub trait Annotator: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Enrich a batch of records with gene/consequence metadata.
    fn annotate(
        &self,
        variants: &[VariantRecord],
    ) -> Result<Vec<AnnotatedVariant>, AnnotationError>;
}

/// Annotator that carries through information already present in each record.
#[derive(Debug, Default)]
pub struct PassthroughAnnotator;

impl Annotator for PassthroughAnnotator {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn annotate(
        &self,
        variants: &[VariantRecord],
    ) -> Result<Vec<AnnotatedVariant>, AnnotationError> {
        debug!(variants = variants.len(), "passthrough annotation");
        Ok(variants
            .iter()
            .cloned()
            .map(AnnotatedVariant::from_record)
            .collect())
    }
}

/// Parse a SnpEff-style `ANN=` INFO value: comma-separated entries of
/// pipe-delimited fields `allele|effect|impact|gene|gene_id|...`.
fn parse_ann_field(value: &str) -> Vec<AnnotationEntry> {
    value
        .split(',')
        .filter_map(|entry| {
            let fields: Vec<&str> = entry.split('|').collect();
            if fields.len() < 4 {
                return None;
            }
            Some(AnnotationEntry {
                allele: fields[0].to_string(),
                effect: fields[1].to_string(),
                impact: fields[2].to_string(),
                gene: non_empty(fields[3]),
                gene_id: fields.get(4).and_then(|f| non_empty(f)),
            })
        })
        .collect()
}

fn non_empty(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf::VcfParser;

    fn record(info: &str) -> VariantRecord {
        VcfParser::new()
            .parse_line(&format!("1\t100\trs1\tA\tG\t50\tPASS\t{info}"))
            .expect("row parses")
    }

    #[test]
    fn gene_info_key_is_carried_through() {
        let annotated = AnnotatedVariant::from_record(record("GENE=CYP2C19"));
        assert_eq!(annotated.gene_symbol.as_deref(), Some("CYP2C19"));
        assert!(annotated.annotations.is_empty());
    }

    #[test]
    fn ann_entries_are_parsed_in_order() {
        let annotated = AnnotatedVariant::from_record(record(
            "ANN=G|missense_variant|MODERATE|CYP2D6|ENSG00000100197,G|upstream_gene_variant|MODIFIER|NDUFA6|ENSG00000184983",
        ));
        assert_eq!(annotated.annotations.len(), 2);
        assert_eq!(annotated.gene_symbol.as_deref(), Some("CYP2D6"));
        assert_eq!(annotated.annotations[0].effect, "missense_variant");
        assert_eq!(
            annotated.annotations[1].gene_id.as_deref(),
            Some("ENSG00000184983")
        );
    }

    #[test]
    fn gene_key_wins_over_ann_entries() {
        let annotated = AnnotatedVariant::from_record(record(
            "GENE=VKORC1;ANN=G|missense_variant|MODERATE|CYP2D6|ENSG1",
        ));
        assert_eq!(annotated.gene_symbol.as_deref(), Some("VKORC1"));
    }

    #[test]
    fn passthrough_annotator_never_fails() {
        let records = vec![record("."), record("GENE=TPMT")];
        let annotated = PassthroughAnnotator
            .annotate(&records)
            .expect("passthrough succeeds");
        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].gene_symbol, None);
        assert_eq!(annotated[1].gene_symbol.as_deref(), Some("TPMT"));
    }
}
