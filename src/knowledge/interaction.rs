use serde::{Deserialize, Serialize};

/// Knowledge-base provider a fact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactSource {
    /// CPIC guideline pair tables.
    Cpic,
    /// PharmGKB clinical annotations.
    Pharmgkb,
}

impl FactSource {
    /// Label used in the `source` field of emitted interactions.
    pub fn label(self) -> &'static str {
        match self {
            FactSource::Cpic => "CPIC",
            FactSource::Pharmgkb => "PharmGKB",
        }
    }
}

/// A single piece of evidence from one source for a (drug, gene) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionFact {
    /// Provider this fact came from.
    pub source: FactSource,
    /// Source-specific evidence-level token (`"A"`, `"1A"`, `"3"`, ...).
    pub evidence_level: Option<String>,
    /// Phenotype text, when the source records one.
    pub phenotype: Option<String>,
    /// Recommendation text, when the source records one.
    pub recommendation: Option<String>,
    /// CPIC level, when the fact carries one.
    pub cpic_level: Option<String>,
    /// PharmGKB level, when the fact carries one.
    pub pharmgkb_level: Option<String>,
    /// CPIC PGx-testing annotation.
    pub pgx_testing: Option<String>,
    /// Guideline identifier.
    pub guideline_id: Option<String>,
    /// PharmGKB clinical annotation identifier.
    pub clinical_annotation_id: Option<String>,
    /// Last-updated date, as published.
    pub last_updated: Option<String>,
    /// Literature reference identifiers (PMIDs).
    pub literature_refs: Vec<String>,
}

/// The externally visible drug-gene interaction unit.
///
/// One instance may represent the fusion of several [`InteractionFact`]s
/// sharing the same (drug, gene) key; fusion happens only in the merge step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugGeneInteraction {
    /// Drug name (canonical form).
    pub drug: String,
    /// Gene symbol (canonical form).
    pub gene: String,
    /// Phenotype text, when known.
    pub phenotype: Option<String>,
    /// Aggregated source label; comma-joined after merging.
    pub source: String,
    /// Evidence-level token of the strongest contributing fact.
    pub evidence_level: Option<String>,
    /// Recommendation text; merged recommendations are joined by blank lines.
    pub recommendation: String,
    /// Literature references, kept sorted and deduplicated.
    #[serde(default)]
    pub literature_refs: Vec<String>,
    /// CPIC level, mirrored from the contributing fact.
    #[serde(default)]
    pub cpic_level: Option<String>,
    /// PharmGKB level, mirrored from the contributing fact.
    #[serde(default)]
    pub pharmgkb_level: Option<String>,
    /// CPIC PGx-testing annotation.
    #[serde(default)]
    pub pgx_testing: Option<String>,
    /// Guideline identifier.
    #[serde(default)]
    pub guideline_id: Option<String>,
    /// PharmGKB clinical annotation identifier.
    #[serde(default)]
    pub clinical_annotation_id: Option<String>,
    /// Last-updated date.
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Guideline URL, when one can be derived.
    #[serde(default)]
    pub guideline_url: Option<String>,
}

/// Evidence level assigned to interactions produced by an AI fallback.
pub const AI_EVIDENCE_LEVEL: &str = "AI-generated";

/// Evidence-priority rank; lower is stronger.
///
/// CPIC "A" < PharmGKB "1A"/"1B" < CPIC "B" < PharmGKB "2A"/"2B" <
/// CPIC "C" < PharmGKB "3"/"4" < AI-generated < anything else.
pub fn evidence_rank(interaction: &DrugGeneInteraction) -> u8 {
    let cpic = interaction.cpic_level.as_deref();
    let pharmgkb = interaction.pharmgkb_level.as_deref();
    if cpic == Some("A") {
        1
    } else if matches!(pharmgkb, Some("1A") | Some("1B")) {
        2
    } else if cpic == Some("B") {
        3
    } else if matches!(pharmgkb, Some("2A") | Some("2B")) {
        4
    } else if cpic == Some("C") {
        5
    } else if matches!(pharmgkb, Some("3") | Some("4")) {
        6
    } else if interaction.evidence_level.as_deref() == Some(AI_EVIDENCE_LEVEL) {
        7
    } else {
        8
    }
}

/// Stable sort by evidence priority; equal-priority interactions keep their
/// relative input order.
pub fn sort_by_evidence(interactions: &mut [DrugGeneInteraction]) {
    interactions.sort_by_key(evidence_rank);
}

/// Drop exact (drug, gene, source) duplicates, then sort by evidence.
///
/// Applied to a single drug's resolved list before it is exposed downstream.
pub fn dedup_and_sort(interactions: Vec<DrugGeneInteraction>) -> Vec<DrugGeneInteraction> {
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<DrugGeneInteraction> = interactions
        .into_iter()
        .filter(|i| seen.insert((i.drug.clone(), i.gene.clone(), i.source.clone())))
        .collect();
    sort_by_evidence(&mut unique);
    unique
}
