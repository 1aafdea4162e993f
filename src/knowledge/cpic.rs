//! CPIC knowledge-base dumps: JSON documents with a fixed per-file schema.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, error, info};

/// Row of `cpic_drugs.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CpicDrug {
    /// Generic drug name.
    pub name: String,
    /// CPIC drug identifier, used to join against pair rows.
    #[serde(default)]
    pub drugid: Option<String>,
    /// RxNorm registry identifier.
    #[serde(default)]
    pub rxnormid: Option<String>,
    /// DrugBank registry identifier.
    #[serde(default)]
    pub drugbankid: Option<String>,
    /// ATC classification codes.
    #[serde(default)]
    pub atcid: Vec<String>,
}

/// Row of `cpic_genes.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CpicGene {
    /// Canonical gene symbol.
    pub symbol: String,
    /// Long gene name, registered as an alias.
    #[serde(default)]
    pub name: Option<String>,
}

/// Row of `cpic_pairs.json` — the drug-gene cross-reference table.
#[derive(Debug, Clone, Deserialize)]
pub struct CpicPair {
    /// Gene symbol of the pair.
    pub genesymbol: String,
    /// Drug identifier, resolved via `cpic_drugs.json`.
    pub drugid: String,
    /// CPIC evidence level (`A`/`B`/`C`).
    #[serde(default)]
    pub cpiclevel: Option<String>,
    /// PharmGKB clinical-annotation level mirrored by CPIC.
    #[serde(default)]
    pub pgkbcalevel: Option<String>,
    /// PGx testing annotation.
    #[serde(default)]
    pub pgxtesting: Option<String>,
    /// Guideline identifier, resolved via `cpic_recommendations.json`.
    #[serde(default)]
    pub guidelineid: Option<String>,
    /// Literature citations (PMIDs).
    #[serde(default)]
    pub citations: Vec<String>,
}

/// Row of `cpic_recommendations.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct CpicRecommendation {
    /// Guideline this recommendation belongs to.
    pub guidelineid: String,
    /// Phenotype the recommendation applies to.
    #[serde(default)]
    pub phenotype: Option<String>,
    /// Recommendation text.
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// All CPIC dump content relevant to index construction.
#[derive(Debug, Default)]
pub struct CpicData {
    /// Drug registry rows.
    pub drugs: Vec<CpicDrug>,
    /// Gene registry rows.
    pub genes: Vec<CpicGene>,
    /// Drug-gene pair rows.
    pub pairs: Vec<CpicPair>,
    /// Guideline recommendation rows.
    pub recommendations: Vec<CpicRecommendation>,
}

impl CpicData {
    /// True when no file contributed any row.
    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty()
            && self.genes.is_empty()
            && self.pairs.is_empty()
            && self.recommendations.is_empty()
    }
}

/// Load the CPIC dumps under `dir`.
///
/// Missing files contribute nothing; a malformed file is logged and skipped
/// so the remaining files still load.
pub fn load(dir: &Path) -> CpicData {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "CPIC directory not found, skipping source");
        return CpicData::default();
    }

    let data = CpicData {
        drugs: load_json(dir, "cpic_drugs.json"),
        genes: load_json(dir, "cpic_genes.json"),
        pairs: load_json(dir, "cpic_pairs.json"),
        recommendations: load_json(dir, "cpic_recommendations.json"),
    };
    info!(
        drugs = data.drugs.len(),
        genes = data.genes.len(),
        pairs = data.pairs.len(),
        recommendations = data.recommendations.len(),
        "loaded CPIC dumps"
    );
    data
}

fn load_json<T: serde::de::DeserializeOwned>(dir: &Path, name: &str) -> Vec<T> {
    let path = dir.join(name);
    if !path.is_file() {
        debug!(file = name, "CPIC file not present");
        return Vec::new();
    }
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(err) => {
            error!(file = name, %err, "failed to open CPIC file, skipping");
            return Vec::new();
        }
    };
    match serde_json::from_reader(BufReader::new(file)) {
        Ok(rows) => rows,
        Err(err) => {
            error!(file = name, %err, "malformed CPIC file, skipping");
            Vec::new()
        }
    }
}
