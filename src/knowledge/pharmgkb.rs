//! PharmGKB knowledge-base dumps: tab-delimited files with named columns.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, error, info};

/// Row of `clinical_annotations.tsv`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClinicalAnnotationRow {
    /// Drug name(s); multiple drugs are comma-separated.
    #[serde(rename = "Drug(s)")]
    pub drugs: String,
    /// Gene symbol.
    #[serde(rename = "Gene")]
    pub gene: String,
    /// PharmGKB evidence level (`1A`..`4`).
    #[serde(rename = "Level of Evidence", default)]
    pub level_of_evidence: Option<String>,
    /// Phenotype text.
    #[serde(rename = "Phenotype(s)", default)]
    pub phenotypes: Option<String>,
    /// Clinical annotation identifier.
    #[serde(rename = "Clinical Annotation ID", default)]
    pub clinical_annotation_id: Option<String>,
    /// Last history date.
    #[serde(rename = "Latest History Date (YYYY-MM-DD)", default)]
    pub last_updated: Option<String>,
}

/// Row of `genes.tsv`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneRow {
    /// Canonical gene symbol.
    #[serde(rename = "Symbol")]
    pub symbol: String,
    /// Comma-separated alternate names.
    #[serde(rename = "Alternate Names", default)]
    pub alternate_names: Option<String>,
}

/// All PharmGKB dump content relevant to index construction.
#[derive(Debug, Default)]
pub struct PharmgkbData {
    /// Clinical annotation rows.
    pub clinical_annotations: Vec<ClinicalAnnotationRow>,
    /// Gene registry rows.
    pub genes: Vec<GeneRow>,
}

impl PharmgkbData {
    /// True when no file contributed any row.
    pub fn is_empty(&self) -> bool {
        self.clinical_annotations.is_empty() && self.genes.is_empty()
    }
}

/// Load the PharmGKB dumps under `dir`.
///
/// Missing files contribute nothing; a malformed file or row is logged and
/// skipped so the remaining content still loads.
pub fn load(dir: &Path) -> PharmgkbData {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "PharmGKB directory not found, skipping source");
        return PharmgkbData::default();
    }

    let data = PharmgkbData {
        clinical_annotations: load_tsv(dir, "clinical_annotations.tsv"),
        genes: load_tsv(dir, "genes.tsv"),
    };
    info!(
        clinical_annotations = data.clinical_annotations.len(),
        genes = data.genes.len(),
        "loaded PharmGKB dumps"
    );
    data
}

fn load_tsv<T: serde::de::DeserializeOwned>(dir: &Path, name: &str) -> Vec<T> {
    let path = dir.join(name);
    if !path.is_file() {
        debug!(file = name, "PharmGKB file not present");
        return Vec::new();
    }
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(err) => {
            error!(file = name, %err, "failed to open PharmGKB file, skipping");
            return Vec::new();
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) => error!(file = name, %err, "malformed PharmGKB row, skipping"),
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_clinical_annotations_with_renamed_columns() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut file = File::create(dir.path().join("clinical_annotations.tsv")).unwrap();
        writeln!(
            file,
            "Clinical Annotation ID\tGene\tDrug(s)\tLevel of Evidence\tPhenotype(s)\tLatest History Date (YYYY-MM-DD)"
        )
        .unwrap();
        writeln!(
            file,
            "981755803\tCYP2C9\twarfarin\t1A\tDosage\t2021-03-24"
        )
        .unwrap();

        let data = load(dir.path());
        assert_eq!(data.clinical_annotations.len(), 1);
        let row = &data.clinical_annotations[0];
        assert_eq!(row.gene, "CYP2C9");
        assert_eq!(row.level_of_evidence.as_deref(), Some("1A"));
        assert_eq!(row.last_updated.as_deref(), Some("2021-03-24"));
    }

    #[test]
    fn gene_rows_expose_alternate_names() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut file = File::create(dir.path().join("genes.tsv")).unwrap();
        writeln!(file, "Symbol\tAlternate Names").unwrap();
        writeln!(file, "CYP2D6\tCPD6, P450-DB1").unwrap();

        let data = load(dir.path());
        assert_eq!(data.genes.len(), 1);
        assert_eq!(
            data.genes[0].alternate_names.as_deref(),
            Some("CPD6, P450-DB1")
        );
    }
}
