#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use pgxpipe::KnowledgeSources;

/// Write a synthetic pre-annotated variant file with `rows` data rows.
///
/// Rows alternate between CYP2C9 and CYP2C19 so both genes appear in every
/// non-trivial batch.
pub fn write_vcf(dir: &Path, name: &str, rows: u64) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).expect("create vcf fixture");
    writeln!(file, "##fileformat=VCFv4.2").unwrap();
    writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
    for i in 0..rows {
        let gene = if i % 2 == 0 { "CYP2C9" } else { "CYP2C19" };
        writeln!(
            file,
            "10\t{}\trs{}\tC\tT\t50\tPASS\tGENE={}",
            96_702_047 + i,
            i,
            gene
        )
        .unwrap();
    }
    path
}

/// Write CPIC and PharmGKB fixture dumps under `dir` and return their
/// locations.
///
/// The fixture records warfarin against CYP2C9 in both sources (CPIC level
/// B with a guideline recommendation, PharmGKB level 1A) and clopidogrel
/// against CYP2C19 in CPIC only (level A).
pub fn write_knowledge(dir: &Path) -> KnowledgeSources {
    let cpic = dir.join("cpic");
    std::fs::create_dir_all(&cpic).expect("create cpic fixture dir");
    std::fs::write(
        cpic.join("cpic_drugs.json"),
        r#"[
            {"name": "warfarin", "drugid": "RxNorm:11289", "rxnormid": "11289"},
            {"name": "clopidogrel", "drugid": "RxNorm:32968", "rxnormid": "32968"}
        ]"#,
    )
    .unwrap();
    std::fs::write(
        cpic.join("cpic_genes.json"),
        r#"[
            {"symbol": "CYP2C9", "name": "cytochrome P450 family 2 subfamily C member 9"},
            {"symbol": "CYP2C19", "name": "cytochrome P450 family 2 subfamily C member 19"}
        ]"#,
    )
    .unwrap();
    std::fs::write(
        cpic.join("cpic_pairs.json"),
        r#"[
            {"genesymbol": "CYP2C9", "drugid": "RxNorm:11289", "cpiclevel": "B",
             "guidelineid": "100419", "citations": ["21900891"]},
            {"genesymbol": "CYP2C19", "drugid": "RxNorm:32968", "cpiclevel": "A",
             "citations": ["23698643"]}
        ]"#,
    )
    .unwrap();
    std::fs::write(
        cpic.join("cpic_recommendations.json"),
        r#"[
            {"guidelineid": "100419", "phenotype": "Poor metabolizer",
             "recommendation": "Reduce starting dose."}
        ]"#,
    )
    .unwrap();

    let pharmgkb = dir.join("pharmgkb");
    std::fs::create_dir_all(&pharmgkb).expect("create pharmgkb fixture dir");
    let mut annotations = File::create(pharmgkb.join("clinical_annotations.tsv")).unwrap();
    writeln!(
        annotations,
        "Clinical Annotation ID\tGene\tDrug(s)\tLevel of Evidence\tPhenotype(s)\tLatest History Date (YYYY-MM-DD)"
    )
    .unwrap();
    writeln!(
        annotations,
        "981755803\tCYP2C9\twarfarin\t1A\tDosage\t2021-03-24"
    )
    .unwrap();
    let mut genes = File::create(pharmgkb.join("genes.tsv")).unwrap();
    writeln!(genes, "Symbol\tAlternate Names").unwrap();
    writeln!(genes, "CYP2C9\tCPC9, P450 IIC9").unwrap();

    KnowledgeSources {
        cpic_dir: Some(cpic),
        pharmgkb_dir: Some(pharmgkb),
    }
}
