use std::collections::BTreeMap;
use std::fmt;

/// A single genetic variant parsed from one data row.
///
/// Immutable once parsed; the batch pipeline only ever reads these.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    /// Chromosome/contig name.
    pub chrom: String,
    /// 1-based genomic coordinate.
    pub pos: u64,
    /// Variant identifier; `chrom:pos` when the input carries `.`.
    pub id: String,
    /// Reference allele.
    pub ref_allele: String,
    /// Alternate allele.
    pub alt_allele: String,
    /// Quality score; `.` parses to 0.0.
    pub qual: f64,
    /// Filter status column.
    pub filter: String,
    /// Open key→value INFO map. Flag entries map to `"true"`.
    pub info: BTreeMap<String, String>,
    /// Human-readable genotype (e.g. `C/T`) when a sample column is present.
    pub genotype: Option<String>,
}

impl fmt::Display for VariantRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}>{} ({})",
            self.chrom, self.pos, self.ref_allele, self.alt_allele, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_position_and_alleles() {
        let record = VariantRecord {
            chrom: "chr10".into(),
            pos: 96_702_047,
            id: "rs1799853".into(),
            ref_allele: "C".into(),
            alt_allele: "T".into(),
            qual: 99.0,
            filter: "PASS".into(),
            info: BTreeMap::new(),
            genotype: Some("C/T".into()),
        };
        assert_eq!(record.to_string(), "chr10:96702047 C>T (rs1799853)");
    }
}
