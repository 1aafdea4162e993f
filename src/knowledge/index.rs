use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::cpic::{self, CpicData};
use super::interaction::{DrugGeneInteraction, FactSource, InteractionFact};
use super::pharmgkb::{self, PharmgkbData};

/// Locations of the knowledge-base dumps.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeSources {
    /// Directory holding the CPIC JSON dumps.
    pub cpic_dir: Option<PathBuf>,
    /// Directory holding the PharmGKB TSV dumps.
    pub pharmgkb_dir: Option<PathBuf>,
}

impl KnowledgeSources {
    /// Conventional layout: `<data_dir>/cpic` and `<data_dir>/pharmgkb`.
    pub fn from_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            cpic_dir: Some(data_dir.join("cpic")),
            pharmgkb_dir: Some(data_dir.join("pharmgkb")),
        }
    }
}

/// Errors raised while constructing the lookup index.
#[derive(Debug, Error)]
pub enum LookupBuildError {
    /// Every configured source was missing, unreadable, or empty.
    #[error("no usable knowledge-base source produced any drug-gene fact")]
    NoUsableSources,
}

/// Brand/trade names mapped to generic drug names, carried in-code because
/// the public dumps do not ship them.
const BRAND_GENERIC: &[(&str, &[&str])] = &[
    ("omeprazole", &["prilosec", "losec"]),
    ("tamoxifen", &["nolvadex"]),
    ("warfarin", &["coumadin", "jantoven"]),
    ("clopidogrel", &["plavix"]),
    ("atorvastatin", &["lipitor"]),
    ("simvastatin", &["zocor"]),
    ("metoprolol", &["lopressor", "toprol"]),
    ("sertraline", &["zoloft"]),
    ("fluoxetine", &["prozac"]),
    ("paroxetine", &["paxil"]),
    ("escitalopram", &["lexapro"]),
    ("venlafaxine", &["effexor"]),
    ("duloxetine", &["cymbalta"]),
    ("amitriptyline", &["elavil"]),
    ("codeine", &["tylenol #3", "tylenol with codeine"]),
    ("tramadol", &["ultram"]),
    ("oxycodone", &["oxycontin", "percocet"]),
    ("hydrocodone", &["vicodin", "norco"]),
    ("morphine", &["ms contin"]),
    ("fentanyl", &["duragesic"]),
    ("carbamazepine", &["tegretol"]),
    ("phenytoin", &["dilantin"]),
    ("valproic acid", &["depakote"]),
    ("lamotrigine", &["lamictal"]),
    ("paracetamol", &["acetaminophen", "tylenol"]),
    ("metformin", &["glucophage", "fortamet"]),
    ("sildenafil", &["viagra", "revatio"]),
];

/// Read-only lookup structures built once from the knowledge-base dumps.
///
/// Safe to share by reference across concurrent batch workers; nothing
/// mutates it after [`LookupIndex::build`] returns.
#[derive(Debug)]
pub struct LookupIndex {
    /// Any drug synonym (lowercased) → canonical lowercase name.
    drug_aliases: HashMap<String, String>,
    /// Any gene alias (uppercased) → canonical uppercase symbol.
    gene_aliases: HashMap<String, String>,
    /// (canonical drug, canonical gene) → evidence facts, in load order.
    facts: BTreeMap<(String, String), Vec<InteractionFact>>,
    /// (canonical gene, canonical drug) → the same facts, for gene-first
    /// queries.
    facts_by_gene: BTreeMap<(String, String), Vec<InteractionFact>>,
}

impl LookupIndex {
    /// Load every configured source once and build the lookup structures.
    ///
    /// A malformed or missing source is skipped (its loader logs the reason);
    /// construction fails only when no source contributed a single fact.
    pub fn build(sources: &KnowledgeSources) -> Result<Self, LookupBuildError> {
        let cpic = sources
            .cpic_dir
            .as_deref()
            .map(cpic::load)
            .unwrap_or_default();
        let pharmgkb = sources
            .pharmgkb_dir
            .as_deref()
            .map(pharmgkb::load)
            .unwrap_or_default();

        let mut index = Self {
            drug_aliases: HashMap::new(),
            gene_aliases: HashMap::new(),
            facts: BTreeMap::new(),
            facts_by_gene: BTreeMap::new(),
        };

        index.register_builtin_brands();
        index.register_cpic(&cpic);
        index.register_pharmgkb(&pharmgkb);

        if index.facts.is_empty() {
            warn!("knowledge-base construction produced zero drug-gene facts");
            return Err(LookupBuildError::NoUsableSources);
        }

        info!(
            facts = index.fact_count(),
            pairs = index.facts.len(),
            drug_aliases = index.drug_aliases.len(),
            gene_aliases = index.gene_aliases.len(),
            "built lookup index"
        );
        Ok(index)
    }

    fn register_builtin_brands(&mut self) {
        for (generic, brands) in BRAND_GENERIC {
            self.drug_aliases
                .insert((*generic).to_string(), (*generic).to_string());
            for brand in *brands {
                self.drug_aliases
                    .insert((*brand).to_string(), (*generic).to_string());
            }
        }
    }

    fn register_cpic(&mut self, cpic: &CpicData) {
        // Drug synonyms: generic name plus registry identifiers.
        let mut drug_by_id: HashMap<&str, String> = HashMap::new();
        for drug in &cpic.drugs {
            let canonical = drug.name.trim().to_lowercase();
            if canonical.is_empty() {
                continue;
            }
            self.drug_aliases.insert(canonical.clone(), canonical.clone());
            if let Some(rxnorm) = &drug.rxnormid {
                self.drug_aliases
                    .insert(format!("rxnorm:{}", rxnorm.to_lowercase()), canonical.clone());
            }
            if let Some(drugbank) = &drug.drugbankid {
                self.drug_aliases.insert(
                    format!("drugbank:{}", drugbank.to_lowercase()),
                    canonical.clone(),
                );
            }
            for atc in &drug.atcid {
                self.drug_aliases
                    .insert(format!("atc:{}", atc.to_lowercase()), canonical.clone());
            }
            if let Some(id) = &drug.drugid {
                drug_by_id.insert(id.as_str(), canonical);
            }
        }

        // Gene aliases: symbol plus long name.
        for gene in &cpic.genes {
            let symbol = gene.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            self.gene_aliases.insert(symbol.clone(), symbol.clone());
            if let Some(name) = &gene.name {
                self.gene_aliases
                    .insert(name.trim().to_uppercase(), symbol.clone());
            }
        }

        // Guideline text, joined into pair facts below.
        let mut recommendations: HashMap<&str, (&Option<String>, &Option<String>)> =
            HashMap::new();
        for rec in &cpic.recommendations {
            recommendations.insert(
                rec.guidelineid.as_str(),
                (&rec.phenotype, &rec.recommendation),
            );
        }

        for pair in &cpic.pairs {
            let gene = pair.genesymbol.trim().to_uppercase();
            if gene.is_empty() {
                continue;
            }
            // An unknown drug id still yields a fact keyed by the id itself,
            // matching how the dumps are joined upstream.
            let drug = drug_by_id
                .get(pair.drugid.as_str())
                .cloned()
                .unwrap_or_else(|| pair.drugid.to_lowercase());

            let (phenotype, recommendation) = pair
                .guidelineid
                .as_deref()
                .and_then(|id| recommendations.get(id))
                .map(|(phenotype, recommendation)| ((*phenotype).clone(), (*recommendation).clone()))
                .unwrap_or((None, None));

            let fact = InteractionFact {
                source: FactSource::Cpic,
                evidence_level: pair.cpiclevel.clone(),
                phenotype,
                recommendation,
                cpic_level: pair.cpiclevel.clone(),
                pharmgkb_level: pair.pgkbcalevel.clone(),
                pgx_testing: pair.pgxtesting.clone(),
                guideline_id: pair.guidelineid.clone(),
                clinical_annotation_id: None,
                last_updated: None,
                literature_refs: pair.citations.clone(),
            };
            self.insert_fact(drug, gene, fact);
        }
    }

    fn register_pharmgkb(&mut self, pharmgkb: &PharmgkbData) {
        for gene in &pharmgkb.genes {
            let symbol = gene.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            self.gene_aliases.insert(symbol.clone(), symbol.clone());
            if let Some(alternates) = &gene.alternate_names {
                for alternate in alternates.split(',') {
                    let alternate = alternate.trim().to_uppercase();
                    if !alternate.is_empty() {
                        self.gene_aliases.insert(alternate, symbol.clone());
                    }
                }
            }
        }

        for annotation in &pharmgkb.clinical_annotations {
            let gene = annotation.gene.trim().to_uppercase();
            if gene.is_empty() {
                continue;
            }
            // One annotation row may name several drugs.
            for drug in annotation.drugs.to_lowercase().split(',') {
                let drug = drug.trim().to_string();
                if drug.is_empty() {
                    continue;
                }
                let fact = InteractionFact {
                    source: FactSource::Pharmgkb,
                    evidence_level: annotation.level_of_evidence.clone(),
                    phenotype: annotation.phenotypes.clone(),
                    recommendation: None,
                    cpic_level: None,
                    pharmgkb_level: annotation.level_of_evidence.clone(),
                    pgx_testing: None,
                    guideline_id: None,
                    clinical_annotation_id: annotation.clinical_annotation_id.clone(),
                    last_updated: annotation.last_updated.clone(),
                    literature_refs: Vec::new(),
                };
                self.insert_fact(drug, gene.clone(), fact);
            }
        }
    }

    fn insert_fact(&mut self, drug: String, gene: String, fact: InteractionFact) {
        self.facts_by_gene
            .entry((gene.clone(), drug.clone()))
            .or_default()
            .push(fact.clone());
        self.facts.entry((drug, gene)).or_default().push(fact);
    }

    /// Normalize a drug name to its canonical lowercase form.
    ///
    /// Total and idempotent: unknown names come back trimmed and lowercased.
    pub fn normalize_drug(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase();
        self.drug_aliases
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Normalize a gene symbol to its canonical uppercase form.
    ///
    /// Total and idempotent: unknown symbols come back trimmed and uppercased.
    pub fn normalize_gene(&self, symbol: &str) -> String {
        let normalized = symbol.trim().to_uppercase();
        self.gene_aliases
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Evidence facts for a (drug, gene) pair. Inputs are normalized here.
    pub fn facts_for_pair(&self, drug: &str, gene: &str) -> &[InteractionFact] {
        let key = (self.normalize_drug(drug), self.normalize_gene(gene));
        self.facts.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Gene-first variant of [`Self::facts_for_pair`].
    pub fn facts_for_gene(&self, gene: &str, drug: &str) -> &[InteractionFact] {
        let key = (self.normalize_gene(gene), self.normalize_drug(drug));
        self.facts_by_gene.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve a drug against the gene set observed in a batch.
    ///
    /// Keyed lookups first; when none hit, a broader deterministic scan
    /// returns every fact recorded for the drug regardless of gene overlap.
    /// Always returns a list, never an error.
    pub fn resolve(&self, drug: &str, genes: &BTreeSet<String>) -> Vec<DrugGeneInteraction> {
        let drug = self.normalize_drug(drug);

        let mut interactions = Vec::new();
        for gene in genes {
            let gene = self.normalize_gene(gene);
            if let Some(facts) = self.facts.get(&(drug.clone(), gene.clone())) {
                for fact in facts {
                    interactions.push(self.interaction_from_fact(&drug, &gene, fact));
                }
            }
        }

        if interactions.is_empty() {
            debug!(%drug, "no keyed match, falling back to drug-wide scan");
            interactions = self.all_interactions_for_drug(&drug);
        }

        interactions
    }

    /// Every interaction recorded for a drug, across all genes.
    pub fn all_interactions_for_drug(&self, drug: &str) -> Vec<DrugGeneInteraction> {
        let drug = self.normalize_drug(drug);
        self.facts
            .iter()
            .filter(|((fact_drug, _), _)| *fact_drug == drug)
            .flat_map(|((_, gene), facts)| {
                facts
                    .iter()
                    .map(|fact| self.interaction_from_fact(&drug, gene, fact))
            })
            .collect()
    }

    fn interaction_from_fact(
        &self,
        drug: &str,
        gene: &str,
        fact: &InteractionFact,
    ) -> DrugGeneInteraction {
        let recommendation = match &fact.recommendation {
            Some(text) => text.clone(),
            None => match fact.source {
                FactSource::Cpic => "No specific recommendation available".to_string(),
                FactSource::Pharmgkb => {
                    "Clinical annotation available. See PharmGKB for details.".to_string()
                }
            },
        };
        let guideline_url = match fact.source {
            FactSource::Cpic => Some(format!(
                "https://cpicpgx.org/guidelines/guideline-for-{}-and-{}/",
                drug,
                gene.to_lowercase()
            )),
            FactSource::Pharmgkb => None,
        };

        DrugGeneInteraction {
            drug: drug.to_string(),
            gene: gene.to_string(),
            phenotype: fact.phenotype.clone(),
            source: fact.source.label().to_string(),
            evidence_level: fact.evidence_level.clone(),
            recommendation,
            literature_refs: fact.literature_refs.clone(),
            cpic_level: fact.cpic_level.clone(),
            pharmgkb_level: fact.pharmgkb_level.clone(),
            pgx_testing: fact.pgx_testing.clone(),
            guideline_id: fact.guideline_id.clone(),
            clinical_annotation_id: fact.clinical_annotation_id.clone(),
            last_updated: fact.last_updated.clone(),
            guideline_url,
        }
    }

    /// Total number of facts across all pairs.
    pub fn fact_count(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }
}
