use std::collections::HashMap;

use tracing::{debug, info};

use crate::knowledge::{evidence_rank, DrugGeneInteraction};

/// Merge key: one entry per case-insensitive (drug, gene) pair.
fn merge_key(interaction: &DrugGeneInteraction) -> String {
    format!(
        "{}_{}",
        interaction.drug.to_lowercase(),
        interaction.gene.to_lowercase()
    )
}

/// Fold the per-batch result sets into one deduplicated interaction list.
///
/// Interactions sharing a (drug, gene) pair collapse into a single entry
/// whose fields combine both sides; entries keep first-seen order, so the
/// merged output is deterministic for a fixed batch ordering. Merging is
/// idempotent: feeding the output back through changes nothing.
pub fn merge(partials: Vec<Vec<DrugGeneInteraction>>) -> Vec<DrugGeneInteraction> {
    let mut merged: Vec<DrugGeneInteraction> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut seen = 0usize;

    for partial in partials {
        for interaction in partial {
            seen += 1;
            let key = merge_key(&interaction);
            match slots.get(&key) {
                Some(&slot) => combine(&mut merged[slot], interaction),
                None => {
                    slots.insert(key, merged.len());
                    merged.push(interaction);
                }
            }
        }
    }

    debug!(seen, merged = merged.len(), "combined partial result sets");
    info!(interactions = merged.len(), "merge complete");
    merged
}

/// Fold `incoming` into the entry already held for its (drug, gene) pair.
fn combine(existing: &mut DrugGeneInteraction, incoming: DrugGeneInteraction) {
    // Rank before any field moves over, so the comparison sees both entries
    // as they arrived.
    let adopt_evidence = match (&existing.evidence_level, &incoming.evidence_level) {
        (None, Some(_)) => true,
        (Some(_), Some(_)) => evidence_rank(&incoming) < evidence_rank(existing),
        _ => false,
    };

    for source in incoming.source.split(", ") {
        if !existing.source.split(", ").any(|s| s == source) {
            if !existing.source.is_empty() {
                existing.source.push_str(", ");
            }
            existing.source.push_str(source);
        }
    }

    if adopt_evidence {
        existing.evidence_level = incoming.evidence_level;
    }
    if existing.phenotype.is_none() {
        existing.phenotype = incoming.phenotype;
    }

    // Identical recommendations recur whenever the same fact resolves in
    // more than one batch; only genuinely distinct text is appended.
    if existing.recommendation.is_empty() {
        existing.recommendation = incoming.recommendation;
    } else if !incoming.recommendation.is_empty()
        && incoming.recommendation != existing.recommendation
    {
        existing.recommendation.push_str("\n\n");
        existing.recommendation.push_str(&incoming.recommendation);
    }

    for reference in incoming.literature_refs {
        if !existing.literature_refs.contains(&reference) {
            existing.literature_refs.push(reference);
        }
    }
    existing.literature_refs.sort();

    if existing.cpic_level.is_none() {
        existing.cpic_level = incoming.cpic_level;
    }
    if existing.pharmgkb_level.is_none() {
        existing.pharmgkb_level = incoming.pharmgkb_level;
    }
    if existing.pgx_testing.is_none() {
        existing.pgx_testing = incoming.pgx_testing;
    }
    if existing.guideline_id.is_none() {
        existing.guideline_id = incoming.guideline_id;
    }
    if existing.clinical_annotation_id.is_none() {
        existing.clinical_annotation_id = incoming.clinical_annotation_id;
    }
    if existing.last_updated.is_none() {
        existing.last_updated = incoming.last_updated;
    }
    if existing.guideline_url.is_none() {
        existing.guideline_url = incoming.guideline_url;
    }
}
