//! Optional AI-backed fallback for drugs the knowledge bases do not cover.
//!
//! The pipeline only depends on this capability interface; no network
//! implementation ships with the crate. Implementations must tag their
//! output with a distinguishable `source` label and the fixed
//! [`AI_EVIDENCE_LEVEL`](crate::knowledge::AI_EVIDENCE_LEVEL) evidence level.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::annotate::AnnotatedVariant;
use crate::knowledge::DrugGeneInteraction;

/// Errors raised by an AI fallback backend. Callers swallow and log these;
/// they never fail a batch.
#[derive(Debug, Error)]
pub enum AiFallbackError {
    /// The backend ran but failed.
    #[error("ai fallback failed: {0}")]
    Backend(String),
}

/// Best-effort interaction suggestion when database resolution found nothing.
pub trait AiFallback: Send + Sync {
    /// Backend name, for logs and the emitted `source` label.
    fn name(&self) -> &'static str;

    /// Suggest zero or more interactions for `drug` given the observed gene
    /// set and the variants behind it.
    fn suggest(
        &self,
        drug: &str,
        genes: &BTreeSet<String>,
        variants: &[AnnotatedVariant],
    ) -> Result<Vec<DrugGeneInteraction>, AiFallbackError>;
}
