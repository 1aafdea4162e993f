//! Multi-source pharmacogenomic knowledge base.
//!
//! Loads CPIC and PharmGKB dumps once, builds normalized lookup structures
//! (drug synonyms, gene aliases, keyed evidence facts), and resolves
//! (drug, gene set) queries into evidence-ranked interactions. The built
//! [`LookupIndex`] is immutable and safe to share across workers.

mod ai;
mod cpic;
mod index;
mod interaction;
mod pharmgkb;

pub use ai::{AiFallback, AiFallbackError};
pub use index::{KnowledgeSources, LookupBuildError, LookupIndex};
pub use interaction::{
    dedup_and_sort, evidence_rank, sort_by_evidence, DrugGeneInteraction, FactSource,
    InteractionFact, AI_EVIDENCE_LEVEL,
};
