//! Line-oriented variant-file input.
//!
//! The pipeline treats variant files as a header block (`#`-prefixed lines)
//! followed by tab-delimited data rows. This module owns the record type and
//! the tolerant parser; batch slicing lives in [`crate::batch`].

mod parser;
mod record;

pub use parser::{VcfError, VcfParser};
pub use record::VariantRecord;
