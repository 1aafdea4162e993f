//! Batch decomposition and parallel execution.
//!
//! Large inputs are decomposed into fixed-size row ranges, each range is
//! materialized as a self-contained slice and processed by an independent
//! worker, and the per-batch result sets are folded back into one
//! deduplicated interaction list. Workers never share mutable state; the
//! only cross-batch step is the final merge.

mod extract;
mod merge;
mod planner;
mod pool;
mod worker;

pub use extract::{extract, BatchSlice, ExtractionError};
pub use merge::merge;
pub use planner::{count_data_rows, plan, PlanError, PlanMode};
pub use pool::{PartialResultHandle, PoolError, WorkerPool};
pub use worker::{
    load_partial, load_partial_or_empty, save_partial, BatchWorker, MergeParseError, TaskError,
};
