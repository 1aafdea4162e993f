use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::worker::TaskError;

/// Outcome handle for one batch task, in submission order.
///
/// An empty handle records a batch that failed, timed out, or was skipped;
/// downstream merging treats it as an empty contribution.
#[derive(Debug, Clone)]
pub struct PartialResultHandle {
    /// Batch this handle belongs to.
    pub batch_index: u64,
    /// Persisted unit, when the task completed.
    pub output: Option<PathBuf>,
}

impl PartialResultHandle {
    /// Handle for a batch that produced nothing.
    pub fn empty(batch_index: u64) -> Self {
        Self {
            batch_index,
            output: None,
        }
    }

    /// True when the batch produced no persisted unit.
    pub fn is_empty(&self) -> bool {
        self.output.is_none()
    }
}

/// Errors raised while setting up the pool itself.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The thread pool could not be constructed.
    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// Dispatches batch tasks across bounded parallelism.
///
/// At most `threads` tasks execute simultaneously, and the returned handles
/// are ordered by batch index regardless of completion order — a stated
/// contract, so downstream merging is deterministic and independent of
/// scheduling. A sequential pool (`threads = 1`) produces the same result
/// set as any wider pool on the same input.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    threads: usize,
    task_deadline: Option<Duration>,
    cancel: Option<Arc<AtomicBool>>,
}

impl WorkerPool {
    /// Pool with `threads` workers; `0` selects the available parallelism.
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            threads
        };
        Self {
            threads,
            task_deadline: None,
            cancel: None,
        }
    }

    /// Set a per-task deadline, measured from the moment the task starts.
    pub fn with_task_deadline(mut self, deadline: Duration) -> Self {
        self.task_deadline = Some(deadline);
        self
    }

    /// Install a cancellation flag. Tasks that have not started when the
    /// flag is raised are skipped; a running task always completes.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `task` for every batch index in `0..batch_count`.
    ///
    /// Failure isolation: an error inside one task is caught and logged and
    /// yields an empty handle for that index; sibling batches keep running.
    pub fn run_all<F>(
        &self,
        batch_count: u64,
        task: F,
    ) -> Result<Vec<PartialResultHandle>, PoolError>
    where
        F: Fn(u64, Option<Instant>) -> Result<PathBuf, TaskError> + Sync,
    {
        info!(batch_count, threads = self.threads, "dispatching batch tasks");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()?;

        // An indexed parallel map collects in submission order, whatever
        // order the tasks actually finish in.
        let handles = pool.install(|| {
            (0..batch_count)
                .into_par_iter()
                .map(|batch_index| {
                    if let Some(cancel) = &self.cancel {
                        if cancel.load(Ordering::Relaxed) {
                            debug!(batch_index, "skipping cancelled batch");
                            return PartialResultHandle::empty(batch_index);
                        }
                    }
                    let deadline = self.task_deadline.map(|d| Instant::now() + d);
                    match task(batch_index, deadline) {
                        Ok(output) => PartialResultHandle {
                            batch_index,
                            output: Some(output),
                        },
                        Err(err) => {
                            warn!(batch_index, %err, "batch task failed, recording empty result");
                            PartialResultHandle::empty(batch_index)
                        }
                    }
                })
                .collect()
        });
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::batch::extract::ExtractionError;

    fn failing(batch_index: u64) -> TaskError {
        TaskError::Extraction(ExtractionError::Io {
            batch_index,
            source: std::io::Error::other("boom"),
        })
    }

    #[test]
    fn handles_come_back_in_submission_order() {
        let pool = WorkerPool::new(4);
        let handles = pool
            .run_all(16, |batch_index, _| {
                // Early batches sleep longest, so completion order inverts
                // submission order.
                std::thread::sleep(Duration::from_millis(16 - batch_index));
                Ok(PathBuf::from(format!("batch_{batch_index}.json")))
            })
            .unwrap();

        let indices: Vec<u64> = handles.iter().map(|h| h.batch_index).collect();
        assert_eq!(indices, (0..16).collect::<Vec<u64>>());
        assert!(handles.iter().all(|h| !h.is_empty()));
    }

    #[test]
    fn one_failing_task_does_not_abort_siblings() {
        let pool = WorkerPool::new(2);
        let handles = pool
            .run_all(5, |batch_index, _| {
                if batch_index == 2 {
                    Err(failing(batch_index))
                } else {
                    Ok(PathBuf::from(format!("batch_{batch_index}.json")))
                }
            })
            .unwrap();

        assert!(handles[2].is_empty());
        let completed = handles.iter().filter(|h| !h.is_empty()).count();
        assert_eq!(completed, 4);
    }

    #[test]
    fn bounded_parallelism_is_respected() {
        let pool = WorkerPool::new(2);
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        pool.run_all(8, |batch_index, _| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(PathBuf::from(format!("batch_{batch_index}.json")))
        })
        .unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn raised_cancel_flag_skips_pending_tasks() {
        let cancel = Arc::new(AtomicBool::new(true));
        let pool = WorkerPool::new(2).with_cancel_flag(Arc::clone(&cancel));
        let handles = pool
            .run_all(4, |batch_index, _| {
                Ok(PathBuf::from(format!("batch_{batch_index}.json")))
            })
            .unwrap();
        assert!(handles.iter().all(PartialResultHandle::is_empty));
    }

    #[test]
    fn deadline_is_handed_to_tasks() {
        let pool = WorkerPool::new(1).with_task_deadline(Duration::from_secs(60));
        let handles = pool
            .run_all(1, |batch_index, deadline| {
                assert!(deadline.is_some());
                Ok(PathBuf::from(format!("batch_{batch_index}.json")))
            })
            .unwrap();
        assert_eq!(handles.len(), 1);
    }

    #[test]
    fn zero_threads_selects_available_parallelism() {
        assert!(WorkerPool::new(0).threads() >= 1);
    }
}
