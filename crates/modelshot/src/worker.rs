//! Background regeneration.
//!
//! Mutations hand a [`RegenerationJob`] to a [`RegenerationQueue`] and return
//! without waiting for the images. [`RegenerationWorker`] runs the jobs on a
//! single named thread, one after the other.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use modelshot_core::{
    identifier::{ModelId, Slug},
    record::ContentModel,
};

use crate::pipeline::{ScreenshotOptions, ScreenshotPipeline};

/// One requested pipeline run.
///
/// Only the model is named; the pipeline reads its current state when the
/// job runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RegenerationJob {
    pub model_id: ModelId,
    /// For logs only.
    pub slug: Slug,
    pub options: ScreenshotOptions,
}

impl RegenerationJob {
    pub fn new(model: &ContentModel, options: ScreenshotOptions) -> Self {
        Self {
            model_id: model.id,
            slug: model.slug.clone(),
            options,
        }
    }
}

/// Accepts regeneration jobs without running them on the caller's thread.
pub trait RegenerationQueue: Send + Sync {
    fn dispatch(&self, job: RegenerationJob);
}

/// Job counters of a worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    dispatched: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl WorkerStats {
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Jobs whose model was deleted before they ran.
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }
}

enum WorkerCommand {
    Run(Box<RegenerationJob>),
    Shutdown,
}

/// Runs regeneration jobs sequentially on a background thread.
pub struct RegenerationWorker {
    tx: Sender<WorkerCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<WorkerStats>,
}

impl RegenerationWorker {
    pub fn start(pipeline: Arc<ScreenshotPipeline>) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam::channel::unbounded();
        let stats = Arc::new(WorkerStats::default());
        let loop_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("modelshot-regenerate".to_string())
            .spawn(move || run_loop(&pipeline, &rx, &loop_stats))?;
        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
            stats,
        })
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Lets the worker finish every job queued so far, then stops it and
    /// waits for the thread. Later calls are no-ops.
    pub fn shutdown(&self) {
        let Ok(mut handle) = self.handle.lock() else {
            warn!("Regeneration worker handle poisoned");
            return;
        };
        let Some(handle) = handle.take() else {
            return;
        };
        let _ = self.tx.send(WorkerCommand::Shutdown);
        if handle.join().is_err() {
            error!("Regeneration worker panicked");
        }
        info!(
            dispatched = self.stats.dispatched(),
            completed = self.stats.completed(),
            failed = self.stats.failed(),
            skipped = self.stats.skipped();
            "Regeneration worker stopped"
        );
    }
}

impl RegenerationQueue for RegenerationWorker {
    fn dispatch(&self, job: RegenerationJob) {
        let slug = job.slug.clone();
        match self.tx.send(WorkerCommand::Run(Box::new(job))) {
            Ok(()) => {
                self.stats.dispatched.fetch_add(1, Ordering::SeqCst);
                debug!(slug:% = slug; "Regeneration queued");
            }
            Err(_) => warn!(slug:% = slug; "Regeneration worker is stopped, job dropped"),
        }
    }
}

impl Drop for RegenerationWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(pipeline: &ScreenshotPipeline, rx: &Receiver<WorkerCommand>, stats: &WorkerStats) {
    while let Ok(command) = rx.recv() {
        match command {
            WorkerCommand::Run(job) => {
                let slug = job.slug.as_str();
                info!(slug; "Regeneration started");
                let report = pipeline.run(job.model_id, &job.options);
                if report.is_skipped() {
                    stats.skipped.fetch_add(1, Ordering::SeqCst);
                } else if report.is_success() {
                    stats.completed.fetch_add(1, Ordering::SeqCst);
                    info!(slug; "Regeneration completed");
                } else {
                    stats.failed.fetch_add(1, Ordering::SeqCst);
                    warn!(slug, stage:? = report.failed_stage(); "Regeneration failed");
                }
            }
            WorkerCommand::Shutdown => break,
        }
    }
}
