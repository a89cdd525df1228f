//! Interval scheduler for daemon mode.
//!
//! Reruns the whole pipeline on a fixed interval. Nothing is carried between
//! runs; a run that records errors is logged and the scheduler waits for the
//! next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};

use docrecon_core::pipeline::{Pipeline, PipelineState};

/// Tracks aggregate statistics across pipeline runs.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub total_cycles: AtomicU64,
    pub total_conflicts: AtomicU64,
    pub total_errors: AtomicU64,
    pub consecutive_errors: AtomicU64,
}

/// The daemon scheduler.
///
/// The first run starts immediately. If a run overruns the interval, missed
/// ticks are skipped rather than queued.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    stats: Arc<SchedulerStats>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        self.stats.clone()
    }

    /// Main scheduler loop. Returns once `shutdown` is notified; a run in
    /// progress is finished first.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.notified() => {
                    info!("scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Run one full pipeline and fold its outcome into the statistics.
    pub async fn run_cycle(&self) -> PipelineState {
        let cycle = self.stats.total_cycles.fetch_add(1, Ordering::SeqCst) + 1;
        info!(cycle, "starting pipeline cycle");

        let state = self.pipeline.run().await;

        self.stats
            .total_conflicts
            .fetch_add(state.conflicts.len() as u64, Ordering::SeqCst);

        if state.errors.is_empty() {
            self.stats.consecutive_errors.store(0, Ordering::SeqCst);
            info!(
                cycle,
                documents = state.documents.len(),
                conflicts = state.conflicts.len(),
                "pipeline cycle completed successfully"
            );
        } else {
            let errors = self.stats.total_errors.fetch_add(1, Ordering::SeqCst) + 1;
            let consecutive = self.stats.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
            error!(
                cycle,
                stage_errors = state.errors.len(),
                total_errors = errors,
                consecutive_errors = consecutive,
                "pipeline cycle completed with errors"
            );
        }

        if let Some(ref report) = state.report {
            println!("{report}");
        }
        state
    }
}
