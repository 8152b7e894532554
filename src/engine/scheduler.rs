// src/engine/scheduler.rs

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::discover::Target;
use crate::engine::state::{RunReport, RunSnapshot, StopPolicy, TargetState, TargetStatus};
use crate::exec::build::{BuildContext, BuildResult, run_build};

/// Events sent into the scheduler loop.
///
/// Workers send `BuildFinished`; the Ctrl-C listener sends
/// `ShutdownRequested`.
#[derive(Debug)]
pub enum RunEvent {
    BuildFinished { index: usize, result: BuildResult },
    ShutdownRequested,
}

/// Fixed-pool scheduler over an immutable, pre-sorted target list.
///
/// Keeps exactly `worker_count` builds in flight: the first workers are
/// seeded up front, and every completion refills the freed slot from the
/// FIFO remainder of the queue, unless a failure under [`StopPolicy::FailFast`]
/// has set the stopping flag. Stopping is non-preemptive: in-flight builds
/// always finish, only future dispatch is suppressed.
pub struct Scheduler {
    targets: Arc<Vec<Target>>,
    statuses: Vec<TargetStatus>,
    policy: StopPolicy,
    worker_count: usize,
    ctx: Arc<BuildContext>,

    events_tx: mpsc::Sender<RunEvent>,
    events_rx: mpsc::Receiver<RunEvent>,
    snapshot_tx: watch::Sender<RunSnapshot>,

    /// Head of the FIFO queue: everything before this index is dispatched
    /// or skipped, everything from it on is still queued.
    next_index: usize,
    in_flight: usize,
    stopping: bool,
    started_at: Instant,
}

impl Scheduler {
    /// Build a scheduler and the snapshot stream reporters subscribe to.
    ///
    /// `worker_count` is clamped to `1..=targets.len()`; there is never a
    /// reason to hold a worker slot with no work to put in it.
    pub fn new(
        targets: Vec<Target>,
        ctx: Arc<BuildContext>,
        policy: StopPolicy,
        worker_count: usize,
    ) -> (Self, watch::Receiver<RunSnapshot>) {
        let targets = Arc::new(targets);
        let statuses = vec![TargetStatus::default(); targets.len()];
        let started_at = Instant::now();

        let (events_tx, events_rx) = mpsc::channel(64);
        let (snapshot_tx, snapshot_rx) = watch::channel(RunSnapshot {
            targets: Arc::clone(&targets),
            statuses: statuses.clone(),
            stopping: false,
            started_at,
        });

        let worker_count = worker_count.clamp(1, targets.len().max(1));

        (
            Self {
                targets,
                statuses,
                policy,
                worker_count,
                ctx,
                events_tx,
                events_rx,
                snapshot_tx,
                next_index: 0,
                in_flight: 0,
                stopping: false,
                started_at,
            },
            snapshot_rx,
        )
    }

    /// Sender for out-of-band events (the Ctrl-C listener).
    pub fn event_sender(&self) -> mpsc::Sender<RunEvent> {
        self.events_tx.clone()
    }

    /// Run every target to a terminal state and return the final report.
    ///
    /// An interrupt suppresses further dispatch and skips the queued
    /// remainder, but in-flight builds are still waited for: their tokens
    /// belong to a pool that may outlive this process.
    pub async fn run(mut self) -> Result<RunReport> {
        info!(
            targets = self.targets.len(),
            workers = self.worker_count,
            policy = ?self.policy,
            "starting build run"
        );

        // Seed the pool with the first min(worker_count, targets) entries.
        while self.next_index < self.targets.len() && self.in_flight < self.worker_count {
            self.dispatch_next();
        }
        self.publish();

        let mut interrupted = false;

        while self.in_flight > 0 {
            // recv() cannot yield None here: we hold an events_tx ourselves.
            match self.events_rx.recv().await {
                Some(RunEvent::BuildFinished { index, result }) => {
                    self.record_completion(index, result);

                    if !self.stopping && self.next_index < self.targets.len() {
                        self.dispatch_next();
                    }
                    self.publish();
                }
                Some(RunEvent::ShutdownRequested) => {
                    if !interrupted {
                        info!("interrupt received, waiting for in-flight builds");
                        interrupted = true;
                        self.stopping = true;
                        self.skip_queued();
                        self.publish();
                    }
                    // Keep draining completions: every in-flight build holds
                    // a pool token, and the run must not end until each one
                    // has been written back. The terminal's SIGINT reaches
                    // the children too, so this wait is short in practice.
                }
                None => break,
            }
        }

        info!(
            succeeded = self
                .statuses
                .iter()
                .filter(|s| s.state == TargetState::Succeeded)
                .count(),
            failed = self
                .statuses
                .iter()
                .filter(|s| s.state == TargetState::Failed)
                .count(),
            skipped = self
                .statuses
                .iter()
                .filter(|s| s.state == TargetState::Skipped)
                .count(),
            interrupted,
            "build run finished"
        );

        Ok(RunReport {
            targets: self.targets,
            statuses: self.statuses,
            interrupted,
        })
    }

    /// Mark the queue head as running and hand it to a worker task.
    fn dispatch_next(&mut self) {
        let index = self.next_index;
        self.next_index += 1;
        self.in_flight += 1;

        let status = &mut self.statuses[index];
        status.state = TargetState::Running;
        status.started_at = Some(Instant::now());

        let target = self.targets[index].clone();
        debug!(target = %target.id(), index, "dispatching build");

        let ctx = Arc::clone(&self.ctx);
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = run_build(&ctx, &target).await;
            // The loop outliving this send is the only way it can fail, and
            // then the result no longer matters.
            let _ = events_tx.send(RunEvent::BuildFinished { index, result }).await;
        });
    }

    fn record_completion(&mut self, index: usize, result: BuildResult) {
        self.in_flight -= 1;

        let target = &self.targets[index];
        let status = &mut self.statuses[index];
        status.elapsed = Some(result.elapsed);
        status.log_path = result.log_path.clone();
        status.state = if result.success {
            TargetState::Succeeded
        } else {
            TargetState::Failed
        };

        if result.success {
            info!(
                target = %target.id(),
                elapsed_s = format!("{:.1}", result.elapsed.as_secs_f64()),
                "target built"
            );
        } else {
            warn!(
                target = %target.id(),
                elapsed_s = format!("{:.1}", result.elapsed.as_secs_f64()),
                log = ?result.log_path,
                "target failed"
            );
        }

        if !result.success && self.policy == StopPolicy::FailFast && !self.stopping {
            info!("failure under fail-fast policy; suppressing further dispatch");
            self.stopping = true;
            self.skip_queued();
        }
    }

    /// Queued → Skipped for everything not yet dispatched.
    fn skip_queued(&mut self) {
        for status in &mut self.statuses[self.next_index..] {
            if status.state == TargetState::Queued {
                status.state = TargetState::Skipped;
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(RunSnapshot {
            targets: Arc::clone(&self.targets),
            statuses: self.statuses.clone(),
            stopping: self.stopping,
            started_at: self.started_at,
        });
    }
}
