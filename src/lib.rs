// src/lib.rs

pub mod cli;
pub mod discover;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod jobserver;
pub mod logging;
pub mod manifest;
pub mod report;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::engine::{RunEvent, RunReport, Scheduler, StopPolicy};
use crate::errors::MakeherdError;
use crate::exec::BuildContext;
use crate::jobserver::TokenChannel;

/// Exit code for a run where at least one target failed, none were found,
/// or setup aborted.
pub const EXIT_FAILURE: i32 = 1;
/// Conventional exit code for a SIGINT-terminated run.
pub const EXIT_INTERRUPTED: i32 = 130;

/// High-level entry point used by `main.rs`.
///
/// Wires together:
/// - target discovery
/// - jobserver attach-or-create
/// - scheduler + executor workers
/// - progress reporting
/// - Ctrl-C handling
///
/// Returns the process exit code. Fatal setup failures (unopenable
/// jobserver, no targets) surface as errors before anything is dispatched.
pub async fn run(args: CliArgs) -> Result<i32> {
    let root = args
        .root
        .canonicalize()
        .with_context(|| format!("resolving project root {}", args.root.display()))?;

    let targets = discover::discover_targets(&root)?;
    if targets.is_empty() {
        return Err(MakeherdError::NoTargets(root).into());
    }
    info!(count = targets.len(), "targets discovered");

    // Attach to a parent's jobserver if MAKEFLAGS advertises one; otherwise
    // create our own pool and advertise it to children.
    let (inherited, detected_jobs) = jobserver::channel_from_env()?;
    let mut child_env: Vec<(String, String)> = Vec::new();

    let (channel, pool_size) = match inherited {
        Some(channel) => {
            info!(jobs = ?detected_jobs, "sharing inherited jobserver");
            (channel, detected_jobs)
        }
        None => {
            let jobs = args
                .jobs
                .map(|j| j as usize)
                .unwrap_or_else(available_parallelism);
            let channel = TokenChannel::create(jobs)
                .map_err(|err| MakeherdError::Jobserver(format!("{err:#}")))?;
            child_env.push((
                "MAKEFLAGS".to_string(),
                format!("-j{jobs} {}", channel.auth_string()),
            ));
            info!(jobs, "created jobserver");
            (channel, Some(jobs))
        }
    };

    // Worker slots: one per token when the pool size is known, bounded by
    // the amount of work. An attached pool of unknown size gets one worker
    // per core; its tokens still gate the real concurrency.
    let worker_count = pool_size
        .unwrap_or_else(available_parallelism)
        .clamp(1, targets.len());

    let log_dir = args.log_dir.unwrap_or_else(|| root.join("build-logs"));
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let ctx = Arc::new(BuildContext {
        root,
        make_program: "make".to_string(),
        extra_args: args.make_args,
        env: child_env,
        channel: Some(Arc::new(channel)),
        log_dir: Some(log_dir),
    });

    let policy = if args.continue_on_error {
        StopPolicy::ContinueOnError
    } else {
        StopPolicy::FailFast
    };

    let (scheduler, snapshot_rx) = Scheduler::new(targets, ctx, policy, worker_count);

    // Ctrl-C → stop dispatching and unwind with a distinct exit code.
    {
        let events_tx = scheduler.event_sender();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = events_tx.send(RunEvent::ShutdownRequested).await;
            }
        });
    }

    let reporter = report::spawn_reporter(snapshot_rx, report::select_renderer(args.plain));

    let run_report = scheduler.run().await?;
    let _ = reporter.await;

    Ok(exit_code(&run_report))
}

fn exit_code(report: &RunReport) -> i32 {
    if report.interrupted {
        warn!("build run interrupted by user");
        return EXIT_INTERRUPTED;
    }

    for (target, status) in report.targets.iter().zip(report.statuses.iter()) {
        if status.state == engine::TargetState::Failed {
            warn!(
                target = %target.id(),
                log = ?status.log_path,
                "target failed; see its build log"
            );
        }
    }

    if report.is_success() { 0 } else { EXIT_FAILURE }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
