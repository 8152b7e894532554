// src/exec/build.rs

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::discover::Target;
use crate::jobserver::TokenChannel;
use crate::manifest;

/// Everything a worker needs to run one target, shared across the pool.
#[derive(Debug)]
pub struct BuildContext {
    /// Project root; working directory for every make invocation.
    pub root: PathBuf,
    /// The build tool to invoke. `make` outside of tests.
    pub make_program: String,
    /// CLI pass-through arguments appended to every invocation.
    pub extra_args: Vec<String>,
    /// Extra environment for children, e.g. the `MAKEFLAGS` advertising a
    /// freshly created jobserver. Attached pools keep the ambient value.
    pub env: Vec<(String, String)>,
    /// Shared token pool; one token is held for the duration of each spawn.
    pub channel: Option<Arc<TokenChannel>>,
    /// Where per-target log artifacts are written.
    pub log_dir: Option<PathBuf>,
}

/// Outcome of one dispatched target; immutable once produced.
#[derive(Debug)]
pub struct BuildResult {
    pub success: bool,
    /// Wall time of the build proper, from spawn to exit. Time spent
    /// waiting for a token is deliberately not billed here.
    pub elapsed: Duration,
    /// Combined stdout + stderr, verbatim.
    pub output: Vec<u8>,
    pub log_path: Option<PathBuf>,
}

/// Run one target to completion.
///
/// Execution errors (spawn failure, log write failure) never escape: they
/// are folded into a failed `BuildResult` carrying the error text, so the
/// scheduler sees target failures as data, not control flow.
pub async fn run_build(ctx: &BuildContext, target: &Target) -> BuildResult {
    match run_build_inner(ctx, target).await {
        Ok(result) => result,
        Err(err) => {
            error!(target = %target.id(), error = %format!("{err:#}"), "build execution error");
            BuildResult {
                success: false,
                elapsed: Duration::ZERO,
                output: format!("makeherd: {err:#}\n").into_bytes(),
                log_path: None,
            }
        }
    }
}

async fn run_build_inner(ctx: &BuildContext, target: &Target) -> Result<BuildResult> {
    let manifest = manifest::load_manifest(&target.manifest_path(&ctx.root));

    // Hold one token for the lifetime of the child process. The guard's
    // drop returns it on every exit path, including task teardown.
    let _token = match &ctx.channel {
        Some(channel) => Some(channel.acquire_async().await?),
        None => None,
    };

    info!(target = %target.id(), "starting build process");
    let started = Instant::now();

    let mut cmd = Command::new(&ctx.make_program);
    cmd.arg(format!("TARGET={}", target.id()))
        .args(&manifest.build.make_args)
        .args(&ctx.extra_args)
        .current_dir(&ctx.root)
        // stdin stays attached alongside the inherited jobserver descriptors.
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    for (key, value) in &ctx.env {
        cmd.env(key, value);
    }
    for (key, value) in &manifest.build.env {
        cmd.env(key, value);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning build process for target '{}'", target.id()))?;

    let mut stdout = child.stdout.take().context("child stdout not captured")?;
    let mut stderr = child.stderr.take().context("child stderr not captured")?;

    // Merge both streams into one buffer, a whole read at a time, so lines
    // from the two pipes never interleave mid-chunk.
    let mut output: Vec<u8> = Vec::new();
    let mut out_buf = [0u8; 8192];
    let mut err_buf = [0u8; 8192];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => match read {
                Ok(0) | Err(_) => out_open = false,
                Ok(n) => output.extend_from_slice(&out_buf[..n]),
            },
            read = stderr.read(&mut err_buf), if err_open => match read {
                Ok(0) | Err(_) => err_open = false,
                Ok(n) => output.extend_from_slice(&err_buf[..n]),
            },
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for build process of target '{}'", target.id()))?;
    let elapsed = started.elapsed();

    let log_path = match &ctx.log_dir {
        Some(dir) => {
            let path = dir.join(format!("{}.log", target.id()));
            tokio::fs::write(&path, &output)
                .await
                .with_context(|| format!("writing build log {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    debug!(
        target = %target.id(),
        exit_code = status.code().unwrap_or(-1),
        success = status.success(),
        "build process exited"
    );

    Ok(BuildResult {
        success: status.success(),
        elapsed,
        output,
        log_path,
    })
}
