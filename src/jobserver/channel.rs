// src/jobserver/channel.rs

use std::fs::OpenOptions;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::unistd;
use tracing::{debug, error};

/// The byte written for every token. Its value is irrelevant to the
/// protocol; only the count of bytes in the pipe matters.
const TOKEN_BYTE: &[u8] = b"+";

/// The two ends of the token-transfer pipe.
///
/// `Owned` descriptors were opened by this process and are closed when the
/// channel is dropped. `Borrowed` descriptors belong to a parent process
/// (passed down via `--jobserver-auth=R,W`) and are left open.
#[derive(Debug)]
pub enum Endpoints {
    Owned { read: OwnedFd, write: OwnedFd },
    Borrowed { read: RawFd, write: RawFd },
}

impl Endpoints {
    fn read_fd(&self) -> BorrowedFd<'_> {
        match self {
            Endpoints::Owned { read, .. } => read.as_fd(),
            // SAFETY: borrowed descriptors are inherited from the parent
            // process and stay open for our entire lifetime; we never close
            // them.
            Endpoints::Borrowed { read, .. } => unsafe { BorrowedFd::borrow_raw(*read) },
        }
    }

    fn write_fd(&self) -> BorrowedFd<'_> {
        match self {
            Endpoints::Owned { write, .. } => write.as_fd(),
            // SAFETY: see `read_fd`.
            Endpoints::Borrowed { write, .. } => unsafe { BorrowedFd::borrow_raw(*write) },
        }
    }
}

/// A pool of fungible concurrency tokens carried over a pipe, speaking the
/// GNU make jobserver protocol.
///
/// The pool is either created here ([`TokenChannel::create`]) or attached to
/// one owned by a parent build ([`TokenChannel::from_raw_fds`],
/// [`TokenChannel::open_fifo`]). Tokens in circulation (held [`Token`] guards
/// plus bytes sitting in the pipe) stay constant for the channel's lifetime.
#[derive(Debug)]
pub struct TokenChannel {
    endpoints: Endpoints,
    /// Number of tokens preloaded at creation; `None` for attached channels,
    /// whose real capacity is known only to their creator.
    capacity: Option<usize>,
}

impl TokenChannel {
    /// Create a fresh channel preloaded with exactly `n` tokens.
    pub fn create(n: usize) -> Result<Self> {
        let (read, write) = unistd::pipe().context("creating jobserver pipe")?;

        // pipe(2) descriptors are inheritable already, but make it explicit
        // so spawned build tools can act as peers on the same pool.
        set_inheritable(read.as_fd())?;
        set_inheritable(write.as_fd())?;

        for _ in 0..n {
            write_token(write.as_fd())?;
        }

        debug!(tokens = n, "created jobserver channel");
        Ok(Self {
            endpoints: Endpoints::Owned { read, write },
            capacity: Some(n),
        })
    }

    /// Attach to a pipe created elsewhere, identified by literal descriptor
    /// numbers. Ownership is not taken; the descriptors are never closed by
    /// this process.
    pub fn from_raw_fds(read: RawFd, write: RawFd) -> Result<Self> {
        let endpoints = Endpoints::Borrowed { read, write };

        // Also validates that the inherited descriptors are actually open.
        set_inheritable(endpoints.read_fd())
            .with_context(|| format!("attaching to jobserver read fd {read}"))?;
        set_inheritable(endpoints.write_fd())
            .with_context(|| format!("attaching to jobserver write fd {write}"))?;

        debug!(read, write, "attached to inherited jobserver pipe");
        Ok(Self {
            endpoints,
            capacity: None,
        })
    }

    /// Attach to a named FIFO created by a parent build.
    ///
    /// The read end is opened before the write end; opening in the other
    /// order deadlocks when no other process holds the FIFO open yet. The
    /// resulting descriptors are owned (we opened them), but the pool itself
    /// belongs to the FIFO's creator and is never preloaded here.
    pub fn open_fifo(path: &Path) -> Result<Self> {
        let read: OwnedFd = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("opening jobserver fifo {} for reading", path.display()))?
            .into();
        let write: OwnedFd = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("opening jobserver fifo {} for writing", path.display()))?
            .into();

        // std opens with O_CLOEXEC; clear it so children inherit the ends.
        set_inheritable(read.as_fd())?;
        set_inheritable(write.as_fd())?;

        debug!(path = %path.display(), "attached to jobserver fifo");
        Ok(Self {
            endpoints: Endpoints::Owned { read, write },
            capacity: None,
        })
    }

    /// Tokens preloaded at creation, if this process created the pool.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Block until one token is available and consume it.
    ///
    /// Interrupted reads are retried; a read of zero bytes means every
    /// writer is gone and the pool can never be replenished, which is fatal.
    pub fn acquire(self: &Arc<Self>) -> Result<Token> {
        let mut buf = [0u8; 1];
        loop {
            match unistd::read(self.endpoints.read_fd(), &mut buf) {
                Ok(0) => bail!("jobserver pipe closed by all writers"),
                Ok(_) => {
                    return Ok(Token {
                        channel: Arc::clone(self),
                    });
                }
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(err).context("reading jobserver token"),
            }
        }
    }

    /// [`acquire`](Self::acquire) bridged onto the tokio blocking pool, so a
    /// starved worker never stalls the runtime.
    pub async fn acquire_async(self: &Arc<Self>) -> Result<Token> {
        let channel = Arc::clone(self);
        tokio::task::spawn_blocking(move || channel.acquire())
            .await
            .context("jobserver acquire task panicked")?
    }

    /// Return exactly one token to the pool. Called from [`Token`]'s drop.
    fn release(&self) -> Result<()> {
        loop {
            match unistd::write(self.endpoints.write_fd(), TOKEN_BYTE) {
                Ok(_) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(err).context("returning jobserver token"),
            }
        }
    }

    /// Raw descriptor pair spawned build tools need to keep open to
    /// participate in this pool.
    pub fn pass_fds(&self) -> (RawFd, RawFd) {
        (
            self.endpoints.read_fd().as_raw_fd(),
            self.endpoints.write_fd().as_raw_fd(),
        )
    }

    /// The `MAKEFLAGS` fragment advertising this pool to child processes.
    pub fn auth_string(&self) -> String {
        let (read, write) = self.pass_fds();
        format!("--jobserver-auth={read},{write}")
    }
}

/// One unit of permission to run a build. Dropping the guard writes the
/// token back, so no exit path can leak it once acquired.
#[derive(Debug)]
pub struct Token {
    channel: Arc<TokenChannel>,
}

impl Drop for Token {
    fn drop(&mut self) {
        if let Err(err) = self.channel.release() {
            // A lost token permanently shrinks the shared pool; nothing to
            // do about it here but make the problem visible.
            error!(error = %err, "failed to return jobserver token");
        }
    }
}

fn set_inheritable(fd: BorrowedFd<'_>) -> Result<()> {
    fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))
        .context("clearing FD_CLOEXEC on jobserver descriptor")?;
    Ok(())
}

fn write_token(fd: BorrowedFd<'_>) -> Result<()> {
    loop {
        match unistd::write(fd, TOKEN_BYTE) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(err) => return Err(err).context("preloading jobserver token"),
        }
    }
}
