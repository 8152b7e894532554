// Each test binary uses a different slice of these helpers.
#![allow(dead_code)]

use std::error::Error;
use std::fs;
use std::os::fd::BorrowedFd;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use makeherd::discover::Target;
use makeherd::exec::BuildContext;
use makeherd::jobserver::TokenChannel;

pub type TestResult = Result<(), Box<dyn Error>>;

/// Switch the channel's read end to non-blocking and count the tokens
/// sitting in the pipe. Consumes them, so only call at the end of a test.
pub fn drain_available(channel: &TokenChannel) -> Result<usize, Box<dyn Error>> {
    use nix::errno::Errno;
    use nix::fcntl::{FcntlArg, OFlag, fcntl};

    let (read_fd, _) = channel.pass_fds();
    // SAFETY: the channel keeps the descriptor open for its lifetime.
    let fd = unsafe { BorrowedFd::borrow_raw(read_fd) };
    fcntl(fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK))?;

    let mut count = 0;
    let mut buf = [0u8; 1];
    loop {
        match nix::unistd::read(fd, &mut buf) {
            Ok(0) => break,
            Ok(_) => count += 1,
            Err(Errno::EAGAIN) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(count)
}

/// Write an executable shell script standing in for `make`.
pub fn fake_make(dir: &Path, body: &str) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join("fake-make");
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    let mut perms = fs::metadata(&path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms)?;
    Ok(path)
}

pub fn targets(group: &str, names: &[&str]) -> Vec<Target> {
    names
        .iter()
        .map(|name| Target {
            group: group.to_string(),
            name: (*name).to_string(),
        })
        .collect()
}

/// A build context running `script` instead of make, with no jobserver and
/// no log directory. Tests override fields as needed.
pub fn test_context(root: &Path, script: &Path) -> BuildContext {
    BuildContext {
        root: root.to_path_buf(),
        make_program: script.to_string_lossy().into_owned(),
        extra_args: Vec::new(),
        env: Vec::new(),
        channel: None,
        log_dir: None,
    }
}
