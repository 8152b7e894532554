use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use makeherd::jobserver::TokenChannel;
use proptest::prelude::*;

mod common;
use common::{TestResult, drain_available};

#[test]
fn tokens_survive_acquire_release_cycles() -> TestResult {
    for n in 1..=8 {
        let channel = Arc::new(TokenChannel::create(n)?);
        assert_eq!(channel.capacity(), Some(n));

        // Drain the pool completely, twice, releasing via guard drop.
        for _ in 0..2 {
            let held: Vec<_> = (0..n)
                .map(|_| channel.acquire())
                .collect::<Result<_, _>>()?;
            assert_eq!(held.len(), n);
            drop(held);
        }

        assert_eq!(drain_available(&channel)?, n);
    }
    Ok(())
}

#[test]
fn acquire_blocks_until_a_token_returns() -> TestResult {
    let channel = Arc::new(TokenChannel::create(1)?);
    let held = channel.acquire()?;

    let (tx, rx) = mpsc::channel();
    let waiter = thread::spawn({
        let channel = Arc::clone(&channel);
        move || {
            let token = channel.acquire().expect("acquire after release");
            tx.send(()).expect("test channel closed");
            drop(token);
        }
    });

    // The pool is empty; the waiter must be parked.
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    drop(held);
    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    waiter.join().expect("waiter panicked");

    assert_eq!(drain_available(&channel)?, 1);
    Ok(())
}

#[test]
fn attach_to_inherited_descriptor_pair() -> TestResult {
    // Stand in for a parent that created the pool: a raw pipe holding two
    // tokens, advertised by descriptor number.
    let (read, write) = nix::unistd::pipe()?;
    nix::unistd::write(&write, b"++")?;

    let channel = Arc::new(TokenChannel::from_raw_fds(
        read.as_raw_fd(),
        write.as_raw_fd(),
    )?);
    assert_eq!(channel.capacity(), None);

    let a = channel.acquire()?;
    let b = channel.acquire()?;
    drop(a);
    drop(b);

    assert_eq!(drain_available(&channel)?, 2);

    // Dropping an attached channel must leave the parent's pipe open.
    drop(channel);
    nix::unistd::write(&write, b"+")?;
    Ok(())
}

#[test]
fn attach_to_dead_descriptors_fails() {
    // Descriptors well past anything a test process has open.
    assert!(TokenChannel::from_raw_fds(973, 974).is_err());
}

#[test]
fn attach_to_named_fifo() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("jobs.fifo");
    nix::unistd::mkfifo(&path, nix::sys::stat::Mode::from_bits_truncate(0o600))?;

    // The "parent": opens the write side (parking until our read open) and
    // seeds three tokens. Keeps its end open for the duration of the test.
    let seeder = thread::spawn({
        let path = path.clone();
        move || -> std::io::Result<std::fs::File> {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new().write(true).open(&path)?;
            file.write_all(b"+++")?;
            file.flush()?;
            Ok(file)
        }
    });

    let channel = Arc::new(TokenChannel::open_fifo(&path)?);
    let _parent_end = seeder.join().expect("seeder panicked")?;

    let held: Vec<_> = (0..3)
        .map(|_| channel.acquire())
        .collect::<Result<_, _>>()?;
    drop(held);

    assert_eq!(drain_available(&channel)?, 3);
    Ok(())
}

proptest! {
    /// Token conservation: any interleaving of acquires and guard drops
    /// leaves the pool at its created capacity.
    #[test]
    fn conservation_under_interleaving(
        n in 1..=4usize,
        ops in proptest::collection::vec(any::<bool>(), 0..32),
    ) {
        let channel = Arc::new(TokenChannel::create(n).unwrap());
        let mut held = Vec::new();

        for acquire in ops {
            if acquire {
                if held.len() < n {
                    held.push(channel.acquire().unwrap());
                }
            } else {
                held.pop();
            }
        }

        drop(held);
        prop_assert_eq!(drain_available(&channel).unwrap(), n);
    }
}
