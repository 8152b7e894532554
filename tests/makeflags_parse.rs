use std::path::PathBuf;

use makeherd::jobserver::{JobserverAuth, parse_makeflags};
use proptest::prelude::*;

#[test]
fn explicit_jobs_with_fd_auth() {
    let info = parse_makeflags("-j4 --jobserver-auth=7,8");
    assert_eq!(info.jobs, Some(4));
    assert_eq!(info.auth, Some(JobserverAuth::Fds(7, 8)));
}

#[test]
fn fifo_auth() {
    let info = parse_makeflags("--jobserver-auth=fifo:/tmp/make-jobs");
    assert_eq!(
        info.auth,
        Some(JobserverAuth::Fifo(PathBuf::from("/tmp/make-jobs")))
    );
    assert_eq!(info.jobs, None);
}

#[test]
fn legacy_fds_flag() {
    let info = parse_makeflags("--jobserver-fds=3,4 -j2");
    assert_eq!(info.auth, Some(JobserverAuth::Fds(3, 4)));
    assert_eq!(info.jobs, Some(2));
}

#[test]
fn jobs_long_form() {
    let info = parse_makeflags("--jobs=12");
    assert_eq!(info.jobs, Some(12));
}

#[test]
fn later_occurrences_win() {
    let info = parse_makeflags("-j2 -j8 --jobserver-fds=3,4 --jobserver-auth=5,6");
    assert_eq!(info.jobs, Some(8));
    assert_eq!(info.auth, Some(JobserverAuth::Fds(5, 6)));
}

#[test]
fn malformed_tokens_are_ignored() {
    let info = parse_makeflags("-jx --jobs=lots --jobserver-auth=banana rR");
    assert_eq!(info.jobs, None);
    assert_eq!(info.auth, None);

    // make marks an unusable pool with negative descriptors.
    let info = parse_makeflags("--jobserver-auth=-2,-2");
    assert_eq!(info.auth, None);

    // An empty fifo path carries no pool either.
    let info = parse_makeflags("--jobserver-auth=fifo:");
    assert_eq!(info.auth, None);
}

#[test]
fn bare_flags_and_bundled_short_options_are_ignored() {
    let info = parse_makeflags("rR -j --jobs -- foo=bar");
    assert_eq!(info.jobs, None);
    assert_eq!(info.auth, None);
}

#[test]
fn empty_makeflags() {
    let info = parse_makeflags("");
    assert_eq!(info.jobs, None);
    assert_eq!(info.auth, None);
}

proptest! {
    /// The parser never panics, whatever MAKEFLAGS holds.
    #[test]
    fn parse_never_panics(flags in ".{0,200}") {
        let _ = parse_makeflags(&flags);
    }

    /// Tokens that do not spell out a jobserver flag can never conjure up
    /// an auth value.
    #[test]
    fn junk_never_yields_auth(flags in "[a-zA-Z0-9 =,_.-]{0,100}") {
        prop_assume!(!flags.contains("--jobserver"));
        let info = parse_makeflags(&flags);
        prop_assert_eq!(info.auth, None);
    }
}
