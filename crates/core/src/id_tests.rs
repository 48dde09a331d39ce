// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

define_id! {
    pub struct TestId;
}

#[test]
fn new_wraps_any_into_string() {
    let id = TestId::new("abc");
    assert_eq!(id.as_str(), "abc");
}

#[test]
fn short_truncates_long_ids() {
    let id = TestId::new("abcdefgh");
    assert_eq!(id.short(4), "abcd");
}

#[test]
fn short_leaves_short_ids_untouched() {
    let id = TestId::new("ab");
    assert_eq!(id.short(4), "ab");
}

#[test]
fn display_matches_inner_string() {
    let id = TestId::new("job-1");
    assert_eq!(id.to_string(), "job-1");
}

#[test]
fn equality_against_str_slices() {
    let id = TestId::new("job-1");
    assert_eq!(id, "job-1");
    assert_eq!(id, *&"job-1");
}

#[test]
fn sequential_id_gen_is_deterministic_and_unique() {
    let gen = SequentialIdGen::new("t");
    assert_eq!(gen.next(), "t-1");
    assert_eq!(gen.next(), "t-2");
}

#[test]
fn uuid_id_gen_produces_unique_values() {
    let gen = UuidIdGen;
    assert_ne!(gen.next(), gen.next());
}
