// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn empty_blob_parses_to_defaults() {
    let opts = JobOptions::from_value(&serde_json::json!({})).unwrap();
    assert_eq!(opts.concurrency, 4);
    assert_eq!(opts.max_depth, MAX_SCAN_DEPTH);
    assert!(opts.recursive);
    assert_eq!(opts.metadata_mode, MetadataMode::None);
}

#[test]
fn max_depth_is_clamped_to_hard_ceiling() {
    let opts = JobOptions::from_value(&serde_json::json!({"max_depth": 999})).unwrap();
    assert_eq!(opts.max_depth, MAX_SCAN_DEPTH);
}

#[test]
fn zero_concurrency_is_clamped_up_to_one() {
    let opts = JobOptions::from_value(&serde_json::json!({"concurrency": 0})).unwrap();
    assert_eq!(opts.concurrency, 1);
}

#[test]
fn concurrency_is_clamped_to_hard_ceiling() {
    let opts = JobOptions::from_value(&serde_json::json!({"concurrency": 1_000_000})).unwrap();
    assert_eq!(opts.concurrency, MAX_SCAN_CONCURRENCY);
}

#[test]
fn unknown_keys_are_ignored() {
    let opts = JobOptions::from_value(&serde_json::json!({"bogus_key": true})).unwrap();
    assert_eq!(opts, JobOptions::default());
}

#[test]
fn replace_rules_apply_in_order() {
    let opts = JobOptions {
        strm_replace_rules: vec![
            ("http://".to_string(), "https://".to_string()),
            ("internal".to_string(), "external".to_string()),
        ],
        ..JobOptions::default()
    };
    let out = opts.apply_replace_rules("http://internal.host/a.mkv");
    assert_eq!(out, "https://external.host/a.mkv");
}

#[test]
fn recognized_keys_parse_from_json() {
    let opts = JobOptions::from_value(&serde_json::json!({
        "concurrency": 8,
        "strm_mode": "local_path",
        "metadata_mode": "copy",
        "extensions": ["mkv", "mp4"],
        "exclude_dirs": ["@eaDir", ".recycle"],
        "min_file_size": 1024,
        "force_update": true,
        "skip_existing": false,
    }))
    .unwrap();
    assert_eq!(opts.concurrency, 8);
    assert_eq!(opts.strm_mode, StrmMode::LocalPath);
    assert_eq!(opts.metadata_mode, MetadataMode::Copy);
    assert!(opts.extensions.contains("mkv"));
    assert_eq!(opts.min_file_size, 1024);
    assert!(opts.force_update);
}
