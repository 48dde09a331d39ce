//! Process-wide tunable CRUD specs.

use crate::prelude::*;

#[test]
fn set_then_get_round_trips() {
    let temp = Project::empty();

    temp.strmsync()
        .args(&["setting", "set", "default_concurrency", "8"])
        .passes()
        .stdout_has("saved");

    temp.strmsync()
        .args(&["setting", "get", "default_concurrency"])
        .passes()
        .stdout_eq("8\n");
}

#[test]
fn get_unknown_key_fails() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();

    temp.strmsync()
        .args(&["setting", "get", "no-such-key"])
        .fails()
        .stderr_has("setting not found");
}

#[test]
fn set_overwrites_existing_value() {
    let temp = Project::empty();

    temp.strmsync()
        .args(&["setting", "set", "k", "first"])
        .passes();
    temp.strmsync()
        .args(&["setting", "set", "k", "second"])
        .passes();

    temp.strmsync()
        .args(&["setting", "get", "k"])
        .passes()
        .stdout_eq("second\n");
}

#[test]
fn list_shows_all_settings() {
    let temp = Project::empty();

    temp.strmsync().args(&["setting", "set", "a", "1"]).passes();
    temp.strmsync().args(&["setting", "set", "b", "2"]).passes();

    let listed = temp.strmsync().args(&["setting", "list"]).passes().stdout();
    assert!(listed.contains('a'));
    assert!(listed.contains('b'));
}
