//! Data-server binding CRUD specs.

use crate::prelude::*;

#[test]
fn upsert_reports_saved_binding() {
    let temp = Project::empty();

    temp.strmsync()
        .args(&[
            "data-server", "upsert", "my-drive", "--kind", "local", "--host", "/tmp",
        ])
        .passes()
        .stdout_has("saved data server my-drive");
}

#[test]
fn upsert_with_explicit_id_updates_in_place() {
    let temp = Project::empty();
    let out = temp
        .strmsync()
        .args(&[
            "data-server", "upsert", "v1", "--kind", "local", "--host", "/tmp/a",
        ])
        .passes()
        .stdout();
    let id = out
        .trim()
        .rsplit_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .unwrap()
        .to_string();

    temp.strmsync()
        .args(&[
            "data-server", "upsert", "v2",
            "--id", &id,
            "--kind", "local",
            "--host", "/tmp/b",
        ])
        .passes()
        .stdout_has("saved data server v2");

    let listed = temp
        .strmsync()
        .args(&["data-server", "list"])
        .passes()
        .stdout();
    assert!(listed.contains("v2"));
    assert!(!listed.contains("v1"));
}

#[test]
fn list_shows_kind_and_host() {
    let temp = Project::empty();
    temp.strmsync()
        .args(&[
            "data-server", "upsert", "my-drive", "--kind", "local", "--host", "/srv/media",
        ])
        .passes();

    let listed = temp
        .strmsync()
        .args(&["data-server", "list"])
        .passes()
        .stdout();
    assert!(listed.contains("my-drive"));
    assert!(listed.contains("local"));
    assert!(listed.contains("/srv/media"));
}

#[test]
fn delete_removes_binding() {
    let temp = Project::empty();
    let out = temp
        .strmsync()
        .args(&[
            "data-server", "upsert", "throwaway", "--kind", "local", "--host", "/tmp",
        ])
        .passes()
        .stdout();
    let id = out
        .trim()
        .rsplit_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .unwrap()
        .to_string();

    temp.strmsync()
        .args(&["data-server", "delete", &id])
        .passes()
        .stdout_has("deleted");

    temp.strmsync()
        .args(&["data-server", "show", &id])
        .fails();
}

#[test]
fn show_unknown_binding_fails() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();

    temp.strmsync()
        .args(&["data-server", "show", "does-not-exist"])
        .fails()
        .stderr_has("data server not found");
}
