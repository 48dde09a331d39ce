//! Job configuration CRUD specs.

use crate::prelude::*;

fn create_data_server(temp: &Project, host: &str) -> String {
    let out = temp
        .strmsync()
        .args(&[
            "data-server", "upsert", "source", "--kind", "local", "--host", host,
        ])
        .passes()
        .stdout();
    // "saved data server {name} ({id})"
    let id = out
        .trim()
        .rsplit_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .expect("upsert output should carry the generated id")
        .to_string();
    id
}

#[test]
fn create_then_show_round_trips_fields() {
    let temp = Project::empty();
    let data_server = create_data_server(&temp, "/tmp");

    let created = temp
        .strmsync()
        .args(&[
            "job", "create", "movies",
            "--data-server", &data_server,
            "--source", "",
            "--target", "/tmp/out",
            "--cron", "0 0 * * * *",
        ])
        .passes()
        .stdout();
    assert!(created.contains("name:          movies"));
    assert!(created.contains("enabled:       true"));
    assert!(created.contains("cron:          0 0 * * * *"));

    let id = created
        .lines()
        .find(|l| l.starts_with("id:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .expect("created job should report an id")
        .to_string();

    temp.strmsync()
        .args(&["job", "show", &id])
        .passes()
        .stdout_has("name:          movies");
}

#[test]
fn create_with_disabled_flag_is_not_enabled() {
    let temp = Project::empty();
    let data_server = create_data_server(&temp, "/tmp");

    temp.strmsync()
        .args(&[
            "job", "create", "paused",
            "--data-server", &data_server,
            "--source", "",
            "--target", "/tmp/out",
            "--disabled",
        ])
        .passes()
        .stdout_has("enabled:       false");
}

#[test]
fn create_rejects_invalid_options_json() {
    let temp = Project::empty();
    let data_server = create_data_server(&temp, "/tmp");

    temp.strmsync()
        .args(&[
            "job", "create", "bad-options",
            "--data-server", &data_server,
            "--source", "",
            "--target", "/tmp/out",
            "--options", "{not json",
        ])
        .fails()
        .stderr_has("invalid --options JSON");
}

#[test]
fn list_shows_created_jobs() {
    let temp = Project::empty();
    let data_server = create_data_server(&temp, "/tmp");

    temp.strmsync()
        .args(&[
            "job", "create", "alpha",
            "--data-server", &data_server,
            "--source", "",
            "--target", "/tmp/out",
        ])
        .passes();
    temp.strmsync()
        .args(&[
            "job", "create", "beta",
            "--data-server", &data_server,
            "--source", "",
            "--target", "/tmp/out",
        ])
        .passes();

    let listed = temp.strmsync().args(&["job", "list"]).passes().stdout();
    assert!(listed.contains("alpha"));
    assert!(listed.contains("beta"));
}

#[test]
fn delete_removes_job() {
    let temp = Project::empty();
    let data_server = create_data_server(&temp, "/tmp");

    let created = temp
        .strmsync()
        .args(&[
            "job", "create", "throwaway",
            "--data-server", &data_server,
            "--source", "",
            "--target", "/tmp/out",
        ])
        .passes()
        .stdout();
    let id = created
        .lines()
        .find(|l| l.starts_with("id:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap()
        .to_string();

    temp.strmsync()
        .args(&["job", "delete", &id])
        .passes()
        .stdout_has("deleted");

    temp.strmsync().args(&["job", "show", &id]).fails();
}

#[test]
fn show_unknown_job_fails() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();

    temp.strmsync()
        .args(&["job", "show", "not-a-real-id"])
        .fails()
        .stderr_has("job not found");
}

#[test]
fn run_unknown_job_fails() {
    let temp = Project::empty();
    temp.strmsync().args(&["daemon", "start"]).passes();

    temp.strmsync()
        .args(&["job", "run", "not-a-real-id"])
        .fails()
        .stderr_has("job not found");
}

#[test]
fn json_output_emits_valid_json() {
    let temp = Project::empty();
    let data_server = create_data_server(&temp, "/tmp");

    temp.strmsync()
        .args(&[
            "job", "create", "json-job",
            "--data-server", &data_server,
            "--source", "",
            "--target", "/tmp/out",
        ])
        .passes();

    let out = temp
        .strmsync()
        .args(&["-o", "json", "job", "list"])
        .passes()
        .stdout();
    let parsed: serde_json::Value =
        serde_json::from_str(&out).expect("job list -o json should emit valid JSON");
    assert!(parsed.as_array().map(|a| !a.is_empty()).unwrap_or(false));
}
