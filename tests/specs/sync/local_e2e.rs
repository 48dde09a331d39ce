//! End-to-end sync specs: a `Local`-kind data server synced into `.strm`
//! descriptor files via the full daemon → worker pool → sync engine path.

use crate::prelude::*;

fn extract_id(line: &str) -> String {
    line.trim()
        .rsplit_once('(')
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .expect("output should carry a generated id")
        .to_string()
}

#[test]
fn job_run_writes_strm_files_for_matching_extension() {
    let temp = Project::empty();
    let source = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();

    std::fs::write(source.path().join("movie.mp4"), b"not real video data").unwrap();
    std::fs::create_dir(source.path().join("subdir")).unwrap();
    std::fs::write(source.path().join("subdir/clip.mp4"), b"also not real").unwrap();
    std::fs::write(source.path().join("poster.jpg"), b"ignored extension").unwrap();

    let data_server_out = temp
        .strmsync()
        .args(&[
            "data-server", "upsert", "source",
            "--kind", "local",
            "--host", source.path().to_str().unwrap(),
        ])
        .passes()
        .stdout();
    let data_server_id = extract_id(&data_server_out);

    let job_out = temp
        .strmsync()
        .args(&[
            "job", "create", "e2e",
            "--data-server", &data_server_id,
            "--source", "",
            "--target", target.path().to_str().unwrap(),
            "--options", r#"{"extensions":["mp4"]}"#,
        ])
        .passes()
        .stdout();
    let job_id = job_out
        .lines()
        .find(|l| l.starts_with("id:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap()
        .to_string();

    temp.strmsync()
        .args(&["job", "run", &job_id])
        .passes()
        .stdout_has("enqueued task run");

    let movie_strm = target.path().join("movie.strm");
    let clip_strm = target.path().join("subdir/clip.strm");
    let synced = wait_for(SPEC_WAIT_MAX_MS * 2, || {
        movie_strm.exists() && clip_strm.exists()
    });
    assert!(
        synced,
        "expected .strm files under the target tree\ndaemon log:\n{}",
        temp.daemon_log()
    );

    let movie_contents = std::fs::read_to_string(&movie_strm).unwrap();
    assert!(movie_contents.contains("movie.mp4"));
    assert!(!target.path().join("poster.strm").exists());
}

#[test]
fn job_run_against_unreadable_source_fails_the_task_run() {
    let temp = Project::empty();
    let target = tempfile::tempdir().unwrap();

    let data_server_out = temp
        .strmsync()
        .args(&[
            "data-server", "upsert", "source",
            "--kind", "local",
            "--host", "/no/such/directory/on/this/machine",
        ])
        .passes()
        .stdout();
    let data_server_id = extract_id(&data_server_out);

    let job_out = temp
        .strmsync()
        .args(&[
            "job", "create", "broken",
            "--data-server", &data_server_id,
            "--source", "",
            "--target", target.path().to_str().unwrap(),
            "--options", r#"{"extensions":["mp4"]}"#,
        ])
        .passes()
        .stdout();
    let job_id = job_out
        .lines()
        .find(|l| l.starts_with("id:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap()
        .to_string();

    temp.strmsync().args(&["job", "run", &job_id]).passes();

    let failed = wait_for(SPEC_WAIT_MAX_MS * 2, || {
        temp.strmsync()
            .args(&["task", "list", "--job", &job_id])
            .passes()
            .stdout()
            .contains("failed")
    });
    assert!(
        failed,
        "task run against a missing source root should fail\ndaemon log:\n{}",
        temp.daemon_log()
    );
}
