use super::parse_startup_error;

#[test]
fn parse_startup_error_finds_the_latest_attempt() {
    let log = "starting strmsyncd pid=1\ninfo: ready\nstarting strmsyncd pid=2\nERROR failed to bind socket\n";
    let err = parse_startup_error(log).unwrap();
    assert!(err.contains("ERROR failed to bind socket"));
}

#[test]
fn parse_startup_error_returns_none_without_a_marker() {
    assert!(parse_startup_error("just some noise").is_none());
}

#[test]
fn parse_startup_error_returns_none_when_the_latest_attempt_has_no_error() {
    let log = "starting strmsyncd pid=1\ninfo: ready\n";
    assert!(parse_startup_error(log).is_none());
}
