mod common;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde::Deserialize;
use serde_json::json;
use serial_test::serial;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct Facility {
    id: u32,
    name: String,
}

#[test]
fn fetches_typed_json() {
    common::init_tracing();
    let server = MockServer::start();
    let _login = common::mock_login(&server);
    let list = server.mock(|when, then| {
        when.method(GET)
            .path("/facilities")
            .header("Authorization", "Bearer abc123");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!([
                {"id": 1, "name": "ILL"},
                {"id": 2, "name": "PSI"}
            ]));
    });

    let client = common::client_for(&server);
    let facilities: Vec<Facility> = client.get_json("/facilities").unwrap();

    assert_eq!(facilities.len(), 2);
    assert_eq!(facilities[0].id, 1);
    assert_eq!(facilities[1].name, "PSI");
    list.assert();
}

#[test]
fn posts_json_with_bearer_token() {
    common::init_tracing();
    let server = MockServer::start();
    let _login = common::mock_login(&server);
    let annotate = server.mock(|when, then| {
        when.method(POST)
            .path("/result/annotate")
            .header("Authorization", "Bearer abc123")
            .header("Content-Type", "application/json")
            .body_includes("\"note\":\"checked\"");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"id": 7}));
    });

    let client = common::client_for(&server);
    let resp = client
        .post_json("/result/annotate", &json!({"note": "checked"}))
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    annotate.assert();
}

#[test]
fn downloads_to_an_explicit_target() {
    common::init_tracing();
    let server = MockServer::start();
    let _login = common::mock_login(&server);
    let file = server.mock(|when, then| {
        when.method(GET).path("/result/download/42");
        then.status(200)
            .header("Content-Type", "application/octet-stream")
            .body("target,cross_section\n56Fe,1.17\n");
    });

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("downloads").join("result_42.csv");

    let client = common::client_for(&server).with_progress(false);
    let written = client.download("/result/download/42", Some(&target)).unwrap();

    assert_eq!(written, target);
    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "target,cross_section\n56Fe,1.17\n"
    );
    file.assert();
}

#[test]
#[serial]
fn derives_the_target_name_from_the_endpoint() {
    common::init_tracing();
    let server = MockServer::start();
    let _login = common::mock_login(&server);
    server.mock(|when, then| {
        when.method(GET).path("/files/report.csv");
        then.status(200)
            .header("Content-Type", "application/octet-stream")
            .body("a,b\n1,2\n");
    });

    let client = common::client_for(&server).with_progress(false);

    // CWD-relative output; restore the working directory afterwards.
    let dir = tempfile::tempdir().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let written = client.download("/files/report.csv?download=1", None);
    std::env::set_current_dir(previous).unwrap();

    assert_eq!(written.unwrap(), PathBuf::from("report.csv"));
    assert!(dir.path().join("report.csv").exists());
}

#[test]
fn missing_download_reports_the_status() {
    common::init_tracing();
    let server = MockServer::start();
    let _login = common::mock_login(&server);
    server.mock(|when, then| {
        when.method(GET).path("/result/download/999");
        then.status(404)
            .header("Content-Type", "application/json")
            .json_body(json!({"detail": "Result file not found"}));
    });

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("missing.bin");

    let client = common::client_for(&server).with_progress(false);
    let err = client.download("/result/download/999", Some(&target)).unwrap_err();
    let msg = format!("{:#}", err);

    assert!(msg.contains("404"), "{msg}");
    assert!(msg.contains("Result file not found"), "{msg}");
    assert!(!target.exists());
}
