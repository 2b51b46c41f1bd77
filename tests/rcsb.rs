mod support;

use std::fs;
use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;

use kira_target_structures::error::KiraError;
use kira_target_structures::http::RetryPolicy;
use kira_target_structures::rcsb::{RcsbClient, RcsbHttpClient, parse_entries_response};

use support::{quick_retries, response, serve, truncated};

#[test]
fn parse_fixture_entries() {
    let raw = fs::read_to_string("tests/fixtures/rcsb_entries.json").unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let candidates = parse_entries_response(&value).unwrap();

    let ids: Vec<&str> = candidates.iter().map(|c| c.structure_id.as_str()).collect();
    assert_eq!(ids, vec!["1B41", "4EY4", "6O4W"]);
    assert_eq!(candidates[1].method.as_deref(), Some("X-RAY DIFFRACTION"));
    assert_eq!(candidates[1].resolution, Some(2.16));
    assert_eq!(candidates[2].method.as_deref(), Some("ELECTRON MICROSCOPY"));
    assert_eq!(candidates[2].resolution, None);
}

#[test]
fn graphql_errors_are_reported() {
    let value = json!({
        "errors": [{ "message": "Variable 'ids' has an invalid value" }],
        "data": null
    });
    let err = parse_entries_response(&value).unwrap_err();
    assert_matches!(err, KiraError::RcsbGraphql(message) if message.contains("invalid value"));
}

#[test]
fn missing_data_is_empty() {
    let value = json!({ "data": { "entries": null } });
    assert!(parse_entries_response(&value).unwrap().is_empty());
}

#[test]
fn structure_url_uses_upper_case_id() {
    let client = RcsbHttpClient::new(
        "https://data.rcsb.org/graphql",
        "https://files.rcsb.org/download/",
        Duration::from_secs(5),
        RetryPolicy::default(),
    )
    .unwrap();
    let id = "4ey4".parse().unwrap();
    assert_eq!(
        client.structure_url(&id),
        "https://files.rcsb.org/download/4EY4.cif"
    );
}

#[test]
fn interrupted_download_is_restarted() {
    let body = b"data_4EY4\n_entry.id 4EY4\n";
    let (url, connections) = serve(vec![
        truncated(&body[..10], body.len()),
        response("200 OK", body),
    ]);
    let client = RcsbHttpClient::new(
        format!("{url}/graphql"),
        url.clone(),
        Duration::from_secs(5),
        quick_retries(3),
    )
    .unwrap();
    let temp = tempfile::tempdir().unwrap();
    let destination = temp.path().join("ACES_HUMAN_4EY4.cif");

    client
        .download_structure(&"4EY4".parse().unwrap(), &destination)
        .unwrap();

    assert_eq!(fs::read(&destination).unwrap(), body);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[test]
fn download_server_error_keeps_status() {
    let (url, _connections) = serve(vec![
        response("500 Internal Server Error", b"oops"),
        response("500 Internal Server Error", b"oops"),
    ]);
    let client = RcsbHttpClient::new(
        format!("{url}/graphql"),
        url.clone(),
        Duration::from_secs(5),
        quick_retries(1),
    )
    .unwrap();
    let temp = tempfile::tempdir().unwrap();
    let destination = temp.path().join("ACES_HUMAN_4EY4.cif");

    let err = client
        .download_structure(&"4EY4".parse().unwrap(), &destination)
        .unwrap_err();
    assert_matches!(err, KiraError::RcsbStatus { status: 500, .. });
    assert!(!destination.exists());
}
