mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;

use kira_target_structures::http::{self, FetchError};

use support::{quick_retries, response, serve, truncated};

fn fetch_text(url: &str, max_retries: usize) -> Result<String, FetchError> {
    let client = http::build_client(Duration::from_secs(5)).unwrap();
    http::fetch_with_retries(quick_retries(max_retries), || client.get(url), |resp| resp.text())
}

#[test]
fn service_unavailable_then_ok_is_retried() {
    let (url, connections) = serve(vec![
        response("503 Service Unavailable", b"busy"),
        response("200 OK", b"hello"),
    ]);
    let body = fetch_text(&url, 3).unwrap();
    assert_eq!(body, "hello");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[test]
fn retries_stop_at_the_configured_cap() {
    let (url, connections) = serve(vec![
        response("503 Service Unavailable", b"busy"),
        response("503 Service Unavailable", b"busy"),
        response("503 Service Unavailable", b"still busy"),
        response("200 OK", b"too late"),
    ]);
    let err = fetch_text(&url, 2).unwrap_err();
    assert_matches!(
        err,
        FetchError::Status { status: 503, message } if message == "still busy"
    );
    assert_eq!(connections.load(Ordering::SeqCst), 3);
}

#[test]
fn not_found_is_not_retried() {
    let (url, connections) = serve(vec![
        response("404 Not Found", b"no such entry"),
        response("200 OK", b"unexpected"),
    ]);
    let err = fetch_text(&url, 3).unwrap_err();
    assert_matches!(err, FetchError::Status { status: 404, .. });
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[test]
fn body_cut_short_is_fetched_again() {
    let (url, connections) = serve(vec![
        truncated(b"hel", 5),
        response("200 OK", b"hello"),
    ]);
    let body = fetch_text(&url, 3).unwrap();
    assert_eq!(body, "hello");
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[test]
fn body_cut_short_without_retries_is_a_transport_error() {
    let (url, connections) = serve(vec![truncated(b"hel", 5)]);
    let err = fetch_text(&url, 0).unwrap_err();
    assert_matches!(err, FetchError::Transport(_));
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}
