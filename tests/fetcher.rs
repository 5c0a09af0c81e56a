use std::time::Duration;

use assert_matches::assert_matches;

use pmc_pdf_fetcher::config::DEFAULT_USER_AGENT;
use pmc_pdf_fetcher::error::PmcError;
use pmc_pdf_fetcher::fetcher::{FetchOutcome, Fetcher, HttpFetcher};

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(DEFAULT_USER_AGENT, Duration::from_secs(10)).unwrap()
}

#[test]
fn ok_body_is_written_verbatim() {
    let mut server = mockito::Server::new();
    let body: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
    let mock = server
        .mock("GET", "/pub/pmc/oa_package/aa/bb/PMC123.tar.gz")
        .match_header("user-agent", DEFAULT_USER_AGENT)
        .with_status(200)
        .with_body(&body)
        .create();
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("nested").join("pdfs");

    let url = format!("{}/pub/pmc/oa_package/aa/bb/PMC123.tar.gz", server.url());
    let outcome = fetcher().fetch(&url, &dir, None).unwrap();

    mock.assert();
    let expected = dir.join("PMC123.tar.gz");
    assert_eq!(
        outcome,
        FetchOutcome::Saved {
            path: expected.clone(),
            bytes: body.len() as u64,
        }
    );
    assert_eq!(std::fs::read(expected).unwrap(), body);
}

#[test]
fn existing_file_is_overwritten() {
    let mut server = mockito::Server::new();
    let _list = server
        .mock("GET", "/list.csv")
        .with_status(200)
        .with_body("fresh")
        .create();
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("renamed.csv"), "stale content").unwrap();

    let url = format!("{}/list.csv", server.url());
    fetcher().fetch(&url, temp.path(), Some("renamed.csv")).unwrap();

    assert_eq!(
        std::fs::read_to_string(temp.path().join("renamed.csv")).unwrap(),
        "fresh"
    );
}

#[test]
fn non_ok_status_writes_nothing() {
    let mut server = mockito::Server::new();
    let _missing = server
        .mock("GET", "/pub/pmc/missing.tar.gz")
        .with_status(404)
        .with_body("not found")
        .create();
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("pdfs");

    let url = format!("{}/pub/pmc/missing.tar.gz", server.url());
    let outcome = fetcher().fetch(&url, &dir, None).unwrap();

    assert_eq!(outcome, FetchOutcome::Rejected { status: 404 });
    assert!(!dir.exists());
}

#[test]
fn connection_failure_is_an_http_error() {
    let temp = tempfile::tempdir().unwrap();
    let result = fetcher().fetch("http://127.0.0.1:9/PMC1.tar.gz", temp.path(), None);
    assert_matches!(result, Err(PmcError::Http(_)));
}
