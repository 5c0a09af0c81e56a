//! E-utilities `esearch` against the PMC database.

use std::fs;
use std::path::Path;
use std::time::Instant;

use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Url;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::SearchQuery;
use crate::error::PmcError;
use crate::fetcher::{FetchOutcome, Fetcher};

const ID_TAG: &[u8] = b"Id";

pub fn search_url(endpoint: &str, query: &SearchQuery) -> Result<Url, PmcError> {
    let max = query.max_results().to_string();
    Url::parse_with_params(
        endpoint,
        &[
            ("db", "pmc"),
            ("term", query.term()),
            ("RetMax", max.as_str()),
        ],
    )
    .map_err(|_| PmcError::InvalidUrl(endpoint.to_string()))
}

/// Runs the search, keeps the raw response as `save_dir/file_name` and returns
/// the ids it lists.
///
/// A failed request is only reported to `sink`; whatever is at the result path
/// afterwards is parsed.
pub fn search_ids(
    fetcher: &dyn Fetcher,
    endpoint: &str,
    query: &SearchQuery,
    save_dir: &Path,
    file_name: &str,
    sink: &dyn ProgressSink,
) -> Result<Vec<String>, PmcError> {
    let url = search_url(endpoint, query)?;
    sink.event(ProgressEvent::info(format!(
        "search term={:?} max={}",
        query.term(),
        query.max_results()
    )));

    let start = Instant::now();
    match fetcher.fetch(url.as_str(), save_dir, Some(file_name)) {
        Ok(FetchOutcome::Saved { path, bytes }) => sink.event(ProgressEvent::timed(
            format!("search response saved to {} ({bytes} bytes)", path.display()),
            start.elapsed(),
        )),
        Ok(FetchOutcome::Rejected { status }) => sink.event(ProgressEvent::warn(format!(
            "search request to {url} failed with HTTP status {status}"
        ))),
        Err(err) => sink.event(ProgressEvent::warn(format!(
            "search request to {url} failed: {err}"
        ))),
    }

    let result_path = save_dir.join(file_name);
    if !result_path.exists() {
        return Err(PmcError::SearchResultMissing(result_path));
    }
    let xml = fs::read_to_string(&result_path)
        .map_err(|err| PmcError::Filesystem(format!("read {}: {err}", result_path.display())))?;
    let ids = parse_id_list(&xml)?;
    sink.event(ProgressEvent::info(format!("search returned {} ids", ids.len())));
    Ok(ids)
}

/// Text of every `<Id>` element in document order, wherever it is nested.
pub fn parse_id_list(xml: &str) -> Result<Vec<String>, PmcError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut ids = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) if tag.local_name().as_ref() == ID_TAG => {
                if depth == 0 {
                    current.clear();
                }
                depth += 1;
            }
            Ok(Event::End(tag)) if tag.local_name().as_ref() == ID_TAG && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let id = current.trim();
                    if !id.is_empty() {
                        ids.push(id.to_string());
                    }
                }
            }
            Ok(Event::Text(text)) if depth > 0 => {
                let text = text
                    .unescape()
                    .map_err(|err| PmcError::XmlParse(err.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::CData(data)) if depth > 0 => {
                current.push_str(&String::from_utf8_lossy(&data));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(PmcError::XmlParse(format!(
                    "at byte {}: {err}",
                    reader.error_position()
                )));
            }
        }
    }
    Ok(ids)
}
