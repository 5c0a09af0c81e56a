use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::config::RunConfig;
use crate::error::PmcError;

/// Result of a single GET. A non-200 answer is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    Saved { path: PathBuf, bytes: u64 },
    Rejected { status: u16 },
}

impl FetchOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, FetchOutcome::Saved { .. })
    }
}

pub trait Fetcher: Send + Sync {
    /// GET `url` and store the body as `dir/name`, `name` defaulting to the
    /// last path segment of the URL.
    fn fetch(&self, url: &str, dir: &Path, name: Option<&str>) -> Result<FetchOutcome, PmcError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, PmcError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|err| PmcError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| PmcError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &RunConfig) -> Result<Self, PmcError> {
        Self::new(&config.user_agent, config.timeout())
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        dir: &Path,
        name: &str,
    ) -> Result<FetchOutcome, PmcError> {
        fs::create_dir_all(dir).map_err(|err| {
            PmcError::Filesystem(format!("create {}: {err}", dir.display()))
        })?;
        let destination = dir.join(name);

        let mut temp = tempfile::Builder::new()
            .prefix(".pmc-pdf-download")
            .tempfile_in(dir)
            .map_err(|err| PmcError::Filesystem(err.to_string()))?;
        let bytes = response
            .copy_to(temp.as_file_mut())
            .map_err(|err| PmcError::Http(err.to_string()))?;
        temp.persist(&destination)
            .map_err(|err| PmcError::Filesystem(err.to_string()))?;

        Ok(FetchOutcome::Saved {
            path: destination,
            bytes,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dir: &Path, name: Option<&str>) -> Result<FetchOutcome, PmcError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => file_name_from_url(url)?,
        };
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PmcError::Http(err.to_string()))?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Ok(FetchOutcome::Rejected {
                status: status.as_u16(),
            });
        }
        self.write_response_to_file(response, dir, &name)
    }
}

/// Last non-empty path segment of `url`, ignoring query and fragment.
pub fn file_name_from_url(url: &str) -> Result<String, PmcError> {
    let parsed = Url::parse(url).map_err(|_| PmcError::InvalidUrl(url.to_string()))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| PmcError::InvalidUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn name_is_last_path_segment() {
        let name =
            file_name_from_url("https://ftp.ncbi.nlm.nih.gov/pub/pmc/oa_package/aa/bb/PMC123.tar.gz")
                .unwrap();
        assert_eq!(name, "PMC123.tar.gz");
    }

    #[test]
    fn name_ignores_query_and_trailing_slash() {
        let name = file_name_from_url("https://example.org/pub/list.csv?x=1#top").unwrap();
        assert_eq!(name, "list.csv");
        let name = file_name_from_url("https://example.org/pub/").unwrap();
        assert_eq!(name, "pub");
    }

    #[test]
    fn name_requires_a_path() {
        assert_matches!(
            file_name_from_url("https://example.org/"),
            Err(PmcError::InvalidUrl(_))
        );
        assert_matches!(file_name_from_url("not a url"), Err(PmcError::InvalidUrl(_)));
    }

    #[test]
    fn outcome_json_is_tagged() {
        let saved = serde_json::to_value(FetchOutcome::Saved {
            path: PathBuf::from("out/list.csv"),
            bytes: 12,
        })
        .unwrap();
        assert_eq!(
            saved,
            serde_json::json!({ "outcome": "saved", "path": "out/list.csv", "bytes": 12 })
        );

        let rejected = serde_json::to_value(FetchOutcome::Rejected { status: 503 }).unwrap();
        assert_eq!(
            rejected,
            serde_json::json!({ "outcome": "rejected", "status": 503 })
        );
    }
}
