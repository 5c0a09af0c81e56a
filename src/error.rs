use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PmcError {
    #[error("invalid PMC id: {0}")]
    InvalidPmcId(String),

    #[error("invalid search query: {0}")]
    InvalidQuery(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("server returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("search result file not found: {0}")]
    #[diagnostic(help("the search request probably failed; check the log above"))]
    SearchResultMissing(PathBuf),

    #[error("failed to parse search response: {0}")]
    XmlParse(String),

    #[error("file list is missing required column `{0}`")]
    #[diagnostic(help("download the OA file list with `pmc-pdf file-list`"))]
    MissingColumn(String),

    #[error("failed to read file list: {0}")]
    Csv(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
