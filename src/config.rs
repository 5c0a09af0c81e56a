use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::SearchQuery;
use crate::error::PmcError;

pub const DEFAULT_CONFIG_FILE: &str = "pmc-pdf.json";
pub const DEFAULT_SEARCH_TERM: &str = "gene";
pub const DEFAULT_OUTPUT_DIR: &str = "genes_dataset";
pub const DEFAULT_RESULT_CAP: u32 = 20;
pub const DEFAULT_FILE_LIST: &str = "oa_comm_use_file_list.csv";
pub const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
pub const FILE_SERVER_URL: &str = "https://ftp.ncbi.nlm.nih.gov/pub/pmc/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Subdirectory of the output directory that receives archives and PDFs.
pub const PDF_SUBDIR: &str = "pdfs";

/// On-disk shape of `pmc-pdf.json`. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub search_term: Option<String>,
    #[serde(default)]
    pub output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub result_cap: Option<u32>,
    #[serde(default)]
    pub result_file_name: Option<String>,
    #[serde(default)]
    pub file_list: Option<Utf8PathBuf>,
    #[serde(default)]
    pub search_url: Option<String>,
    #[serde(default)]
    pub file_server_url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub search_term: String,
    pub output_dir: Utf8PathBuf,
    pub result_cap: u32,
    pub result_file_name: String,
    pub file_list: Utf8PathBuf,
    pub search_url: String,
    pub file_server_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl RunConfig {
    pub fn query(&self) -> Result<SearchQuery, PmcError> {
        SearchQuery::new(self.search_term.clone(), self.result_cap)
    }

    pub fn download_dir(&self) -> Utf8PathBuf {
        self.output_dir.join(PDF_SUBDIR)
    }

    pub fn search_result_path(&self) -> Utf8PathBuf {
        self.output_dir.join(&self.result_file_name)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full download URL for a path taken from the file list's `File` column.
    pub fn package_url(&self, relative_path: &str) -> String {
        join_url(&self.file_server_url, relative_path)
    }

    pub fn file_list_url(&self) -> String {
        join_url(&self.file_server_url, DEFAULT_FILE_LIST)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            search_term: DEFAULT_SEARCH_TERM.to_string(),
            output_dir: Utf8PathBuf::from(DEFAULT_OUTPUT_DIR),
            result_cap: DEFAULT_RESULT_CAP,
            result_file_name: default_result_file_name(DEFAULT_SEARCH_TERM),
            file_list: Utf8PathBuf::from(DEFAULT_FILE_LIST),
            search_url: ESEARCH_URL.to_string(),
            file_server_url: FILE_SERVER_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Values supplied on the command line. They win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub search_term: Option<String>,
    pub output_dir: Option<Utf8PathBuf>,
    pub result_cap: Option<u32>,
    pub result_file_name: Option<String>,
    pub file_list: Option<Utf8PathBuf>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>, overrides: Overrides) -> Result<RunConfig, PmcError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default(), overrides);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PmcError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| PmcError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(config: Config, overrides: Overrides) -> Result<RunConfig, PmcError> {
        let search_term = overrides
            .search_term
            .or(config.search_term)
            .unwrap_or_else(|| DEFAULT_SEARCH_TERM.to_string());
        let result_cap = overrides
            .result_cap
            .or(config.result_cap)
            .unwrap_or(DEFAULT_RESULT_CAP);
        SearchQuery::new(search_term.clone(), result_cap)?;

        let result_file_name = overrides
            .result_file_name
            .or(config.result_file_name)
            .unwrap_or_else(|| default_result_file_name(&search_term));
        if result_file_name.is_empty() || result_file_name.contains(['/', '\\']) {
            return Err(PmcError::ConfigParse(format!(
                "result_file_name must be a plain file name: {result_file_name:?}"
            )));
        }

        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(PmcError::ConfigParse(
                "timeout_secs must be positive".to_string(),
            ));
        }

        Ok(RunConfig {
            search_term,
            output_dir: overrides
                .output_dir
                .or(config.output_dir)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR)),
            result_cap,
            result_file_name,
            file_list: overrides
                .file_list
                .or(config.file_list)
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_FILE_LIST)),
            search_url: config
                .search_url
                .unwrap_or_else(|| ESEARCH_URL.to_string()),
            file_server_url: config
                .file_server_url
                .unwrap_or_else(|| FILE_SERVER_URL.to_string()),
            user_agent: config
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout_secs,
        })
    }
}

pub fn default_result_file_name(term: &str) -> String {
    let slug = term
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect::<String>();
    format!("esearch_pmd_{slug}_id.xml")
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
