use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PmcError;

/// Numeric part of a PubMed Central accession.
///
/// Parses either the bare digits returned by E-utilities (`"123"`) or the
/// accession form used by the OA file list (`"PMC123"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PmcId(String);

impl PmcId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `PMC<digits>`, the key of the file list's `Accession ID` column.
    pub fn accession(&self) -> String {
        format!("PMC{}", self.0)
    }

    pub fn archive_name(&self) -> String {
        format!("{}.tar.gz", self.accession())
    }
}

impl fmt::Display for PmcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PmcId {
    type Err = PmcError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("PMC") => &trimmed[3..],
            _ => trimmed,
        };
        let is_valid = !digits.is_empty() && digits.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(PmcError::InvalidPmcId(value.to_string()));
        }
        Ok(Self(digits.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
    max_results: u32,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>, max_results: u32) -> Result<Self, PmcError> {
        let term = term.into();
        if term.trim().is_empty() {
            return Err(PmcError::InvalidQuery("search term is empty".to_string()));
        }
        if max_results == 0 {
            return Err(PmcError::InvalidQuery(
                "max results must be positive".to_string(),
            ));
        }
        Ok(Self { term, max_results })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_bare_digits() {
        let id: PmcId = "123".parse().unwrap();
        assert_eq!(id.as_str(), "123");
        assert_eq!(id.accession(), "PMC123");
    }

    #[test]
    fn parse_accession_form() {
        let id: PmcId = " pmc4567 ".parse().unwrap();
        assert_eq!(id.as_str(), "4567");
        assert_eq!(id.archive_name(), "PMC4567.tar.gz");
    }

    #[test]
    fn parse_rejects_non_digits() {
        assert_matches!("PMC".parse::<PmcId>(), Err(PmcError::InvalidPmcId(_)));
        assert_matches!("12a".parse::<PmcId>(), Err(PmcError::InvalidPmcId(_)));
        assert_matches!("../1".parse::<PmcId>(), Err(PmcError::InvalidPmcId(_)));
    }

    #[test]
    fn query_requires_positive_cap() {
        assert_matches!(SearchQuery::new("gene", 0), Err(PmcError::InvalidQuery(_)));
        assert_matches!(SearchQuery::new("  ", 5), Err(PmcError::InvalidQuery(_)));
        let query = SearchQuery::new("gene", 2).unwrap();
        assert_eq!(query.term(), "gene");
        assert_eq!(query.max_results(), 2);
    }
}
