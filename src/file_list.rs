//! The PMC open-access file list: `Accession ID` to package path.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::domain::PmcId;
use crate::error::PmcError;

pub const ACCESSION_COLUMN: &str = "Accession ID";
pub const FILE_COLUMN: &str = "File";

#[derive(Debug, Clone, Default)]
pub struct PathTable {
    paths: HashMap<String, String>,
}

impl PathTable {
    pub fn load(path: &Path) -> Result<Self, PmcError> {
        let file = File::open(path)
            .map_err(|err| PmcError::Filesystem(format!("open {}: {err}", path.display())))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PmcError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = csv
            .headers()
            .map_err(|err| PmcError::Csv(err.to_string()))?
            .clone();
        let accession_idx = column_index(&headers, ACCESSION_COLUMN)?;
        let file_idx = column_index(&headers, FILE_COLUMN)?;

        let mut table = Self::default();
        for record in csv.records() {
            let record = record.map_err(|err| PmcError::Csv(err.to_string()))?;
            let (Some(accession), Some(file)) = (record.get(accession_idx), record.get(file_idx))
            else {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                return Err(PmcError::Csv(format!("line {line}: missing columns")));
            };
            table.insert(accession, file);
        }
        Ok(table)
    }

    pub fn from_rows<I, A, F>(rows: I) -> Self
    where
        I: IntoIterator<Item = (A, F)>,
        A: AsRef<str>,
        F: AsRef<str>,
    {
        let mut table = Self::default();
        for (accession, file) in rows {
            table.insert(accession.as_ref(), file.as_ref());
        }
        table
    }

    /// Relative package path for `id`, if the list has a row for it.
    pub fn resolve(&self, id: &PmcId) -> Option<&str> {
        self.paths.get(&id.accession()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    // First row for an accession wins.
    fn insert(&mut self, accession: &str, file: &str) {
        self.paths
            .entry(accession.trim().to_string())
            .or_insert_with(|| file.trim().to_string());
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, PmcError> {
    headers
        .iter()
        .position(|header| header.trim() == name)
        .ok_or_else(|| PmcError::MissingColumn(name.to_string()))
}
