use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Serialize;
use tar::Archive;
use tempfile::TempDir;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::PmcId;
use crate::error::PmcError;

pub const PDF_SUFFIX: &str = ".pdf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PdfOutcome {
    Moved { file: String },
    /// A file with the same name already sat in the save directory; the
    /// extracted copy was dropped with the rest of the package.
    Conflict { file: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnpackReport {
    pub pdfs: Vec<PdfOutcome>,
}

impl UnpackReport {
    pub fn is_empty(&self) -> bool {
        self.pdfs.is_empty()
    }

    pub fn moved(&self) -> Vec<String> {
        self.pdfs
            .iter()
            .filter_map(|outcome| match outcome {
                PdfOutcome::Moved { file } => Some(file.clone()),
                PdfOutcome::Conflict { .. } => None,
            })
            .collect()
    }

    pub fn conflicts(&self) -> Vec<String> {
        self.pdfs
            .iter()
            .filter_map(|outcome| match outcome {
                PdfOutcome::Conflict { file } => Some(file.clone()),
                PdfOutcome::Moved { .. } => None,
            })
            .collect()
    }
}

/// Owns everything one unpack creates: the downloaded archive and the
/// staging directory the archive is extracted into. Dropping it removes both,
/// so every exit from [`unpack_pdfs`] leaves only relocated PDFs behind.
struct PackageCleanup {
    archive: PathBuf,
    staging: Option<TempDir>,
}

impl PackageCleanup {
    fn new(archive: PathBuf) -> Self {
        Self {
            archive,
            staging: None,
        }
    }

    fn stage_in(&mut self, save_dir: &Path) -> Result<&Path, PmcError> {
        let staging = tempfile::Builder::new()
            .prefix(".pmc-unpack")
            .tempdir_in(save_dir)
            .map_err(|err| PmcError::Filesystem(format!("staging in {}: {err}", save_dir.display())))?;
        Ok(self.staging.insert(staging).path())
    }

    fn finish(mut self) -> Result<(), PmcError> {
        if let Some(staging) = self.staging.take() {
            let path = staging.path().to_path_buf();
            staging
                .close()
                .map_err(|err| PmcError::Filesystem(format!("remove {}: {err}", path.display())))?;
        }
        remove_archive(&self.archive)
    }
}

impl Drop for PackageCleanup {
    fn drop(&mut self) {
        // The staging TempDir removes itself.
        let _ = remove_archive(&self.archive);
    }
}

fn remove_archive(archive: &Path) -> Result<(), PmcError> {
    if archive.exists() {
        fs::remove_file(archive)
            .map_err(|err| PmcError::Filesystem(format!("remove {}: {err}", archive.display())))?;
    }
    Ok(())
}

pub fn archive_path(id: &PmcId, save_dir: &Path) -> PathBuf {
    save_dir.join(id.archive_name())
}

/// Extracts `save_dir/PMC<id>.tar.gz` into a staging directory inside
/// `save_dir`, moves the PDFs found in its `PMC<id>/` folder up into
/// `save_dir` and deletes the rest, whatever the archive contained.
pub fn unpack_pdfs(
    id: &PmcId,
    save_dir: &Path,
    sink: &dyn ProgressSink,
) -> Result<UnpackReport, PmcError> {
    let archive = archive_path(id, save_dir);
    let mut cleanup = PackageCleanup::new(archive.clone());
    if !archive.is_file() {
        return Err(PmcError::Archive(format!(
            "archive {} not found",
            archive.display()
        )));
    }

    let staging = cleanup.stage_in(save_dir)?;
    extract_tar_gz(&archive, staging)?;
    let package_dir = staging.join(id.accession());

    let mut report = UnpackReport::default();
    for name in pdf_names(&package_dir)? {
        let target = save_dir.join(&name);
        if target.exists() {
            sink.event(ProgressEvent::warn(format!("file {name} already exists")));
            report.pdfs.push(PdfOutcome::Conflict { file: name });
            continue;
        }
        fs::rename(package_dir.join(&name), &target)
            .map_err(|err| PmcError::Filesystem(format!("move {name}: {err}")))?;
        sink.event(ProgressEvent::info(format!("extracted PDF {name}")));
        report.pdfs.push(PdfOutcome::Moved { file: name });
    }
    if report.is_empty() {
        sink.event(ProgressEvent::info(format!(
            "no PDF found in {}",
            id.archive_name()
        )));
    }

    cleanup.finish()?;
    Ok(report)
}

pub fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> Result<(), PmcError> {
    let file = fs::File::open(archive_path).map_err(|err| {
        PmcError::Archive(format!("open archive {}: {err}", archive_path.display()))
    })?;
    let mut archive = Archive::new(GzDecoder::new(io::BufReader::new(file)));
    archive.set_preserve_permissions(false);
    archive.unpack(target_dir).map_err(|err| {
        PmcError::Archive(format!("extract {}: {err}", archive_path.display()))
    })
}

fn pdf_names(dir: &Path) -> Result<Vec<String>, PmcError> {
    let entries = fs::read_dir(dir).map_err(|err| {
        PmcError::Archive(format!(
            "package directory {} not found after extraction: {err}",
            dir.display()
        ))
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| PmcError::Filesystem(err.to_string()))?;
        let file_type = entry
            .file_type()
            .map_err(|err| PmcError::Filesystem(err.to_string()))?;
        if !file_type.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(PDF_SUFFIX) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;
    use crate::app::SilentSink;

    fn write_archive(dir: &Path, id: &PmcId, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(archive_path(id, dir)).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_package(dir: &Path, id: &PmcId, files: &[(&str, &[u8])]) {
        let entries = files
            .iter()
            .map(|(name, data)| (format!("{}/{name}", id.accession()), *data))
            .collect::<Vec<_>>();
        let entries = entries
            .iter()
            .map(|(path, data)| (path.as_str(), *data))
            .collect::<Vec<_>>();
        write_archive(dir, id, &entries);
    }

    fn dir_listing(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn moves_pdf_and_cleans_up() {
        let temp = tempfile::tempdir().unwrap();
        let id: PmcId = "123".parse().unwrap();
        write_package(
            temp.path(),
            &id,
            &[("foo.pdf", &b"%PDF-1.4"[..]), ("foo.nxml", &b"<article/>"[..])],
        );

        let report = unpack_pdfs(&id, temp.path(), &SilentSink).unwrap();

        assert_eq!(report.moved(), vec!["foo.pdf"]);
        assert_eq!(fs::read(temp.path().join("foo.pdf")).unwrap(), b"%PDF-1.4");
        assert_eq!(dir_listing(temp.path()), vec!["foo.pdf"]);
    }

    #[test]
    fn existing_pdf_is_reported_as_conflict() {
        let temp = tempfile::tempdir().unwrap();
        let id: PmcId = "123".parse().unwrap();
        fs::write(temp.path().join("foo.pdf"), b"old").unwrap();
        write_package(temp.path(), &id, &[("foo.pdf", &b"new"[..]), ("bar.pdf", &b"bar"[..])]);

        let report = unpack_pdfs(&id, temp.path(), &SilentSink).unwrap();

        assert_eq!(report.moved(), vec!["bar.pdf"]);
        assert_eq!(report.conflicts(), vec!["foo.pdf"]);
        assert_eq!(fs::read(temp.path().join("foo.pdf")).unwrap(), b"old");
        assert_eq!(dir_listing(temp.path()), vec!["bar.pdf", "foo.pdf"]);
    }

    #[test]
    fn missing_archive_is_an_archive_error() {
        let temp = tempfile::tempdir().unwrap();
        let id: PmcId = "9".parse().unwrap();
        assert_matches!(
            unpack_pdfs(&id, temp.path(), &SilentSink),
            Err(PmcError::Archive(_))
        );
    }

    #[test]
    fn entries_outside_package_folder_are_removed() {
        let temp = tempfile::tempdir().unwrap();
        let id: PmcId = "7".parse().unwrap();
        write_archive(
            temp.path(),
            &id,
            &[
                ("PMC7/a.pdf", &b"%PDF"[..]),
                ("README.txt", &b"readme"[..]),
                ("supp/x.nxml", &b"<x/>"[..]),
            ],
        );

        let report = unpack_pdfs(&id, temp.path(), &SilentSink).unwrap();

        assert_eq!(report.moved(), vec!["a.pdf"]);
        assert_eq!(dir_listing(temp.path()), vec!["a.pdf"]);
    }

    #[test]
    fn package_without_expected_directory_is_cleaned_up() {
        let temp = tempfile::tempdir().unwrap();
        let id: PmcId = "55".parse().unwrap();
        write_archive(temp.path(), &id, &[("elsewhere/a.pdf", &b"pdf"[..])]);

        let err = unpack_pdfs(&id, temp.path(), &SilentSink).unwrap_err();

        assert_matches!(err, PmcError::Archive(_));
        assert!(dir_listing(temp.path()).is_empty());
    }

    #[test]
    fn corrupt_archive_is_cleaned_up() {
        let temp = tempfile::tempdir().unwrap();
        let id: PmcId = "56".parse().unwrap();
        fs::write(archive_path(&id, temp.path()), b"not gzip at all").unwrap();

        let err = unpack_pdfs(&id, temp.path(), &SilentSink).unwrap_err();

        assert_matches!(err, PmcError::Archive(_));
        assert!(dir_listing(temp.path()).is_empty());
    }
}
