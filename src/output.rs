use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ItemStatus, RunReport};
use crate::fetcher::FetchOutcome;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(result: &RunReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_ids(ids: &[String]) -> io::Result<()> {
        Self::print_json(&ids)
    }

    pub fn print_fetch(result: &FetchOutcome) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_run_summary(report: &RunReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!(
        "{cyan}PMC PDF summary for {:?} -> {}{reset}",
        report.search_term, report.download_dir
    );
    println!(
        "{green}ids: {}  extracted: {}  pdfs: {}{reset}",
        report.summary.ids, report.summary.extracted, report.summary.pdfs
    );
    println!(
        "{yellow}skipped: {}  conflicts: {}{reset}  {red}failed: {}{reset}",
        report.summary.skipped, report.summary.conflicts, report.summary.failed
    );

    for item in &report.items {
        let (color, detail) = match &item.status {
            ItemStatus::Extracted { moved, conflicts } if conflicts.is_empty() => {
                (green, moved.join(", "))
            }
            ItemStatus::Extracted { moved, conflicts } => (
                yellow,
                format!("{} (already present: {})", moved.join(", "), conflicts.join(", ")),
            ),
            ItemStatus::NoPdf => (yellow, "no PDF in package".to_string()),
            ItemStatus::NotInFileList => (yellow, "not in OA file list".to_string()),
            ItemStatus::InvalidId { message }
            | ItemStatus::DownloadFailed { message }
            | ItemStatus::UnpackFailed { message } => (red, message.clone()),
            ItemStatus::DownloadRejected { status } => (red, format!("HTTP {status}")),
        };
        println!("{color}  {}: {detail}{reset}", item.id);
    }
}
