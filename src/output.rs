use std::io::{self, Write};

use serde::Serialize;

use crate::aggregate::{RollupResult, StateMapResult};
use crate::app::{ProgressEvent, ProgressSink, StatusEntry};
use crate::consolidate::ConsolidateResult;
use crate::pull::PullReport;
use crate::roster::CaptureReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_capture(report: &CaptureReport) {
        println!("Rosters written: {}", report.written.len());
        for written in &report.written {
            println!("  {} ({} legislators) -> {}", written.state, written.rows, written.path);
        }
        if !report.skipped.is_empty() {
            println!("Already captured: {}", report.skipped.join(", "));
        }
        print_failures(report.failures.iter().map(|failure| failure.label()));
    }

    pub fn print_pull(report: &PullReport) {
        println!(
            "{}: {} fetched, {} skipped across {} rosters",
            report.resource, report.fetched, report.skipped, report.rosters
        );
        print_failures(report.failures.iter().map(|failure| failure.label()));
    }

    pub fn print_consolidate(result: &ConsolidateResult) {
        println!(
            "Saved {} records from {} files to {}",
            result.rows, result.files, result.path
        );
    }

    pub fn print_state_map(result: &StateMapResult) {
        println!("Mapped {} candidates to states in {}", result.candidates, result.path);
    }

    pub fn print_rollup(result: &RollupResult) {
        println!("{:<6}{:>16}{:>16}{:>16}", "state", "indivs", "pacs", "total");
        for entry in &result.states {
            println!(
                "{:<6}{:>16}{:>16}{:>16}",
                entry.state.as_str(),
                entry.totals.indivs,
                entry.totals.pacs,
                entry.totals.total
            );
        }
        println!("{} sector records rolled up into {}", result.records, result.path);
    }

    pub fn print_status(entries: &[StatusEntry]) {
        for entry in entries {
            let files = entry
                .files
                .map(|count| count.to_string())
                .unwrap_or_else(|| "missing".to_string());
            let master = if entry.consolidated { "consolidated" } else { "-" };
            println!("{:<14}{:>10}  {master}", entry.dataset.dir_name(), files);
        }
    }
}

fn print_failures(labels: impl Iterator<Item = String>) {
    let labels: Vec<String> = labels.collect();
    if labels.is_empty() {
        println!("No failures.");
    } else {
        println!("The following failed to fetch ({}): {}", labels.len(), labels.join(", "));
    }
}
