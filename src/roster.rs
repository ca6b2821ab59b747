use std::fs;
use std::thread;
use std::time::Duration;

use camino::Utf8Path;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::client::FinanceClient;
use crate::domain::{Cid, StateCode};
use crate::error::PullError;
use crate::pull::SoftFailure;
use crate::store::DataLayout;
use crate::table;

pub const CID_COLUMN: &str = "cid";

/// Candidate ids of one roster file, in file order. Roster files are
/// authoritative input, so a row without a usable `cid` is an error.
pub fn read_candidate_ids(path: &Utf8Path) -> Result<Vec<Cid>, PullError> {
    let file = fs::File::open(path.as_std_path())
        .map_err(|err| PullError::Filesystem(format!("open {path}: {err}")))?;
    let mut reader = csv::Reader::from_reader(file);
    let column = reader
        .headers()?
        .iter()
        .position(|header| header == CID_COLUMN)
        .ok_or_else(|| missing_cid(path, None))?;

    let mut ids = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row?;
        let value = row
            .get(column)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| missing_cid(path, Some(index + 1)))?;
        ids.push(value.parse()?);
    }
    Ok(ids)
}

fn missing_cid(path: &Utf8Path, row: Option<usize>) -> PullError {
    PullError::MissingColumn {
        path: match row {
            Some(row) => format!("{path} row {row}"),
            None => path.to_string(),
        },
        column: CID_COLUMN.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterWritten {
    pub state: String,
    pub rows: usize,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureReport {
    pub written: Vec<RosterWritten>,
    pub skipped: Vec<String>,
    pub failures: Vec<SoftFailure>,
}

/// Fetches one state's legislators and writes `states/{STATE}.csv`.
pub fn capture_state_roster<C: FinanceClient + ?Sized>(
    client: &C,
    layout: &DataLayout,
    state: &StateCode,
) -> Result<RosterWritten, PullError> {
    let records = client.legislators_for_state(state)?;
    if let Some(index) = table::find_mismatch(&records) {
        return Err(PullError::DataShape(format!(
            "legislator {index} of {state} has a different field set"
        )));
    }
    let path = layout.roster_path(state);
    DataLayout::write_table_atomic(&path, &records)?;
    tracing::info!(%state, rows = records.len(), %path, "roster written");
    Ok(RosterWritten {
        state: state.to_string(),
        rows: records.len(),
        path: path.to_string(),
    })
}

/// Captures every canonical state's roster, sleeping `throttle` between calls.
/// Existing roster files are kept unless `force` is set.
pub fn capture_all_rosters<C: FinanceClient + ?Sized>(
    client: &C,
    layout: &DataLayout,
    throttle: Duration,
    force: bool,
    sink: &dyn ProgressSink,
) -> Result<CaptureReport, PullError> {
    DataLayout::ensure_dir(&layout.rosters_dir())?;
    let mut report = CaptureReport::default();
    let mut called = false;

    for state in StateCode::all() {
        if !force && layout.roster_path(&state).as_std_path().exists() {
            report.skipped.push(state.to_string());
            continue;
        }
        if called && !throttle.is_zero() {
            thread::sleep(throttle);
        }
        called = true;

        sink.event(ProgressEvent {
            message: format!("phase=Roster; capturing {state}"),
            elapsed: None,
        });
        match capture_state_roster(client, layout, &state) {
            Ok(written) => report.written.push(written),
            Err(PullError::RateLimit(message)) => {
                tracing::warn!(%state, "rate limit reached during roster capture");
                return Err(PullError::RunAborted {
                    message,
                    failures: report.failures.iter().map(SoftFailure::label).collect(),
                });
            }
            Err(err) if err.is_soft() => {
                tracing::warn!(%state, error = %err, "roster capture failed");
                report.failures.push(SoftFailure {
                    source: "legislators".to_string(),
                    id: state.to_string(),
                    message: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(report)
}
