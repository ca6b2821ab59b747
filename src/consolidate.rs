use serde::Serialize;

use crate::domain::{DatasetKind, StateCode};
use crate::error::PullError;
use crate::store::DataLayout;
use crate::table::Record;

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidateResult {
    pub dataset: DatasetKind,
    pub files: usize,
    pub rows: usize,
    pub path: String,
    pub generated_at: String,
}

/// Reads every per-ID file of `kind` and normalizes its rows:
/// rosters gain `state` from the office code, every other type except
/// summaries gets `cid` from the file stem (replacing any value in the row).
/// Returns the number of files read alongside the rows.
pub fn collect_records(
    layout: &DataLayout,
    kind: DatasetKind,
) -> Result<(usize, Vec<Record>), PullError> {
    let dir = layout.dataset_dir(kind);
    let files = DataLayout::list_data_files(&dir)?;
    tracing::info!(dataset = %kind, files = files.len(), %dir, "consolidating");

    let mut all = Vec::new();
    let mut headers: Option<Vec<String>> = None;
    for path in &files {
        let stem = path
            .file_stem()
            .ok_or_else(|| PullError::Filesystem(format!("unnamed file in {dir}")))?;
        let mut records = DataLayout::read_table(path)?;
        for record in &mut records {
            match kind {
                DatasetKind::States => {
                    let office = record.get("office").ok_or_else(|| PullError::MissingColumn {
                        path: path.to_string(),
                        column: "office".to_string(),
                    })?;
                    let state = StateCode::from_office(office)
                        .map_err(|err| PullError::DataShape(format!("{path}: {err}")))?;
                    record.set("state", state.as_str());
                }
                DatasetKind::Summaries => {}
                DatasetKind::Sectors | DatasetKind::Industries | DatasetKind::Contributors => {
                    record.set("cid", stem);
                }
            }
        }

        // every row must carry the first row's field set
        for record in &records {
            let found: Vec<String> = record.names().map(str::to_string).collect();
            if let Some(expected) = &headers {
                if !same_fields(expected, &found) {
                    return Err(PullError::HeaderMismatch {
                        path: path.to_string(),
                        expected: expected.clone(),
                        found,
                    });
                }
            } else {
                headers = Some(found);
            }
        }
        tracing::debug!(%path, rows = records.len(), "file read");
        all.extend(records);
    }

    if all.is_empty() {
        return Err(PullError::NothingToConsolidate(dir.to_string()));
    }
    Ok((files.len(), all))
}

fn same_fields(expected: &[String], found: &[String]) -> bool {
    expected.len() == found.len() && expected.iter().all(|name| found.contains(name))
}

/// Writes `{type}/ALL_CANDIDATES.csv`. Nothing is written when any file
/// disagrees with the first record's columns.
pub fn consolidate(layout: &DataLayout, kind: DatasetKind) -> Result<ConsolidateResult, PullError> {
    let (files, records) = collect_records(layout, kind)?;
    let path = layout.master_path(kind);
    DataLayout::write_table_atomic(&path, &records)?;
    tracing::info!(dataset = %kind, rows = records.len(), %path, "master table written");
    Ok(ConsolidateResult {
        dataset: kind,
        files,
        rows: records.len(),
        path: path.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
    })
}
