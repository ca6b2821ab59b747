use std::collections::BTreeSet;

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::client::{AttributedRows, FinanceClient};
use crate::domain::{Cid, Cycle, ResourceKind};
use crate::error::PullError;
use crate::roster;
use crate::store::DataLayout;
use crate::table::{self, Record};

/// A candidate (or state) whose fetch failed without ending the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftFailure {
    pub source: String,
    pub id: String,
    pub message: String,
}

impl SoftFailure {
    /// `{source}_{id}`, e.g. `NJ_N00036154`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.source, self.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    pub resource: ResourceKind,
    pub rosters: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub failures: Vec<SoftFailure>,
}

/// Fetches one candidate's resource and shapes it into the rows of its file.
pub fn fetch_records<C: FinanceClient + ?Sized>(
    client: &C,
    kind: ResourceKind,
    cid: &Cid,
    cycle: Option<Cycle>,
) -> Result<Vec<Record>, PullError> {
    let records = match kind {
        ResourceKind::Sectors => with_provenance(client.sector_totals(cid, cycle)?)?,
        ResourceKind::Industries => with_provenance(client.top_industries(cid, cycle)?)?,
        ResourceKind::Contributors => {
            let sheet = client.contributors(cid, cycle)?;
            let cycle = sheet.attribute("cycle")?.to_string();
            let source = sheet.attribute("source")?.to_string();
            sheet
                .rows
                .into_iter()
                .map(|row| {
                    row.with("cycle", cycle.as_str())
                        .with("source", source.as_str())
                        .with("cid", cid.as_str())
                })
                .collect()
        }
        ResourceKind::Summaries => vec![client.summary(cid, cycle)?],
    };

    if let Some(index) = table::find_mismatch(&records) {
        return Err(PullError::DataShape(format!(
            "{kind} row {index} for {cid} has a different field set"
        )));
    }
    Ok(records)
}

fn with_provenance(sheet: AttributedRows) -> Result<Vec<Record>, PullError> {
    let last_updated = sheet.attribute("last_updated")?.to_string();
    let cycle = sheet.attribute("cycle")?.to_string();
    Ok(sheet
        .rows
        .into_iter()
        .map(|row| {
            row.with("last_updated", last_updated.as_str())
                .with("cycle", cycle.as_str())
        })
        .collect())
}

/// Drives fetches for one resource type. The skip-set is computed once, when
/// the dispatcher is built, and every attempted id joins it before its call.
pub struct Dispatcher<'a, C: FinanceClient + ?Sized> {
    client: &'a C,
    layout: &'a DataLayout,
    kind: ResourceKind,
    cycle: Option<Cycle>,
    skip: BTreeSet<Cid>,
    fetched: usize,
    skipped: usize,
}

impl<'a, C: FinanceClient + ?Sized> Dispatcher<'a, C> {
    /// Fails when the resource directory does not exist.
    pub fn new(
        client: &'a C,
        layout: &'a DataLayout,
        kind: ResourceKind,
        cycle: Option<Cycle>,
        known_failures: &BTreeSet<Cid>,
    ) -> Result<Self, PullError> {
        let skip = skip_set(layout, kind, known_failures)?;
        tracing::debug!(resource = %kind, resolved = skip.len(), "skip-set computed");
        Ok(Self {
            client,
            layout,
            kind,
            cycle,
            skip,
            fetched: 0,
            skipped: 0,
        })
    }

    pub fn skip_set(&self) -> &BTreeSet<Cid> {
        &self.skip
    }

    pub fn fetched(&self) -> usize {
        self.fetched
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Runs the ids of one roster. Soft failures are returned tagged with
    /// `roster`; a rate limit ends the dispatch with `RunAborted`, carrying the
    /// soft failures seen so far in this roster. Files already written stay.
    pub fn dispatch(
        &mut self,
        roster: &str,
        cids: &[Cid],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<SoftFailure>, PullError> {
        let mut failures = Vec::new();
        for cid in cids {
            if self.skip.contains(cid) {
                tracing::debug!(%cid, "already resolved, skipping");
                self.skipped += 1;
                continue;
            }
            self.skip.insert(cid.clone());

            sink.event(ProgressEvent {
                message: format!("phase=Fetch; {} {cid}", self.kind),
                elapsed: None,
            });
            let start = std::time::Instant::now();
            let records = match fetch_records(self.client, self.kind, cid, self.cycle) {
                Ok(records) => records,
                Err(PullError::RateLimit(message)) => {
                    tracing::warn!(%cid, roster, "rate limit reached, aborting");
                    return Err(PullError::RunAborted {
                        message,
                        failures: failures.iter().map(SoftFailure::label).collect(),
                    });
                }
                Err(err) if err.is_soft() => {
                    tracing::warn!(%cid, roster, error = %err, "fetch failed");
                    failures.push(SoftFailure {
                        source: roster.to_string(),
                        id: cid.to_string(),
                        message: err.to_string(),
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            let path = self.layout.candidate_path(self.kind, cid);
            DataLayout::write_table_atomic(&path, &records)?;
            self.fetched += 1;
            sink.event(ProgressEvent {
                message: format!("phase=Store; wrote {path}"),
                elapsed: Some(start.elapsed()),
            });
        }
        Ok(failures)
    }
}

/// Ids on disk for `kind` plus the known failures.
pub fn skip_set(
    layout: &DataLayout,
    kind: ResourceKind,
    known_failures: &BTreeSet<Cid>,
) -> Result<BTreeSet<Cid>, PullError> {
    let mut skip = DataLayout::list_ids(&layout.resource_dir(kind))?;
    skip.extend(known_failures.iter().cloned());
    Ok(skip)
}

/// Pulls `kind` for every candidate of every roster in `states/`.
///
/// Soft failures are collected into the report. A rate limit stops the run
/// before any later roster and surfaces as `RunAborted` with every soft
/// failure accumulated up to that point.
pub fn pull_all<C: FinanceClient + ?Sized>(
    client: &C,
    layout: &DataLayout,
    kind: ResourceKind,
    cycle: Option<Cycle>,
    known_failures: &BTreeSet<Cid>,
    sink: &dyn ProgressSink,
) -> Result<PullReport, PullError> {
    let rosters = DataLayout::list_data_files(&layout.rosters_dir())?;
    DataLayout::ensure_dir(&layout.resource_dir(kind))?;
    let mut dispatcher = Dispatcher::new(client, layout, kind, cycle, known_failures)?;
    let mut failures: Vec<SoftFailure> = Vec::new();

    for roster_path in &rosters {
        let roster_name = roster_path.file_stem().unwrap_or(roster_path.as_str());
        tracing::info!(resource = %kind, roster = roster_name, "working on roster");
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; roster {roster_name}"),
            elapsed: None,
        });
        let cids = roster::read_candidate_ids(roster_path)?;

        match dispatcher.dispatch(roster_name, &cids, sink) {
            Ok(found) => failures.extend(found),
            Err(PullError::RunAborted {
                message,
                failures: in_roster,
            }) => {
                let mut labels: Vec<String> = failures.iter().map(SoftFailure::label).collect();
                labels.extend(in_roster);
                tracing::warn!(
                    resource = %kind,
                    fetched = dispatcher.fetched(),
                    failures = labels.len(),
                    "run aborted by rate limit"
                );
                return Err(PullError::RunAborted {
                    message,
                    failures: labels,
                });
            }
            Err(err) => return Err(err),
        }
        tracing::info!(roster = roster_name, "roster complete");
    }

    tracing::info!(
        resource = %kind,
        fetched = dispatcher.fetched(),
        skipped = dispatcher.skipped(),
        failures = failures.len(),
        "pull complete"
    );
    Ok(PullReport {
        resource: kind,
        rosters: rosters.len(),
        fetched: dispatcher.fetched(),
        skipped: dispatcher.skipped(),
        failures,
    })
}
