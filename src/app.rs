use std::time::Duration;

use serde::Serialize;

use crate::aggregate::{self, RollupResult, StateMapResult};
use crate::client::FinanceClient;
use crate::config::{KnownFailures, ResolvedConfig};
use crate::consolidate::{self, ConsolidateResult};
use crate::domain::{Cycle, DatasetKind, ResourceKind};
use crate::error::PullError;
use crate::pull::{self, PullReport};
use crate::roster::{self, CaptureReport};
use crate::store::DataLayout;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Forwards progress to the `tracing` subscriber.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                latency_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!("{}", event.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PullSettings {
    pub cycle: Option<Cycle>,
    pub throttle: Duration,
    pub known_failures: KnownFailures,
}

impl From<&ResolvedConfig> for PullSettings {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            cycle: Some(config.cycle),
            throttle: config.throttle,
            known_failures: config.known_failures.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub dataset: DatasetKind,
    pub files: Option<usize>,
    pub consolidated: bool,
}

/// The independently invokable operations, each resumable by running it again.
pub struct App<C: FinanceClient> {
    layout: DataLayout,
    client: C,
    settings: PullSettings,
}

impl<C: FinanceClient> App<C> {
    pub fn new(layout: DataLayout, client: C, settings: PullSettings) -> Self {
        Self {
            layout,
            client,
            settings,
        }
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn capture_rosters(
        &self,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<CaptureReport, PullError> {
        sink.event(ProgressEvent {
            message: "phase=Resolve; capturing state rosters".to_string(),
            elapsed: None,
        });
        roster::capture_all_rosters(
            &self.client,
            &self.layout,
            self.settings.throttle,
            force,
            sink,
        )
    }

    pub fn pull(
        &self,
        kind: ResourceKind,
        sink: &dyn ProgressSink,
    ) -> Result<PullReport, PullError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; pulling {kind} for all candidates"),
            elapsed: None,
        });
        pull::pull_all(
            &self.client,
            &self.layout,
            kind,
            self.settings.cycle,
            self.settings.known_failures.for_kind(kind),
            sink,
        )
    }

    pub fn consolidate(
        &self,
        kind: DatasetKind,
        sink: &dyn ProgressSink,
    ) -> Result<ConsolidateResult, PullError> {
        sink.event(ProgressEvent {
            message: format!("phase=Consolidate; {kind}"),
            elapsed: None,
        });
        consolidate::consolidate(&self.layout, kind)
    }

    pub fn state_map(&self, sink: &dyn ProgressSink) -> Result<StateMapResult, PullError> {
        sink.event(ProgressEvent {
            message: "phase=Aggregate; building candidate state map".to_string(),
            elapsed: None,
        });
        aggregate::write_cid_state_map(&self.layout)
    }

    pub fn rollup(&self, sink: &dyn ProgressSink) -> Result<RollupResult, PullError> {
        sink.event(ProgressEvent {
            message: "phase=Aggregate; summing sectors by state".to_string(),
            elapsed: None,
        });
        aggregate::rollup_sectors(&self.layout)
    }

    /// File counts per dataset directory; `None` when the directory is absent.
    pub fn status(&self) -> Result<Vec<StatusEntry>, PullError> {
        let kinds = [
            DatasetKind::States,
            DatasetKind::Sectors,
            DatasetKind::Industries,
            DatasetKind::Contributors,
            DatasetKind::Summaries,
        ];
        let mut entries = Vec::new();
        for kind in kinds {
            let dir = self.layout.dataset_dir(kind);
            let files = match DataLayout::list_data_files(&dir) {
                Ok(files) => Some(files.len()),
                Err(PullError::MissingDirectory(_)) => None,
                Err(err) => return Err(err),
            };
            entries.push(StatusEntry {
                dataset: kind,
                files,
                consolidated: self.layout.master_path(kind).as_std_path().exists(),
            });
        }
        Ok(entries)
    }
}
