#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use campaign_finance_puller::app::{ProgressEvent, ProgressSink};
use campaign_finance_puller::client::{AttributedRows, FinanceClient};
use campaign_finance_puller::domain::{Cid, Cycle, StateCode};
use campaign_finance_puller::error::PullError;
use campaign_finance_puller::store::DataLayout;
use campaign_finance_puller::table::Record;

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    NotFound,
    Empty,
    RateLimit,
}

/// Answers every candidate with one sector/industry/contributor row unless a
/// scripted reply is registered for it. Records every call it receives.
#[derive(Default)]
pub struct MockClient {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn with_reply(mut self, id: &str, reply: Reply) -> Self {
        self.replies.insert(id.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, id: &str) -> Result<(), PullError> {
        self.calls.lock().unwrap().push(id.to_string());
        match self.replies.get(id) {
            None => Ok(()),
            Some(Reply::NotFound) => Err(PullError::ClientStatus {
                status: 404,
                message: "not found".to_string(),
            }),
            Some(Reply::Empty) => Err(PullError::DataShape("no records".to_string())),
            Some(Reply::RateLimit) => Err(PullError::RateLimit(
                "call limit has been reached".to_string(),
            )),
        }
    }

    fn sheet(&self, cid: &Cid, cycle: Option<Cycle>) -> Result<AttributedRows, PullError> {
        self.record_call(cid.as_str())?;
        let cycle = cycle.map(|cycle| cycle.to_string()).unwrap_or_default();
        Ok(AttributedRows {
            attributes: Record::new()
                .with("cid", cid.as_str())
                .with("cycle", cycle)
                .with("last_updated", "10/19/2022")
                .with("source", "https://www.opensecrets.org"),
            rows: vec![
                Record::new()
                    .with("sector_name", "Transportation")
                    .with("indivs", "238492")
                    .with("pacs", "216526")
                    .with("total", "455018"),
                Record::new()
                    .with("sector_name", "Finance")
                    .with("indivs", "100")
                    .with("pacs", "50")
                    .with("total", "150"),
            ],
        })
    }
}

impl FinanceClient for MockClient {
    fn legislators_for_state(&self, state: &StateCode) -> Result<Vec<Record>, PullError> {
        self.record_call(state.as_str())?;
        Ok(vec![
            Record::new()
                .with("cid", format!("N{}0001", state.as_str()))
                .with("firstlast", "First Member")
                .with("office", format!("{}01", state.as_str())),
            Record::new()
                .with("cid", format!("N{}0002", state.as_str()))
                .with("firstlast", "Second Member")
                .with("office", format!("{}S1", state.as_str())),
        ])
    }

    fn summary(&self, cid: &Cid, cycle: Option<Cycle>) -> Result<Record, PullError> {
        self.record_call(cid.as_str())?;
        Ok(Record::new()
            .with("cid", cid.as_str())
            .with("state", "NJ")
            .with("cycle", cycle.map(|cycle| cycle.to_string()).unwrap_or_default())
            .with("total", "2018825.46"))
    }

    fn contributors(
        &self,
        cid: &Cid,
        cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        self.sheet(cid, cycle)
    }

    fn top_industries(
        &self,
        cid: &Cid,
        cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        self.sheet(cid, cycle)
    }

    fn sector_totals(
        &self,
        cid: &Cid,
        cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        self.sheet(cid, cycle)
    }
}

pub fn temp_layout() -> (TempDir, DataLayout) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    std::fs::create_dir_all(root.as_std_path()).unwrap();
    (temp, DataLayout::new(root))
}

pub fn write_file(path: &Utf8Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent.as_std_path()).unwrap();
    }
    std::fs::write(path.as_std_path(), content).unwrap();
}

pub fn cid(value: &str) -> Cid {
    value.parse().unwrap()
}
