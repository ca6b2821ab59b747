use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{Cid, DatasetKind, StateCode};
use crate::error::PullError;
use crate::store::DataLayout;
use crate::table::Record;

pub type CidStateMap = BTreeMap<Cid, StateCode>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateTotals {
    pub indivs: i64,
    pub pacs: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateRollup {
    pub state: StateCode,
    #[serde(flatten)]
    pub totals: StateTotals,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateMapResult {
    pub candidates: usize,
    pub path: String,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollupResult {
    pub records: usize,
    pub states: Vec<StateRollup>,
    pub path: String,
    pub generated_at: String,
}

fn field<'r>(record: &'r Record, name: &str, origin: &str) -> Result<&'r str, PullError> {
    record.get(name).ok_or_else(|| PullError::MissingColumn {
        path: origin.to_string(),
        column: name.to_string(),
    })
}

/// Builds the id → state lookup from summary rows (`cid`, `state` columns).
pub fn cid_state_map(records: &[Record], origin: &str) -> Result<CidStateMap, PullError> {
    let mut map = CidStateMap::new();
    for record in records {
        let cid: Cid = field(record, "cid", origin)?.parse()?;
        let state: StateCode = field(record, "state", origin)?.parse()?;
        map.insert(cid, state);
    }
    Ok(map)
}

/// Derives the lookup from the consolidated summaries and stores it as
/// `cid_states.csv` next to the dataset directories.
pub fn write_cid_state_map(layout: &DataLayout) -> Result<StateMapResult, PullError> {
    let source = layout.master_path(DatasetKind::Summaries);
    let map = cid_state_map(&DataLayout::read_table(&source)?, source.as_str())?;
    if map.is_empty() {
        return Err(PullError::NothingToConsolidate(source.to_string()));
    }
    let rows: Vec<Record> = map
        .iter()
        .map(|(cid, state)| {
            Record::new()
                .with("cid", cid.as_str())
                .with("state", state.as_str())
        })
        .collect();
    let path = layout.cid_state_map_path();
    DataLayout::write_table_atomic(&path, &rows)?;
    tracing::info!(candidates = map.len(), %path, "cid state map written");
    Ok(StateMapResult {
        candidates: map.len(),
        path: path.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
    })
}

/// Reads the stored lookup, deriving it from the summaries when absent.
pub fn load_cid_state_map(layout: &DataLayout) -> Result<CidStateMap, PullError> {
    let stored = layout.cid_state_map_path();
    let source = if stored.as_std_path().exists() {
        stored
    } else {
        layout.master_path(DatasetKind::Summaries)
    };
    cid_state_map(&DataLayout::read_table(&source)?, source.as_str())
}

fn amount(record: &Record, name: &str, origin: &str) -> Result<i64, PullError> {
    let raw = field(record, name, origin)?.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(value);
    }
    let not_a_number =
        || PullError::DataShape(format!("{origin}: `{name}` is not a number: {raw:?}"));
    let value = raw.parse::<f64>().map_err(|_| not_a_number())?.round();
    // NaN and infinities parse as f64 but are not amounts
    if !value.is_finite() {
        return Err(not_a_number());
    }
    if value < i64::MIN as f64 || value >= i64::MAX as f64 {
        return Err(PullError::DataShape(format!(
            "{origin}: `{name}` is out of range: {raw:?}"
        )));
    }
    Ok(value as i64)
}

fn accumulate(
    sum: &mut i64,
    value: i64,
    name: &str,
    state: &StateCode,
) -> Result<(), PullError> {
    *sum = sum.checked_add(value).ok_or_else(|| {
        PullError::DataShape(format!("`{name}` total for {state} overflows"))
    })?;
    Ok(())
}

/// Sums `indivs`, `pacs` and `total` per state. Every canonical state is
/// present, zero when no record maps to it; a record whose candidate has no
/// state is an error rather than dropped.
pub fn sector_rollup(
    records: &[Record],
    states: &CidStateMap,
    origin: &str,
) -> Result<BTreeMap<StateCode, StateTotals>, PullError> {
    let mut result: BTreeMap<StateCode, StateTotals> = StateCode::all()
        .map(|state| (state, StateTotals::default()))
        .collect();

    for record in records {
        let cid: Cid = field(record, "cid", origin)?.parse()?;
        let state = states
            .get(&cid)
            .ok_or_else(|| PullError::UnmappedCandidate(cid.to_string()))?;
        let totals = result
            .get_mut(state)
            .ok_or_else(|| PullError::InvalidState(state.to_string()))?;
        accumulate(&mut totals.indivs, amount(record, "indivs", origin)?, "indivs", state)?;
        accumulate(&mut totals.pacs, amount(record, "pacs", origin)?, "pacs", state)?;
        accumulate(&mut totals.total, amount(record, "total", origin)?, "total", state)?;
    }
    Ok(result)
}

/// Rolls the consolidated sector table up by state and writes
/// `state_sector_totals.csv` in canonical state order.
pub fn rollup_sectors(layout: &DataLayout) -> Result<RollupResult, PullError> {
    let source = layout.master_path(DatasetKind::Sectors);
    let records = DataLayout::read_table(&source)?;
    let states = load_cid_state_map(layout)?;
    let mut totals = sector_rollup(&records, &states, source.as_str())?;

    let rollup: Vec<StateRollup> = StateCode::all()
        .map(|state| {
            let totals = totals.remove(&state).unwrap_or_default();
            StateRollup { state, totals }
        })
        .collect();
    let rows: Vec<Record> = rollup
        .iter()
        .map(|entry| {
            Record::new()
                .with("state", entry.state.as_str())
                .with("indivs", entry.totals.indivs.to_string())
                .with("pacs", entry.totals.pacs.to_string())
                .with("total", entry.totals.total.to_string())
        })
        .collect();

    let path = layout.state_rollup_path();
    DataLayout::write_table_atomic(&path, &rows)?;
    tracing::info!(records = records.len(), %path, "state sector totals written");
    Ok(RollupResult {
        records: records.len(),
        states: rollup,
        path: path.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
    })
}
