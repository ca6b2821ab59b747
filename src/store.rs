use std::collections::BTreeSet;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::{Cid, DatasetKind, ResourceKind, StateCode};
use crate::error::PullError;
use crate::table::{self, Record};

pub const MASTER_FILE_NAME: &str = "ALL_CANDIDATES.csv";
pub const DATA_EXTENSION: &str = "csv";

/// On-disk layout rooted at the data directory (`./data` by default).
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: Utf8PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn rosters_dir(&self) -> Utf8PathBuf {
        self.dataset_dir(DatasetKind::States)
    }

    pub fn roster_path(&self, state: &StateCode) -> Utf8PathBuf {
        self.rosters_dir()
            .join(format!("{}.{DATA_EXTENSION}", state.as_str()))
    }

    pub fn resource_dir(&self, kind: ResourceKind) -> Utf8PathBuf {
        self.dataset_dir(kind.into())
    }

    pub fn dataset_dir(&self, kind: DatasetKind) -> Utf8PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn candidate_path(&self, kind: ResourceKind, cid: &Cid) -> Utf8PathBuf {
        self.resource_dir(kind)
            .join(format!("{}.{DATA_EXTENSION}", cid.as_str()))
    }

    pub fn master_path(&self, kind: DatasetKind) -> Utf8PathBuf {
        self.dataset_dir(kind).join(MASTER_FILE_NAME)
    }

    pub fn cid_state_map_path(&self) -> Utf8PathBuf {
        self.root.join("cid_states.csv")
    }

    pub fn state_rollup_path(&self) -> Utf8PathBuf {
        self.root.join("state_sector_totals.csv")
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), PullError> {
        fs::create_dir_all(path.as_std_path()).map_err(|err| PullError::Filesystem(err.to_string()))
    }

    /// Per-ID data files in `dir`, sorted by name. Hidden files, temp files,
    /// subdirectories, foreign extensions and the master table are skipped.
    pub fn list_data_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, PullError> {
        if !dir.as_std_path().is_dir() {
            return Err(PullError::MissingDirectory(dir.as_std_path().to_path_buf()));
        }
        let entries = dir
            .read_dir_utf8()
            .map_err(|err| PullError::Filesystem(format!("read {dir}: {err}")))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| PullError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if !path.is_file() || !is_data_file(path) {
                tracing::debug!(path = %path, "skipping non-data artifact");
                continue;
            }
            files.push(path.to_path_buf());
        }
        files.sort();
        Ok(files)
    }

    /// Candidate ids already captured in `dir`, derived from file stems.
    pub fn list_ids(dir: &Utf8Path) -> Result<BTreeSet<Cid>, PullError> {
        let mut ids = BTreeSet::new();
        for path in Self::list_data_files(dir)? {
            let Some(stem) = path.file_stem() else {
                continue;
            };
            match stem.parse::<Cid>() {
                Ok(cid) => {
                    ids.insert(cid);
                }
                Err(_) => tracing::debug!(path = %path, "file name is not a candidate id"),
            }
        }
        Ok(ids)
    }

    pub fn read_table(path: &Utf8Path) -> Result<Vec<Record>, PullError> {
        let file = fs::File::open(path.as_std_path())
            .map_err(|err| PullError::Filesystem(format!("open {path}: {err}")))?;
        table::read_records(file)
    }

    /// Writes the table to a temp file beside `path` and renames it into place,
    /// so readers never see a half-written file.
    pub fn write_table_atomic(path: &Utf8Path, records: &[Record]) -> Result<(), PullError> {
        let parent = path
            .parent()
            .ok_or_else(|| PullError::Filesystem("invalid destination path".to_string()))?;
        Self::ensure_dir(parent)?;
        let mut temp = Builder::new()
            .prefix(".cfp-table")
            .suffix(".tmp")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| PullError::Filesystem(err.to_string()))?;
        table::write_records(temp.as_file_mut(), records)?;
        temp.as_file_mut()
            .flush()
            .map_err(|err| PullError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| PullError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn is_data_file(path: &Utf8Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    !name.starts_with('.')
        && name != MASTER_FILE_NAME
        && path.extension() == Some(DATA_EXTENSION)
}
