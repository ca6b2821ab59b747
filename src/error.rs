use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PullError {
    #[error("invalid candidate id: {0}")]
    InvalidCid(String),

    #[error("invalid state code: {0}")]
    InvalidState(String),

    #[error("invalid election cycle (expected an even year): {0}")]
    InvalidCycle(String),

    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing API key (set OPENSECRETS_API_KEY or api_key in the config file)")]
    #[diagnostic(help("request a key at https://www.opensecrets.org/api/admin/index.php"))]
    MissingApiKey,

    #[error("API call limit reached: {0}")]
    #[diagnostic(help("the daily quota is exhausted; rerun tomorrow to resume"))]
    RateLimit(String),

    #[error("OpenSecrets request failed: {0}")]
    Http(String),

    #[error("OpenSecrets returned status {status}: {message}")]
    ClientStatus { status: u16, message: String },

    #[error("unexpected data shape: {0}")]
    DataShape(String),

    #[error("directory not found: {0}")]
    #[diagnostic(help("create the directory first if this is the first run"))]
    MissingDirectory(PathBuf),

    #[error("{path}: missing required column `{column}`")]
    MissingColumn { path: String, column: String },

    #[error("{path}: columns {found:?} do not match the first record's columns {expected:?}")]
    HeaderMismatch {
        path: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("no records to consolidate in {0}")]
    NothingToConsolidate(String),

    #[error("candidate {0} has no state mapping")]
    UnmappedCandidate(String),

    #[error("run aborted after {} soft failure(s): {message}", .failures.len())]
    #[diagnostic(help("progress on disk is kept; rerun the same command to resume"))]
    RunAborted {
        message: String,
        failures: Vec<String>,
    },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl PullError {
    /// Errors recorded per candidate during a pull without stopping the run.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            PullError::Http(_) | PullError::ClientStatus { .. } | PullError::DataShape(_)
        )
    }
}

impl From<csv::Error> for PullError {
    fn from(err: csv::Error) -> Self {
        PullError::Csv(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_classification() {
        assert!(PullError::DataShape("empty".to_string()).is_soft());
        assert!(
            PullError::ClientStatus {
                status: 404,
                message: "not found".to_string()
            }
            .is_soft()
        );
        assert!(!PullError::RateLimit("call limit has been reached".to_string()).is_soft());
        assert!(!PullError::Filesystem("denied".to_string()).is_soft());
    }
}
