use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PullError;

static CID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("candidate id pattern is valid")
});

/// Every state code the legislators endpoint accepts, in capture order.
pub const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "AS", "GU", "MP", "PR", "VI",
];

/// OpenSecrets candidate identifier, e.g. `N00036154`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cid {
    type Err = PullError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !CID_PATTERN.is_match(trimmed) {
            return Err(PullError::InvalidCid(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for Cid {
    type Error = PullError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cid> for String {
    fn from(value: Cid) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct StateCode(&'static str);

impl StateCode {
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn all() -> impl Iterator<Item = StateCode> {
        STATE_CODES.iter().map(|code| StateCode(*code))
    }

    /// Leading two characters of an office code such as `NJS1` or `NY12`.
    /// The prefix must be a canonical state code.
    pub fn from_office(office: &str) -> Result<Self, PullError> {
        office
            .get(..2)
            .and_then(|prefix| prefix.parse().ok())
            .ok_or_else(|| PullError::InvalidState(office.to_string()))
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StateCode {
    type Err = PullError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_uppercase();
        STATE_CODES
            .iter()
            .find(|code| **code == normalized)
            .map(|code| StateCode(*code))
            .ok_or_else(|| PullError::InvalidState(value.to_string()))
    }
}

impl From<StateCode> for String {
    fn from(value: StateCode) -> Self {
        value.0.to_string()
    }
}

/// Two-year election cycle, named by its even year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Cycle(u16);

impl Cycle {
    pub fn year(&self) -> u16 {
        self.0
    }
}

impl Default for Cycle {
    fn default() -> Self {
        Self(2022)
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Cycle {
    type Error = PullError;

    fn try_from(year: u16) -> Result<Self, Self::Error> {
        if year < 1990 || year % 2 != 0 {
            return Err(PullError::InvalidCycle(year.to_string()));
        }
        Ok(Self(year))
    }
}

impl From<Cycle> for u16 {
    fn from(value: Cycle) -> Self {
        value.0
    }
}

impl FromStr for Cycle {
    type Err = PullError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let year = value
            .trim()
            .parse::<u16>()
            .map_err(|_| PullError::InvalidCycle(value.to_string()))?;
        Self::try_from(year)
    }
}

/// Per-candidate resources pulled from the API, one directory each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Sectors,
    Industries,
    Contributors,
    Summaries,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Sectors,
        ResourceKind::Industries,
        ResourceKind::Contributors,
        ResourceKind::Summaries,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            ResourceKind::Sectors => "sectors",
            ResourceKind::Industries => "industries",
            ResourceKind::Contributors => "contributors",
            ResourceKind::Summaries => "summaries",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for ResourceKind {
    type Err = PullError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.dir_name() == value.trim())
            .ok_or_else(|| PullError::UnknownResource(value.to_string()))
    }
}

/// Anything that can be consolidated: the state rosters plus every resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    States,
    Sectors,
    Industries,
    Contributors,
    Summaries,
}

impl DatasetKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            DatasetKind::States => "states",
            DatasetKind::Sectors => "sectors",
            DatasetKind::Industries => "industries",
            DatasetKind::Contributors => "contributors",
            DatasetKind::Summaries => "summaries",
        }
    }
}

impl From<ResourceKind> for DatasetKind {
    fn from(value: ResourceKind) -> Self {
        match value {
            ResourceKind::Sectors => DatasetKind::Sectors,
            ResourceKind::Industries => DatasetKind::Industries,
            ResourceKind::Contributors => DatasetKind::Contributors,
            ResourceKind::Summaries => DatasetKind::Summaries,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}
