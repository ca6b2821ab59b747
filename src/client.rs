use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::{Cid, Cycle, StateCode};
use crate::error::PullError;
use crate::table::Record;

/// Response body the API sends with a 400 once the daily quota is spent.
pub const RATE_LIMIT_BODY: &str = "call limit has been reached";

/// Rows of an endpoint together with the attributes of their enclosing
/// element (`cycle`, `last_updated`, `source`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributedRows {
    pub attributes: Record,
    pub rows: Vec<Record>,
}

impl AttributedRows {
    pub fn attribute(&self, name: &str) -> Result<&str, PullError> {
        self.attributes
            .get(name)
            .ok_or_else(|| PullError::DataShape(format!("missing `{name}` attribute")))
    }
}

pub trait FinanceClient: Send + Sync {
    fn legislators_for_state(&self, state: &StateCode) -> Result<Vec<Record>, PullError>;
    fn summary(&self, cid: &Cid, cycle: Option<Cycle>) -> Result<Record, PullError>;
    fn contributors(&self, cid: &Cid, cycle: Option<Cycle>)
    -> Result<AttributedRows, PullError>;
    fn top_industries(
        &self,
        cid: &Cid,
        cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError>;
    fn sector_totals(&self, cid: &Cid, cycle: Option<Cycle>)
    -> Result<AttributedRows, PullError>;
}

#[derive(Clone)]
pub struct OpenSecretsHttpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenSecretsHttpClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, PullError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cfp/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| PullError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| PullError::Http(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Calls one API method and returns the body under the `response` envelope.
    fn fetch(&self, method: &str, params: &[(&str, String)]) -> Result<Value, PullError> {
        tracing::debug!(method, ?params, "opensecrets.request");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("method", method),
                ("output", "json"),
            ])
            .query(params)
            .send()
            // the request URL carries the API key
            .map_err(|err| PullError::Http(err.without_url().to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| PullError::Http(err.without_url().to_string()))?;
        check_status(status, &body)?;

        let mut value: Value = serde_json::from_str(&body)
            .map_err(|err| PullError::DataShape(format!("{method}: invalid JSON: {err}")))?;
        value
            .get_mut("response")
            .map(Value::take)
            .ok_or_else(|| PullError::DataShape(format!("{method}: missing `response` envelope")))
    }
}

fn candidate_params(
    key: &'static str,
    cid: &Cid,
    cycle: Option<Cycle>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![(key, cid.as_str().to_string())];
    if let Some(cycle) = cycle {
        params.push(("cycle", cycle.to_string()));
    }
    params
}

impl FinanceClient for OpenSecretsHttpClient {
    fn legislators_for_state(&self, state: &StateCode) -> Result<Vec<Record>, PullError> {
        let response = self.fetch("getLegislators", &[("id", state.to_string())])?;
        parse_legislators(&response)
    }

    fn summary(&self, cid: &Cid, cycle: Option<Cycle>) -> Result<Record, PullError> {
        let response = self.fetch("candSummary", &candidate_params("id", cid, cycle))?;
        parse_summary(&response)
    }

    fn contributors(
        &self,
        cid: &Cid,
        cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        let response = self.fetch("candContrib", &candidate_params("cid", cid, cycle))?;
        parse_attributed(&response, "contributors", "contributor")
    }

    fn top_industries(
        &self,
        cid: &Cid,
        cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        let response = self.fetch("candIndustry", &candidate_params("cid", cid, cycle))?;
        parse_attributed(&response, "industries", "industry")
    }

    fn sector_totals(
        &self,
        cid: &Cid,
        cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        let response = self.fetch("candSector", &candidate_params("cid", cid, cycle))?;
        parse_attributed(&response, "sectors", "sector")
    }
}

pub fn check_status(status: u16, body: &str) -> Result<(), PullError> {
    if status == 400 && body.trim() == RATE_LIMIT_BODY {
        return Err(PullError::RateLimit(body.trim().to_string()));
    }
    if !(200..300).contains(&status) {
        let message = if body.trim().is_empty() {
            "OpenSecrets request failed".to_string()
        } else {
            body.trim().to_string()
        };
        return Err(PullError::ClientStatus { status, message });
    }
    Ok(())
}

pub fn parse_legislators(response: &Value) -> Result<Vec<Record>, PullError> {
    let rows = items(response, "legislator")?
        .into_iter()
        .map(attributes)
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Err(PullError::DataShape("no legislator records".to_string()));
    }
    Ok(rows)
}

pub fn parse_summary(response: &Value) -> Result<Record, PullError> {
    let summary = response
        .get("summary")
        .ok_or_else(|| PullError::DataShape("missing `summary`".to_string()))?;
    attributes(summary)
}

/// Parses `{outer: {"@attributes": {..}, inner: [{"@attributes": {..}}, ..]}}`.
pub fn parse_attributed(
    response: &Value,
    outer: &str,
    inner: &str,
) -> Result<AttributedRows, PullError> {
    let container = response
        .get(outer)
        .ok_or_else(|| PullError::DataShape(format!("missing `{outer}`")))?;
    let rows = items(container, inner)?
        .into_iter()
        .map(attributes)
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Err(PullError::DataShape(format!("no {inner} records")));
    }
    Ok(AttributedRows {
        attributes: attributes(container)?,
        rows,
    })
}

/// A list element holding one item comes back as a bare object.
fn items<'a>(value: &'a Value, key: &str) -> Result<Vec<&'a Value>, PullError> {
    match value.get(key) {
        Some(Value::Array(array)) => Ok(array.iter().collect()),
        Some(item @ Value::Object(_)) => Ok(vec![item]),
        Some(_) => Err(PullError::DataShape(format!("`{key}` is not a list"))),
        None => Err(PullError::DataShape(format!("missing `{key}`"))),
    }
}

fn attributes(value: &Value) -> Result<Record, PullError> {
    let object = value
        .get("@attributes")
        .and_then(Value::as_object)
        .ok_or_else(|| PullError::DataShape("missing `@attributes`".to_string()))?;
    Ok(object
        .iter()
        .map(|(key, value)| (key.as_str(), scalar_text(value)))
        .collect())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
