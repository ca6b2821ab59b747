use std::io::{Read, Write};

use serde::Serialize;

use crate::error::PullError;

/// One row of a flat file: field names in insertion order, each with a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value in place when the field exists, appends it otherwise.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn has_same_fields(&self, headers: &[String]) -> bool {
        self.fields.len() == headers.len()
            && headers.iter().all(|header| self.get(header).is_some())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (key, value) in iter {
            let key: String = key.into();
            record.set(&key, value);
        }
        record
    }
}

/// Reads a headed CSV stream into records.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<Record>, PullError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        );
    }
    Ok(records)
}

/// Header row of the table: the first record's field names.
pub fn headers_of(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|record| record.names().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Checks every record against the first one's field set, returning the index
/// of the first offender.
pub fn find_mismatch(records: &[Record]) -> Option<usize> {
    let headers = headers_of(records);
    records
        .iter()
        .position(|record| !record.has_same_fields(&headers))
}

/// Writes records under the first record's header. Columns are matched by
/// name, so rows carrying the same fields in a different order stay aligned.
/// An empty slice has no header to write and is rejected.
pub fn write_records<W: Write>(writer: W, records: &[Record]) -> Result<(), PullError> {
    if records.is_empty() {
        return Err(PullError::DataShape("no records to write".to_string()));
    }
    let headers = headers_of(records);
    if let Some(index) = find_mismatch(records) {
        return Err(PullError::HeaderMismatch {
            path: format!("record {index}"),
            expected: headers,
            found: records[index].names().map(str::to_string).collect(),
        });
    }

    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(&headers)?;
    for record in records {
        writer.write_record(
            headers
                .iter()
                .map(|header| record.get(header).unwrap_or_default()),
        )?;
    }
    writer
        .flush()
        .map_err(|err| PullError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn set_overrides_in_place() {
        let mut record = Record::new().with("cid", "stale").with("total", "10");
        record.set("cid", "N00036154");
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["cid", "total"]);
        assert_eq!(record.get("cid"), Some("N00036154"));
    }

    #[test]
    fn write_aligns_columns_by_name() {
        let records = vec![
            Record::new().with("a", "1").with("b", "2"),
            Record::new().with("b", "4").with("a", "3"),
        ];
        let mut out = Vec::new();
        write_records(&mut out, &records).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\n1,2\n3,4\n");
    }

    #[test]
    fn write_rejects_mismatched_fields() {
        let records = vec![
            Record::new().with("a", "1"),
            Record::new().with("a", "1").with("extra", "x"),
        ];
        let err = write_records(Vec::new(), &records).unwrap_err();
        assert_matches!(err, PullError::HeaderMismatch { .. });
    }

    #[test]
    fn write_rejects_empty_table() {
        let mut out = Vec::new();
        let err = write_records(&mut out, &[]).unwrap_err();
        assert_matches!(err, PullError::DataShape(_));
        assert!(out.is_empty());
    }

    #[test]
    fn read_preserves_row_order() {
        let input = "cid,office\nN1,NJS1\nN2,NJ01\n";
        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("office"), Some("NJ01"));
    }
}
