use std::collections::{BTreeMap, HashMap};

/// Named-field access to one raw source row.
///
/// Loaders implement this for their native row type so the merge code never
/// sees CSV records or SQLite rows directly. Absent fields read as an empty
/// string.
pub trait RawRow {
    /// Value of `field`, trimmed of surrounding whitespace; empty when absent.
    fn get(&self, field: &str) -> String;

    /// Field names in source order.
    fn field_names(&self) -> Vec<String>;

    fn has(&self, field: &str) -> bool {
        self.field_names().iter().any(|f| f == field)
    }

    /// First field name satisfying `predicate`, or an empty string.
    fn find_field(&self, predicate: &dyn Fn(&str) -> bool) -> String {
        self.field_names()
            .into_iter()
            .find(|f| predicate(f))
            .unwrap_or_default()
    }
}

impl RawRow for BTreeMap<String, String> {
    fn get(&self, field: &str) -> String {
        BTreeMap::get(self, field)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    fn field_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

impl RawRow for HashMap<String, String> {
    fn get(&self, field: &str) -> String {
        HashMap::get(self, field)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.keys().cloned().collect();
        names.sort();
        names
    }
}

/// A row held as parallel header/value vectors, as produced by the CSV and
/// SQLite readers.
#[derive(Debug, Clone, Default)]
pub struct FieldRow {
    headers: Vec<String>,
    values: Vec<String>,
}

impl FieldRow {
    pub fn new(headers: Vec<String>, values: Vec<String>) -> Self {
        Self { headers, values }
    }
}

impl RawRow for FieldRow {
    fn get(&self, field: &str) -> String {
        self.headers
            .iter()
            .position(|h| h == field)
            .and_then(|idx| self.values.get(idx))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    fn field_names(&self) -> Vec<String> {
        self.headers.clone()
    }
}
