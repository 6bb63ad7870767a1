//! Solr `select` parameter builder
//!
//! Repeatable parameters (`q`, `fq`, `facet.field`, ...) accumulate across
//! calls; singular ones (`rows`, `start`, `sort`, `facet`) are replaced.

use std::collections::BTreeMap;

use url::form_urlencoded;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolrQuery {
    params: BTreeMap<String, Vec<String>>,
}

impl SolrQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping earlier values for the same key
    pub fn add_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.entry(key.into()).or_default().push(value.into());
        self
    }

    /// Replace every value for the key
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), vec![value.into()]);
        self
    }

    pub fn query(&mut self, query: &str) -> &mut Self {
        self.add_param("q", query)
    }

    pub fn filter_query(&mut self, filter: &str) -> &mut Self {
        self.add_param("fq", filter)
    }

    /// Enables faceting and narrows the result with `fq`.
    pub fn facet_query(&mut self, query: &str) -> &mut Self {
        self.set_param("facet", "true").add_param("fq", query)
    }

    pub fn add_facet(&mut self, field: &str) -> &mut Self {
        self.set_param("facet", "true").add_param("facet.field", field)
    }

    /// `fl` as a comma-separated list; nothing is added for an empty list.
    pub fn add_fields<S: AsRef<str>>(&mut self, fields: &[S]) -> &mut Self {
        if !fields.is_empty() {
            self.add_param("fl", join(fields));
        }
        self
    }

    /// Enables faceting even when `fields` is empty.
    pub fn add_pivot_fields<S: AsRef<str>>(&mut self, fields: &[S]) -> &mut Self {
        self.set_param("facet", "true");
        if !fields.is_empty() {
            self.add_param("facet.pivot.field", join(fields));
        }
        self
    }

    pub fn start(&mut self, start: u64) -> &mut Self {
        self.set_param("start", start.to_string())
    }

    pub fn rows(&mut self, rows: u64) -> &mut Self {
        self.set_param("rows", rows.to_string())
    }

    pub fn sort(&mut self, sort: &str) -> &mut Self {
        self.set_param("sort", sort)
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.params.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Key/value pairs in key order, repeated keys in insertion order
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())))
    }

    /// `application/x-www-form-urlencoded` query string, sorted by key.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new()).extend_pairs(self.params()).finish()
    }
}

fn join<S: AsRef<str>>(fields: &[S]) -> String {
    fields.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}
