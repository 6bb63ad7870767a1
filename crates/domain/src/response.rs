//! Response envelope returned by the update and select endpoints
//!
//! Every field is optional: the service only includes what the request
//! produced (an update carries no `response`, a select usually does).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Record;

/// Top-level envelope: `{responseHeader:{...}, response:{...}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolrResponse {
    #[serde(rename = "responseHeader", default, skip_serializing_if = "Option::is_none")]
    pub header: Option<ResponseHeader>,

    #[serde(rename = "response", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ResultSet>,

    /// Facet counts and anything else the service returned alongside
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,

    #[serde(rename = "QTime", default, skip_serializing_if = "Option::is_none")]
    pub qtime: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(rename = "numFound", default, skip_serializing_if = "Option::is_none")]
    pub num_found: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,

    #[serde(rename = "maxScore", default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docs: Vec<Record>,
}

impl SolrResponse {
    /// Status reported in the header; absent means the service did not say.
    pub fn status(&self) -> Option<i64> {
        self.header.as_ref().and_then(|h| h.status)
    }

    /// True unless the header reports a non-zero status.
    pub fn is_ok(&self) -> bool {
        self.status().map_or(true, |s| s == 0)
    }

    pub fn docs(&self) -> &[Record] {
        self.body.as_ref().map_or(&[], |b| b.docs.as_slice())
    }

    pub fn num_found(&self) -> Option<u64> {
        self.body.as_ref().and_then(|b| b.num_found)
    }
}
