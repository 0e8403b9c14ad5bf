//! Payload and option types exchanged with the records API.
//!
//! # Design
//! Record payloads are caller-defined; the client only fixes the envelope
//! shapes the backend always uses (create result and paginated list). The
//! untyped default for a record is a JSON object map.

use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// An untyped record: the raw JSON object the backend returns.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Identity and metadata the backend assigns to a newly created record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResult {
    pub id: String,
    #[serde(default)]
    pub collection_id: String,
    #[serde(default)]
    pub collection_name: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    /// Remaining record fields echoed back by the backend.
    #[serde(flatten)]
    pub fields: Record,
}

/// One page of a collection listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_items: i64,
    pub total_pages: i64,
    pub items: Vec<T>,
}

/// Request shaping for list operations. Unset, zero and empty values are
/// omitted from the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub filter: Option<String>,
    pub sort: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Use an already rendered filter expression.
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter = Some(expression.into());
        self
    }

    /// Render `filter` and use the result as the filter expression.
    pub fn filter_with(self, filter: &Filter) -> Self {
        self.filter(filter.build())
    }

    /// Backend sort syntax, e.g. `-created,title`.
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Query pairs to send, in a stable order. Only values that are set and
    /// non-zero / non-empty appear.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page.filter(|p| *p > 0) {
            pairs.push(("page", page.to_string()));
        }
        if let Some(size) = self.page_size.filter(|s| *s > 0) {
            pairs.push(("perPage", size.to_string()));
        }
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            pairs.push(("filter", filter.to_string()));
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("sort", sort.to_string()));
        }
        pairs
    }
}
