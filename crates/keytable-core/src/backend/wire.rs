//! Wire types for the ws4sql JSON protocol.
//!
//! A request is one JSON document carrying an ordered transaction of queries
//! (row-set producing) and statements (row-count producing). The response
//! carries one result per transaction item, in the same order. Failed
//! requests come back as an [`ErrorBody`] naming the failing item.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TableError};

/// One item of a transaction: either a row-set query or a statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestItem {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub statement: Option<String>,
    /// Named parameters bound into the item's SQL (`:name` placeholders).
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub values: Map<String, Value>,
}

/// A parameterized transaction to POST at the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub transaction: Vec<RequestItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Query,
    Statement,
}

/// Builder assembling a [`Request`] from templates and bound parameters.
///
/// Bound values apply to every item in the transaction; the backend ignores
/// parameters an item's SQL does not reference.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    items: Vec<(ItemKind, String)>,
    values: Map<String, Value>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row-set query to the transaction.
    pub fn add_query(mut self, text: impl Into<String>) -> Self {
        self.items.push((ItemKind::Query, text.into()));
        self
    }

    /// Append a statement to the transaction.
    pub fn add_statement(mut self, text: impl Into<String>) -> Self {
        self.items.push((ItemKind::Statement, text.into()));
        self
    }

    /// Bind a named parameter.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Assemble the request. Fails on an empty transaction.
    pub fn build(self) -> Result<Request> {
        if self.items.is_empty() {
            return Err(TableError::QueryBuild {
                message: "transaction has no queries or statements".into(),
            });
        }
        let transaction = self
            .items
            .into_iter()
            .map(|(kind, text)| {
                let (query, statement) = match kind {
                    ItemKind::Query => (Some(text), None),
                    ItemKind::Statement => (None, Some(text)),
                };
                RequestItem {
                    query,
                    statement,
                    values: self.values.clone(),
                }
            })
            .collect();
        Ok(Request { transaction })
    }
}

/// Response to a successfully executed transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub results: Vec<ItemResult>,
}

/// Outcome of one transaction item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Rows produced by a query, each an ordered column-name to cell map.
    #[serde(default)]
    pub result_set: Option<Vec<Map<String, Value>>>,
    /// Rows affected by a statement.
    #[serde(default)]
    pub rows_updated: Option<u64>,
}

impl ItemResult {
    /// Error out when the backend flagged this item as failed.
    pub fn ensure_success(&self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        Err(TableError::Remote {
            message: self
                .error
                .clone()
                .unwrap_or_else(|| "item reported failure without detail".into()),
        })
    }
}

/// Error document the backend returns for a failed request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Index of the failing transaction item, or -1 for request-level
    /// failures.
    #[serde(default)]
    pub req_idx: Option<i64>,
    #[serde(default)]
    pub error: String,
}

/// First cell of a result row, in the column order the backend sent.
pub fn first_column(row: &Map<String, Value>) -> Option<&Value> {
    row.values().next()
}

/// Convert one result cell to its table value form.
///
/// Text passes through unchanged, numbers render in base 10, SQL NULL maps
/// to the empty string. Anything else is not a value a lookup table can
/// represent and is rejected.
pub fn cell_to_string(cell: &Value) -> Result<String> {
    match cell {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(TableError::Remote {
            message: format!("unsupported {} cell in result set", kind_name(other)),
        }),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
