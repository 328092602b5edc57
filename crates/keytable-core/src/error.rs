//! Error types for keytable.
//!
//! Every table operation that fails reports which table and which key it was
//! working on, so a host multiplexing many table instances can attribute the
//! failure without extra bookkeeping.

use std::fmt;

use thiserror::Error;

/// Identity and key context attached to a failed table operation.
#[derive(Debug, Clone)]
pub struct OpContext {
    /// Module name the table registered under.
    pub module: String,
    /// Instance name of this particular table.
    pub instance: String,
    /// Operation that failed ("lookup", "set", "del", ...).
    pub operation: &'static str,
    /// Key the operation targeted, if it had one.
    pub key: Option<String>,
}

impl fmt::Display for OpContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(
                f,
                "{}/{}: {} '{}'",
                self.module, self.instance, self.operation, key
            ),
            None => write!(f, "{}/{}: {}", self.module, self.instance, self.operation),
        }
    }
}

/// Main error type for table operations.
#[derive(Debug, Error)]
pub enum TableError {
    /// A mutating or enumerating operation was requested on a table whose
    /// configuration does not carry the backing query template.
    #[error("Table is not mutable (no '{directive}' query)")]
    NotMutable { directive: &'static str },

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A request could not be assembled from the template and parameters.
    #[error("Failed to build request: {message}")]
    QueryBuild { message: String },

    /// Transport-level failure reaching the backend, or an unintelligible
    /// response from it.
    #[error("Backend request failed: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The backend accepted the request but reported that executing it
    /// failed.
    #[error("Backend execution failed: {message}")]
    Remote { message: String },

    /// Wrapper attaching table identity and key context to an underlying
    /// failure.
    #[error("{context}: {source}")]
    Op {
        context: OpContext,
        #[source]
        source: Box<TableError>,
    },
}

/// Result type alias for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

impl From<reqwest::Error> for TableError {
    fn from(err: reqwest::Error) -> Self {
        TableError::Backend {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl TableError {
    /// Wrap this error with the identity of the operation that hit it.
    pub fn with_context(self, context: OpContext) -> TableError {
        TableError::Op {
            context,
            source: Box::new(self),
        }
    }

    /// Walk past operation wrappers to the underlying failure.
    pub fn root_cause(&self) -> &TableError {
        match self {
            TableError::Op { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Check if this error means a required query template is missing.
    pub fn is_not_mutable(&self) -> bool {
        matches!(self.root_cause(), TableError::NotMutable { .. })
    }
}
