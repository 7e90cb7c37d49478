//! Error types of the table engine.

/// Errors raised by table access, normalization and query evaluation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Requested table name is not present in the store.
    #[error("table not found: {0}")]
    TableNotFound(String),
    /// Requested INFO table is not present in the store.
    #[error("INFO not found: {0}")]
    InfoNotFound(String),
    /// A locus references a chromosome absent from the contig catalog.
    #[error("contig not found: {0}")]
    ContigNotFound(String),
    /// Breakend ALT literal without brackets or single-breakend dot.
    #[error("invalid breakend ALT: {0:?}")]
    InvalidBreakend(String),
    /// A record that cannot be normalized.
    #[error("invalid record {id}: {msg}")]
    InvalidRecord { id: String, msg: String },
    /// A query or query logic expression that cannot be parsed.
    #[error("invalid query {query:?}: {msg}")]
    InvalidQuery { query: String, msg: String },
    /// A header line that cannot be parsed.
    #[error("invalid header line: {0:?}")]
    InvalidHeader(String),
    /// A table of the wrong kind or shape was passed in.
    #[error("invalid table {name}: {msg}")]
    InvalidTable { name: String, msg: String },
}

impl Error {
    pub(crate) fn record<I: Into<String>, M: Into<String>>(id: I, msg: M) -> Self {
        Error::InvalidRecord {
            id: id.into(),
            msg: msg.into(),
        }
    }

    pub(crate) fn query<Q: Into<String>, M: Into<String>>(query: Q, msg: M) -> Self {
        Error::InvalidQuery {
            query: query.into(),
            msg: msg.into(),
        }
    }

    pub(crate) fn table<N: Into<String>, M: Into<String>>(name: N, msg: M) -> Self {
        Error::InvalidTable {
            name: name.into(),
            msg: msg.into(),
        }
    }
}
