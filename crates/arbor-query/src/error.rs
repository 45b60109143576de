/// A query that failed to compile.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at byte {offset}")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// Byte offset in the query source.
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueryErrorKind {
    #[error("syntax error: {0}")]
    Syntax(&'static str),
    #[error("unknown node type `{0}`")]
    NodeType(String),
    #[error("unknown field `{0}`")]
    Field(String),
    #[error("undefined capture `@{0}`")]
    Capture(String),
    #[error("invalid predicate: {0}")]
    Predicate(String),
    #[error("invalid pattern structure: {0}")]
    Structure(&'static str),
}

impl QueryError {
    pub(crate) fn new(kind: QueryErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}
