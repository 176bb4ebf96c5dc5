use thiserror::Error;

/// Everything that can go wrong compiling a filter document. All variants
/// render as 400s at the HTTP boundary; none carry SQL.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Table or column name failed [`super::ident`] validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid WHERE clause: {0}")]
    InvalidWhereClause(String),

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid offset: {0}")]
    InvalidOffset(String),
}
