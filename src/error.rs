use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid tensor shape: {0}")]
    InvalidShape(String),

    #[error("unsupported output layout: {0}")]
    UnsupportedLayout(String),

    #[error("assignment could not be solved: {0}")]
    Unsolvable(String),

    #[error("malformed annotation at line {line}: {reason}")]
    MalformedAnnotation { line: usize, reason: String },
}
