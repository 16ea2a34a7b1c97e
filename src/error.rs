use std::fmt::Display;
use std::io;
use std::path::PathBuf;

/// Errors crossing the orchestrator boundary.
///
/// Expected misses inside the engine (a field that cannot be parsed, a
/// lookup with no hit) are represented as `None` or as per-record
/// [`IssueCode`](crate::categories::IssueCode) flags, never as errors. This
/// type only covers failures that prevent a section or a whole document from
/// being processed; the orchestrator converts it into the `error` and
/// `warnings` fields of the result.
#[derive(Debug)]
pub enum ExtractError {
    /// The caller passed an empty or otherwise unusable path.
    InvalidPath,
    /// The caller passed blank text to the text entry point.
    EmptyText,
    /// The input file does not exist.
    NotFound(PathBuf),
    /// The underlying table extractor failed to read the document.
    Adapter(String),
    /// Input/output error.
    Io(io::Error),
    /// Error parsing a reference-data JSON document.
    Json(serde_json::Error),
}

impl Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath => write!(f, "Invalid PDF path provided"),
            Self::EmptyText => write!(f, "Blank text provided"),
            Self::NotFound(p) => write!(f, "PDF file not found: {}", p.display()),
            Self::Adapter(msg) => write!(f, "Error extracting tables: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Json(e) => write!(f, "Error parsing JSON: {e}"),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<io::Error> for ExtractError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}
