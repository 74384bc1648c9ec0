use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing request fields. Raised before any record is fetched.
    #[error("invalid report request: {0}")]
    InvalidRequest(String),

    #[error("appointment data unavailable: {0}")]
    DataUnavailable(String),

    #[error("report rendering failed: {0}")]
    Render(String),

    #[error("report generation cancelled after {rows_done} rows")]
    Cancelled { rows_done: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset decoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the caller sent a bad request rather than the generation failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }

    pub(crate) fn render(context: &str, detail: impl std::fmt::Display) -> Self {
        Error::Render(format!("{context}: {detail}"))
    }
}
