use thiserror::Error;

/// A directive was found but could not be decoded. Logged and the query
/// passes through untouched, except for [`DirectiveError::UnknownAnchor`],
/// which the hooks turn into [`Abort::UnknownAnchor`].
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("directive markers are malformed: {0}")]
    Markers(String),
    #[error("directive json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown anchor '{0}'")]
    UnknownAnchor(String),
    #[error("anchor '{name}': {reason}")]
    Anchor { name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("collector answered with status {status}")]
    Status { status: u16, body: String },
    #[error("send refused: {0}")]
    Refused(String),
}

/// Request-level abort handed back to the host, which turns it into its own
/// error report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Abort {
    /// Finalization ran with `enableTerminate` set.
    #[error("{0}")]
    Terminated(String),
    #[error("There is an UNKNOWN_ANCHOR in json: {name}")]
    UnknownAnchor { name: String },
}
