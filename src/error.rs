use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing post URL / id. Raised before any network call.
    #[error("{0}")]
    InvalidInput(String),

    /// Metadata mirror or media host unreachable, or the payload was unusable.
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {0}")]
    UpstreamStatus(u16),

    #[error("no media found in post {0}")]
    NoMediaFound(String),

    /// One item of a bulk download failed; never propagated past the orchestrator.
    #[error("download of item {position} failed: {reason}")]
    DownloadItem { position: usize, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamFetch(_) | Self::UpstreamStatus(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::UpstreamStatus(status.as_u16()),
            None => Self::UpstreamFetch(e.to_string()),
        }
    }
}
