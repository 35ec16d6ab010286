use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not read credentials from {}: {reason}", path.display())]
    ConfigCorrupt { path: PathBuf, reason: String },
    #[error("no bearer token was provided")]
    MissingToken,
    #[error("could not locate the home directory")]
    NoHomeDir,
    #[error("`{0}` is neither a numeric tweet ID nor a tweet URL")]
    InvalidReference(String),
    #[error("unsupported API version `{0}`, expected `v1` or `v2`")]
    UnsupportedApiVersion(String),
    #[error("API returned {status}:\n{body}")]
    Api { status: u16, body: String },
    #[error("malformed API response: {0}")]
    MalformedResponse(String),
    #[error("none of the requested tweets could be resolved")]
    NoPostsResolved,
    #[error("unknown media type `{0}`")]
    UnknownMediaType(String),
    #[error("media item has no variants to choose from")]
    EmptyVariantList,
    #[error("invalid media URL `{0}`")]
    InvalidMediaUrl(String),
    #[error("download of {url} failed with status {status}")]
    DownloadFailure { url: String, status: u16 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("could not format timestamp: {0}")]
    Format(#[from] time::error::Format),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
