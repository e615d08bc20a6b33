use core::fmt::{self, Display};

#[derive(Debug)]
pub enum Error {
    /// The remote store could not complete the operation (network, permission, quota).
    Unavailable,
    /// A stored document does not match the expected schema.
    Malformed,
    /// The voter name sanitizes to an empty key, which would address the whole collection.
    EmptyKey,
    /// The configured database URL cannot address documents.
    BadUrl,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        log::error!("remote store request failed: {err}");
        Self::Unavailable
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        log::error!("stored document does not match its schema: {err}");
        Self::Malformed
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unavailable => "The poll store is unavailable. Please try again.",
            Self::Malformed => "The poll store returned an unexpected document.",
            Self::EmptyKey => "Voter name cannot be empty.",
            Self::BadUrl => "The poll store URL is not a valid base URL.",
        })
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;
