use core::fmt::{self, Display};
use hyper::StatusCode;
use model::{Invalid, Wait};

#[derive(Debug)]
pub enum Error {
    /// The poll store failed; prior state is left as it was.
    Store(db::error::Error),
    /// Input rejected before touching the store.
    Invalid(Invalid),
    /// The voter already voted within the last day.
    Ineligible(Wait),
    /// A destructive reset was requested without enough confirmations.
    Unconfirmed,
    /// No session, or a session of the wrong role.
    Unauthenticated,
    /// Wrong admin secret.
    Unauthorized,
    /// Too many concurrent writers kept invalidating the vote.
    Contention,
    /// The request body could not be parsed.
    BadRequest,
    NotFound,
}

impl From<db::error::Error> for Error {
    fn from(err: db::error::Error) -> Self {
        Self::Store(err)
    }
}

impl From<Invalid> for Error {
    fn from(err: Invalid) -> Self {
        Self::Invalid(err)
    }
}

impl Error {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Store(_) => StatusCode::BAD_GATEWAY,
            Self::Invalid(_) | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Ineligible(_) | Self::Unconfirmed => StatusCode::FORBIDDEN,
            Self::Unauthenticated | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Contention => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => err.fmt(f),
            Self::Invalid(err) => err.fmt(f),
            Self::Ineligible(wait) => write!(f, "You can vote again in {wait}"),
            Self::Unconfirmed => f.write_str("This action must be confirmed before it runs."),
            Self::Unauthenticated => f.write_str("Please log in first."),
            Self::Unauthorized => f.write_str("Invalid username or password"),
            Self::Contention => f.write_str("Too many votes are arriving at once. Please try again."),
            Self::BadRequest => f.write_str("Malformed request."),
            Self::NotFound => f.write_str("Resource not found."),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
