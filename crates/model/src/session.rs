use crate::error::Invalid;
use alloc::boxed::Box;

/// State owned by one logged-in browser session. Created on login and dropped on logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// A voter identified only by the name they typed. Nothing stops two people from picking
    /// the same name.
    Voter {
        /// Trimmed display name.
        name: Box<str>,
    },
    /// Someone who supplied the shared admin secret. This is not a security boundary: the secret
    /// is a fixed pair known to every deployment.
    Admin,
}

impl Session {
    pub fn as_voter(&self) -> Option<&str> {
        if let Self::Voter { name } = self {
            Some(name.as_ref())
        } else {
            None
        }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Trims a login name and checks that it is long enough to be told apart.
pub fn validate_name(name: &str) -> Result<&str, Invalid> {
    let name = name.trim();
    match name.chars().count() {
        0 => Err(Invalid::EmptyName),
        1 => Err(Invalid::ShortName),
        _ => Ok(name),
    }
}
