use crate::{
    error::{Error, Result},
    vote::update,
};
use db::Repository;
use model::{Edit, Invalid, Poll, Session};

/// The shared admin secret. Every deployment ships with the same default pair, so this only keeps
/// honest visitors out of the admin pages.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: Box<str>,
    password: Box<str>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("admin", "admin123")
    }
}

impl Credentials {
    pub fn new(username: impl Into<Box<str>>, password: impl Into<Box<str>>) -> Self {
        Self { username: username.into(), password: password.into() }
    }

    /// Opens an admin session if both fields match. The username is trimmed; the password is not.
    pub fn login(&self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Invalid::MissingCredentials.into());
        }

        if username != &*self.username || password != &*self.password {
            log::warn!("rejected admin login for {username}");
            return Err(Error::Unauthorized);
        }

        log::info!("admin {username} logged in");
        Ok(Session::Admin)
    }
}

/// Applies an admin edit to the latest stored poll and saves it. Votes that land while the edit is
/// being applied are kept. Nothing is written if the edit leaves the poll invalid.
pub async fn publish(repo: &Repository, edit: Edit) -> Result<Poll> {
    let (poll, _) = update(repo, |poll| {
        poll.apply(edit.clone())?;
        Ok(true)
    })
    .await?;
    log::info!("published poll {:?} with {} options", poll.title, poll.options.len());
    Ok(poll)
}
