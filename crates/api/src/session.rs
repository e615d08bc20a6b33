use crate::error::Result;
use dashmap::DashMap;
use db::{Repository, Subscription};
use model::{session::validate_name, Eligibility, Session, Timestamp, Wait};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq)]
pub enum Login {
    Accepted(Session),
    /// The name is fine but its owner voted too recently.
    Wait(Wait),
}

/// Logs a voter in by name. Login is refused until the voter may vote again.
pub async fn login_voter(repo: &Repository, name: &str, now: Timestamp) -> Result<Login> {
    let name = validate_name(name)?;
    let voter = repo.get_voter(name).await?;
    Ok(match Eligibility::check(voter.as_ref(), now) {
        Eligibility::Eligible => {
            log::info!("voter {name} logged in");
            Login::Accepted(Session::Voter { name: name.into() })
        }
        Eligibility::Wait(wait) => {
            log::debug!("voter {name} must wait {wait}");
            Login::Wait(wait)
        }
    })
}

/// How long a session stays valid after login.
pub const LIFETIME_MS: u64 = 12 * 60 * 60 * 1000;

struct Entry {
    session: Session,
    expires: Timestamp,
    /// Live feeds opened under this session.
    feeds: Vec<Subscription>,
}

/// Server-side session registry keyed by the random cookie value. Clones share the same registry.
#[derive(Clone, Default)]
pub struct Sessions {
    inner: Arc<DashMap<Uuid, Entry>>,
}

impl Sessions {
    /// Opens a session that lasts [`LIFETIME_MS`] from `now`. Expired sessions are dropped on the
    /// way.
    pub fn open(&self, session: Session, now: Timestamp) -> Uuid {
        self.inner.retain(|_, entry| entry.expires > now);
        let id = Uuid::new_v4();
        let expires = now.saturating_add(LIFETIME_MS);
        self.inner.insert(id, Entry { session, expires, feeds: Vec::new() });
        id
    }

    pub fn get(&self, id: &Uuid, now: Timestamp) -> Option<Session> {
        let session = {
            let entry = self.inner.get(id)?;
            (entry.expires > now).then(|| entry.session.clone())
        };
        if session.is_none() {
            log::debug!("session {id} expired");
            self.inner.remove(id);
        }
        session
    }

    /// Ties a live feed to the session so that logging out ends it. Returns `false` for unknown ids.
    pub fn attach(&self, id: &Uuid, feed: Subscription) -> bool {
        match self.inner.get_mut(id) {
            Some(mut entry) => {
                entry.feeds.push(feed);
                true
            }
            None => false,
        }
    }

    /// Forgets a feed that ended on its own.
    pub fn detach(&self, id: &Uuid, feed: Subscription) {
        if let Some(mut entry) = self.inner.get_mut(id) {
            entry.feeds.retain(|&owned| owned != feed);
        }
    }

    /// Number of live feeds owned by the session.
    pub fn feeds(&self, id: &Uuid) -> usize {
        self.inner.get(id).map_or(0, |entry| entry.feeds.len())
    }

    /// Discards the session and stops every feed it still owns.
    pub fn close(&self, id: &Uuid, repo: &Repository) -> Option<Session> {
        let (_, Entry { session, feeds, .. }) = self.inner.remove(id)?;
        for feed in feeds {
            repo.unsubscribe(feed);
        }
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
