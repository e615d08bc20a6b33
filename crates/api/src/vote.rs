//! Casting votes against the shared poll document.
//!
//! The store has no increment primitive, so a vote is a read-modify-write of the whole poll.
//! [`Strategy::Overwrite`] does exactly that and can lose a vote when two voters interleave
//! between the read and the write. [`Strategy::Transactional`] guards the write with the
//! revision that was read and starts over whenever another writer got there first.

use crate::error::{Error, Result};
use dashmap::DashMap;
use db::Repository;
use model::{voter::sanitize_key, Eligibility, Invalid, Poll, Timestamp, Voter};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Attempts made by [`Strategy::Transactional`] before giving up.
pub const MAX_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Plain read-modify-write. Concurrent votes may overwrite each other.
    Overwrite,
    /// Compare-and-set on the poll revision, retried on conflict.
    #[default]
    Transactional,
}

impl Strategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "overwrite" => Some(Self::Overwrite),
            "transactional" => Some(Self::Transactional),
            _ => None,
        }
    }
}

/// Returns the poll and whether the option existed.
async fn overwrite(repo: &Repository, option: u32) -> Result<(Poll, bool)> {
    let mut poll = repo.get_poll().await?;
    if !poll.increment(option) {
        return Ok((poll, false));
    }
    repo.save_poll(&poll).await?;
    Ok((poll, true))
}

/// Applies `change` to the latest poll and saves the result only if nobody else wrote the poll in
/// between, starting over from a fresh read otherwise. A change that returns `false` is not
/// written. Errors from `change` abort without writing.
pub(crate) async fn update<F>(repo: &Repository, mut change: F) -> Result<(Poll, bool)>
where
    F: FnMut(&mut Poll) -> Result<bool>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let (mut poll, revision) = repo.get_poll_versioned().await?;
        if !change(&mut poll)? {
            return Ok((poll, false));
        }
        if repo.save_poll_if(&poll, &revision).await? {
            return Ok((poll, true));
        }
        log::debug!("poll changed during update (attempt {attempt} of {MAX_ATTEMPTS})");
    }
    Err(Error::Contention)
}

/// Counts a vote for `option` and overwrites the voter's receipt. The caller must have checked
/// eligibility beforehand.
///
/// Votes for an option that is not in the poll are dropped: nothing is written and the current
/// poll comes back unchanged.
pub async fn record_vote(
    repo: &Repository,
    strategy: Strategy,
    name: &str,
    option: u32,
    now: Timestamp,
) -> Result<Poll> {
    if name.trim().is_empty() {
        return Err(Invalid::EmptyName.into());
    }

    let (poll, counted) = match strategy {
        Strategy::Overwrite => overwrite(repo, option).await?,
        Strategy::Transactional => update(repo, |poll| Ok(poll.increment(option))).await?,
    };

    if !counted {
        log::warn!("dropping vote from {name} for unknown option {option}");
        return Ok(poll);
    }

    let voter = Voter { name: name.into(), last_vote: now, voted_for: option };
    repo.save_voter(name, &voter).await?;
    log::info!("recorded vote from {name} for option {option}");
    Ok(poll)
}

/// Per-voter locks that keep the eligibility check and the vote of one voter together, so that
/// concurrent requests cannot both pass the check. Names that share a storage key share a lock.
#[derive(Default)]
pub struct Ballots(DashMap<String, Arc<Mutex<()>>>);

impl Ballots {
    /// Checks that the voter may vote at `now` and records the vote.
    pub async fn cast(
        &self,
        repo: &Repository,
        strategy: Strategy,
        name: &str,
        option: u32,
        now: Timestamp,
    ) -> Result<Poll> {
        let key = sanitize_key(name);
        let lock = Arc::clone(&self.0.entry(key.clone()).or_default());
        let result = {
            let _turn = lock.lock().await;
            check_and_record(repo, strategy, name, option, now).await
        };

        drop(lock);
        self.0.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Number of voters with a vote in flight.
    pub fn pending(&self) -> usize {
        self.0.len()
    }
}

async fn check_and_record(
    repo: &Repository,
    strategy: Strategy,
    name: &str,
    option: u32,
    now: Timestamp,
) -> Result<Poll> {
    let voter = repo.get_voter(name).await?;
    if let Eligibility::Wait(wait) = Eligibility::check(voter.as_ref(), now) {
        return Err(Error::Ineligible(wait));
    }
    record_vote(repo, strategy, name, option, now).await
}
