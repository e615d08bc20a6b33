use crate::{
    error::{Error, Result},
    vote::update,
};
use db::Repository;
use model::Poll;

/// How many times the admin has confirmed a destructive action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confirmation {
    Unconfirmed,
    Once,
    Twice,
}

impl From<u8> for Confirmation {
    fn from(count: u8) -> Self {
        match count {
            0 => Self::Unconfirmed,
            1 => Self::Once,
            _ => Self::Twice,
        }
    }
}

/// Zeroes every counter and forgets all voters. Title, description, and options are kept.
pub async fn reset_votes_only(repo: &Repository, confirmation: Confirmation) -> Result<Poll> {
    if confirmation < Confirmation::Once {
        return Err(Error::Unconfirmed);
    }

    let (poll, _) = update(repo, |poll| {
        poll.clear_votes();
        Ok(true)
    })
    .await?;
    repo.remove_all_voters().await?;
    log::info!("all votes were reset");
    Ok(poll)
}

/// Deletes the poll and all voters, then stores the default poll in their place.
pub async fn reset_everything(repo: &Repository, confirmation: Confirmation) -> Result<Poll> {
    if confirmation < Confirmation::Twice {
        return Err(Error::Unconfirmed);
    }

    repo.remove_poll().await?;
    repo.remove_all_voters().await?;
    let poll = Poll::default();
    repo.save_poll(&poll).await?;
    log::warn!("poll was reset to its default content");
    Ok(poll)
}
