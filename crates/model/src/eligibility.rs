//! Decides whether a voter may vote again. Everything here is a pure function of the voter's
//! receipt and the current time.

use crate::{voter::Voter, Timestamp};
use core::{
    fmt::{self, Display},
    time::Duration,
};

/// Length of the voting window in milliseconds.
pub const WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

const HOUR_MS: u64 = 60 * 60 * 1000;
const MINUTE_MS: u64 = 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// The voter must wait this long before voting again.
    Wait(Wait),
}

impl Eligibility {
    pub fn check(voter: Option<&Voter>, now: Timestamp) -> Self {
        let remaining = time_until_next_vote(voter, now);
        if remaining.is_zero() {
            Self::Eligible
        } else {
            Self::Wait(remaining.into())
        }
    }
}

/// Voters without a receipt may always vote. The window is inclusive: exactly 24 hours after the
/// last vote, the voter is eligible again.
pub fn can_vote(voter: Option<&Voter>, now: Timestamp) -> bool {
    match voter {
        Some(voter) => now >= voter.last_vote.saturating_add(WINDOW_MS),
        None => true,
    }
}

/// Time left until [`can_vote`] holds. Never negative.
pub fn time_until_next_vote(voter: Option<&Voter>, now: Timestamp) -> Duration {
    let millis = voter.map_or(0, |voter| voter.last_vote.saturating_add(WINDOW_MS).saturating_sub(now));
    Duration::from_millis(millis)
}

/// Remaining time split for display, truncating towards zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    pub hours: u64,
    pub minutes: u64,
}

impl From<Duration> for Wait {
    fn from(remaining: Duration) -> Self {
        let millis = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
        Self { hours: millis / HOUR_MS, minutes: millis % HOUR_MS / MINUTE_MS }
    }
}

impl Display for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m", self.hours, self.minutes)
    }
}
