#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod eligibility;
pub mod error;
pub mod poll;
pub mod session;
pub mod voter;

pub use eligibility::{Eligibility, Wait};
pub use error::Invalid;
pub use poll::{Edit, EditOption, Poll, PollOption, Standing};
pub use session::Session;
pub use voter::Voter;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;
