use crate::Timestamp;
use alloc::string::String;
use serde::{Deserialize, Serialize};

/// Receipt of the most recent vote cast under a given name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    /// Display name as typed, before sanitization.
    pub name: String,
    pub last_vote: Timestamp,
    pub voted_for: u32,
}

/// Characters the store refuses inside keys.
const RESERVED: [char; 6] = ['.', '#', '$', '/', '[', ']'];

/// Maps a voter name onto a store key. Distinct names may collide (e.g. `a.b` and `a#b`), in
/// which case they share one voter record.
pub fn sanitize_key(name: &str) -> String {
    name.chars().map(|c| if RESERVED.contains(&c) { '_' } else { c }).collect()
}
