use crate::error::Invalid;
use alloc::{string::String, vec::Vec};
use core::fmt::{self, Display};
use serde::{Deserialize, Serialize, Serializer};

/// The singleton poll document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Poll {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Options in display order. The store drops empty arrays, hence the default.
    #[serde(default)]
    pub options: Vec<PollOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollOption {
    pub id: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub votes: u32,
}

impl PollOption {
    fn seeded(id: u32, label: &str) -> Self {
        Self { id, label: label.into(), votes: 0 }
    }
}

impl Default for Poll {
    /// Content seeded whenever the poll document is absent.
    fn default() -> Self {
        Self {
            title: "What's Your Favorite Technology?".into(),
            description: "Help us understand the community's preferences by voting for your favorite technology stack"
                .into(),
            options: Vec::from([
                PollOption::seeded(1, "React - Modern UI Library"),
                PollOption::seeded(2, "Vue.js - Progressive Framework"),
                PollOption::seeded(3, "Angular - Complete Solution"),
                PollOption::seeded(4, "Svelte - Compiler-based Framework"),
            ]),
        }
    }
}

/// Admin-submitted replacement for the poll content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Edit {
    pub title: String,
    pub description: String,
    pub options: Vec<EditOption>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EditOption {
    /// Identifier of an existing option. Unknown or missing identifiers denote a new option.
    #[serde(default)]
    pub id: Option<u32>,
    pub label: String,
}

impl Poll {
    pub fn option(&self, id: u32) -> Option<&PollOption> {
        self.options.iter().find(|opt| opt.id == id)
    }

    /// Adds one vote to the option with the given identifier. Returns `false` if there is no
    /// such option, in which case the poll is left untouched.
    pub fn increment(&mut self, id: u32) -> bool {
        match self.options.iter_mut().find(|opt| opt.id == id) {
            Some(opt) => {
                opt.votes = opt.votes.saturating_add(1);
                true
            }
            None => false,
        }
    }

    pub fn clear_votes(&mut self) {
        for opt in &mut self.options {
            opt.votes = 0;
        }
    }

    pub fn next_option_id(&self) -> u32 {
        self.options.iter().map(|opt| opt.id).max().map_or(1, |max| max + 1)
    }

    /// Appends a blank option and returns its identifier.
    pub fn add_option(&mut self) -> u32 {
        let id = self.next_option_id();
        self.options.push(PollOption { id, label: String::new(), votes: 0 });
        id
    }

    pub fn remove_option(&mut self, id: u32) -> Result<(), Invalid> {
        if self.options.len() <= 2 {
            return Err(Invalid::TooFewOptions);
        }
        let index = self.options.iter().position(|opt| opt.id == id).ok_or(Invalid::MissingOption)?;
        self.options.remove(index);
        Ok(())
    }

    /// Checks whether the poll may be published.
    pub fn validate(&self) -> Result<(), Invalid> {
        if self.title.trim().is_empty() {
            return Err(Invalid::MissingTitle);
        }

        if self.description.trim().is_empty() {
            return Err(Invalid::MissingDescription);
        }

        if self.options.len() < 2 {
            return Err(Invalid::TooFewOptions);
        }

        if self.options.iter().any(|opt| opt.label.trim().is_empty()) {
            return Err(Invalid::EmptyLabel);
        }

        for (i, opt) in self.options.iter().enumerate() {
            if self.options[..i].iter().any(|prev| prev.id == opt.id) {
                return Err(Invalid::DuplicateOption);
            }
        }

        Ok(())
    }

    /// Replaces the content with an admin edit. Surviving options keep their counters while new
    /// ones start at zero. Nothing changes unless the result validates.
    pub fn apply(&mut self, edit: Edit) -> Result<(), Invalid> {
        let Edit { title, description, options: entries } = edit;
        let mut next = self.next_option_id();
        let mut options = Vec::with_capacity(entries.len());
        for EditOption { id, label } in entries {
            let existing = id.and_then(|id| self.option(id)).map(|opt| (opt.id, opt.votes));
            let (id, votes) = existing.unwrap_or_else(|| {
                let id = next;
                next += 1;
                (id, 0)
            });
            options.push(PollOption { id, label: label.trim().into(), votes });
        }

        let poll = Self { title: title.trim().into(), description: description.trim().into(), options };
        poll.validate()?;
        *self = poll;
        Ok(())
    }

    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|opt| u64::from(opt.votes)).sum()
    }

    /// The option with the most votes. Ties go to whichever comes first.
    pub fn leader(&self) -> Option<&PollOption> {
        self.options.iter().reduce(|max, opt| if opt.votes > max.votes { opt } else { max })
    }

    /// Options ranked by votes, most first.
    pub fn standings(&self) -> Vec<Standing<'_>> {
        let total = self.total_votes();
        let mut ranked: Vec<_> = self
            .options
            .iter()
            .map(|opt| Standing { id: opt.id, label: &opt.label, votes: opt.votes, percent: Percent::of(opt.votes, total) })
            .collect();
        ranked.sort_by(|a, b| b.votes.cmp(&a.votes));
        ranked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Standing<'p> {
    pub id: u32,
    pub label: &'p str,
    pub votes: u32,
    pub percent: Percent,
}

/// Share of the total vote in tenths of a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percent(u32);

impl Percent {
    fn of(votes: u32, total: u64) -> Self {
        if total == 0 {
            return Self(0);
        }
        let tenths = (u64::from(votes) * 1000 + total / 2) / total;
        Self(u32::try_from(tenths).unwrap_or(1000))
    }

    pub const fn tenths(self) -> u32 {
        self.0
    }
}

impl Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tallied(counts: &[(u32, u32)]) -> Poll {
        Poll {
            title: "Title".into(),
            description: "Description".into(),
            options: counts
                .iter()
                .map(|&(id, votes)| PollOption { id, label: format!("Option {id}"), votes })
                .collect(),
        }
    }

    #[test]
    fn default_poll_has_four_empty_options() {
        let poll = Poll::default();
        assert_eq!(poll.title, "What's Your Favorite Technology?");
        assert_eq!(poll.options.len(), 4);
        assert_eq!(poll.options.iter().map(|opt| opt.id).collect::<Vec<_>>(), [1, 2, 3, 4]);
        assert_eq!(poll.total_votes(), 0);
        assert_eq!(poll, Poll::default());
        poll.validate().unwrap();
    }

    #[test]
    fn increments_only_the_chosen_option() {
        let mut poll = tallied(&[(1, 5), (2, 3)]);
        assert!(poll.increment(2));
        assert_eq!(poll, tallied(&[(1, 5), (2, 4)]));
    }

    #[test]
    fn unknown_option_is_left_alone() {
        let mut poll = tallied(&[(1, 5), (2, 3)]);
        assert!(!poll.increment(999));
        assert_eq!(poll, tallied(&[(1, 5), (2, 3)]));
    }

    #[test]
    fn new_options_take_the_next_identifier() {
        let mut poll = tallied(&[(3, 0), (7, 0)]);
        assert_eq!(poll.add_option(), 8);
        assert_eq!(poll.add_option(), 9);
        assert_eq!(poll.options[2].label, "");

        let mut empty = Poll { options: Vec::new(), ..Poll::default() };
        assert_eq!(empty.add_option(), 1);
    }

    #[test]
    fn refuses_to_drop_below_two_options() {
        let mut poll = tallied(&[(1, 0), (2, 0), (3, 0)]);
        poll.remove_option(2).unwrap();
        assert_eq!(poll.remove_option(1), Err(Invalid::TooFewOptions));
        assert_eq!(poll.options.iter().map(|opt| opt.id).collect::<Vec<_>>(), [1, 3]);
    }

    #[test]
    fn removing_an_unknown_option_is_an_error() {
        let mut poll = tallied(&[(1, 0), (2, 0), (3, 0)]);
        assert_eq!(poll.remove_option(9), Err(Invalid::MissingOption));
        assert_eq!(poll.options.len(), 3);
    }

    #[test]
    fn validation_rejects_incomplete_polls() {
        let mut poll = tallied(&[(1, 0), (2, 0)]);
        poll.title = "   ".into();
        assert_eq!(poll.validate(), Err(Invalid::MissingTitle));

        let mut poll = tallied(&[(1, 0), (2, 0)]);
        poll.description.clear();
        assert_eq!(poll.validate(), Err(Invalid::MissingDescription));

        assert_eq!(tallied(&[(1, 0)]).validate(), Err(Invalid::TooFewOptions));

        let mut poll = tallied(&[(1, 0), (2, 0)]);
        poll.options[1].label = " ".into();
        assert_eq!(poll.validate(), Err(Invalid::EmptyLabel));

        assert_eq!(tallied(&[(1, 0), (1, 0)]).validate(), Err(Invalid::DuplicateOption));
    }

    #[test]
    fn edits_keep_counters_of_surviving_options() {
        let mut poll = tallied(&[(1, 5), (2, 3), (3, 1)]);
        poll.apply(Edit {
            title: "  New title ".into(),
            description: "New description".into(),
            options: Vec::from([
                EditOption { id: Some(3), label: " Third ".into() },
                EditOption { id: Some(1), label: "First".into() },
                EditOption { id: None, label: "Fresh".into() },
            ]),
        })
        .unwrap();

        assert_eq!(poll.title, "New title");
        assert_eq!(
            poll.options,
            [
                PollOption { id: 3, label: "Third".into(), votes: 1 },
                PollOption { id: 1, label: "First".into(), votes: 5 },
                PollOption { id: 4, label: "Fresh".into(), votes: 0 },
            ]
        );
    }

    #[test]
    fn rejected_edits_leave_the_poll_untouched() {
        let mut poll = tallied(&[(1, 5), (2, 3)]);
        let err = poll
            .apply(Edit {
                title: "Title".into(),
                description: "Description".into(),
                options: Vec::from([
                    EditOption { id: Some(1), label: "One".into() },
                    EditOption { id: Some(2), label: "".into() },
                ]),
            })
            .unwrap_err();
        assert_eq!(err, Invalid::EmptyLabel);
        assert_eq!(poll, tallied(&[(1, 5), (2, 3)]));
    }

    #[test]
    fn standings_are_ranked_with_percentages() {
        let poll = tallied(&[(1, 1), (2, 2), (3, 0)]);
        let standings = poll.standings();
        assert_eq!(standings.iter().map(|s| s.id).collect::<Vec<_>>(), [2, 1, 3]);
        assert_eq!(standings[0].percent.to_string(), "66.7");
        assert_eq!(standings[1].percent.to_string(), "33.3");
        assert_eq!(standings[2].percent.to_string(), "0.0");
        assert_eq!(poll.leader().map(|opt| opt.id), Some(2));
    }

    #[test]
    fn empty_tally_has_zero_shares_and_first_leader() {
        let poll = tallied(&[(4, 0), (5, 0)]);
        assert!(poll.standings().iter().all(|s| s.percent.tenths() == 0));
        assert_eq!(poll.leader().map(|opt| opt.id), Some(4));
    }

    #[test]
    fn wire_format_matches_stored_documents() {
        let doc = serde_json::json!({
            "title": "T",
            "description": "D",
            "options": [{ "id": 1, "label": "A", "votes": 2 }, { "id": 2, "label": "B", "votes": 0 }],
        });
        let poll: Poll = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(poll.options[0].votes, 2);
        assert_eq!(serde_json::to_value(&poll).unwrap(), doc);

        // The store omits empty collections entirely.
        let bare: Poll = serde_json::from_value(serde_json::json!({ "title": "T" })).unwrap();
        assert!(bare.options.is_empty());
    }
}
