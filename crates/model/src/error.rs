use core::fmt::{self, Display};

/// Input rejected before any store write is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalid {
    /// Poll title is empty after trimming.
    MissingTitle,
    /// Poll description is empty after trimming.
    MissingDescription,
    /// A poll must keep at least two options.
    TooFewOptions,
    /// Some option has an empty label.
    EmptyLabel,
    /// Two options share the same identifier.
    DuplicateOption,
    /// No option carries the given identifier.
    MissingOption,
    /// Login attempted without a name.
    EmptyName,
    /// Login name is shorter than two characters.
    ShortName,
    /// Admin login attempted without a username or password.
    MissingCredentials,
}

impl Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingTitle => "Poll title is required.",
            Self::MissingDescription => "Poll description is required.",
            Self::TooFewOptions => "A poll needs at least two options.",
            Self::EmptyLabel => "Every option needs a label.",
            Self::DuplicateOption => "Option identifiers must be unique.",
            Self::MissingOption => "That option does not exist.",
            Self::EmptyName => "Please enter your name",
            Self::ShortName => "Name must be at least 2 characters",
            Self::MissingCredentials => "Please enter both username and password",
        })
    }
}
