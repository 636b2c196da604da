//! Error types for vibe-freqkeys

use thiserror::Error;

/// Result type alias for vibe-freqkeys operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vibe-freqkeys
#[derive(Debug, Error)]
pub enum Error {
    /// Base frequency or octave out of range
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A trigger was replaced by the very same trigger
    #[error("The {0} trigger is already set to this function")]
    NoOp(&'static str),

    /// `link()` called on a linked controller
    #[error("{0}")]
    AlreadyLinked(LinkConflict),

    /// `restart()` called on an unlinked controller
    #[error("The controller is not linked. 'restart()' can be performed only on linked controllers. Use 'link()' first")]
    NotLinked,

    /// `restart()` called while pending and linked triggers are identical
    #[error("Both attack and release triggers are already linked, nothing to restart. Change a trigger and try again")]
    NoChange,

    /// Configuration file error
    #[error("Config file error: {0}")]
    ConfigFile(String),

    /// Terminal error
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Detail attached to [`Error::AlreadyLinked`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkConflict {
    /// Pending triggers differ from the linked ones
    #[error("The controller is already linked. To use a new trigger unlink the controller and link it again, or use restart()")]
    PendingChanged,
    /// Pending and linked triggers are identical
    #[error("The controller is already linked")]
    Unchanged,
}
