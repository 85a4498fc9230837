//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use experiment_core::model::{Condition, DeploymentError, SequenceError, ViewId, ViewRole};

/// Configuration problems. All of them are fatal at startup: a session must
/// not begin when any of these is reported.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no conditions configured")]
    EmptyConditionSet,
    #[error("view `{0}` is declared twice in the catalog")]
    DuplicateCatalogView(ViewId),
    #[error("{condition}: template references unknown view `{view}`")]
    UnknownView { condition: Condition, view: ViewId },
    #[error("{condition}: {source}")]
    Sequence {
        condition: Condition,
        #[source]
        source: SequenceError,
    },
    #[error("{condition}: template has {len} views, too short for the shared prefix and suffix")]
    TemplateTooShort { condition: Condition, len: usize },
    #[error("{condition}: template does not start with the shared introduction prefix")]
    PrefixMismatch { condition: Condition },
    #[error("{condition}: template does not end with the shared post-test suffix")]
    SuffixMismatch { condition: Condition },
    #[error("{condition}: position {position} must be a {expected} view, found {found}")]
    MisplacedRole {
        condition: Condition,
        position: usize,
        expected: ViewRole,
        found: ViewRole,
    },
    #[error("configured conditions must be exactly the templated set {expected:?}, got {got:?}")]
    ConditionSetMismatch {
        expected: Vec<Condition>,
        got: Vec<Condition>,
    },
    #[error("{condition}: main block `{view}` is not followed by a break")]
    MissingBreak { condition: Condition, view: ViewId },
    #[error("{condition}: main block `{view}` is followed by more than one break")]
    ExtraBreak { condition: Condition, view: ViewId },
    #[error("progress bar references view `{view}` missing from the {condition} sequence")]
    UnknownProgressView { condition: Condition, view: ViewId },
    #[error("invalid preload URL: {0}")]
    InvalidPreloadUrl(String),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
}

/// Misuse of the view sequencer by its hosting runtime.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequencerError {
    #[error("sequencer has not been started")]
    NotStarted,
    #[error("sequencer was already started")]
    AlreadyStarted,
    #[error("sequence already finished")]
    Finished,
}

/// Errors emitted by the results submission client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("submission endpoint answered with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by an experiment session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("results belong to `{got}`, but the current view is `{expected}`")]
    NotCurrentView { expected: ViewId, got: ViewId },
    #[error("session has not finished yet")]
    NotFinished,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}
