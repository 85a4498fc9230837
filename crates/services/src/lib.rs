#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod experiment;
pub mod platform;
pub mod preload;
pub mod results;
pub mod sequencing;
pub mod session;
pub mod submission;

pub use experiment_core::Clock;

pub use config::ExperimentConfig;
pub use error::{ConfigError, SequencerError, SessionError, SubmissionError};
pub use experiment::Experiment;
pub use platform::ParticipantContext;
pub use preload::{AssetCache, PreloadReport, Preloader};
pub use results::{ResultRow, ResultsPayload};
pub use sequencing::{
    ConditionAssigner, ProgressMapper, ProgressTable, SequenceBuilder, SequenceProgress,
    SequencerState, ViewCatalog, ViewSequencer,
};
pub use session::{ExperimentSession, SessionMonitor, SessionOptions};
pub use submission::{
    DebugSubmissionClient, HttpSubmissionClient, SubmissionClient, SubmissionReceipt, client_for,
};
