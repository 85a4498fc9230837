mod assign;
mod progress;
mod sequencer;
mod templates;

pub use assign::ConditionAssigner;
pub use progress::{ProgressMapper, ProgressTable};
pub use sequencer::{SequenceProgress, SequencerState, ViewSequencer};
pub use templates::{SHARED_PREFIX_LEN, SHARED_SUFFIX_LEN, SequenceBuilder, ViewCatalog};
