use std::fmt;

use tracing::{debug, warn};

use experiment_core::model::{ProgressInfo, Sequence, ViewDescriptor};

use super::progress::ProgressTable;
use crate::error::SequencerError;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Where the participant is in the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Built, no view shown yet.
    Ready,
    /// Showing the view at this index.
    AtView(usize),
    /// Every view was completed. Terminal.
    Finished,
}

/// Aggregated view of sequence progress, useful for UI and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceProgress {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

//
// ─── SEQUENCER ─────────────────────────────────────────────────────────────────
//

/// Cursor over an immutable sequence of views.
///
/// `Ready -> AtView(0) -> ... -> AtView(len - 1) -> Finished`. There is no
/// backward transition. Advancing a finished sequencer is a no-op so a late or
/// duplicate completion signal cannot crash the session.
#[derive(Clone)]
pub struct ViewSequencer {
    sequence: Sequence,
    progress: ProgressTable,
    state: SequencerState,
}

impl ViewSequencer {
    /// `progress` is expected to be built from `sequence`.
    #[must_use]
    pub fn new(sequence: Sequence, progress: ProgressTable) -> Self {
        Self {
            sequence,
            progress,
            state: SequencerState::Ready,
        }
    }

    #[must_use]
    pub fn state(&self) -> SequencerState {
        self.state
    }

    #[must_use]
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    #[must_use]
    pub fn progress_table(&self) -> &ProgressTable {
        &self.progress
    }

    /// Show the first view.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::AlreadyStarted` on any call after the first.
    pub fn start(&mut self) -> Result<&ViewDescriptor, SequencerError> {
        if self.state != SequencerState::Ready {
            warn!(state = ?self.state, "start called on a running sequencer");
            return Err(SequencerError::AlreadyStarted);
        }
        self.state = SequencerState::AtView(0);
        debug!(total = self.sequence.len(), "sequencer started");
        self.current()
    }

    /// The view to render now.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NotStarted` before `start`, and
    /// `SequencerError::Finished` once the sequence is done.
    pub fn current(&self) -> Result<&ViewDescriptor, SequencerError> {
        match self.state {
            SequencerState::AtView(index) => {
                self.sequence.get(index).ok_or(SequencerError::Finished)
            }
            SequencerState::Ready => Err(SequencerError::NotStarted),
            SequencerState::Finished => Err(SequencerError::Finished),
        }
    }

    /// Move past the current view.
    ///
    /// In `Finished` this does nothing and returns `Finished`.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NotStarted` before `start`.
    pub fn advance(&mut self) -> Result<SequencerState, SequencerError> {
        self.state = match self.state {
            SequencerState::Ready => {
                warn!("advance called before start");
                return Err(SequencerError::NotStarted);
            }
            SequencerState::AtView(index) if index + 1 < self.sequence.len() => {
                SequencerState::AtView(index + 1)
            }
            SequencerState::AtView(_) => {
                debug!("sequence finished");
                SequencerState::Finished
            }
            SequencerState::Finished => {
                debug!("advance ignored: sequence already finished");
                SequencerState::Finished
            }
        };
        if let SequencerState::AtView(index) = self.state {
            if let Some(view) = self.sequence.get(index) {
                debug!(cursor = index, view = %view.id, role = %view.role, "advanced");
            }
        }
        Ok(self.state)
    }

    /// Progress metadata for the current view; `None` when it shows no indicator.
    ///
    /// # Errors
    ///
    /// Same as [`ViewSequencer::current`].
    pub fn progress_info(&self) -> Result<Option<ProgressInfo>, SequencerError> {
        let view = self.current()?;
        Ok(self.progress.info(&view.id))
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == SequencerState::Finished
    }

    /// Cursor position in `[0, len]`; `len` once finished.
    #[must_use]
    pub fn cursor(&self) -> usize {
        match self.state {
            SequencerState::Ready => 0,
            SequencerState::AtView(index) => index,
            SequencerState::Finished => self.sequence.len(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// The view that follows the current one, if any.
    #[must_use]
    pub fn peek_next(&self) -> Option<&ViewDescriptor> {
        match self.state {
            SequencerState::Ready => self.sequence.get(0),
            SequencerState::AtView(index) => self.sequence.get(index + 1),
            SequencerState::Finished => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> SequenceProgress {
        let total = self.sequence.len();
        let completed = self.cursor();
        SequenceProgress {
            total,
            completed,
            remaining: total.saturating_sub(completed),
            is_complete: self.is_finished(),
        }
    }
}

impl fmt::Debug for ViewSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSequencer")
            .field("len", &self.sequence.len())
            .field("state", &self.state)
            .field("tracked", &self.progress.tracked_count())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::ProgressMapper;
    use experiment_core::model::{Condition, ProgressBarSettings, ViewId, ViewRole};

    fn sequencer() -> ViewSequencer {
        let sequence = Sequence::new(vec![
            ViewDescriptor::new("intro", ViewRole::Introduction),
            ViewDescriptor::new("main1", ViewRole::MainBlock),
            ViewDescriptor::new("break1", ViewRole::Break),
        ])
        .unwrap();
        let table = ProgressMapper::new([ViewId::new("main1")], ProgressBarSettings::default())
            .map(Condition::GroupA, &sequence)
            .unwrap();
        ViewSequencer::new(sequence, table)
    }

    #[test]
    fn current_before_start_is_an_error() {
        let seq = sequencer();
        assert_eq!(seq.state(), SequencerState::Ready);
        assert_eq!(seq.current().unwrap_err(), SequencerError::NotStarted);
        assert_eq!(seq.progress_info().unwrap_err(), SequencerError::NotStarted);
    }

    #[test]
    fn start_twice_is_an_error() {
        let mut seq = sequencer();
        assert_eq!(seq.start().unwrap().id.as_str(), "intro");
        assert_eq!(seq.start().unwrap_err(), SequencerError::AlreadyStarted);
        assert_eq!(seq.state(), SequencerState::AtView(0));
    }

    #[test]
    fn advance_before_start_is_an_error() {
        let mut seq = sequencer();
        assert_eq!(seq.advance().unwrap_err(), SequencerError::NotStarted);
        assert_eq!(seq.state(), SequencerState::Ready);
    }

    #[test]
    fn advancing_len_times_finishes_and_stays_finished() {
        let mut seq = sequencer();
        seq.start().unwrap();
        for _ in 0..seq.len() {
            assert!(!seq.is_finished());
            seq.advance().unwrap();
        }
        assert!(seq.is_finished());
        assert_eq!(seq.cursor(), seq.len());
        assert_eq!(seq.advance().unwrap(), SequencerState::Finished);
        assert_eq!(seq.cursor(), seq.len());
        assert_eq!(seq.current().unwrap_err(), SequencerError::Finished);
    }

    #[test]
    fn progress_info_follows_cursor() {
        let mut seq = sequencer();
        seq.start().unwrap();
        assert_eq!(seq.progress_info().unwrap(), None);
        seq.advance().unwrap();
        let info = seq.progress_info().unwrap().unwrap();
        assert_eq!((info.position, info.total), (1, 1));
        seq.advance().unwrap();
        assert_eq!(seq.progress_info().unwrap(), None);
    }

    #[test]
    fn peek_and_progress_snapshot() {
        let mut seq = sequencer();
        assert_eq!(seq.peek_next().unwrap().id.as_str(), "intro");
        seq.start().unwrap();
        assert_eq!(seq.peek_next().unwrap().id.as_str(), "main1");
        seq.advance().unwrap();
        seq.advance().unwrap();
        assert!(seq.peek_next().is_none());
        let progress = seq.progress();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.remaining, 1);
        assert!(!progress.is_complete);
    }
}
