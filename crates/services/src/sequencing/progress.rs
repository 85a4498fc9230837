use std::collections::{BTreeSet, HashMap};

use experiment_core::model::{Condition, ProgressBarSettings, ProgressInfo, Sequence, ViewId};

use crate::error::ConfigError;

/// Builds progress tables from the configured set of tracked views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressMapper {
    tracked: BTreeSet<ViewId>,
    settings: ProgressBarSettings,
}

impl ProgressMapper {
    #[must_use]
    pub fn new(tracked: impl IntoIterator<Item = ViewId>, settings: ProgressBarSettings) -> Self {
        Self {
            tracked: tracked.into_iter().collect(),
            settings,
        }
    }

    #[must_use]
    pub fn tracked(&self) -> &BTreeSet<ViewId> {
        &self.tracked
    }

    /// Map every view of `sequence` to its progress entry.
    ///
    /// Tracked views are numbered in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownProgressView` if a tracked id is absent from
    /// `sequence`.
    pub fn map(
        &self,
        condition: Condition,
        sequence: &Sequence,
    ) -> Result<ProgressTable, ConfigError> {
        if let Some(missing) = self.tracked.iter().find(|id| !sequence.contains(id)) {
            return Err(ConfigError::UnknownProgressView {
                condition,
                view: missing.clone(),
            });
        }

        let total = self.tracked.len();
        let mut position = 0;
        let mut entries = HashMap::with_capacity(sequence.len());
        for id in sequence.ids() {
            let entry = if self.tracked.contains(id) {
                position += 1;
                Some(ProgressInfo {
                    position,
                    total,
                    style: self.settings.style,
                    width: self.settings.width,
                })
            } else {
                None
            };
            entries.insert(id.clone(), entry);
        }

        Ok(ProgressTable { entries, total })
    }
}

/// Progress entry for every view of one sequence. `None` means no indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTable {
    entries: HashMap<ViewId, Option<ProgressInfo>>,
    total: usize,
}

impl ProgressTable {
    /// Progress metadata for `id`, or `None` when the view shows no indicator.
    #[must_use]
    pub fn info(&self, id: &ViewId) -> Option<ProgressInfo> {
        self.entries.get(id).copied().flatten()
    }

    #[must_use]
    pub fn is_tracked(&self, id: &ViewId) -> bool {
        self.info(id).is_some()
    }

    /// Returns true when `id` has an entry, tracked or not.
    #[must_use]
    pub fn contains(&self, id: &ViewId) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tracked views.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use experiment_core::model::{ProgressStyle, ViewDescriptor, ViewRole};

    fn sequence() -> Sequence {
        Sequence::new(vec![
            ViewDescriptor::new("intro", ViewRole::Introduction),
            ViewDescriptor::new("practice", ViewRole::Practice),
            ViewDescriptor::new("main1", ViewRole::MainBlock),
            ViewDescriptor::new("break1", ViewRole::Break),
            ViewDescriptor::new("thanks", ViewRole::Thanks),
        ])
        .unwrap()
    }

    fn mapper(tracked: &[&str]) -> ProgressMapper {
        ProgressMapper::new(
            tracked.iter().copied().map(ViewId::from),
            ProgressBarSettings {
                style: ProgressStyle::Separate,
                width: 100,
            },
        )
    }

    #[test]
    fn every_view_has_an_entry() {
        let seq = sequence();
        let table = mapper(&["main1", "practice"])
            .map(Condition::GroupA, &seq)
            .unwrap();
        assert_eq!(table.len(), seq.len());
        for view in seq.views() {
            assert!(table.contains(&view.id));
            let expected = matches!(view.id.as_str(), "main1" | "practice");
            assert_eq!(table.is_tracked(&view.id), expected);
        }
    }

    #[test]
    fn tracked_views_are_numbered_in_sequence_order() {
        let table = mapper(&["main1", "practice"])
            .map(Condition::GroupA, &sequence())
            .unwrap();
        let practice = table.info(&ViewId::new("practice")).unwrap();
        let main = table.info(&ViewId::new("main1")).unwrap();
        assert_eq!((practice.position, practice.total), (1, 2));
        assert_eq!((main.position, main.total), (2, 2));
        assert_eq!(main.style, ProgressStyle::Separate);
        assert_eq!(table.tracked_count(), 2);
    }

    #[test]
    fn unknown_tracked_view_is_a_config_error() {
        let err = mapper(&["main1", "main9"])
            .map(Condition::GroupB, &sequence())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownProgressView { condition: Condition::GroupB, ref view }
                if view.as_str() == "main9"
        ));
    }

    #[test]
    fn empty_progress_set_tracks_nothing() {
        let seq = sequence();
        let table = mapper(&[]).map(Condition::GroupA, &seq).unwrap();
        assert!(seq.ids().all(|id| !table.is_tracked(id)));
    }
}
