use std::collections::HashMap;

use experiment_core::model::{
    Condition, PerCondition, Sequence, ViewDescriptor, ViewId, ViewRole,
};

use crate::error::ConfigError;

/// Length of the introduction/instructions prefix every template shares.
pub const SHARED_PREFIX_LEN: usize = 2;
/// Length of the post-test/thanks suffix every template shares.
pub const SHARED_SUFFIX_LEN: usize = 2;

/// Static catalog of views, shared by every condition's ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCatalog {
    views: HashMap<ViewId, ViewDescriptor>,
}

impl ViewCatalog {
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateCatalogView` when an id is declared twice.
    pub fn new(views: impl IntoIterator<Item = ViewDescriptor>) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for view in views {
            if map.contains_key(&view.id) {
                return Err(ConfigError::DuplicateCatalogView(view.id));
            }
            map.insert(view.id.clone(), view);
        }
        Ok(Self { views: map })
    }

    #[must_use]
    pub fn get(&self, id: &ViewId) -> Option<&ViewDescriptor> {
        self.views.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Per-condition view orderings, checked once and then looked up directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceBuilder {
    sequences: PerCondition<Sequence>,
}

impl SequenceBuilder {
    /// Resolve every template against the catalog and check the structure all
    /// templates must share.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a template references an unknown view, is
    /// empty or repeats a view, breaks the shared prefix/suffix, does not open
    /// with introduction and instructions and close with thanks, or has a main
    /// block that is not followed by exactly one break.
    pub fn new(
        catalog: &ViewCatalog,
        templates: PerCondition<Vec<ViewId>>,
    ) -> Result<Self, ConfigError> {
        let sequences = templates.try_map(|condition, ids| resolve(catalog, condition, ids))?;

        let reference = sequences.get(Condition::GroupA);
        for (condition, sequence) in sequences.iter() {
            check_shape(condition, sequence, reference)?;
            check_block_breaks(condition, sequence)?;
        }

        Ok(Self { sequences })
    }

    /// Ordered views for `condition`.
    #[must_use]
    pub fn build(&self, condition: Condition) -> Sequence {
        self.sequences.get(condition).clone()
    }

    #[must_use]
    pub fn sequence(&self, condition: Condition) -> &Sequence {
        self.sequences.get(condition)
    }
}

fn resolve(
    catalog: &ViewCatalog,
    condition: Condition,
    ids: Vec<ViewId>,
) -> Result<Sequence, ConfigError> {
    let views = ids
        .into_iter()
        .map(|id| {
            catalog
                .get(&id)
                .cloned()
                .ok_or(ConfigError::UnknownView { condition, view: id })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Sequence::new(views).map_err(|source| ConfigError::Sequence { condition, source })
}

fn check_shape(
    condition: Condition,
    sequence: &Sequence,
    reference: &Sequence,
) -> Result<(), ConfigError> {
    let len = sequence.len();
    if len < SHARED_PREFIX_LEN + SHARED_SUFFIX_LEN {
        return Err(ConfigError::TemplateTooShort { condition, len });
    }

    let views = sequence.views();
    let expected = reference.views();
    if views[..SHARED_PREFIX_LEN] != expected[..SHARED_PREFIX_LEN] {
        return Err(ConfigError::PrefixMismatch { condition });
    }
    if views[len - SHARED_SUFFIX_LEN..] != expected[expected.len() - SHARED_SUFFIX_LEN..] {
        return Err(ConfigError::SuffixMismatch { condition });
    }

    let frame = [
        (0, ViewRole::Introduction),
        (1, ViewRole::Instructions),
        (len - 1, ViewRole::Thanks),
    ];
    for (position, expected) in frame {
        let found = views[position].role;
        if found != expected {
            return Err(ConfigError::MisplacedRole {
                condition,
                position,
                expected,
                found,
            });
        }
    }
    Ok(())
}

/// Every main block is followed by exactly one break, unless it sits right
/// before the shared suffix. Practice blocks are exempt.
fn check_block_breaks(condition: Condition, sequence: &Sequence) -> Result<(), ConfigError> {
    let views = sequence.views();
    let last_before_suffix = views.len().saturating_sub(SHARED_SUFFIX_LEN + 1);
    let is_break = |index: usize| views.get(index).is_some_and(|v| v.role == ViewRole::Break);

    for (index, view) in views.iter().enumerate() {
        if view.role != ViewRole::MainBlock {
            continue;
        }
        if is_break(index + 1) {
            if is_break(index + 2) {
                return Err(ConfigError::ExtraBreak {
                    condition,
                    view: view.id.clone(),
                });
            }
        } else if index != last_before_suffix {
            return Err(ConfigError::MissingBreak {
                condition,
                view: view.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ViewCatalog {
        ViewCatalog::new([
            ViewDescriptor::new("intro", ViewRole::Introduction),
            ViewDescriptor::new("instructions", ViewRole::Instructions),
            ViewDescriptor::new("practice_conj", ViewRole::Practice),
            ViewDescriptor::new("practice_feat", ViewRole::Practice),
            ViewDescriptor::new("main1", ViewRole::MainBlock),
            ViewDescriptor::new("break1", ViewRole::Break),
            ViewDescriptor::new("main2", ViewRole::MainBlock),
            ViewDescriptor::new("break2", ViewRole::Break),
            ViewDescriptor::new("post_test", ViewRole::PostTest),
            ViewDescriptor::new("thanks", ViewRole::Thanks),
        ])
        .unwrap()
    }

    fn ids(raw: &[&str]) -> Vec<ViewId> {
        raw.iter().copied().map(ViewId::from).collect()
    }

    fn group_a() -> Vec<ViewId> {
        ids(&[
            "intro",
            "instructions",
            "practice_conj",
            "practice_feat",
            "main1",
            "break1",
            "main2",
            "break2",
            "post_test",
            "thanks",
        ])
    }

    fn group_b() -> Vec<ViewId> {
        ids(&[
            "intro",
            "instructions",
            "practice_feat",
            "practice_conj",
            "main2",
            "break1",
            "main1",
            "break2",
            "post_test",
            "thanks",
        ])
    }

    #[test]
    fn build_returns_template_order() {
        let builder = SequenceBuilder::new(&catalog(), PerCondition::new(group_a(), group_b()))
            .unwrap();
        let seq = builder.build(Condition::GroupB);
        let built: Vec<_> = seq.ids().cloned().collect();
        assert_eq!(built, group_b());
    }

    #[test]
    fn unknown_view_is_rejected() {
        let mut b = group_b();
        b[2] = ViewId::new("practice_missing");
        let err = SequenceBuilder::new(&catalog(), PerCondition::new(group_a(), b)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownView { condition: Condition::GroupB, ref view }
                if view.as_str() == "practice_missing"
        ));
    }

    #[test]
    fn empty_template_is_rejected() {
        let err =
            SequenceBuilder::new(&catalog(), PerCondition::new(group_a(), Vec::new())).unwrap_err();
        assert!(matches!(err, ConfigError::Sequence { condition: Condition::GroupB, .. }));
    }

    #[test]
    fn diverging_prefix_is_rejected() {
        let mut b = group_b();
        b.swap(0, 1);
        let err = SequenceBuilder::new(&catalog(), PerCondition::new(group_a(), b)).unwrap_err();
        assert!(matches!(err, ConfigError::PrefixMismatch { condition: Condition::GroupB }));
    }

    #[test]
    fn diverging_suffix_is_rejected() {
        let mut b = group_b();
        b.pop();
        let err = SequenceBuilder::new(&catalog(), PerCondition::new(group_a(), b)).unwrap_err();
        assert!(matches!(err, ConfigError::SuffixMismatch { condition: Condition::GroupB }));
    }

    #[test]
    fn template_must_open_with_introduction_and_close_with_thanks() {
        let inverted = ids(&["main1", "break1", "intro", "instructions"]);
        let err = SequenceBuilder::new(
            &catalog(),
            PerCondition::new(inverted.clone(), inverted),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MisplacedRole {
                condition: Condition::GroupA,
                position: 0,
                expected: ViewRole::Introduction,
                found: ViewRole::MainBlock,
            }
        ));

        let mut a = group_a();
        a.pop();
        let err = SequenceBuilder::new(&catalog(), PerCondition::new(a.clone(), a)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MisplacedRole {
                expected: ViewRole::Thanks,
                found: ViewRole::PostTest,
                ..
            }
        ));
    }

    #[test]
    fn main_block_without_break_is_rejected() {
        let a = ids(&[
            "intro",
            "instructions",
            "main1",
            "main2",
            "break2",
            "post_test",
            "thanks",
        ]);
        let err =
            SequenceBuilder::new(&catalog(), PerCondition::new(a.clone(), a)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBreak { ref view, .. } if view.as_str() == "main1"));
    }

    #[test]
    fn main_block_with_two_breaks_is_rejected() {
        let a = ids(&[
            "intro",
            "instructions",
            "main1",
            "break1",
            "break2",
            "post_test",
            "thanks",
        ]);
        let err =
            SequenceBuilder::new(&catalog(), PerCondition::new(a.clone(), a)).unwrap_err();
        assert!(matches!(err, ConfigError::ExtraBreak { ref view, .. } if view.as_str() == "main1"));
    }

    #[test]
    fn last_main_block_before_suffix_may_skip_break() {
        let a = ids(&[
            "intro",
            "instructions",
            "main1",
            "break1",
            "main2",
            "post_test",
            "thanks",
        ]);
        assert!(SequenceBuilder::new(&catalog(), PerCondition::new(a.clone(), a)).is_ok());
    }

    #[test]
    fn practice_blocks_need_no_break() {
        let a = ids(&[
            "intro",
            "instructions",
            "practice_conj",
            "practice_feat",
            "post_test",
            "thanks",
        ]);
        assert!(SequenceBuilder::new(&catalog(), PerCondition::new(a.clone(), a)).is_ok());
    }

    #[test]
    fn duplicate_catalog_entry_is_rejected() {
        let err = ViewCatalog::new([
            ViewDescriptor::new("intro", ViewRole::Introduction),
            ViewDescriptor::new("intro", ViewRole::Thanks),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCatalogView(_)));
    }
}
