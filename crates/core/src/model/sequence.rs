use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::ViewId;
use crate::model::view::ViewDescriptor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequenceError {
    #[error("sequence must contain at least one view")]
    Empty,

    #[error("view `{0}` appears more than once")]
    DuplicateView(ViewId),

    #[error("view id cannot be blank")]
    BlankId,
}

/// Ordered, condition-specific list of views for one session.
///
/// Immutable once built: no view is ever appended or removed, only a cursor
/// moves over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    views: Vec<ViewDescriptor>,
}

impl Sequence {
    /// Build a sequence from an ordered list of views.
    ///
    /// # Errors
    ///
    /// Returns `SequenceError::Empty` for an empty list, `SequenceError::BlankId`
    /// for a blank id and `SequenceError::DuplicateView` when an id repeats.
    pub fn new(views: Vec<ViewDescriptor>) -> Result<Self, SequenceError> {
        if views.is_empty() {
            return Err(SequenceError::Empty);
        }
        let mut seen = HashSet::with_capacity(views.len());
        for view in &views {
            if view.id.is_blank() {
                return Err(SequenceError::BlankId);
            }
            if !seen.insert(&view.id) {
                return Err(SequenceError::DuplicateView(view.id.clone()));
            }
        }
        Ok(Self { views })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ViewDescriptor> {
        self.views.get(index)
    }

    #[must_use]
    pub fn views(&self) -> &[ViewDescriptor] {
        &self.views
    }

    pub fn ids(&self) -> impl Iterator<Item = &ViewId> {
        self.views.iter().map(|v| &v.id)
    }

    #[must_use]
    pub fn position(&self, id: &ViewId) -> Option<usize> {
        self.views.iter().position(|v| &v.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &ViewId) -> bool {
        self.position(id).is_some()
    }
}
