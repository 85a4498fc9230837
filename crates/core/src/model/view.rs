use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::ViewId;

//
// ─── ROLE ─────────────────────────────────────────────────────────────────────
//

/// What kind of screen a view is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewRole {
    Introduction,
    Instructions,
    Practice,
    /// A block of main trials; must be followed by a break.
    MainBlock,
    Break,
    PostTest,
    Thanks,
}

impl ViewRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ViewRole::Introduction => "introduction",
            ViewRole::Instructions => "instructions",
            ViewRole::Practice => "practice",
            ViewRole::MainBlock => "main_block",
            ViewRole::Break => "break",
            ViewRole::PostTest => "post_test",
            ViewRole::Thanks => "thanks",
        }
    }

    /// Returns true for views that present trials (practice or main).
    #[must_use]
    pub fn is_trial_block(self) -> bool {
        matches!(self, ViewRole::Practice | ViewRole::MainBlock)
    }
}

impl fmt::Display for ViewRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── DESCRIPTOR ───────────────────────────────────────────────────────────────
//

/// One screen of the catalog, shared by every condition's ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewDescriptor {
    pub id: ViewId,
    pub role: ViewRole,
}

impl ViewDescriptor {
    #[must_use]
    pub fn new(id: impl Into<ViewId>, role: ViewRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}
