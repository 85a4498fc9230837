use rand::Rng;

use experiment_core::model::Condition;

use crate::error::ConfigError;

/// Draws the between-participants condition for a new session.
///
/// Call once per session and keep the result; drawing again would
/// desynchronize the condition from an already built sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionAssigner {
    conditions: Vec<Condition>,
}

impl ConditionAssigner {
    /// Create an assigner over the configured conditions. Duplicates are dropped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyConditionSet` if no condition is given.
    pub fn new(conditions: impl IntoIterator<Item = Condition>) -> Result<Self, ConfigError> {
        let mut unique = Vec::new();
        for condition in conditions {
            if !unique.contains(&condition) {
                unique.push(condition);
            }
        }
        if unique.is_empty() {
            return Err(ConfigError::EmptyConditionSet);
        }
        Ok(Self { conditions: unique })
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Uniform draw using the thread-local generator.
    #[must_use]
    pub fn assign(&self) -> Condition {
        self.assign_with(&mut rand::rng())
    }

    /// Uniform draw using the given generator.
    pub fn assign_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Condition {
        // `new` guarantees at least one condition.
        let index = rng.random_range(0..self.conditions.len());
        self.conditions[index]
    }
}

impl Default for ConditionAssigner {
    fn default() -> Self {
        Self {
            conditions: Condition::ALL.to_vec(),
        }
    }
}
