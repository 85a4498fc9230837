use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown condition: {raw}")]
pub struct ParseConditionError {
    pub raw: String,
}

/// Between-participants group a session is assigned to.
///
/// The two groups see the same views, counterbalanced:
/// - `GroupA` practises conjunction search first.
/// - `GroupB` practises feature search first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    GroupA,
    GroupB,
}

impl Condition {
    /// Every supported condition, in declaration order.
    pub const ALL: [Condition; 2] = [Condition::GroupA, Condition::GroupB];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::GroupA => "GroupA",
            Condition::GroupB => "GroupB",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ParseConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "GroupA" | "groupA" | "a" | "A" => Ok(Self::GroupA),
            "GroupB" | "groupB" | "b" | "B" => Ok(Self::GroupB),
            other => Err(ParseConditionError {
                raw: other.to_string(),
            }),
        }
    }
}

/// One value per condition, looked up by matching on the closed enum.
///
/// Replaces per-condition branching: a missing entry is a compile error rather
/// than a runtime lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerCondition<T> {
    #[serde(rename = "GroupA")]
    pub group_a: T,
    #[serde(rename = "GroupB")]
    pub group_b: T,
}

impl<T> PerCondition<T> {
    #[must_use]
    pub fn new(group_a: T, group_b: T) -> Self {
        Self { group_a, group_b }
    }

    #[must_use]
    pub fn get(&self, condition: Condition) -> &T {
        match condition {
            Condition::GroupA => &self.group_a,
            Condition::GroupB => &self.group_b,
        }
    }

    /// Applies `f` to every entry, keeping the condition keying and stopping
    /// at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(Condition, T) -> Result<U, E>,
    ) -> Result<PerCondition<U>, E> {
        Ok(PerCondition {
            group_a: f(Condition::GroupA, self.group_a)?,
            group_b: f(Condition::GroupB, self.group_b)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Condition, &T)> {
        Condition::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels() {
        assert_eq!("GroupA".parse::<Condition>().unwrap(), Condition::GroupA);
        assert_eq!(" b ".parse::<Condition>().unwrap(), Condition::GroupB);
    }

    #[test]
    fn rejects_unknown_label() {
        let err = "GroupC".parse::<Condition>().unwrap_err();
        assert_eq!(err.raw, "GroupC");
    }

    #[test]
    fn per_condition_lookup_matches_key() {
        let table = PerCondition::new("first", "second");
        assert_eq!(*table.get(Condition::GroupA), "first");
        assert_eq!(*table.get(Condition::GroupB), "second");
        let keys: Vec<_> = table.iter().map(|(c, _)| c).collect();
        assert_eq!(keys, Condition::ALL.to_vec());
    }

    #[test]
    fn per_condition_deserializes_group_keys() {
        let table: PerCondition<u8> =
            serde_json::from_str(r#"{"GroupA": 1, "GroupB": 2}"#).unwrap();
        assert_eq!(table, PerCondition::new(1, 2));
    }

    #[test]
    fn per_condition_missing_key_is_rejected() {
        let parsed = serde_json::from_str::<PerCondition<u8>>(r#"{"GroupA": 1}"#);
        assert!(parsed.is_err());
    }
}
