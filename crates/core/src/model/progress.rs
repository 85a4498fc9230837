use serde::{Deserialize, Serialize};

/// How the progress indicator is drawn.
///
/// - `Default`: one bar across all tracked views.
/// - `Separate`: a fresh bar for each tracked view.
/// - `Chunks`: one chunk per tracked view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStyle {
    #[default]
    Default,
    Separate,
    Chunks,
}

/// Progress bar appearance shared by every tracked view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBarSettings {
    #[serde(default)]
    pub style: ProgressStyle,
    #[serde(default = "default_width")]
    pub width: u32,
}

fn default_width() -> u32 {
    100
}

impl Default for ProgressBarSettings {
    fn default() -> Self {
        Self {
            style: ProgressStyle::Default,
            width: default_width(),
        }
    }
}

/// Progress metadata for a tracked view: "view `position` of `total`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressInfo {
    /// 1-based position among the tracked views of the sequence.
    pub position: usize,
    pub total: usize,
    pub style: ProgressStyle,
    pub width: u32,
}

impl ProgressInfo {
    /// Number of tracked views completed before this one.
    #[must_use]
    pub fn completed_before(&self) -> usize {
        self.position.saturating_sub(1)
    }

    /// Width of a single chunk when drawn in `Chunks` style.
    #[must_use]
    pub fn chunk_width(&self) -> u32 {
        let total = u32::try_from(self.total.max(1)).unwrap_or(u32::MAX);
        self.width / total
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!("{} of {}", self.position, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_when_fields_missing() {
        let settings: ProgressBarSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, ProgressBarSettings::default());
    }

    #[test]
    fn chunk_width_divides_total_width() {
        let info = ProgressInfo {
            position: 3,
            total: 8,
            style: ProgressStyle::Chunks,
            width: 100,
        };
        assert_eq!(info.chunk_width(), 12);
        assert_eq!(info.completed_before(), 2);
        assert_eq!(info.label(), "3 of 8");
    }
}
