//! Declarative experiment configuration: view catalog, per-condition
//! templates, progress bar and deployment.
//!
//! Loaded from TOML, with `EXP_*` environment variables overriding the
//! deployment section.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use experiment_core::model::{
    Condition, DeployMethod, DeploymentDescriptorDraft, PerCondition, ProgressBarSettings,
    ProgressStyle, ViewDescriptor, ViewId, ViewRole,
};

use crate::error::ConfigError;

pub const ENV_DEPLOY_METHOD: &str = "EXP_DEPLOY_METHOD";
pub const ENV_SERVER_URL: &str = "EXP_SERVER_URL";
pub const ENV_EXPERIMENT_ID: &str = "EXP_EXPERIMENT_ID";
pub const ENV_CONTACT_EMAIL: &str = "EXP_CONTACT_EMAIL";
pub const ENV_PROLIFIC_URL: &str = "EXP_PROLIFIC_URL";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "all_conditions")]
    pub conditions: Vec<Condition>,
    pub views: Vec<ViewDescriptor>,
    pub templates: PerCondition<Vec<ViewId>>,
    #[serde(default)]
    pub progress_bar: ProgressBarConfig,
    pub deploy: DeploymentDescriptorDraft,
    /// Absolute URLs of assets to warm before the first view.
    #[serde(default)]
    pub preload: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ProgressBarConfig {
    /// Views that show a progress indicator.
    #[serde(rename = "in", default)]
    pub tracked: Vec<ViewId>,
    #[serde(default)]
    pub style: ProgressStyle,
    #[serde(default = "default_width")]
    pub width: u32,
}

impl ProgressBarConfig {
    #[must_use]
    pub fn settings(&self) -> ProgressBarSettings {
        ProgressBarSettings {
            style: self.style,
            width: self.width,
        }
    }
}

fn all_conditions() -> Vec<Condition> {
    Condition::ALL.to_vec()
}

fn default_width() -> u32 {
    ProgressBarSettings::default().width
}

impl ExperimentConfig {
    /// Read a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Parse` if it is not a valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if `raw` is not a valid configuration.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply deployment overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Deployment` if `EXP_DEPLOY_METHOD` is not a known method.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply deployment overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Deployment` if the deploy method is not a known method.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(method) = lookup(ENV_DEPLOY_METHOD) {
            self.deploy.deploy_method = method.parse()?;
        }
        if let Some(url) = lookup(ENV_SERVER_URL) {
            self.deploy.server_app_url = url;
        }
        if let Some(id) = lookup(ENV_EXPERIMENT_ID) {
            self.deploy.experiment_id = id;
        }
        if let Some(email) = lookup(ENV_CONTACT_EMAIL) {
            self.deploy.contact_email = email;
        }
        if let Some(url) = lookup(ENV_PROLIFIC_URL) {
            self.deploy.prolific_url = Some(url);
        }
        Ok(self)
    }

    /// The built-in visual-search study.
    ///
    /// `GroupA` practises conjunction search first, `GroupB` feature search.
    /// Main blocks are counterbalanced the same way, each followed by a break.
    #[must_use]
    pub fn visual_search() -> Self {
        let mut views = vec![
            ViewDescriptor::new("intro", ViewRole::Introduction),
            ViewDescriptor::new("instructions", ViewRole::Instructions),
            ViewDescriptor::new("main_instructions", ViewRole::Instructions),
            ViewDescriptor::new("practice_conjunction", ViewRole::Practice),
            ViewDescriptor::new("practice_feature", ViewRole::Practice),
        ];
        for n in 1..=4 {
            views.push(ViewDescriptor::new(
                format!("instructions_conjunction_{n}"),
                ViewRole::Instructions,
            ));
            views.push(ViewDescriptor::new(
                format!("instructions_feature_{n}"),
                ViewRole::Instructions,
            ));
        }
        for n in 1..=3 {
            views.push(ViewDescriptor::new(
                format!("main_conjunction_{n}"),
                ViewRole::MainBlock,
            ));
            views.push(ViewDescriptor::new(format!("main_feature_{n}"), ViewRole::MainBlock));
        }
        for n in 1..=6 {
            views.push(ViewDescriptor::new(format!("after_block_{n}"), ViewRole::Break));
        }
        views.push(ViewDescriptor::new("post_test", ViewRole::PostTest));
        views.push(ViewDescriptor::new("thanks", ViewRole::Thanks));

        let group_a = template(&[
            "intro",
            "instructions",
            "instructions_conjunction_1",
            "practice_conjunction",
            "instructions_feature_1",
            "practice_feature",
            "main_instructions",
            "instructions_conjunction_2",
            "main_conjunction_1",
            "after_block_1",
            "instructions_conjunction_3",
            "main_conjunction_2",
            "after_block_2",
            "instructions_feature_2",
            "main_feature_1",
            "after_block_3",
            "instructions_conjunction_4",
            "main_conjunction_3",
            "after_block_4",
            "instructions_feature_3",
            "main_feature_2",
            "after_block_5",
            "instructions_feature_4",
            "main_feature_3",
            "after_block_6",
            "post_test",
            "thanks",
        ]);
        let group_b = template(&[
            "intro",
            "instructions",
            "instructions_feature_1",
            "practice_feature",
            "instructions_conjunction_1",
            "practice_conjunction",
            "main_instructions",
            "instructions_feature_2",
            "main_feature_1",
            "after_block_1",
            "instructions_feature_3",
            "main_feature_2",
            "after_block_2",
            "instructions_conjunction_2",
            "main_conjunction_1",
            "after_block_3",
            "instructions_feature_4",
            "main_feature_3",
            "after_block_4",
            "instructions_conjunction_3",
            "main_conjunction_2",
            "after_block_5",
            "instructions_conjunction_4",
            "main_conjunction_3",
            "after_block_6",
            "post_test",
            "thanks",
        ]);

        Self {
            conditions: all_conditions(),
            views,
            templates: PerCondition::new(group_a, group_b),
            progress_bar: ProgressBarConfig {
                tracked: template(&[
                    "practice_conjunction",
                    "practice_feature",
                    "main_conjunction_1",
                    "main_conjunction_2",
                    "main_conjunction_3",
                    "main_feature_1",
                    "main_feature_2",
                    "main_feature_3",
                ]),
                style: ProgressStyle::Separate,
                width: 100,
            },
            deploy: DeploymentDescriptorDraft {
                deploy_method: DeployMethod::DirectLink,
                experiment_id: "256".into(),
                server_app_url: "https://magpie-demo.herokuapp.com/api/submit_experiment/".into(),
                contact_email: "experimenter@example.org".into(),
                prolific_url: Some(
                    "https://app.prolific.ac/submissions/complete?cc=SAMPLE1234".into(),
                ),
            },
            preload: Vec::new(),
        }
    }
}

fn template(ids: &[&str]) -> Vec<ViewId> {
    ids.iter().copied().map(ViewId::from).collect()
}
