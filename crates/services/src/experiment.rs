use tracing::info;
use url::Url;

use experiment_core::model::{Condition, DeploymentDescriptor};

use crate::config::ExperimentConfig;
use crate::error::ConfigError;
use crate::sequencing::{
    ConditionAssigner, ProgressMapper, SequenceBuilder, ViewCatalog, ViewSequencer,
};

/// A validated experiment: everything a session needs, checked once at startup.
#[derive(Debug, Clone)]
pub struct Experiment {
    assigner: ConditionAssigner,
    builder: SequenceBuilder,
    mapper: ProgressMapper,
    deployment: DeploymentDescriptor,
    preload: Vec<Url>,
}

impl Experiment {
    /// Validate `config` for every condition.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found; no session may start from an
    /// invalid configuration. The configured conditions must cover every
    /// templated condition.
    pub fn from_config(config: &ExperimentConfig) -> Result<Self, ConfigError> {
        let assigner = ConditionAssigner::new(config.conditions.iter().copied())?;
        if Condition::ALL
            .iter()
            .any(|condition| !assigner.conditions().contains(condition))
        {
            return Err(ConfigError::ConditionSetMismatch {
                expected: Condition::ALL.to_vec(),
                got: assigner.conditions().to_vec(),
            });
        }
        let catalog = ViewCatalog::new(config.views.iter().cloned())?;
        let builder = SequenceBuilder::new(&catalog, config.templates.clone())?;
        let mapper = ProgressMapper::new(
            config.progress_bar.tracked.iter().cloned(),
            config.progress_bar.settings(),
        );
        for condition in Condition::ALL {
            mapper.map(condition, builder.sequence(condition))?;
        }
        let deployment = config.deploy.clone().validate()?;
        let preload = config
            .preload
            .iter()
            .map(|raw| Url::parse(raw).map_err(|_| ConfigError::InvalidPreloadUrl(raw.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            views = catalog.len(),
            tracked = mapper.tracked().len(),
            deploy_method = %deployment.deploy_method(),
            "experiment configuration validated"
        );

        Ok(Self {
            assigner,
            builder,
            mapper,
            deployment,
            preload,
        })
    }

    #[must_use]
    pub fn assigner(&self) -> &ConditionAssigner {
        &self.assigner
    }

    #[must_use]
    pub fn builder(&self) -> &SequenceBuilder {
        &self.builder
    }

    #[must_use]
    pub fn mapper(&self) -> &ProgressMapper {
        &self.mapper
    }

    #[must_use]
    pub fn deployment(&self) -> &DeploymentDescriptor {
        &self.deployment
    }

    /// Assets to warm; the same for every condition.
    #[must_use]
    pub fn preload_urls(&self) -> &[Url] {
        &self.preload
    }

    /// A fresh sequencer for `condition`, in the `Ready` state.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownProgressView` if the progress set does not
    /// fit the sequence; `from_config` already rules this out.
    pub fn sequencer(&self, condition: Condition) -> Result<ViewSequencer, ConfigError> {
        let sequence = self.builder.build(condition);
        let table = self.mapper.map(condition, &sequence)?;
        Ok(ViewSequencer::new(sequence, table))
    }
}
