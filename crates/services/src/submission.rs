use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use experiment_core::model::{DeployMethod, DeploymentDescriptor};

use crate::error::SubmissionError;
use crate::results::ResultsPayload;

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    /// HTTP status of the endpoint; `None` when nothing was sent.
    pub status: Option<u16>,
    pub trials: usize,
}

/// Delivers finished results to their destination.
///
/// Retry policy belongs to implementations; callers may call `submit` again
/// after a failure.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// # Errors
    ///
    /// Returns `SubmissionError` if the results could not be delivered.
    async fn submit(
        &self,
        deployment: &DeploymentDescriptor,
        payload: &ResultsPayload,
    ) -> Result<SubmissionReceipt, SubmissionError>;
}

/// Posts results as JSON to the deployment's server endpoint.
#[derive(Clone, Default)]
pub struct HttpSubmissionClient {
    client: Client,
}

impl HttpSubmissionClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionClient for HttpSubmissionClient {
    async fn submit(
        &self,
        deployment: &DeploymentDescriptor,
        payload: &ResultsPayload,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let response = self
            .client
            .post(deployment.server_app_url().clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmissionError::HttpStatus(status));
        }

        info!(
            experiment_id = deployment.experiment_id(),
            trials = payload.len(),
            status = status.as_u16(),
            "results submitted"
        );
        Ok(SubmissionReceipt {
            status: Some(status.as_u16()),
            trials: payload.len(),
        })
    }
}

/// Used by debug deployments: results stay local.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugSubmissionClient;

#[async_trait]
impl SubmissionClient for DebugSubmissionClient {
    async fn submit(
        &self,
        deployment: &DeploymentDescriptor,
        payload: &ResultsPayload,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        info!(
            experiment_id = deployment.experiment_id(),
            trials = payload.len(),
            "debug deployment, results not sent"
        );
        Ok(SubmissionReceipt {
            status: None,
            trials: payload.len(),
        })
    }
}

/// The client matching a deploy method.
#[must_use]
pub fn client_for(method: DeployMethod) -> Arc<dyn SubmissionClient> {
    if method.is_debug() {
        Arc::new(DebugSubmissionClient)
    } else {
        Arc::new(HttpSubmissionClient::new())
    }
}
