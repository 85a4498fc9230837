use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

const MTURK_SUBMIT_URL: &str = "https://www.mturk.com/mturk/externalSubmit";
const MTURK_SANDBOX_SUBMIT_URL: &str = "https://workersandbox.mturk.com/mturk/externalSubmit";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeploymentError {
    #[error("unknown deploy method: {0}")]
    UnknownMethod(String),

    #[error("experiment id cannot be empty")]
    EmptyExperimentId,

    #[error("contact email cannot be empty")]
    EmptyContact,

    #[error("invalid server URL: {0}")]
    InvalidServerUrl(String),

    #[error("server URL must use http or https, got `{0}`")]
    UnsupportedScheme(String),

    #[error("Prolific deployments need a completion URL")]
    MissingProlificUrl,

    #[error("invalid Prolific completion URL: {0}")]
    InvalidProlificUrl(String),
}

//
// ─── METHOD ────────────────────────────────────────────────────────────────────
//

/// Where the experiment is deployed and how participants reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeployMethod {
    /// Local run; results are shown instead of submitted.
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "directLink")]
    DirectLink,
    #[serde(rename = "MTurk")]
    MTurk,
    #[serde(rename = "MTurkSandbox")]
    MTurkSandbox,
    #[serde(rename = "Prolific")]
    Prolific,
}

impl DeployMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeployMethod::Debug => "debug",
            DeployMethod::DirectLink => "directLink",
            DeployMethod::MTurk => "MTurk",
            DeployMethod::MTurkSandbox => "MTurkSandbox",
            DeployMethod::Prolific => "Prolific",
        }
    }

    #[must_use]
    pub fn is_debug(self) -> bool {
        matches!(self, DeployMethod::Debug)
    }
}

impl fmt::Display for DeployMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeployMethod {
    type Err = DeploymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "debug" => Ok(Self::Debug),
            "directLink" => Ok(Self::DirectLink),
            "MTurk" => Ok(Self::MTurk),
            "MTurkSandbox" => Ok(Self::MTurkSandbox),
            "Prolific" => Ok(Self::Prolific),
            other => Err(DeploymentError::UnknownMethod(other.to_string())),
        }
    }
}

//
// ─── DESCRIPTOR ────────────────────────────────────────────────────────────────
//

/// Unvalidated deployment record, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptorDraft {
    pub deploy_method: DeployMethod,
    pub experiment_id: String,
    pub server_app_url: String,
    pub contact_email: String,
    #[serde(default)]
    pub prolific_url: Option<String>,
}

/// Static deployment record consumed at startup and passed through to the
/// submission client and platform glue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDescriptor {
    deploy_method: DeployMethod,
    experiment_id: String,
    server_app_url: Url,
    contact_email: String,
    prolific_url: Option<Url>,
}

impl DeploymentDescriptorDraft {
    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `DeploymentError` when a required field is blank, a URL does not
    /// parse, or a Prolific deployment has no completion URL.
    pub fn validate(self) -> Result<DeploymentDescriptor, DeploymentError> {
        let experiment_id = self.experiment_id.trim().to_string();
        if experiment_id.is_empty() {
            return Err(DeploymentError::EmptyExperimentId);
        }
        let contact_email = self.contact_email.trim().to_string();
        if contact_email.is_empty() {
            return Err(DeploymentError::EmptyContact);
        }

        let server_app_url = Url::parse(self.server_app_url.trim())
            .map_err(|_| DeploymentError::InvalidServerUrl(self.server_app_url.clone()))?;
        if !matches!(server_app_url.scheme(), "http" | "https") {
            return Err(DeploymentError::UnsupportedScheme(
                server_app_url.scheme().to_string(),
            ));
        }

        let prolific_url = match normalize_optional(self.prolific_url) {
            Some(raw) => Some(
                Url::parse(&raw).map_err(|_| DeploymentError::InvalidProlificUrl(raw.clone()))?,
            ),
            None => None,
        };
        if self.deploy_method == DeployMethod::Prolific && prolific_url.is_none() {
            return Err(DeploymentError::MissingProlificUrl);
        }

        Ok(DeploymentDescriptor {
            deploy_method: self.deploy_method,
            experiment_id,
            server_app_url,
            contact_email,
            prolific_url,
        })
    }
}

impl DeploymentDescriptor {
    #[must_use]
    pub fn deploy_method(&self) -> DeployMethod {
        self.deploy_method
    }

    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    #[must_use]
    pub fn server_app_url(&self) -> &Url {
        &self.server_app_url
    }

    #[must_use]
    pub fn contact_email(&self) -> &str {
        &self.contact_email
    }

    /// Where the participant is sent after a successful submission, if the
    /// platform expects a redirect.
    #[must_use]
    pub fn completion_redirect(&self) -> Option<Url> {
        match self.deploy_method {
            DeployMethod::Prolific => self.prolific_url.clone(),
            DeployMethod::MTurk => Url::parse(MTURK_SUBMIT_URL).ok(),
            DeployMethod::MTurkSandbox => Url::parse(MTURK_SANDBOX_SUBMIT_URL).ok(),
            DeployMethod::Debug | DeployMethod::DirectLink => None,
        }
    }

    /// Copy of this descriptor with a different deploy method.
    ///
    /// # Errors
    ///
    /// Returns `DeploymentError::MissingProlificUrl` when switching to Prolific
    /// without a completion URL.
    pub fn with_deploy_method(&self, method: DeployMethod) -> Result<Self, DeploymentError> {
        if method == DeployMethod::Prolific && self.prolific_url.is_none() {
            return Err(DeploymentError::MissingProlificUrl);
        }
        Ok(Self {
            deploy_method: method,
            ..self.clone()
        })
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
