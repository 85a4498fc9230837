//! Participant identifiers handed over by the recruitment platform in the
//! study link's query string.

use std::collections::BTreeMap;

use serde::Serialize;
use url::Url;

use experiment_core::model::DeployMethod;

const PROLIFIC_PARAMS: [(&str, &str); 3] = [
    ("PROLIFIC_PID", "prolific_pid"),
    ("STUDY_ID", "prolific_study_id"),
    ("SESSION_ID", "prolific_session_id"),
];

const MTURK_PARAMS: [(&str, &str); 3] = [
    ("workerId", "worker_id"),
    ("assignmentId", "assignment_id"),
    ("hitId", "hit_id"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParticipantContext {
    fields: BTreeMap<String, String>,
}

impl ParticipantContext {
    /// Read the platform parameters `method` defines from `url`.
    /// Unknown and empty parameters are ignored.
    #[must_use]
    pub fn from_url(url: &Url, method: DeployMethod) -> Self {
        let params: &[(&str, &str)] = match method {
            DeployMethod::Prolific => &PROLIFIC_PARAMS,
            DeployMethod::MTurk | DeployMethod::MTurkSandbox => &MTURK_PARAMS,
            DeployMethod::Debug | DeployMethod::DirectLink => &[],
        };

        let mut fields = BTreeMap::new();
        for (key, value) in url.query_pairs() {
            let Some((_, name)) = params.iter().find(|(param, _)| *param == key) else {
                continue;
            };
            let value = value.trim();
            if !value.is_empty() {
                fields.insert((*name).to_string(), value.to_string());
            }
        }
        Self { fields }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
