use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use experiment_core::model::{ViewId, ViewRole};

/// Data recorded by one view, e.g. one trial. The sequencer never looks inside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub view: ViewId,
    pub role: ViewRole,
    pub data: Map<String, Value>,
}

/// Body posted to the results endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsPayload {
    pub experiment_id: String,
    pub trials: Vec<Map<String, Value>>,
}

impl ResultsPayload {
    /// Flatten rows into trials, tagging each with its view and the session-wide
    /// `globals`. Keys a view recorded itself are never overwritten by globals.
    #[must_use]
    pub fn assemble(
        experiment_id: impl Into<String>,
        globals: &Map<String, Value>,
        rows: &[ResultRow],
    ) -> Self {
        let trials = rows
            .iter()
            .map(|row| {
                let mut trial = row.data.clone();
                trial.insert("view".into(), Value::String(row.view.to_string()));
                trial.insert("role".into(), Value::String(row.role.as_str().into()));
                for (key, value) in globals {
                    trial.entry(key.clone()).or_insert_with(|| value.clone());
                }
                trial
            })
            .collect();

        Self {
            experiment_id: experiment_id.into(),
            trials,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(view: &str, data: Value) -> ResultRow {
        ResultRow {
            view: ViewId::new(view),
            role: ViewRole::MainBlock,
            data: data.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn globals_fill_missing_keys_only() {
        let globals = json!({ "condition": "GroupA", "rt": 0 });
        let payload = ResultsPayload::assemble(
            "256",
            globals.as_object().unwrap(),
            &[row("main_feature_1", json!({ "rt": 512, "correct": true }))],
        );

        assert_eq!(payload.len(), 1);
        let trial = &payload.trials[0];
        assert_eq!(trial["rt"], json!(512));
        assert_eq!(trial["condition"], json!("GroupA"));
        assert_eq!(trial["view"], json!("main_feature_1"));
        assert_eq!(trial["role"], json!("main_block"));
    }

    #[test]
    fn payload_serializes_with_trials_array() {
        let payload = ResultsPayload::assemble("7", &Map::new(), &[]);
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body, json!({ "experiment_id": "7", "trials": [] }));
    }
}
