use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{info, warn};

use experiment_core::Clock;
use experiment_core::model::{
    Condition, DeploymentDescriptor, ProgressInfo, SessionId, ViewDescriptor, ViewId,
};

use crate::error::SessionError;
use crate::experiment::Experiment;
use crate::platform::ParticipantContext;
use crate::results::{ResultRow, ResultsPayload};
use crate::sequencing::{SequenceProgress, SequencerState, ViewSequencer};
use crate::submission::{SubmissionClient, SubmissionReceipt};

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    clock: Clock,
    forced_condition: Option<Condition>,
    participant: ParticipantContext,
}

impl SessionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Skip the random draw. Honoured for debug deployments only.
    #[must_use]
    pub fn with_forced_condition(mut self, condition: Option<Condition>) -> Self {
        self.forced_condition = condition;
        self
    }

    #[must_use]
    pub fn with_participant(mut self, participant: ParticipantContext) -> Self {
        self.participant = participant;
        self
    }
}

//
// ─── MONITOR ───────────────────────────────────────────────────────────────────
//

/// Read-only snapshot for debug tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMonitor {
    pub session_id: SessionId,
    pub condition: Condition,
    pub state: SequencerState,
    pub current: Option<ViewId>,
    pub next: Option<ViewId>,
    pub progress: SequenceProgress,
    pub recorded_rows: usize,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One participant's run, from condition assignment to submission.
///
/// The condition is drawn exactly once, in `init`, and cached for the whole
/// session. This handle replaces any process-wide debug slot: debug tooling
/// attaches through [`ExperimentSession::monitor`].
pub struct ExperimentSession {
    id: SessionId,
    condition: Condition,
    deployment: DeploymentDescriptor,
    participant: ParticipantContext,
    sequencer: ViewSequencer,
    clock: Clock,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    rows: Vec<ResultRow>,
}

impl ExperimentSession {
    /// Assign a condition and prepare its sequence.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if the sequence cannot be prepared.
    pub fn init(experiment: &Experiment, options: SessionOptions) -> Result<Self, SessionError> {
        Self::init_with_rng(experiment, options, &mut rand::rng())
    }

    /// Like [`ExperimentSession::init`], drawing the condition from `rng`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` if the sequence cannot be prepared.
    pub fn init_with_rng<R: Rng + ?Sized>(
        experiment: &Experiment,
        options: SessionOptions,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        let deployment = experiment.deployment().clone();
        let condition = match options.forced_condition {
            Some(condition) if deployment.deploy_method().is_debug() => condition,
            Some(condition) => {
                warn!(%condition, "forced condition ignored outside debug deployments");
                experiment.assigner().assign_with(rng)
            }
            None => experiment.assigner().assign_with(rng),
        };
        let sequencer = experiment.sequencer(condition)?;
        let id = SessionId::random();

        info!(session = %id, %condition, views = sequencer.len(), "session initialized");

        Ok(Self {
            id,
            condition,
            deployment,
            participant: options.participant,
            sequencer,
            clock: options.clock,
            started_at: options.clock.now(),
            finished_at: None,
            rows: Vec::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn condition(&self) -> Condition {
        self.condition
    }

    #[must_use]
    pub fn deployment(&self) -> &DeploymentDescriptor {
        &self.deployment
    }

    #[must_use]
    pub fn sequencer(&self) -> &ViewSequencer {
        &self.sequencer
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Show the first view.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::AlreadyStarted` on a second call.
    pub fn start(&mut self) -> Result<&ViewDescriptor, SessionError> {
        Ok(self.sequencer.start()?)
    }

    /// # Errors
    ///
    /// Returns a `SequencerError` outside of a running sequence.
    pub fn current(&self) -> Result<&ViewDescriptor, SessionError> {
        Ok(self.sequencer.current()?)
    }

    /// # Errors
    ///
    /// Returns a `SequencerError` outside of a running sequence.
    pub fn progress_info(&self) -> Result<Option<ProgressInfo>, SessionError> {
        Ok(self.sequencer.progress_info()?)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.sequencer.is_finished()
    }

    /// Complete the current view. A no-op once finished.
    ///
    /// # Errors
    ///
    /// Returns `SequencerError::NotStarted` before `start`.
    pub fn advance(&mut self) -> Result<SequencerState, SessionError> {
        let state = self.sequencer.advance()?;
        if state == SequencerState::Finished && self.finished_at.is_none() {
            let now = self.clock.now();
            self.finished_at = Some(now);
            info!(
                session = %self.id,
                rows = self.rows.len(),
                duration_ms = self.clock.millis_since(self.started_at),
                "session finished"
            );
        }
        Ok(state)
    }

    /// Store data produced by the current view.
    ///
    /// # Errors
    ///
    /// Returns a `SequencerError` outside of a running sequence and
    /// `SessionError::NotCurrentView` when `view` is not the view on screen.
    pub fn record(&mut self, view: &ViewId, data: Map<String, Value>) -> Result<(), SessionError> {
        let current = self.sequencer.current()?;
        if &current.id != view {
            return Err(SessionError::NotCurrentView {
                expected: current.id.clone(),
                got: view.clone(),
            });
        }
        self.rows.push(ResultRow {
            view: current.id.clone(),
            role: current.role,
            data,
        });
        Ok(())
    }

    /// The body to submit, once the sequence is finished.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` while views remain.
    pub fn results_payload(&self) -> Result<ResultsPayload, SessionError> {
        let finished_at = self.finished_at.ok_or(SessionError::NotFinished)?;
        let mut globals = Map::new();
        globals.insert("session_id".into(), Value::String(self.id.to_string()));
        globals.insert("condition".into(), Value::String(self.condition.to_string()));
        globals.insert(
            "deploy_method".into(),
            Value::String(self.deployment.deploy_method().to_string()),
        );
        globals.insert(
            "experiment_start".into(),
            Value::String(self.started_at.to_rfc3339()),
        );
        globals.insert("experiment_end".into(), Value::String(finished_at.to_rfc3339()));
        globals.insert(
            "experiment_duration_ms".into(),
            Value::from((finished_at - self.started_at).num_milliseconds()),
        );
        for (key, value) in self.participant.iter() {
            globals.insert(key.to_string(), Value::String(value.to_string()));
        }

        Ok(ResultsPayload::assemble(
            self.deployment.experiment_id(),
            &globals,
            &self.rows,
        ))
    }

    /// Send the results. The session is left untouched either way, so a failed
    /// submission may be retried.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` while views remain, or
    /// `SessionError::Submission` if the client fails.
    pub async fn submit(
        &self,
        client: &dyn SubmissionClient,
    ) -> Result<SubmissionReceipt, SessionError> {
        let payload = self.results_payload()?;
        match client.submit(&self.deployment, &payload).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                warn!(
                    session = %self.id,
                    contact = self.deployment.contact_email(),
                    error = %err,
                    "results submission failed"
                );
                Err(err.into())
            }
        }
    }

    /// Debug snapshot. `None` outside debug deployments.
    #[must_use]
    pub fn monitor(&self) -> Option<SessionMonitor> {
        if !self.deployment.deploy_method().is_debug() {
            return None;
        }
        Some(SessionMonitor {
            session_id: self.id,
            condition: self.condition,
            state: self.sequencer.state(),
            current: self.sequencer.current().ok().map(|v| v.id.clone()),
            next: self.sequencer.peek_next().map(|v| v.id.clone()),
            progress: self.sequencer.progress(),
            recorded_rows: self.rows.len(),
        })
    }
}

impl fmt::Debug for ExperimentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentSession")
            .field("id", &self.id)
            .field("condition", &self.condition)
            .field("sequencer", &self.sequencer)
            .field("started_at", &self.started_at)
            .field("finished_at", &self.finished_at)
            .field("rows_len", &self.rows.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperimentConfig;
    use crate::error::SequencerError;
    use experiment_core::model::DeployMethod;
    use experiment_core::time::fixed_clock;
    use serde_json::json;

    fn experiment(method: DeployMethod) -> Experiment {
        let mut config = ExperimentConfig::visual_search();
        config.deploy.deploy_method = method;
        Experiment::from_config(&config).unwrap()
    }

    fn options() -> SessionOptions {
        SessionOptions::new().with_clock(fixed_clock())
    }

    #[test]
    fn forced_condition_applies_in_debug() {
        let exp = experiment(DeployMethod::Debug);
        for condition in Condition::ALL {
            let session = ExperimentSession::init(
                &exp,
                options().with_forced_condition(Some(condition)),
            )
            .unwrap();
            assert_eq!(session.condition(), condition);
        }
    }

    #[test]
    fn condition_is_fixed_for_the_session() {
        let exp = experiment(DeployMethod::DirectLink);
        let mut session = ExperimentSession::init(&exp, options()).unwrap();
        let condition = session.condition();
        session.start().unwrap();
        while !session.is_finished() {
            session.advance().unwrap();
            assert_eq!(session.condition(), condition);
        }
    }

    #[test]
    fn record_requires_current_view() {
        let exp = experiment(DeployMethod::Debug);
        let mut session = ExperimentSession::init(&exp, options()).unwrap();
        let err = session
            .record(&ViewId::new("intro"), Map::new())
            .unwrap_err();
        assert!(matches!(err, SessionError::Sequencer(SequencerError::NotStarted)));

        session.start().unwrap();
        let err = session
            .record(&ViewId::new("thanks"), Map::new())
            .unwrap_err();
        assert!(matches!(err, SessionError::NotCurrentView { .. }));
        session.record(&ViewId::new("intro"), Map::new()).unwrap();
        assert_eq!(session.rows().len(), 1);
    }

    #[test]
    fn payload_only_after_finish() {
        let exp = experiment(DeployMethod::Debug);
        let mut session = ExperimentSession::init(
            &exp,
            options().with_forced_condition(Some(Condition::GroupB)),
        )
        .unwrap();
        assert!(matches!(
            session.results_payload().unwrap_err(),
            SessionError::NotFinished
        ));

        session.start().unwrap();
        while !session.is_finished() {
            let view = session.current().unwrap().clone();
            if view.role.is_trial_block() {
                let data = json!({ "rt": 420 }).as_object().cloned().unwrap();
                session.record(&view.id, data).unwrap();
            }
            session.advance().unwrap();
        }

        let payload = session.results_payload().unwrap();
        assert_eq!(payload.experiment_id, "256");
        assert_eq!(payload.len(), 8);
        let trial = &payload.trials[0];
        assert_eq!(trial["condition"], json!("GroupB"));
        assert_eq!(trial["view"], json!("practice_feature"));
        assert_eq!(trial["experiment_duration_ms"], json!(0));
    }

    #[test]
    fn monitor_only_in_debug() {
        let debug = experiment(DeployMethod::Debug);
        let mut session = ExperimentSession::init(&debug, options()).unwrap();
        let snapshot = session.monitor().unwrap();
        assert_eq!(snapshot.state, SequencerState::Ready);
        assert_eq!(snapshot.current, None);
        assert_eq!(snapshot.next, Some(ViewId::new("intro")));

        session.start().unwrap();
        let snapshot = session.monitor().unwrap();
        assert_eq!(snapshot.current, Some(ViewId::new("intro")));
        assert_eq!(snapshot.next, Some(ViewId::new("instructions")));

        let live = experiment(DeployMethod::DirectLink);
        let session = ExperimentSession::init(&live, options()).unwrap();
        assert!(session.monitor().is_none());
    }

    #[test]
    fn duplicate_advance_after_finish_is_harmless() {
        let exp = experiment(DeployMethod::Debug);
        let mut session = ExperimentSession::init(&exp, options()).unwrap();
        session.start().unwrap();
        for _ in 0..session.sequencer().len() {
            session.advance().unwrap();
        }
        let finished_at = session.finished_at();
        assert_eq!(session.advance().unwrap(), SequencerState::Finished);
        assert_eq!(session.finished_at(), finished_at);
    }
}
