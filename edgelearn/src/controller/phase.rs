//! Phase tick: one step of the train, eval, deploy cycle.

use chrono::Utc;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::error::ControllerError;
use super::output::{add_prefix, copy_artifact, trim_prefix, write_samples};
use super::state::JobState;
use super::JobPhaseController;
use crate::job::{
    ModelInfo, Phase, TriggerStatus, UpstreamMessage, WorkerInput, WorkerStatus,
};
use crate::relay::send_json;
use crate::trigger::{self, Facts, NUM_OF_SAMPLES};

/// Number of eval results the deploy trigger compares: (new, old).
const EVAL_RESULT_PAIR: usize = 2;

impl JobPhaseController {
    /// Runs one step of the current phase.
    ///
    /// With worker and trigger both `Ready` the phase trigger is evaluated
    /// and, if it fires, the remote work is dispatched upstream. A `Completed`
    /// worker advances exactly one phase; a `Failed` train worker restarts
    /// the train phase.
    ///
    /// Calling this again while the worker is still `Ready` but the trigger
    /// already `Completed` has no side effect.
    ///
    /// # Errors
    ///
    /// Any error leaves the phase where it was; the next tick retries. A
    /// failed eval worker errors on every tick until a new report arrives.
    pub fn tick(&self) -> Result<(), ControllerError> {
        let mut state = self.state.lock();
        match state.phase {
            Phase::Train => self.train_task(&mut state),
            Phase::Eval => self.eval_task(&mut state),
            Phase::Deploy => self.deploy_task(&mut state),
        }
    }

    fn train_task(&self, state: &mut JobState) -> Result<(), ControllerError> {
        if state.awaiting_trigger() && !self.trigger_train(state)? {
            return Ok(());
        }

        match state.worker_status {
            WorkerStatus::Failed => {
                warn!(job = %self.id, version = state.version, "Train worker failed, restarting train phase");
                state.back_task();
            }
            WorkerStatus::Completed => {
                info!(job = %self.id, version = state.version, "Train phase completed");
                state.next_task();
            }
            _ => {}
        }
        Ok(())
    }

    /// Evaluates the train trigger and dispatches training if it fires.
    ///
    /// Nothing is committed to the state unless the instruction was sent.
    fn trigger_train(&self, state: &mut JobState) -> Result<bool, ControllerError> {
        let train_count = state.samples.train_samples().len();
        let facts = Facts::new().with(NUM_OF_SAMPLES, train_count);
        if !trigger::evaluate(&state.definition.spec.train_spec.trigger, &facts)? {
            debug!(job = %self.id, train_samples = train_count, "Train trigger did not fire");
            return Ok(false);
        }

        let version = state.version + 1;
        let data_path = write_samples(
            state.samples.train_samples(),
            self.layout.samples_train(),
            version,
            &state.dataset_format,
        )?;

        let message = UpstreamMessage {
            phase: Phase::Train,
            status: WorkerStatus::Ready,
            input: Some(WorkerInput {
                models: vec![state.train_model.current_artifact()],
                data_url: self.worker_path(&data_path),
                output_dir: self.worker_path(&self.layout.train_output(version)),
            }),
        };
        send_json(self.relay.as_ref(), &message, &self.header)?;

        state.version = version;
        state.train_data_url = Some(data_path);
        state.trigger_time = Some(Utc::now());
        state.trigger_status = TriggerStatus::Completed;

        info!(
            job = %self.id,
            version,
            train_samples = train_count,
            "Train trigger fired, training dispatched"
        );
        Ok(true)
    }

    fn eval_task(&self, state: &mut JobState) -> Result<(), ControllerError> {
        if state.awaiting_trigger() {
            self.trigger_eval(state)?;
        }

        match state.worker_status {
            WorkerStatus::Failed => {
                error!(job = %self.id, version = state.version, "Eval worker failed");
                Err(ControllerError::EvalWorkerFailed {
                    version: state.version,
                })
            }
            WorkerStatus::Completed => {
                info!(job = %self.id, version = state.version, "Eval phase completed");
                state.next_task();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Dispatches evaluation of the trained artifact against the deployed one.
    fn trigger_eval(&self, state: &mut JobState) -> Result<(), ControllerError> {
        let version = state.version;
        let data_path = write_samples(
            state.samples.eval_samples(),
            self.layout.samples_eval(),
            version,
            &state.dataset_format,
        )?;

        let deployed = &state.deploy_model;
        let message = UpstreamMessage {
            phase: Phase::Eval,
            status: WorkerStatus::Ready,
            input: Some(WorkerInput {
                models: vec![
                    state.train_model.current_artifact(),
                    ModelInfo::new(deployed.format.clone(), deployed.url.clone()),
                ],
                data_url: self.worker_path(&data_path),
                output_dir: self.worker_path(&self.layout.eval_output(version)),
            }),
        };
        send_json(self.relay.as_ref(), &message, &self.header)?;

        state.eval_data_url = Some(data_path);
        state.trigger_status = TriggerStatus::Completed;

        info!(
            job = %self.id,
            version,
            eval_samples = state.samples.eval_samples().len(),
            "Evaluation dispatched"
        );
        Ok(())
    }

    fn deploy_task(&self, state: &mut JobState) -> Result<(), ControllerError> {
        if state.awaiting_trigger() {
            let message = match self.try_deploy(state) {
                Ok(Some(model)) => UpstreamMessage {
                    phase: Phase::Deploy,
                    status: WorkerStatus::Ready,
                    input: Some(WorkerInput {
                        models: vec![model],
                        ..Default::default()
                    }),
                },
                Ok(None) => UpstreamMessage::bare(Phase::Train, WorkerStatus::Waiting),
                Err(e) => {
                    let failed = UpstreamMessage::bare(Phase::Deploy, WorkerStatus::Failed);
                    if let Err(relay_err) = send_json(self.relay.as_ref(), &failed, &self.header) {
                        warn!(job = %self.id, error = %relay_err, "Failed to report deploy failure");
                    }
                    return Err(e);
                }
            };
            send_json(self.relay.as_ref(), &message, &self.header)?;
            state.trigger_status = TriggerStatus::Completed;
        }

        info!(job = %self.id, version = state.version, "Deploy phase completed");
        state.next_task();
        Ok(())
    }

    /// Evaluates the deploy trigger and deploys if it fires.
    ///
    /// Returns the deployed model, or `None` when the trigger held back.
    /// `deploy_model` changes only after the artifact was copied.
    fn try_deploy(&self, state: &mut JobState) -> Result<Option<ModelInfo>, ControllerError> {
        let (new, old) = match state.eval_results.as_slice() {
            [new, old] => (new, old),
            other => {
                return Err(ControllerError::EvalResultCount {
                    expected: EVAL_RESULT_PAIR,
                    actual: other.len(),
                })
            }
        };

        let facts = Facts::from_metric_delta(&new.metrics, &old.metrics);
        if !trigger::evaluate(&state.definition.spec.deploy_spec.trigger, &facts)? {
            info!(job = %self.id, version = state.version, "Deploy trigger did not fire");
            return Ok(None);
        }

        if new.format != old.format {
            return Err(ControllerError::ModelFormatMismatch {
                trained: new.format.clone(),
                deployed: old.format.clone(),
            });
        }

        let prefix = self.config.volume_mount_prefix();
        let trained_path = add_prefix(prefix, &new.url);
        let deploy_path = add_prefix(prefix, &old.url);
        copy_artifact(Path::new(&trained_path), Path::new(&deploy_path))?;

        let deployed = ModelInfo::new(new.format.clone(), new.url.clone());
        state.deploy_model = ModelInfo::new(old.format.clone(), old.url.clone());

        info!(
            job = %self.id,
            version = state.version,
            trained = %trained_path,
            deployed = %deploy_path,
            "Deployed trained model"
        );
        Ok(Some(deployed))
    }

    /// Path of a local file as workers see it.
    fn worker_path(&self, path: &Path) -> String {
        trim_prefix(self.config.volume_mount_prefix(), &path.to_string_lossy())
    }
}
