// ============================================================
// Layer 5a — Iteration Controller
// ============================================================
// Drives the self-play loop as a small state machine:
//
//   Idle ──► AdapterPending ──► Training ──► Evaluating ──┐
//                                  ▲                       │
//                                  └──── next iteration ◄──┤
//                                                          ▼
//                                                         Done
//
//   - the adapter is attached at most once per controller
//   - each iteration visits every training batch once, in the
//     order supplied, then evaluates on the explicit eval set
//   - the checkpoint policy sees every eval loss; a persist
//     overwrites the single best slot
//
// Composition rather than a trainer base class: the loss
// composer and checkpoint policy are boxed capabilities chosen
// from SpinConfig and replaceable with `with_composer` /
// `with_policy`.

use crate::domain::batch::Batch;
use crate::domain::error::{SpinError, SpinResult};
use crate::spin::adapter::{AdapterManager, AttachOutcome};
use crate::spin::config::{LossMode, SpinConfig};
use crate::spin::events::{IterationSummary, TrainEvent, TrainReport};
use crate::spin::learner::{CheckpointMeta, Learner};
use crate::spin::loss::{LossComponents, LossComposer, SelfPlayComposer, SupervisedComposer};
use crate::spin::policy::{policy_for, CheckpointPolicy};
use crate::spin::step::StepExecutor;
use crate::spin::synthesis::SamplingSynthesizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AdapterPending,
    Training,
    Evaluating,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationState {
    pub iteration_index: usize,
    pub best_eval_loss:  f64,
    pub has_adapter:     bool,
}

impl Default for IterationState {
    fn default() -> Self {
        Self {
            iteration_index: 0,
            best_eval_loss:  f64::INFINITY,
            has_adapter:     false,
        }
    }
}

/// Collects events and forwards each one to the caller's observer.
struct EventLog<'a> {
    events:   Vec<TrainEvent>,
    observer: &'a mut dyn FnMut(&TrainEvent),
}

impl EventLog<'_> {
    fn emit(&mut self, event: TrainEvent) {
        (self.observer)(&event);
        self.events.push(event);
    }
}

#[derive(Default)]
struct EpochTotals {
    steps:           usize,
    total:           f64,
    real:            f64,
    synthetic:       f64,
    synthetic_steps: usize,
}

impl EpochTotals {
    fn add(&mut self, c: &LossComponents) {
        self.steps += 1;
        self.total += c.total;
        self.real  += c.real;
        if let Some(s) = c.synthetic {
            self.synthetic       += s;
            self.synthetic_steps += 1;
        }
    }

    fn mean(sum: f64, n: usize) -> f64 {
        if n > 0 { sum / n as f64 } else { f64::NAN }
    }
}

pub struct IterationController<L: Learner> {
    config:   SpinConfig,
    adapter:  AdapterManager,
    composer: Box<dyn LossComposer<L>>,
    executor: StepExecutor,
    policy:   Box<dyn CheckpointPolicy>,
    state:    IterationState,
    phase:    Phase,
}

impl<L: Learner + 'static> IterationController<L> {
    pub fn from_config(config: SpinConfig) -> SpinResult<Self> {
        config.validate()?;

        let composer: Box<dyn LossComposer<L>> = match config.loss_mode {
            LossMode::SelfPlay => Box::new(SelfPlayComposer::new(
                config.beta,
                Box::new(SamplingSynthesizer::new(config.synthesis.clone(), config.seed)),
            )),
            LossMode::Supervised => Box::new(SupervisedComposer),
        };

        Ok(Self {
            adapter:  AdapterManager::new(config.adapter.clone())?,
            executor: StepExecutor::new(config.grad_accum_steps)?,
            policy:   policy_for(config.checkpoint_mode),
            composer,
            config,
            state:    IterationState::default(),
            phase:    Phase::Idle,
        })
    }

    pub fn with_composer(mut self, composer: Box<dyn LossComposer<L>>) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn CheckpointPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> IterationState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn train(&mut self, learner: &mut L, train: &[Batch], eval: &[Batch]) -> SpinResult<TrainReport> {
        self.train_observed(learner, train, eval, &mut |_| {})
    }

    /// Run all configured iterations. `observer` sees every event as
    /// it happens; the same events are returned in the report.
    pub fn train_observed(
        &mut self,
        learner:  &mut L,
        train:    &[Batch],
        eval:     &[Batch],
        observer: &mut dyn FnMut(&TrainEvent),
    ) -> SpinResult<TrainReport> {
        check_inputs(train, eval)?;

        let mut log = EventLog { events: Vec::new(), observer };

        // A new call starts a new run; only the adapter survives.
        self.phase                 = Phase::Idle;
        self.state.iteration_index = 0;
        self.state.best_eval_loss  = f64::INFINITY;

        if !self.state.has_adapter {
            self.phase = Phase::AdapterPending;
            let outcome = self.adapter.attach(learner)?;
            self.state.has_adapter = true;
            log.emit(TrainEvent::AdapterAttached {
                trainable_params: outcome.trainable_params(),
                newly_attached:   matches!(outcome, AttachOutcome::Attached { .. }),
            });
        }

        let mut summaries = Vec::with_capacity(self.config.num_epochs);

        for iteration in 0..self.config.num_epochs {
            self.state.iteration_index = iteration;
            self.phase = Phase::Training;
            log.emit(TrainEvent::IterationStarted { iteration });
            tracing::debug!("SPIN iteration {} started", iteration + 1);

            let totals = self.run_epoch(learner, train, iteration, &mut log)?;

            self.phase = Phase::Evaluating;
            let eval_loss = evaluate(learner, eval)?;
            log.emit(TrainEvent::Evaluated { iteration, eval_loss });

            let decision = self.policy.consider(eval_loss, self.state.best_eval_loss);
            self.state.best_eval_loss = decision.new_best;
            if decision.should_persist {
                learner.persist(&self.config.output_dir, CheckpointMeta { iteration, eval_loss })?;
            }
            log.emit(TrainEvent::CheckpointDecided {
                iteration,
                eval_loss,
                best_eval_loss: self.state.best_eval_loss,
                persisted:      decision.should_persist,
            });

            let summary = IterationSummary {
                iteration,
                steps:          totals.steps,
                train_loss:     EpochTotals::mean(totals.total, totals.steps),
                real_loss:      EpochTotals::mean(totals.real, totals.steps),
                synthetic_loss: (totals.synthetic_steps > 0)
                    .then(|| EpochTotals::mean(totals.synthetic, totals.synthetic_steps)),
                eval_loss,
                best_eval_loss: self.state.best_eval_loss,
                persisted:      decision.should_persist,
            };
            log.emit(TrainEvent::IterationCompleted(summary.clone()));
            summaries.push(summary);
        }

        self.state.iteration_index = self.config.num_epochs;
        self.phase = Phase::Done;

        Ok(TrainReport {
            training_loss:  summaries.last().map(|s| s.train_loss).unwrap_or(f64::NAN),
            best_eval_loss: self.state.best_eval_loss,
            iterations:     summaries,
            events:         log.events,
        })
    }

    fn run_epoch(
        &mut self,
        learner:   &mut L,
        train:     &[Batch],
        iteration: usize,
        log:       &mut EventLog<'_>,
    ) -> SpinResult<EpochTotals> {
        let accum       = self.executor.grad_accum_steps();
        let mut pending = 0usize;
        let mut totals  = EpochTotals::default();

        for (step, batch) in train.iter().enumerate() {
            let outcome = self.executor.step(learner, self.composer.as_mut(), batch, iteration)?;
            totals.add(&outcome.components);
            log.emit(TrainEvent::StepCompleted {
                iteration,
                step,
                components:  outcome.components,
                scaled_loss: outcome.scaled_loss,
            });

            pending += 1;
            if pending == accum {
                learner.apply_update()?;
                pending = 0;
                log.emit(TrainEvent::OptimizerUpdate { iteration, step });
            }
        }

        // Flush a partial accumulation so no gradient leaks into the next epoch
        if pending > 0 {
            learner.apply_update()?;
            log.emit(TrainEvent::OptimizerUpdate { iteration, step: train.len() - 1 });
        }

        Ok(totals)
    }
}

fn check_inputs(train: &[Batch], eval: &[Batch]) -> SpinResult<()> {
    if train.is_empty() {
        return Err(SpinError::config("training set is empty"));
    }
    if eval.is_empty() {
        return Err(SpinError::config(
            "evaluation set is empty; an explicit evaluation split is required",
        ));
    }
    for (i, batch) in train.iter().enumerate() {
        batch
            .validate_supervised()
            .map_err(|e| SpinError::data(format!("training batch {i}: {e}")))?;
    }
    for (i, batch) in eval.iter().enumerate() {
        batch
            .validate_supervised()
            .map_err(|e| SpinError::data(format!("evaluation batch {i}: {e}")))?;
    }
    Ok(())
}

/// Mean supervised loss over the evaluation batches.
fn evaluate<L: Learner>(learner: &mut L, eval: &[Batch]) -> SpinResult<f64> {
    learner.set_train_mode(false);
    let mut sum = 0.0;
    for batch in eval {
        sum += learner.eval_loss(batch)?;
    }
    Ok(sum / eval.len() as f64)
}
