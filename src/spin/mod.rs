// ============================================================
// Layer 5a — Self-Play Training Core (SPIN)
// ============================================================
// The iterative two-phase optimisation protocol, written against
// the `Learner` trait so it never touches Burn directly:
//
//   IterationController
//     ├── AdapterManager      attach LoRA once, before iteration 0
//     ├── StepExecutor        one backward pass per training batch
//     │     └── LossComposer  real loss (+ beta * synthetic loss)
//     │           └── Synthesizer   sample continuations, no grad
//     └── CheckpointPolicy    strict improvement → persist best
//
// Every component returns plain data (loss components, decisions)
// and the controller turns them into TrainEvents for the caller.
//
// Reference: Chen et al. (2024) Self-Play Fine-Tuning (SPIN)
//            Hu et al. (2021) LoRA

pub mod adapter;
pub mod config;
pub mod controller;
pub mod events;
pub mod learner;
pub mod loss;
pub mod policy;
pub mod step;
pub mod synthesis;

#[cfg(test)]
pub(crate) mod testing;
