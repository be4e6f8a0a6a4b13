//! Challenge Sequencer: ordered challenge lists and step progression
//!
//! The sequencer owns ordering and termination. Whether a step is satisfied
//! is decided by a pluggable [`StepEvaluator`]; the default trusts the client.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{KycError, Result};
use crate::types::{ChallengeKind, Image, StepOutcome};
use crate::TERMINAL_ACTION;

/// Decides whether a frame satisfies one challenge
pub trait StepEvaluator: Send + Sync {
    fn evaluate(&self, challenge: &ChallengeKind, frame: &Image) -> StepOutcome;
}

/// Accepts every step; gesture detection happens client-side
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysPass;

impl StepEvaluator for AlwaysPass {
    fn evaluate(&self, _challenge: &ChallengeKind, _frame: &Image) -> StepOutcome {
        StepOutcome::Passed
    }
}

/// Result of one `verify_step`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub passed: bool,
    /// Cursor after the step
    pub index: usize,
    pub next_action: String,
}

/// Challenge Sequencer
#[derive(Debug, Default, Clone, Copy)]
pub struct ChallengeSequencer;

impl ChallengeSequencer {
    pub fn new() -> Self {
        Self
    }

    /// Draw `k` distinct labels from `pool` in random order
    pub fn generate(&self, pool: &[String], k: usize) -> Result<Vec<String>> {
        self.generate_with(pool, k, &mut rand::thread_rng())
    }

    /// [`generate`](Self::generate) with a caller-supplied RNG
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        pool: &[String],
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let distinct: Vec<&String> = pool
            .iter()
            .filter(|label| !label.trim().is_empty())
            .filter(|label| seen.insert(label.as_str()))
            .collect();

        if k > distinct.len() {
            return Err(KycError::InvalidRequest(format!(
                "cannot draw {} challenges from a pool of {}",
                k,
                distinct.len()
            )));
        }

        Ok(distinct
            .choose_multiple(rng, k)
            .map(|label| (*label).clone())
            .collect())
    }

    /// Label at `index`, or the terminal action once the sequence is exhausted
    pub fn next_action(&self, sequence: &[String], index: usize) -> String {
        sequence
            .get(index)
            .cloned()
            .unwrap_or_else(|| TERMINAL_ACTION.to_string())
    }

    /// Evaluate the step at `index`.
    ///
    /// Advances by exactly one on pass. A finished sequence has no step left
    /// to verify, so the cursor stays put and the step reports not passed.
    pub fn verify_step(
        &self,
        sequence: &[String],
        index: usize,
        frame: &Image,
        evaluator: &dyn StepEvaluator,
    ) -> StepResult {
        let Some(label) = sequence.get(index) else {
            return StepResult {
                passed: false,
                index: sequence.len(),
                next_action: TERMINAL_ACTION.to_string(),
            };
        };

        let outcome = evaluator.evaluate(&ChallengeKind::from_label(label), frame);
        let index = if outcome.is_passed() { index + 1 } else { index };

        StepResult {
            passed: outcome.is_passed(),
            index,
            next_action: self.next_action(sequence, index),
        }
    }
}
