//! Seeded random baseline agent.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::domain::{AgentAction, TurnRecord};
use crate::ports::{DiagnosticAgent, ExternalCallError};

const QUESTIONS: &[&str] = &[
    "What is the patient's age and gender?",
    "What are the main symptoms?",
    "How long have the symptoms been present?",
    "Are there any associated symptoms?",
    "What is the patient's medical history?",
    "Are there any recent exposures or travel?",
    "What medications is the patient taking?",
    "Are there any allergies?",
    "What are the vital signs?",
    "Are there any physical examination findings?",
];

const TESTS: &[&str] = &[
    "Complete Blood Count",
    "Comprehensive Metabolic Panel",
    "Chest X-ray",
    "CT scan of the chest",
    "Blood cultures",
    "Urinalysis",
    "Electrocardiogram",
    "Echocardiogram",
    "Liver function tests",
    "Thyroid function tests",
];

pub const UNDETERMINED: &str = "I cannot determine the diagnosis with the available information.";

/// Asks random questions and orders random tests, then gives up.
///
/// The generator is reseeded on [`reset`](DiagnosticAgent::reset), so every
/// case sees the same sequence for a given seed.
pub struct RandomAgent {
    name: String,
    seed: u64,
    max_actions: usize,
    rng: Mutex<StdRng>,
}

impl RandomAgent {
    pub fn new(seed: u64) -> Self {
        Self {
            name: "random".to_string(),
            seed,
            max_actions: 10,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Diagnose on this action number (1-based) at the latest.
    pub fn with_max_actions(mut self, max_actions: usize) -> Self {
        self.max_actions = max_actions.max(1);
        self
    }
}

#[async_trait]
impl DiagnosticAgent for RandomAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_action(
        &self,
        _initial_abstract: &str,
        history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        if history.len() + 1 >= self.max_actions {
            return Ok(AgentAction::diagnose(UNDETERMINED));
        }

        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        let action = if rng.gen_bool(0.5) {
            QUESTIONS.choose(&mut *rng).map(|q| AgentAction::ask(*q))
        } else {
            TESTS.choose(&mut *rng).map(|t| AgentAction::order(*t))
        };
        Ok(action.unwrap_or_else(|| AgentAction::diagnose(UNDETERMINED)))
    }

    fn reset(&mut self) {
        self.rng = Mutex::new(StdRng::seed_from_u64(self.seed));
    }
}
