//! Interfaces to the collaborators an encounter talks to.
//!
//! Every method is async and may fail. A [`ExternalCallError::Transient`]
//! failure is retried by the call controls; a permanent one is not.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AgentAction, TurnRecord};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExternalCallError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl ExternalCallError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExternalCallError::Transient(_))
    }
}

/// Text the gatekeeper reveals for one request. The state machine attaches
/// the cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatekeeperReply {
    pub text: String,
    pub is_synthetic: bool,
}

/// Raw judge output before range checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub score: u8,
    pub rationale: Option<String>,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A diagnostic agent under evaluation.
#[async_trait]
pub trait DiagnosticAgent: Send + Sync {
    fn name(&self) -> &str;

    /// Choose the next move from the abstract and the turns so far.
    async fn next_action(
        &self,
        initial_abstract: &str,
        history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError>;

    /// Forget everything from the previous case.
    fn reset(&mut self);
}

/// Hands out one agent instance per encounter.
pub trait AgentFactory: Send + Sync {
    fn agent_name(&self) -> String;

    fn create(&self) -> Box<dyn DiagnosticAgent>;
}

/// A bare closure is a factory. Reading its name builds (and drops) one
/// agent; wrap it in [`NamedFactory`] when construction is expensive or has
/// side effects.
impl<F> AgentFactory for F
where
    F: Fn() -> Box<dyn DiagnosticAgent> + Send + Sync,
{
    fn agent_name(&self) -> String {
        self().name().to_string()
    }

    fn create(&self) -> Box<dyn DiagnosticAgent> {
        self()
    }
}

/// Factory with a name known up front.
pub struct NamedFactory<F> {
    name: String,
    make: F,
}

impl<F> NamedFactory<F>
where
    F: Fn() -> Box<dyn DiagnosticAgent> + Send + Sync,
{
    pub fn new(name: impl Into<String>, make: F) -> Self {
        Self {
            name: name.into(),
            make,
        }
    }
}

impl<F> AgentFactory for NamedFactory<F>
where
    F: Fn() -> Box<dyn DiagnosticAgent> + Send + Sync,
{
    fn agent_name(&self) -> String {
        self.name.clone()
    }

    fn create(&self) -> Box<dyn DiagnosticAgent> {
        (self.make)()
    }
}

// ---------------------------------------------------------------------------
// Gatekeeper / Judge / Cost model
// ---------------------------------------------------------------------------

/// Answers questions and test orders against the hidden case text.
#[async_trait]
pub trait Gatekeeper: Send + Sync {
    async fn answer(
        &self,
        full_case_text: &str,
        action: &AgentAction,
    ) -> Result<GatekeeperReply, ExternalCallError>;
}

/// Scores a candidate diagnosis against the ground truth on a 1..=5 scale.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn score(
        &self,
        candidate: &str,
        ground_truth: &str,
    ) -> Result<JudgeVerdict, ExternalCallError>;
}

/// Prices a test order.
#[async_trait]
pub trait CostModel: Send + Sync {
    async fn estimate(&self, action: &AgentAction) -> Result<f64, ExternalCallError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ScriptedAgent;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_named_factory_does_not_build_for_name() {
        let built = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&built);
        let factory = NamedFactory::new("scripted", move || -> Box<dyn DiagnosticAgent> {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::new(ScriptedAgent::repeating("scripted", AgentAction::diagnose("X")))
        });

        assert_eq!(factory.agent_name(), "scripted");
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert_eq!(factory.create().name(), "scripted");
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_factory_name_comes_from_agent() {
        let factory = || -> Box<dyn DiagnosticAgent> {
            Box::new(ScriptedAgent::repeating("closure", AgentAction::diagnose("X")))
        };
        assert_eq!(factory.agent_name(), "closure");
    }
}
