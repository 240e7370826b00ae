//! Fixed-script agent for replays and tests.

use async_trait::async_trait;

use crate::domain::{AgentAction, TurnRecord};
use crate::ports::{DiagnosticAgent, ExternalCallError};

/// Plays back a list of actions, one per turn. Once the script runs out the
/// last action repeats.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    name: String,
    script: Vec<AgentAction>,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>, script: Vec<AgentAction>) -> Self {
        Self {
            name: name.into(),
            script,
        }
    }

    /// Same action on every turn.
    pub fn repeating(name: impl Into<String>, action: AgentAction) -> Self {
        Self::new(name, vec![action])
    }
}

#[async_trait]
impl DiagnosticAgent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_action(
        &self,
        _initial_abstract: &str,
        history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        self.script
            .get(history.len())
            .or_else(|| self.script.last())
            .cloned()
            .ok_or_else(|| ExternalCallError::Permanent("empty script".to_string()))
    }

    fn reset(&mut self) {}
}
