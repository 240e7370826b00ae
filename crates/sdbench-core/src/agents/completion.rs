//! Agent driven by a text-completion backend.
//!
//! The backend sees a plain prompt built from the abstract and the history
//! and must answer with one `<question>`, `<test>` or `<diagnosis>` tag.
//! Anything else becomes a malformed action and costs the agent a turn.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{parse_action_text, AgentAction, TurnRecord};
use crate::ports::{DiagnosticAgent, ExternalCallError};

/// Anything that turns a prompt into text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ExternalCallError>;
}

/// One client shared by the agents of a run.
#[async_trait]
impl<C: CompletionClient + ?Sized> CompletionClient for Arc<C> {
    async fn complete(&self, prompt: &str) -> Result<String, ExternalCallError> {
        (**self).complete(prompt).await
    }
}

const INSTRUCTIONS: &str = "\
You are an expert diagnostic physician. Based on the case information and \
encounter history, choose the single most useful next action.

You can:
1. Ask a specific question about the patient's history or examination
2. Order a specific test or procedure
3. Make a final diagnosis (only if you are confident)

Respond with exactly one of:
<question>Your specific question here</question>
<test>Specific test name here</test>
<diagnosis>Your diagnosis here</diagnosis>

Be specific and clinical. Vague or overly broad requests are refused.";

/// Render the prompt for the next turn.
pub fn build_prompt(initial_abstract: &str, history: &[TurnRecord]) -> String {
    let mut prompt = format!("{INSTRUCTIONS}\n\nCase Abstract: {initial_abstract}\n");
    if !history.is_empty() {
        prompt.push_str("\nEncounter History:\n");
        for t in history {
            prompt.push_str(&format!(
                "{}. {}: {}\n",
                t.turn,
                t.action.kind(),
                t.action.content()
            ));
            if let Some(reply) = t.response.text() {
                prompt.push_str(&format!("   -> {reply}\n"));
            }
        }
    }
    prompt
}

pub struct CompletionAgent<C> {
    name: String,
    client: C,
}

impl<C: CompletionClient> CompletionAgent<C> {
    pub fn new(name: impl Into<String>, client: C) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl<C: CompletionClient> DiagnosticAgent for CompletionAgent<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_action(
        &self,
        initial_abstract: &str,
        history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        let prompt = build_prompt(initial_abstract, history);
        let text = self.client.complete(&prompt).await?;
        Ok(parse_action_text(&text))
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvidenceResponse, TurnResponse};
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for Canned {
        async fn complete(&self, prompt: &str) -> Result<String, ExternalCallError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn canned(reply: &str) -> Canned {
        Canned {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_parses_tagged_reply() {
        let agent = CompletionAgent::new("llm", canned("Next: <test>Serum ACE</test>"));
        let action = agent.next_action("Cough and dyspnea.", &[]).await.unwrap();
        assert_eq!(action, AgentAction::order("Serum ACE"));
    }

    #[tokio::test]
    async fn test_untagged_reply_is_malformed() {
        let agent = CompletionAgent::new("llm", canned("I think it is probably asthma"));
        let action = agent.next_action("Wheeze.", &[]).await.unwrap();
        assert_eq!(action, AgentAction::malformed("I think it is probably asthma"));
    }

    #[test]
    fn test_prompt_includes_history() {
        let history = vec![TurnRecord {
            turn: 1,
            action: AgentAction::order("Chest X-ray"),
            response: TurnResponse::Evidence {
                evidence: EvidenceResponse {
                    text: "Bilateral hilar adenopathy.".to_string(),
                    is_synthetic: false,
                    cost: 200.0,
                },
                redacted: false,
            },
            visit_charged: false,
            turn_cost: 200.0,
            cost_after_turn: 200.0,
        }];
        let prompt = build_prompt("Cough.", &history);
        assert!(prompt.contains("Case Abstract: Cough."));
        assert!(prompt.contains("1. order_test: Chest X-ray"));
        assert!(prompt.contains("-> Bilateral hilar adenopathy."));
    }
}
