//! Keyword-retrieval gatekeeper.

use async_trait::async_trait;

use super::text::{keywords, sentences};
use crate::domain::AgentAction;
use crate::ports::{ExternalCallError, Gatekeeper, GatekeeperReply};

/// Answers from the case text by keyword overlap; falls back to a synthetic
/// normal finding when nothing in the case matches.
#[derive(Debug, Clone)]
pub struct KeywordGatekeeper {
    max_sentences: usize,
}

impl Default for KeywordGatekeeper {
    fn default() -> Self {
        Self { max_sentences: 2 }
    }
}

impl KeywordGatekeeper {
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }

    pub fn reply(&self, full_case_text: &str, action: &AgentAction) -> GatekeeperReply {
        let wanted = keywords(action.content());
        let candidates = sentences(full_case_text);

        let mut scored: Vec<(usize, usize)> = candidates
            .iter()
            .enumerate()
            .map(|(idx, s)| (idx, keywords(s).intersection(&wanted).count()))
            .filter(|(_, hits)| *hits > 0)
            .collect();
        // Best first; earlier sentences win ties.
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(self.max_sentences);
        scored.sort_by_key(|(idx, _)| *idx);

        if scored.is_empty() {
            return GatekeeperReply {
                text: synthetic_finding(action),
                is_synthetic: true,
            };
        }

        let text = scored
            .iter()
            .map(|(idx, _)| candidates[*idx])
            .collect::<Vec<_>>()
            .join(" ");
        GatekeeperReply {
            text,
            is_synthetic: false,
        }
    }
}

fn synthetic_finding(action: &AgentAction) -> String {
    match action {
        AgentAction::OrderTest { content } => {
            format!("{}: within normal limits.", content.trim())
        }
        _ => "Nothing notable is documented for that question.".to_string(),
    }
}

#[async_trait]
impl Gatekeeper for KeywordGatekeeper {
    async fn answer(
        &self,
        full_case_text: &str,
        action: &AgentAction,
    ) -> Result<GatekeeperReply, ExternalCallError> {
        Ok(self.reply(full_case_text, action))
    }
}
