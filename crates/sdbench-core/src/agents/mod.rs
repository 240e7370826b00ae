//! Diagnostic agent implementations.

pub mod chat;
pub mod completion;
pub mod protocol;
pub mod random;
pub mod scripted;

pub use chat::{ChatCompletionsClient, ChatConfig};
pub use completion::{build_prompt, CompletionAgent, CompletionClient};
pub use protocol::{
    aggressive_protocol, conservative_protocol, default_protocol, default_rules, DiagnosisRule,
    ProtocolAgent,
};
pub use random::RandomAgent;
pub use scripted::ScriptedAgent;
