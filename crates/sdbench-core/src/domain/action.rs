//! Agent actions: the three request kinds plus a malformed fallback.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Discriminant of an [`AgentAction`], handy for counting and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AskQuestion,
    OrderTest,
    Diagnose,
    Malformed,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::AskQuestion => "ask_question",
            ActionKind::OrderTest => "order_test",
            ActionKind::Diagnose => "diagnose",
            ActionKind::Malformed => "malformed",
        };
        f.write_str(s)
    }
}

/// One move an agent makes in an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentAction {
    /// Ask the patient or examiner a question.
    AskQuestion { content: String },
    /// Order a specific diagnostic test.
    OrderTest { content: String },
    /// Commit to a final diagnosis.
    Diagnose { content: String },
    /// Output that could not be read as any of the above.
    Malformed { raw: String },
}

impl AgentAction {
    pub fn ask(content: impl Into<String>) -> Self {
        Self::AskQuestion {
            content: content.into(),
        }
    }

    pub fn order(content: impl Into<String>) -> Self {
        Self::OrderTest {
            content: content.into(),
        }
    }

    pub fn diagnose(content: impl Into<String>) -> Self {
        Self::Diagnose {
            content: content.into(),
        }
    }

    pub fn malformed(raw: impl Into<String>) -> Self {
        Self::Malformed { raw: raw.into() }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::AskQuestion { .. } => ActionKind::AskQuestion,
            Self::OrderTest { .. } => ActionKind::OrderTest,
            Self::Diagnose { .. } => ActionKind::Diagnose,
            Self::Malformed { .. } => ActionKind::Malformed,
        }
    }

    /// Free text carried by the action (the raw text for malformed output).
    pub fn content(&self) -> &str {
        match self {
            Self::AskQuestion { content }
            | Self::OrderTest { content }
            | Self::Diagnose { content } => content,
            Self::Malformed { raw } => raw,
        }
    }

    /// A well-formed action is a real request with non-blank content.
    pub fn is_well_formed(&self) -> bool {
        !matches!(self, Self::Malformed { .. }) && !self.content().trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tag parsing
// ---------------------------------------------------------------------------

fn tag_patterns() -> &'static [(ActionKind, Regex)] {
    static PATTERNS: OnceLock<Vec<(ActionKind, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (ActionKind::AskQuestion, "question"),
            (ActionKind::OrderTest, "test"),
            (ActionKind::Diagnose, "diagnosis"),
        ]
        .into_iter()
        .filter_map(|(kind, tag)| {
            Regex::new(&format!(r"(?is)<{tag}>(.*?)</{tag}>"))
                .ok()
                .map(|re| (kind, re))
        })
        .collect()
    })
}

/// Read free model output as an action.
///
/// Recognizes `<question>`, `<test>` and `<diagnosis>` tags. When several
/// appear, the one that starts first wins. Text with no tag is malformed.
pub fn parse_action_text(text: &str) -> AgentAction {
    let first = tag_patterns()
        .iter()
        .filter_map(|(kind, re)| {
            re.captures(text).and_then(|caps| {
                let whole = caps.get(0)?;
                let inner = caps.get(1)?;
                Some((whole.start(), *kind, inner.as_str().trim().to_string()))
            })
        })
        .min_by_key(|(start, _, _)| *start);

    match first {
        Some((_, ActionKind::AskQuestion, c)) => AgentAction::ask(c),
        Some((_, ActionKind::OrderTest, c)) => AgentAction::order(c),
        Some((_, ActionKind::Diagnose, c)) => AgentAction::diagnose(c),
        _ => AgentAction::malformed(text),
    }
}

/// Pull a diagnosis-like statement out of text that is not itself a
/// DIAGNOSE action.
///
/// Matches a `<diagnosis>` tag, or a line starting with `Diagnosis:`,
/// `Working diagnosis:` or `Impression:`.
pub fn extract_stated_diagnosis(text: &str) -> Option<String> {
    static LINE: OnceLock<Option<Regex>> = OnceLock::new();

    let tagged = tag_patterns()
        .iter()
        .find(|(kind, _)| *kind == ActionKind::Diagnose)
        .and_then(|(_, re)| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());
    if tagged.is_some() {
        return tagged;
    }

    let line_re = LINE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(?:working\s+diagnosis|diagnosis|impression)\s*:\s*(.+?)\s*$").ok()
    });
    line_re
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

const BROAD_QUESTION_PHRASES: &[&str] = &[
    "tell me everything",
    "what's wrong",
    "what should i do",
    "give me all information",
    "summarize the case",
];

const VAGUE_TEST_PHRASES: &[&str] = &[
    "run blood work",
    "do some imaging",
    "order labs",
    "get tests",
    "run diagnostics",
];

/// Reason an over-broad request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRejection {
    pub guidance: &'static str,
}

/// Refuse questions that ask for the whole case and test orders that name no
/// specific test.
pub fn validate_request(action: &AgentAction) -> std::result::Result<(), RequestRejection> {
    let lowered = action.content().to_lowercase();
    match action {
        AgentAction::AskQuestion { .. }
            if BROAD_QUESTION_PHRASES.iter().any(|p| lowered.contains(p)) =>
        {
            Err(RequestRejection {
                guidance: "Please ask more specific questions about the patient's history or examination findings.",
            })
        }
        AgentAction::OrderTest { .. }
            if VAGUE_TEST_PHRASES.iter().any(|p| lowered.contains(p)) =>
        {
            Err(RequestRejection {
                guidance: "Please specify the exact test you would like to order (e.g., 'Complete Blood Count', 'CT of the abdomen with contrast').",
            })
        }
        _ => Ok(()),
    }
}
