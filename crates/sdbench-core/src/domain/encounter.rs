//! Encounter records: turns, evidence, costs, scores and outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::AgentAction;

/// Score assigned when the judge is never consulted.
pub const SENTINEL_SCORE: u8 = 1;

/// What the gatekeeper revealed for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceResponse {
    pub text: String,
    /// `true` when the case had no matching fact and the answer was made up.
    pub is_synthetic: bool,
    /// Evidence cost for this request (excludes the physician visit).
    pub cost: f64,
}

// ---------------------------------------------------------------------------
// Costs
// ---------------------------------------------------------------------------

/// Source of a ledger charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    PhysicianVisit,
    Test,
}

/// A single append-only ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub turn: u32,
    pub kind: CostKind,
    pub amount: f64,
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Where a score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Judge,
    Sentinel,
}

/// Rubric label for a 1..=5 score.
pub fn score_label(score: u8) -> &'static str {
    match score {
        5 => "Perfect/Clinically superior",
        4 => "Mostly correct",
        3 => "Partially correct",
        2 => "Largely incorrect",
        _ => "Completely incorrect",
    }
}

/// Final score of an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeScore {
    pub score: u8,
    pub source: ScoreSource,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl JudgeScore {
    pub fn judged(score: u8, rationale: Option<String>) -> Self {
        Self {
            score,
            source: ScoreSource::Judge,
            label: score_label(score).to_string(),
            rationale,
        }
    }

    pub fn sentinel(reason: impl Into<String>) -> Self {
        Self {
            score: SENTINEL_SCORE,
            source: ScoreSource::Sentinel,
            label: score_label(SENTINEL_SCORE).to_string(),
            rationale: Some(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Turns
// ---------------------------------------------------------------------------

/// What came back for one dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnResponse {
    /// Gatekeeper answered. `redacted` marks answers scrubbed of the ground truth.
    Evidence {
        evidence: EvidenceResponse,
        redacted: bool,
    },
    /// Request refused as too broad or too vague.
    Rejected { text: String },
    /// Wasted turn: malformed action or a failed gatekeeper call.
    NoOp { reason: String },
    /// DIAGNOSE turn. `None` when the judge could not produce a score.
    Scored { score: Option<JudgeScore> },
}

impl TurnResponse {
    /// Text an agent can read back in its history.
    pub fn text(&self) -> Option<&str> {
        match self {
            TurnResponse::Evidence { evidence, .. } => Some(&evidence.text),
            TurnResponse::Rejected { text } => Some(text),
            TurnResponse::NoOp { reason } => Some(reason),
            TurnResponse::Scored { .. } => None,
        }
    }
}

/// One action and its dispatch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based turn index.
    pub turn: u32,
    pub action: AgentAction,
    pub response: TurnResponse,
    pub visit_charged: bool,
    /// Everything charged in this turn (visit plus evidence).
    pub turn_cost: f64,
    pub cost_after_turn: f64,
}

// ---------------------------------------------------------------------------
// Encounter
// ---------------------------------------------------------------------------

/// Why an encounter stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncounterOutcome {
    /// Agent submitted a diagnosis.
    Diagnosed,
    /// Turn budget ran out before a diagnosis.
    BudgetExhausted,
    /// Agent call timed out or failed after retries.
    AgentFailed { reason: String },
    /// Run was cancelled while this encounter was in flight.
    Cancelled,
    /// The encounter task itself died; recorded by the runner.
    Crashed { reason: String },
}

impl EncounterOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EncounterOutcome::Diagnosed => "diagnosed",
            EncounterOutcome::BudgetExhausted => "budget_exhausted",
            EncounterOutcome::AgentFailed { .. } => "agent_failed",
            EncounterOutcome::Cancelled => "cancelled",
            EncounterOutcome::Crashed { .. } => "crashed",
        }
    }
}

/// A finished session between one agent and one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEncounter {
    pub case_id: String,
    pub agent_name: String,
    pub turns: Vec<TurnRecord>,
    pub cumulative_cost: f64,
    pub turn_count: u32,
    pub terminal_diagnosis: Option<String>,
    pub judge_score: Option<JudgeScore>,
    /// Set only when a DIAGNOSE action was accepted.
    pub is_complete: bool,
    pub outcome: EncounterOutcome,
    pub cost_entries: Vec<CostEntry>,
    pub last_stated_diagnosis: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DiagnosticEncounter {
    /// Placeholder for an encounter whose task died outside any collaborator
    /// call, so no turns or charges survive.
    pub fn crashed(case_id: &str, agent_name: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let now = Utc::now();
        Self {
            case_id: case_id.to_string(),
            agent_name: agent_name.to_string(),
            turns: Vec::new(),
            cumulative_cost: 0.0,
            turn_count: 0,
            terminal_diagnosis: None,
            judge_score: Some(JudgeScore::sentinel(reason.clone())),
            is_complete: false,
            outcome: EncounterOutcome::Crashed { reason },
            cost_entries: Vec::new(),
            last_stated_diagnosis: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn score(&self) -> Option<u8> {
        self.judge_score.as_ref().map(|s| s.score)
    }

    /// Unscored encounters never count as correct.
    pub fn is_correct(&self, threshold: u8) -> bool {
        self.score().is_some_and(|s| s >= threshold)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
