//! Shared fakes for encounter and runner tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sdbench_core::config::{BenchConfig, CallPolicy};
use sdbench_core::domain::{AgentAction, CaseFile, TurnRecord};
use sdbench_core::encounter::EncounterServices;
use sdbench_core::ports::{
    AgentFactory, CostModel, DiagnosticAgent, ExternalCallError, Gatekeeper, GatekeeperReply,
    Judge, JudgeVerdict,
};

pub fn case(id: &str, ground_truth: &str) -> CaseFile {
    CaseFile {
        case_id: id.to_string(),
        initial_abstract: format!("Abstract for {id}: fever and cough."),
        full_case_text: format!("Case {id}. The patient reports fever and cough."),
        ground_truth_diagnosis: ground_truth.to_string(),
        publication_year: 2024,
        is_test_case: false,
    }
}

/// Short timeouts, no retries.
pub fn fast_config() -> BenchConfig {
    BenchConfig {
        calls: CallPolicy {
            timeout_ms: 1_000,
            max_retries: 0,
            backoff_base_ms: 1,
            ceiling_ms: 5_000,
        },
        ..BenchConfig::default()
    }
}

pub fn factory<A>(agent: A) -> Arc<dyn AgentFactory>
where
    A: DiagnosticAgent + Clone + 'static,
{
    Arc::new(move || -> Box<dyn DiagnosticAgent> { Box::new(agent.clone()) })
}

// ---------------------------------------------------------------------------
// Gatekeeper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum GatekeeperMode {
    /// "Result for <request>".
    Echo,
    /// Return the full case text.
    CaseText,
    Fixed(String),
    Fail,
}

pub struct FakeGatekeeper {
    mode: GatekeeperMode,
    pub calls: AtomicU32,
}

impl FakeGatekeeper {
    pub fn new(mode: GatekeeperMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gatekeeper for FakeGatekeeper {
    async fn answer(
        &self,
        full_case_text: &str,
        action: &AgentAction,
    ) -> Result<GatekeeperReply, ExternalCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = match &self.mode {
            GatekeeperMode::Echo => format!("Result for {}", action.content()),
            GatekeeperMode::CaseText => full_case_text.to_string(),
            GatekeeperMode::Fixed(text) => text.clone(),
            GatekeeperMode::Fail => {
                return Err(ExternalCallError::Permanent("gatekeeper offline".into()))
            }
        };
        Ok(GatekeeperReply {
            text,
            is_synthetic: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Judge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum JudgeMode {
    Fixed(u8),
    /// 5 on a case-insensitive exact match, 2 otherwise.
    Matching,
    Slow(Duration),
    Fail,
}

pub struct FakeJudge {
    mode: JudgeMode,
    pub calls: AtomicU32,
}

impl FakeJudge {
    pub fn new(mode: JudgeMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Judge for FakeJudge {
    async fn score(
        &self,
        candidate: &str,
        ground_truth: &str,
    ) -> Result<JudgeVerdict, ExternalCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let score = match &self.mode {
            JudgeMode::Fixed(score) => *score,
            JudgeMode::Matching => {
                if candidate.trim().eq_ignore_ascii_case(ground_truth.trim()) {
                    5
                } else {
                    2
                }
            }
            JudgeMode::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                5
            }
            JudgeMode::Fail => return Err(ExternalCallError::Transient("judge down".into())),
        };
        Ok(JudgeVerdict {
            score,
            rationale: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Cost model
// ---------------------------------------------------------------------------

pub struct FixedCost {
    price: f64,
    pub calls: AtomicU32,
}

impl FixedCost {
    pub fn new(price: f64) -> Arc<Self> {
        Arc::new(Self {
            price,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CostModel for FixedCost {
    async fn estimate(&self, _action: &AgentAction) -> Result<f64, ExternalCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.price)
    }
}

/// Fakes bundled, with handles kept for call-count assertions.
pub struct Fixture {
    pub gatekeeper: Arc<FakeGatekeeper>,
    pub judge: Arc<FakeJudge>,
    pub cost: Arc<FixedCost>,
}

impl Fixture {
    pub fn new(gatekeeper: GatekeeperMode, judge: JudgeMode, price: f64) -> Self {
        Self {
            gatekeeper: FakeGatekeeper::new(gatekeeper),
            judge: FakeJudge::new(judge),
            cost: FixedCost::new(price),
        }
    }

    pub fn services(&self) -> EncounterServices {
        EncounterServices::new(
            Arc::clone(&self.gatekeeper) as Arc<dyn Gatekeeper>,
            Arc::clone(&self.judge) as Arc<dyn Judge>,
            Arc::clone(&self.cost) as Arc<dyn CostModel>,
        )
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Never answers within any reasonable timeout.
#[derive(Debug, Clone)]
pub struct StalledAgent;

#[async_trait]
impl DiagnosticAgent for StalledAgent {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn next_action(
        &self,
        _initial_abstract: &str,
        _history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(AgentAction::diagnose("too late"))
    }

    fn reset(&mut self) {}
}

/// Panics on any case whose abstract mentions "panic".
#[derive(Debug, Clone)]
pub struct PanickyAgent;

#[async_trait]
impl DiagnosticAgent for PanickyAgent {
    fn name(&self) -> &str {
        "panicky"
    }

    async fn next_action(
        &self,
        initial_abstract: &str,
        _history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        if initial_abstract.contains("panic") {
            panic!("agent blew up");
        }
        Ok(AgentAction::diagnose("Sarcoidosis"))
    }

    fn reset(&mut self) {}
}

/// Asks one question, then panics on the next turn.
#[derive(Debug, Clone)]
pub struct AskThenPanicAgent;

#[async_trait]
impl DiagnosticAgent for AskThenPanicAgent {
    fn name(&self) -> &str {
        "ask-then-panic"
    }

    async fn next_action(
        &self,
        _initial_abstract: &str,
        history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        if history.is_empty() {
            return Ok(AgentAction::ask("Any recent travel?"));
        }
        panic!("agent lost its state");
    }

    fn reset(&mut self) {}
}

/// Records the (turn, action) pairs it was shown on every call, then plays a
/// fixed script.
#[derive(Debug, Clone)]
pub struct RecordingAgent {
    script: Vec<AgentAction>,
    pub seen: Arc<Mutex<Vec<Vec<(u32, AgentAction)>>>>,
}

impl RecordingAgent {
    pub fn new(script: Vec<AgentAction>) -> Self {
        Self {
            script,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seen(&self) -> Vec<Vec<(u32, AgentAction)>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosticAgent for RecordingAgent {
    fn name(&self) -> &str {
        "recording"
    }

    async fn next_action(
        &self,
        _initial_abstract: &str,
        history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        let mut seen = self.seen.lock().unwrap();
        seen.push(history.iter().map(|t| (t.turn, t.action.clone())).collect());
        let idx = seen.len() - 1;
        Ok(self
            .script
            .get(idx)
            .cloned()
            .unwrap_or_else(|| AgentAction::diagnose("Sarcoidosis")))
    }

    fn reset(&mut self) {}
}

/// Asks once, then diagnoses with whatever the gatekeeper said.
#[derive(Debug, Clone)]
pub struct ParrotAgent {
    pub delay: Duration,
}

#[async_trait]
impl DiagnosticAgent for ParrotAgent {
    fn name(&self) -> &str {
        "parrot"
    }

    async fn next_action(
        &self,
        _initial_abstract: &str,
        history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        tokio::time::sleep(self.delay).await;
        match history.first().and_then(|t| t.response.text()) {
            Some(evidence) => Ok(AgentAction::diagnose(evidence)),
            None => Ok(AgentAction::ask("What did the workup show?")),
        }
    }

    fn reset(&mut self) {}
}
