//! Encounter state machine.
//!
//! Drives one agent through one case:
//!
//! ```text
//! AwaitingAction --agent acts--> Dispatching --+--> AwaitingAction
//!                                              +--> Terminated
//! ```
//!
//! Termination happens on an accepted diagnosis, on budget exhaustion, on an
//! agent that stops answering, or on cancellation. Collaborator failures
//! never abort the encounter; they degrade the turn instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use tokio_util::sync::CancellationToken;

use crate::call::{call_with_controls, CallFailure};
use crate::config::BenchConfig;
use crate::domain::{
    extract_stated_diagnosis, validate_request, AgentAction, CaseFile, CostKind,
    DiagnosticEncounter, EncounterOutcome, EvidenceResponse, JudgeScore, TurnRecord, TurnResponse,
};
use crate::ledger::CostLedger;
use crate::metrics::METRICS;
use crate::obs;
use crate::ports::{CostModel, DiagnosticAgent, Gatekeeper, Judge};

const REDACTED: &str = "[redacted]";
const MALFORMED_NOTICE: &str =
    "Unrecognized action. Respond with <question>, <test> or <diagnosis>.";

/// Shared collaborators for every encounter in a run.
#[derive(Clone)]
pub struct EncounterServices {
    pub gatekeeper: Arc<dyn Gatekeeper>,
    pub judge: Arc<dyn Judge>,
    pub cost_model: Arc<dyn CostModel>,
}

impl EncounterServices {
    pub fn new(
        gatekeeper: Arc<dyn Gatekeeper>,
        judge: Arc<dyn Judge>,
        cost_model: Arc<dyn CostModel>,
    ) -> Self {
        Self {
            gatekeeper,
            judge,
            cost_model,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterState {
    AwaitingAction,
    Dispatching,
    Terminated,
}

/// Result of dispatching one action.
enum Step {
    Continue,
    Diagnosed {
        diagnosis: String,
        score: Option<JudgeScore>,
    },
    Cancelled,
}

enum Judgement {
    Scored(JudgeScore),
    Unscored,
    Cancelled,
}

/// Replace every case-insensitive occurrence of `ground_truth` in `text`.
///
/// Returns the scrubbed text and whether anything was replaced.
pub fn redact_ground_truth(text: &str, ground_truth: &str) -> (String, bool) {
    let needle = ground_truth.trim();
    if needle.is_empty() {
        return (text.to_string(), false);
    }
    match RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
    {
        Ok(re) if re.is_match(text) => (re.replace_all(text, REDACTED).into_owned(), true),
        _ => (text.to_string(), false),
    }
}

/// One encounter in flight.
pub struct EncounterMachine<'a> {
    case: &'a CaseFile,
    agent: &'a dyn DiagnosticAgent,
    services: &'a EncounterServices,
    config: &'a BenchConfig,
    cancel: CancellationToken,
    state: EncounterState,
    ledger: CostLedger,
    turns: Vec<TurnRecord>,
    last_stated_diagnosis: Option<String>,
    started_at: DateTime<Utc>,
}

impl<'a> EncounterMachine<'a> {
    pub fn new(
        case: &'a CaseFile,
        agent: &'a dyn DiagnosticAgent,
        services: &'a EncounterServices,
        config: &'a BenchConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            case,
            agent,
            services,
            config,
            cancel,
            state: EncounterState::AwaitingAction,
            ledger: CostLedger::new(),
            turns: Vec::new(),
            last_stated_diagnosis: None,
            started_at: Utc::now(),
        }
    }

    pub fn state(&self) -> EncounterState {
        self.state
    }

    fn turn_count(&self) -> u32 {
        self.turns.len() as u32
    }

    fn transition(&mut self, next: EncounterState) {
        tracing::trace!(case_id = %self.case.case_id, from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    /// Run to termination.
    pub async fn run(mut self) -> DiagnosticEncounter {
        METRICS.inc_encounters();
        obs::emit_encounter_started(&self.case.case_id, self.config.max_turns_per_case);

        loop {
            if self.cancel.is_cancelled() {
                return self.finish(EncounterOutcome::Cancelled, None, None);
            }
            if self.turn_count() >= self.config.max_turns_per_case {
                return self.exhaust().await;
            }

            let action = match self.request_action().await {
                Ok(action) => action,
                Err(failure) if failure.is_cancelled() => {
                    return self.finish(EncounterOutcome::Cancelled, None, None);
                }
                Err(failure) => {
                    obs::emit_degraded(&self.case.case_id, "agent", &failure);
                    let reason = failure.to_string();
                    let sentinel = JudgeScore::sentinel(format!("agent failed: {reason}"));
                    return self.finish(
                        EncounterOutcome::AgentFailed { reason },
                        None,
                        Some(sentinel),
                    );
                }
            };

            self.transition(EncounterState::Dispatching);
            match self.dispatch(action).await {
                Step::Continue => self.transition(EncounterState::AwaitingAction),
                Step::Diagnosed { diagnosis, score } => {
                    return self.finish(EncounterOutcome::Diagnosed, Some(diagnosis), score);
                }
                Step::Cancelled => {
                    return self.finish(EncounterOutcome::Cancelled, None, None);
                }
            }
        }
    }

    async fn request_action(&self) -> Result<AgentAction, CallFailure> {
        let agent = self.agent;
        let abstract_text = self.case.initial_abstract.as_str();
        let history = self.turns.as_slice();
        call_with_controls(&self.config.calls, "agent", &self.cancel, || {
            agent.next_action(abstract_text, history)
        })
        .await
        .map(|out| out.value)
    }

    async fn dispatch(&mut self, action: AgentAction) -> Step {
        let turn = self.turn_count() + 1;

        if !action.is_well_formed() {
            if let Some(stated) = extract_stated_diagnosis(action.content()) {
                self.last_stated_diagnosis = Some(stated);
            }
            self.record_turn(
                turn,
                action,
                TurnResponse::NoOp {
                    reason: MALFORMED_NOTICE.to_string(),
                },
                false,
            );
            return Step::Continue;
        }

        if let AgentAction::Diagnose { content } = &action {
            let diagnosis = content.trim().to_string();
            let charge_visit = self.config.charge_visit_on_diagnose;
            if charge_visit {
                self.charge(turn, CostKind::PhysicianVisit, self.config.physician_visit_cost);
            }
            let judgement = self.judge(&diagnosis).await;
            let score = match judgement {
                Judgement::Scored(score) => Some(score),
                Judgement::Unscored => None,
                Judgement::Cancelled => {
                    self.record_turn(turn, action, TurnResponse::Scored { score: None }, charge_visit);
                    return Step::Cancelled;
                }
            };
            self.record_turn(
                turn,
                action,
                TurnResponse::Scored {
                    score: score.clone(),
                },
                charge_visit,
            );
            return Step::Diagnosed { diagnosis, score };
        }

        if let Some(stated) = extract_stated_diagnosis(action.content()) {
            self.last_stated_diagnosis = Some(stated);
        }

        if self.config.reject_vague_requests {
            if let Err(rejection) = validate_request(&action) {
                self.record_turn(
                    turn,
                    action,
                    TurnResponse::Rejected {
                        text: format!("Invalid request: {}", rejection.guidance),
                    },
                    false,
                );
                return Step::Continue;
            }
        }

        let gatekeeper = Arc::clone(&self.services.gatekeeper);
        let full_text = self.case.full_case_text.as_str();
        let reply = call_with_controls(&self.config.calls, "gatekeeper", &self.cancel, || {
            gatekeeper.answer(full_text, &action)
        })
        .await;

        let reply = match reply {
            Ok(out) => out.value,
            Err(failure) if failure.is_cancelled() => return Step::Cancelled,
            Err(failure) => {
                obs::emit_degraded(&self.case.case_id, "gatekeeper", &failure);
                self.record_turn(
                    turn,
                    action,
                    TurnResponse::NoOp {
                        reason: format!("Gatekeeper unavailable: {failure}"),
                    },
                    false,
                );
                return Step::Continue;
            }
        };

        let evidence_cost = match &action {
            AgentAction::OrderTest { .. } => match self.price(&action).await {
                Some(cost) => cost,
                None if self.cancel.is_cancelled() => return Step::Cancelled,
                None => 0.0,
            },
            _ => 0.0,
        };

        let visit = matches!(action, AgentAction::AskQuestion { .. });
        if visit {
            self.charge(turn, CostKind::PhysicianVisit, self.config.physician_visit_cost);
        }
        if evidence_cost > 0.0 {
            self.charge(turn, CostKind::Test, evidence_cost);
        }

        let (text, redacted) = redact_ground_truth(&reply.text, &self.case.ground_truth_diagnosis);
        if redacted {
            tracing::warn!(case_id = %self.case.case_id, turn, "gatekeeper answer leaked the diagnosis; redacted");
        }
        self.record_turn(
            turn,
            action,
            TurnResponse::Evidence {
                evidence: EvidenceResponse {
                    text,
                    is_synthetic: reply.is_synthetic,
                    cost: evidence_cost,
                },
                redacted,
            },
            visit,
        );
        Step::Continue
    }

    /// Ask the cost model for a test price. `None` on any failure.
    async fn price(&self, action: &AgentAction) -> Option<f64> {
        let cost_model = Arc::clone(&self.services.cost_model);
        match call_with_controls(&self.config.calls, "cost_model", &self.cancel, || {
            cost_model.estimate(action)
        })
        .await
        {
            Ok(out) if out.value.is_finite() && out.value >= 0.0 => Some(out.value),
            Ok(out) => {
                tracing::warn!(case_id = %self.case.case_id, amount = out.value, "cost model returned an invalid amount; charging nothing");
                None
            }
            Err(failure) => {
                if !failure.is_cancelled() {
                    obs::emit_degraded(&self.case.case_id, "cost_model", &failure);
                }
                None
            }
        }
    }

    async fn judge(&self, candidate: &str) -> Judgement {
        let judge = Arc::clone(&self.services.judge);
        let ground_truth = self.case.ground_truth_diagnosis.as_str();
        let verdict = call_with_controls(&self.config.calls, "judge", &self.cancel, || {
            judge.score(candidate, ground_truth)
        })
        .await;

        match verdict {
            Ok(out) if (1..=5).contains(&out.value.score) => {
                Judgement::Scored(JudgeScore::judged(out.value.score, out.value.rationale))
            }
            Ok(out) => {
                tracing::warn!(case_id = %self.case.case_id, score = out.value.score, "judge score out of range; leaving unscored");
                Judgement::Unscored
            }
            Err(failure) if failure.is_cancelled() => Judgement::Cancelled,
            Err(failure) => {
                obs::emit_degraded(&self.case.case_id, "judge", &failure);
                Judgement::Unscored
            }
        }
    }

    /// Budget ran out: judge whatever diagnosis was stated, or assign the
    /// sentinel score.
    async fn exhaust(self) -> DiagnosticEncounter {
        let score = match self.last_stated_diagnosis.clone() {
            Some(stated) => match self.judge(&stated).await {
                Judgement::Scored(score) => Some(score),
                Judgement::Unscored => None,
                Judgement::Cancelled => {
                    return self.finish(EncounterOutcome::Cancelled, None, None);
                }
            },
            None => Some(JudgeScore::sentinel(
                "turn budget exhausted without a stated diagnosis",
            )),
        };
        self.finish(EncounterOutcome::BudgetExhausted, None, score)
    }

    fn charge(&mut self, turn: u32, kind: CostKind, amount: f64) {
        if let Err(e) = self.ledger.record(turn, kind, amount) {
            tracing::warn!(case_id = %self.case.case_id, error = %e, "charge skipped");
        }
    }

    fn record_turn(
        &mut self,
        turn: u32,
        action: AgentAction,
        response: TurnResponse,
        visit_charged: bool,
    ) {
        let turn_cost = self.ledger.turn_total(turn);
        let cost_after_turn = self.ledger.total();
        METRICS.inc_turns();
        obs::emit_turn(
            &self.case.case_id,
            turn,
            &action.kind().to_string(),
            turn_cost,
            cost_after_turn,
        );
        self.turns.push(TurnRecord {
            turn,
            action,
            response,
            visit_charged,
            turn_cost,
            cost_after_turn,
        });
    }

    fn finish(
        mut self,
        outcome: EncounterOutcome,
        terminal_diagnosis: Option<String>,
        judge_score: Option<JudgeScore>,
    ) -> DiagnosticEncounter {
        self.transition(EncounterState::Terminated);
        let encounter = DiagnosticEncounter {
            case_id: self.case.case_id.clone(),
            agent_name: self.agent.name().to_string(),
            cumulative_cost: self.ledger.total(),
            turn_count: self.turn_count(),
            is_complete: terminal_diagnosis.is_some(),
            terminal_diagnosis,
            judge_score,
            outcome,
            cost_entries: self.ledger.into_entries(),
            turns: self.turns,
            last_stated_diagnosis: self.last_stated_diagnosis,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        obs::emit_encounter_finished(
            &encounter.case_id,
            encounter.outcome.label(),
            encounter.turn_count,
            encounter.cumulative_cost,
            encounter.score(),
        );
        encounter
    }
}

/// Run a single encounter to completion.
pub async fn run_encounter(
    case: &CaseFile,
    agent: &dyn DiagnosticAgent,
    services: &EncounterServices,
    config: &BenchConfig,
    cancel: CancellationToken,
) -> DiagnosticEncounter {
    EncounterMachine::new(case, agent, services, config, cancel)
        .run()
        .await
}
