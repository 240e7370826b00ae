//! Structured observability hooks for benchmark and encounter lifecycle events.
//!
//! Spans are returned as plain [`tracing::Span`]s and attached with
//! `Instrument`, since encounters run on spawned tasks.

use tracing::{info, Span};

/// Span covering a whole benchmark run.
pub fn benchmark_span(run_id: &str, agent_name: &str) -> Span {
    tracing::info_span!("sdbench.run", run_id = %run_id, agent = %agent_name)
}

/// Span covering one encounter.
pub fn encounter_span(case_id: &str, agent_name: &str) -> Span {
    tracing::info_span!("sdbench.encounter", case_id = %case_id, agent = %agent_name)
}

pub fn emit_benchmark_started(run_id: &str, agent_name: &str, total_cases: usize) {
    info!(
        event = "benchmark.started",
        run_id = %run_id,
        agent_name = %agent_name,
        total_cases = total_cases,
    );
}

pub fn emit_benchmark_finished(
    run_id: &str,
    accuracy: f64,
    average_cost: f64,
    total_cases: usize,
    cancelled: bool,
) {
    info!(
        event = "benchmark.finished",
        run_id = %run_id,
        accuracy = accuracy,
        average_cost = average_cost,
        total_cases = total_cases,
        cancelled = cancelled,
    );
}

pub fn emit_encounter_started(case_id: &str, max_turns: u32) {
    info!(event = "encounter.started", case_id = %case_id, max_turns = max_turns);
}

/// Emit event: one turn dispatched.
pub fn emit_turn(case_id: &str, turn: u32, kind: &str, turn_cost: f64, cumulative_cost: f64) {
    info!(
        event = "encounter.turn",
        case_id = %case_id,
        turn = turn,
        kind = %kind,
        turn_cost = turn_cost,
        cumulative_cost = cumulative_cost,
    );
}

pub fn emit_encounter_finished(
    case_id: &str,
    outcome: &str,
    turns: u32,
    cumulative_cost: f64,
    score: Option<u8>,
) {
    info!(
        event = "encounter.finished",
        case_id = %case_id,
        outcome = %outcome,
        turns = turns,
        cumulative_cost = cumulative_cost,
        score = score,
    );
}

/// Emit event: an external call is being retried (warning level).
pub fn emit_call_retry(call: &str, attempt: u32, reason: &str) {
    tracing::warn!(event = "call.retry", call = %call, attempt = attempt, reason = %reason);
}

/// Emit event: a collaborator failed and the encounter degraded (warning level).
pub fn emit_degraded(case_id: &str, call: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "encounter.degraded", case_id = %case_id, call = %call, error = %error);
}
