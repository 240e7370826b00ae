//! Benchmark aggregates over a set of encounters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::encounter::{DiagnosticEncounter, EncounterOutcome};

/// Fraction of encounters scored at or above `threshold`. 0.0 when empty.
pub fn diagnostic_accuracy(encounters: &[DiagnosticEncounter], threshold: u8) -> f64 {
    if encounters.is_empty() {
        return 0.0;
    }
    let correct = encounters.iter().filter(|e| e.is_correct(threshold)).count();
    correct as f64 / encounters.len() as f64
}

/// Mean cumulative cost. 0.0 when empty.
pub fn average_cost(encounters: &[DiagnosticEncounter]) -> f64 {
    if encounters.is_empty() {
        return 0.0;
    }
    encounters.iter().map(|e| e.cumulative_cost).sum::<f64>() / encounters.len() as f64
}

/// Mean score over encounters that have one.
pub fn average_score(encounters: &[DiagnosticEncounter]) -> Option<f64> {
    let scores: Vec<f64> = encounters
        .iter()
        .filter_map(|e| e.score())
        .map(f64::from)
        .collect();
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

/// How many encounters ended each way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub diagnosed: usize,
    pub budget_exhausted: usize,
    pub agent_failed: usize,
    pub cancelled: usize,
    pub crashed: usize,
    /// Encounters with no score at all (judge failure or cancellation).
    pub unscored: usize,
}

impl OutcomeCounts {
    pub fn tally(encounters: &[DiagnosticEncounter]) -> Self {
        let mut counts = Self::default();
        for e in encounters {
            match e.outcome {
                EncounterOutcome::Diagnosed => counts.diagnosed += 1,
                EncounterOutcome::BudgetExhausted => counts.budget_exhausted += 1,
                EncounterOutcome::AgentFailed { .. } => counts.agent_failed += 1,
                EncounterOutcome::Cancelled => counts.cancelled += 1,
                EncounterOutcome::Crashed { .. } => counts.crashed += 1,
            }
            if e.judge_score.is_none() {
                counts.unscored += 1;
            }
        }
        counts
    }
}

/// Result of running one agent over a case list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub run_id: Uuid,
    pub agent_name: String,
    /// Digest of the ordered case ids the run was asked to cover.
    pub dataset_digest: String,
    pub threshold: u8,
    pub max_turns_per_case: u32,
    pub total_cases: usize,
    pub correct_cases: usize,
    pub diagnostic_accuracy: f64,
    pub average_cost: f64,
    pub average_score: Option<f64>,
    /// Accuracy over encounters that did not run out of turns.
    pub accuracy_excluding_budget_exhausted: f64,
    pub outcomes: OutcomeCounts,
    /// `true` when the run stopped early and some cases were never started.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub encounters: Vec<DiagnosticEncounter>,
}

/// Identity and settings of a run, known before any encounter finishes.
#[derive(Debug, Clone)]
pub struct RunHeader {
    pub run_id: Uuid,
    pub agent_name: String,
    pub dataset_digest: String,
    pub threshold: u8,
    pub max_turns_per_case: u32,
    pub started_at: DateTime<Utc>,
}

impl BenchmarkResult {
    pub fn aggregate(
        header: RunHeader,
        encounters: Vec<DiagnosticEncounter>,
        cancelled: bool,
    ) -> Self {
        let threshold = header.threshold;
        let not_exhausted: Vec<DiagnosticEncounter> = encounters
            .iter()
            .filter(|e| e.outcome != EncounterOutcome::BudgetExhausted)
            .cloned()
            .collect();

        Self {
            run_id: header.run_id,
            agent_name: header.agent_name,
            dataset_digest: header.dataset_digest,
            threshold,
            max_turns_per_case: header.max_turns_per_case,
            total_cases: encounters.len(),
            correct_cases: encounters.iter().filter(|e| e.is_correct(threshold)).count(),
            diagnostic_accuracy: diagnostic_accuracy(&encounters, threshold),
            average_cost: average_cost(&encounters),
            average_score: average_score(&encounters),
            accuracy_excluding_budget_exhausted: diagnostic_accuracy(&not_exhausted, threshold),
            outcomes: OutcomeCounts::tally(&encounters),
            cancelled,
            started_at: header.started_at,
            finished_at: Utc::now(),
            encounters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::encounter::JudgeScore;

    fn encounter(score: Option<u8>, cost: f64, outcome: EncounterOutcome) -> DiagnosticEncounter {
        let mut e = DiagnosticEncounter::crashed("c", "a", "fixture");
        e.judge_score = score.map(|s| JudgeScore::judged(s, None));
        e.cumulative_cost = cost;
        e.outcome = outcome;
        e
    }

    fn header() -> RunHeader {
        RunHeader {
            run_id: Uuid::new_v4(),
            agent_name: "fixture".to_string(),
            dataset_digest: "d".to_string(),
            threshold: 4,
            max_turns_per_case: 10,
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_accuracy_two_of_three() {
        let encs = vec![
            encounter(Some(5), 100.0, EncounterOutcome::Diagnosed),
            encounter(Some(3), 200.0, EncounterOutcome::Diagnosed),
            encounter(Some(4), 300.0, EncounterOutcome::Diagnosed),
        ];
        assert!((diagnostic_accuracy(&encs, 4) - 2.0 / 3.0).abs() < 1e-12);
        assert!((average_cost(&encs) - 200.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_aggregates_are_zero() {
        assert_eq!(diagnostic_accuracy(&[], 4), 0.0);
        assert_eq!(average_cost(&[]), 0.0);
        assert_eq!(average_score(&[]), None);

        let result = BenchmarkResult::aggregate(header(), Vec::new(), false);
        assert_eq!(result.total_cases, 0);
        assert_eq!(result.diagnostic_accuracy, 0.0);
    }

    #[test]
    fn test_unscored_counts_as_incorrect() {
        let encs = vec![
            encounter(None, 0.0, EncounterOutcome::Diagnosed),
            encounter(Some(5), 0.0, EncounterOutcome::Diagnosed),
        ];
        assert_eq!(diagnostic_accuracy(&encs, 4), 0.5);
        assert_eq!(OutcomeCounts::tally(&encs).unscored, 1);
    }

    #[test]
    fn test_accuracy_excluding_budget_exhausted() {
        let encs = vec![
            encounter(Some(5), 300.0, EncounterOutcome::Diagnosed),
            encounter(Some(1), 900.0, EncounterOutcome::BudgetExhausted),
        ];
        let result = BenchmarkResult::aggregate(header(), encs, false);
        assert_eq!(result.diagnostic_accuracy, 0.5);
        assert_eq!(result.accuracy_excluding_budget_exhausted, 1.0);
        assert_eq!(result.outcomes.budget_exhausted, 1);
        assert_eq!(result.correct_cases, 1);
        assert_eq!(result.average_score, Some(3.0));
    }
}
