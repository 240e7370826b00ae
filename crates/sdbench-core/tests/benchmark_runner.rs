//! Benchmark runner tests: aggregation, ordering, isolation and cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use std::sync::atomic::{AtomicU32, Ordering};

use common::{
    case, factory, fast_config, AskThenPanicAgent, Fixture, GatekeeperMode, JudgeMode,
    PanickyAgent, ParrotAgent, StalledAgent,
};
use sdbench_core::agents::{ProtocolAgent, RandomAgent, ScriptedAgent};
use sdbench_core::domain::{
    dataset_digest, AgentAction, CaseFile, CostKind, EncounterOutcome, ScoreSource,
};
use sdbench_core::ports::{AgentFactory, DiagnosticAgent, NamedFactory};
use sdbench_core::{
    compare_results, reference_services, synthetic_cases, BenchConfig, BenchmarkRunner,
};

fn cases(list: &[(&str, &str)]) -> Arc<[CaseFile]> {
    list.iter()
        .map(|(id, gt)| case(id, gt))
        .collect::<Vec<_>>()
        .into()
}

#[tokio::test]
async fn test_accuracy_and_case_order() {
    let fx = Fixture::new(GatekeeperMode::Echo, JudgeMode::Matching, 0.0);
    let runner = BenchmarkRunner::new(fast_config(), fx.services());
    let cases = cases(&[
        ("c1", "Sarcoidosis"),
        ("c2", "Tuberculosis"),
        ("c3", "sarcoidosis"),
    ]);
    let agent = ScriptedAgent::repeating("sure", AgentAction::diagnose("Sarcoidosis"));

    let result = runner.run(factory(agent), Arc::clone(&cases)).await;

    assert_eq!(result.agent_name, "sure");
    assert_eq!(result.total_cases, 3);
    assert_eq!(result.correct_cases, 2);
    assert!((result.diagnostic_accuracy - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(result.average_cost, 300.0);
    assert_eq!(result.dataset_digest, dataset_digest(&cases));
    assert!(!result.cancelled);

    let ids: Vec<&str> = result.encounters.iter().map(|e| e.case_id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
}

/// Same seed, same cases, same collaborators: identical transcripts.
#[tokio::test]
async fn test_seeded_run_is_reproducible() {
    let cases: Arc<[CaseFile]> = vec![
        CaseFile {
            case_id: "nejm-1".into(),
            initial_abstract: "A 34-year-old woman with cough and erythema nodosum.".into(),
            full_case_text: "A 34-year-old woman had cough for two months. \
                Chest X-ray showed bilateral hilar adenopathy. \
                Complete blood count was normal."
                .into(),
            ground_truth_diagnosis: "Sarcoidosis".into(),
            publication_year: 2021,
            is_test_case: false,
        },
        case("nejm-2", "Brucellosis"),
    ]
    .into();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let runner = BenchmarkRunner::new(fast_config(), reference_services());
        let seeded: Arc<dyn AgentFactory> =
            Arc::new(|| -> Box<dyn DiagnosticAgent> { Box::new(RandomAgent::new(7)) });
        runs.push(runner.run(seeded, Arc::clone(&cases)).await);
    }

    for (a, b) in runs[0].encounters.iter().zip(&runs[1].encounters) {
        assert_eq!(a.turns, b.turns);
        assert_eq!(a.cumulative_cost, b.cumulative_cost);
        assert_eq!(a.judge_score, b.judge_score);
    }
    assert_eq!(runs[0].diagnostic_accuracy, runs[1].diagnostic_accuracy);
}

/// Concurrent encounters only ever see their own case.
#[tokio::test]
async fn test_concurrent_encounters_are_isolated() {
    let fx = Fixture::new(GatekeeperMode::CaseText, JudgeMode::Fixed(3), 0.0);
    let config = BenchConfig {
        max_concurrent_encounters: 4,
        ..fast_config()
    };
    let runner = BenchmarkRunner::new(config, fx.services());
    let ids: Vec<String> = (0..8).map(|i| format!("case-{i}")).collect();
    let cases: Arc<[CaseFile]> = ids
        .iter()
        .map(|id| case(id, "Hidden diagnosis"))
        .collect::<Vec<_>>()
        .into();
    let agent = ParrotAgent {
        delay: Duration::from_millis(5),
    };

    let result = runner.run(factory(agent), Arc::clone(&cases)).await;

    assert_eq!(result.total_cases, 8);
    for (enc, case) in result.encounters.iter().zip(cases.iter()) {
        assert_eq!(enc.case_id, case.case_id);
        assert_eq!(
            enc.terminal_diagnosis.as_deref(),
            Some(case.full_case_text.as_str())
        );
        assert_eq!(enc.turn_count, 2);
        assert_eq!(enc.cumulative_cost, 600.0);
    }
}

/// An agent panic fails only its own encounter; its siblings finish.
#[tokio::test]
async fn test_panicking_agent_does_not_abort_run() {
    let fx = Fixture::new(GatekeeperMode::Echo, JudgeMode::Fixed(5), 0.0);
    let runner = BenchmarkRunner::new(fast_config(), fx.services());
    let cases = cases(&[
        ("c1", "Sarcoidosis"),
        ("panic-c2", "Sarcoidosis"),
        ("c3", "Sarcoidosis"),
    ]);

    let result = runner.run(factory(PanickyAgent), cases).await;

    assert_eq!(result.total_cases, 3);
    assert_eq!(result.outcomes.agent_failed, 1);
    assert_eq!(result.outcomes.diagnosed, 2);
    assert_eq!(result.outcomes.crashed, 0);
    let failed = &result.encounters[1];
    assert_eq!(failed.case_id, "panic-c2");
    match &failed.outcome {
        EncounterOutcome::AgentFailed { reason } => assert!(reason.contains("agent blew up")),
        other => panic!("expected agent failure, got {other:?}"),
    }
    assert_eq!(failed.score(), Some(1));
    assert!((result.diagnostic_accuracy - 2.0 / 3.0).abs() < 1e-12);
}

/// A panic mid-encounter keeps the turns and charges made before it.
#[tokio::test]
async fn test_agent_panic_keeps_cost_so_far() {
    let fx = Fixture::new(GatekeeperMode::Echo, JudgeMode::Fixed(5), 0.0);
    let runner = BenchmarkRunner::new(fast_config(), fx.services());

    let result = runner
        .run(factory(AskThenPanicAgent), cases(&[("c1", "Sarcoidosis")]))
        .await;

    let enc = &result.encounters[0];
    assert!(matches!(enc.outcome, EncounterOutcome::AgentFailed { .. }));
    assert_eq!(enc.cumulative_cost, 300.0);
    assert_eq!(enc.turn_count, 1);
    assert_eq!(enc.turns.len(), 1);
    assert_eq!(enc.cost_entries.len(), 1);
    assert_eq!(enc.cost_entries[0].kind, CostKind::PhysicianVisit);
    let score = enc.judge_score.as_ref().expect("sentinel score");
    assert_eq!(score.source, ScoreSource::Sentinel);
    assert_eq!(result.average_cost, 300.0);
    assert_eq!(fx.judge.calls(), 0);
}

/// A task that dies outside any collaborator call is recorded as crashed.
#[tokio::test]
async fn test_factory_panic_recorded_as_crash() {
    let fx = Fixture::new(GatekeeperMode::Echo, JudgeMode::Fixed(5), 0.0);
    let config = BenchConfig {
        max_concurrent_encounters: 1,
        ..fast_config()
    };
    let runner = BenchmarkRunner::new(config, fx.services());
    let built = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&built);
    let flaky: Arc<dyn AgentFactory> = Arc::new(NamedFactory::new(
        "sure",
        move || -> Box<dyn DiagnosticAgent> {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("factory failed on second case");
            }
            Box::new(ScriptedAgent::repeating(
                "sure",
                AgentAction::diagnose("Sarcoidosis"),
            ))
        },
    ));

    let result = runner
        .run(
            flaky,
            cases(&[
                ("c1", "Sarcoidosis"),
                ("c2", "Sarcoidosis"),
                ("c3", "Sarcoidosis"),
            ]),
        )
        .await;

    assert_eq!(result.total_cases, 3);
    assert_eq!(result.outcomes.crashed, 1);
    let crashed = &result.encounters[1];
    assert_eq!(crashed.case_id, "c2");
    assert!(matches!(crashed.outcome, EncounterOutcome::Crashed { .. }));
    assert_eq!(crashed.score(), Some(1));
    assert_eq!(crashed.cumulative_cost, 0.0);
    assert_eq!(result.encounters[2].outcome, EncounterOutcome::Diagnosed);
}

#[tokio::test]
async fn test_cancelled_before_run_skips_all_cases() {
    let fx = Fixture::new(GatekeeperMode::Echo, JudgeMode::Fixed(5), 0.0);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let runner = BenchmarkRunner::new(fast_config(), fx.services()).with_cancellation(cancel);

    let result = runner
        .run(
            factory(ScriptedAgent::repeating("any", AgentAction::diagnose("X"))),
            cases(&[("c1", "X"), ("c2", "X")]),
        )
        .await;

    assert!(result.cancelled);
    assert_eq!(result.total_cases, 0);
    assert_eq!(result.diagnostic_accuracy, 0.0);
}

/// Cancelling mid-run stops the in-flight encounter and skips the rest.
#[tokio::test(start_paused = true)]
async fn test_cancel_mid_run() {
    let fx = Fixture::new(GatekeeperMode::Echo, JudgeMode::Fixed(5), 0.0);
    let config = BenchConfig {
        max_concurrent_encounters: 1,
        ..fast_config()
    };
    let runner = BenchmarkRunner::new(config, fx.services());
    let token = runner.cancellation_token();

    let (result, _) = tokio::join!(
        runner.run(
            factory(StalledAgent),
            cases(&[("c1", "X"), ("c2", "X"), ("c3", "X")])
        ),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        }
    );

    assert!(result.cancelled);
    assert_eq!(result.encounters.len(), 1);
    assert_eq!(result.encounters[0].outcome, EncounterOutcome::Cancelled);
    assert!(result.encounters[0].judge_score.is_none());
    assert_eq!(fx.judge.calls(), 0);
}

#[tokio::test]
async fn test_run_comparative() {
    let fx = Fixture::new(GatekeeperMode::Echo, JudgeMode::Matching, 0.0);
    let runner = BenchmarkRunner::new(fast_config(), fx.services());
    let cases = cases(&[("c1", "Sarcoidosis"), ("c2", "Sarcoidosis")]);

    let results = runner
        .run_comparative(
            &[
                factory(ScriptedAgent::repeating(
                    "alpha",
                    AgentAction::diagnose("Sarcoidosis"),
                )),
                factory(ScriptedAgent::repeating(
                    "beta",
                    AgentAction::diagnose("Tuberculosis"),
                )),
            ],
            cases,
        )
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].agent_name, "alpha");
    assert_eq!(results[0].diagnostic_accuracy, 1.0);
    assert_eq!(results[1].diagnostic_accuracy, 0.0);

    let cmp = compare_results(&results);
    assert_eq!(cmp.best_accuracy.map(|p| p.agent_name).as_deref(), Some("alpha"));
}

/// The built-in demo set runs end to end on the offline collaborators.
#[tokio::test]
async fn test_demo_cases_with_protocol_variants() {
    let runner = BenchmarkRunner::new(fast_config(), reference_services());
    let demo: Arc<[CaseFile]> = synthetic_cases().into();
    let conservative: Arc<dyn AgentFactory> =
        Arc::new(|| -> Box<dyn DiagnosticAgent> { Box::new(ProtocolAgent::conservative()) });
    let aggressive: Arc<dyn AgentFactory> =
        Arc::new(|| -> Box<dyn DiagnosticAgent> { Box::new(ProtocolAgent::aggressive()) });

    let results = runner
        .run_comparative(&[conservative, aggressive], demo)
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].agent_name, "conservative");
    assert_eq!(results[1].agent_name, "aggressive");
    for result in &results {
        assert_eq!(result.total_cases, 3);
        assert_eq!(result.outcomes.crashed + result.outcomes.agent_failed, 0);
        assert!(result.average_cost > 0.0);
        for enc in &result.encounters {
            assert!(enc.turn_count >= 1);
            assert!(enc.cumulative_cost > 0.0);
        }
    }
}
