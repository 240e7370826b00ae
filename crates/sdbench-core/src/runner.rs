//! Benchmark runner: drives one encounter per case and aggregates the results.
//!
//! Encounters for different cases run on their own tasks, bounded by a
//! semaphore. With `max_concurrent_encounters = 1` cases run strictly one
//! after another. Results always come back in input case order.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::BenchConfig;
use crate::domain::{dataset_digest, BenchmarkResult, CaseFile, DiagnosticEncounter, RunHeader};
use crate::encounter::{run_encounter, EncounterServices};
use crate::metrics::METRICS;
use crate::obs;
use crate::ports::AgentFactory;

pub struct BenchmarkRunner {
    config: Arc<BenchConfig>,
    services: EncounterServices,
    cancel: CancellationToken,
}

impl BenchmarkRunner {
    pub fn new(config: BenchConfig, services: EncounterServices) -> Self {
        Self {
            config: Arc::new(config),
            services,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token so callers can stop the run.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one agent over every case.
    ///
    /// Collaborator panics are absorbed by the call controls and end the
    /// encounter with its turns and cost intact. A case whose task dies
    /// anyway (for example in the factory) is recorded as a crashed encounter
    /// with the sentinel score; the other cases are unaffected. After
    /// cancellation, cases not yet started are skipped and the result is
    /// flagged `cancelled`.
    pub async fn run(
        &self,
        factory: Arc<dyn AgentFactory>,
        cases: Arc<[CaseFile]>,
    ) -> BenchmarkResult {
        let header = RunHeader {
            run_id: Uuid::new_v4(),
            agent_name: factory.agent_name(),
            dataset_digest: dataset_digest(&cases),
            threshold: self.config.correct_diagnosis_threshold,
            max_turns_per_case: self.config.max_turns_per_case,
            started_at: Utc::now(),
        };
        let run_id = header.run_id.to_string();
        let span = obs::benchmark_span(&run_id, &header.agent_name);

        async move {
            obs::emit_benchmark_started(&run_id, &header.agent_name, cases.len());
            let encounters = self.run_cases(&header.agent_name, factory, &cases).await;
            let cancelled = self.cancel.is_cancelled();
            let result = BenchmarkResult::aggregate(header, encounters, cancelled);

            obs::emit_benchmark_finished(
                &run_id,
                result.diagnostic_accuracy,
                result.average_cost,
                result.total_cases,
                result.cancelled,
            );
            METRICS.flush();
            result
        }
        .instrument(span)
        .await
    }

    /// Run several agents over the same cases, one after another.
    pub async fn run_comparative(
        &self,
        factories: &[Arc<dyn AgentFactory>],
        cases: Arc<[CaseFile]>,
    ) -> Vec<BenchmarkResult> {
        let mut results = Vec::with_capacity(factories.len());
        for factory in factories {
            if self.cancel.is_cancelled() {
                break;
            }
            results.push(self.run(Arc::clone(factory), Arc::clone(&cases)).await);
        }
        results
    }

    async fn run_cases(
        &self,
        agent_name: &str,
        factory: Arc<dyn AgentFactory>,
        cases: &Arc<[CaseFile]>,
    ) -> Vec<DiagnosticEncounter> {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent_encounters));
        let mut tasks = Vec::with_capacity(cases.len());

        for idx in 0..cases.len() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&sem).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                tracing::info!(skipped = cases.len() - idx, "run cancelled; remaining cases skipped");
                break;
            };

            let cases = Arc::clone(cases);
            let factory = Arc::clone(&factory);
            let services = self.services.clone();
            let config = Arc::clone(&self.config);
            let cancel = self.cancel.clone();
            let span = obs::encounter_span(&cases[idx].case_id, agent_name);

            let handle = tokio::spawn(
                async move {
                    let _permit = permit;
                    let case = &cases[idx];
                    let mut agent = factory.create();
                    agent.reset();
                    run_encounter(case, agent.as_ref(), &services, &config, cancel).await
                }
                .instrument(span),
            );
            tasks.push(handle);
        }

        let joined = futures::future::join_all(tasks).await;
        let mut encounters = Vec::with_capacity(joined.len());
        for (idx, outcome) in joined.into_iter().enumerate() {
            match outcome {
                Ok(encounter) => encounters.push(encounter),
                Err(e) => {
                    METRICS.inc_crashes();
                    tracing::warn!(case_id = %cases[idx].case_id, error = %e, "encounter task failed");
                    encounters.push(DiagnosticEncounter::crashed(
                        &cases[idx].case_id,
                        agent_name,
                        format!("encounter task failed: {e}"),
                    ));
                }
            }
        }
        encounters
    }
}
