//! SDBench Core Library
//!
//! Turn-based, cost-aware evaluation of diagnostic agents: the encounter
//! state machine, the benchmark runner, and the pieces they depend on.

pub mod agents;
pub mod call;
pub mod compare;
pub mod config;
pub mod domain;
pub mod encounter;
pub mod ledger;
pub mod metrics;
pub mod obs;
pub mod ports;
pub mod reference;
pub mod reporting;
pub mod runner;
pub mod telemetry;

pub use domain::{
    dataset_digest, load_cases_jsonl, parse_action_text, ActionKind, AgentAction,
    BenchmarkResult, CaseFile, CaseFilter, CaseLoadReport, CostEntry, CostKind,
    DiagnosticEncounter, EncounterOutcome, EvidenceResponse, JudgeScore, Result, SdbenchError,
    TurnRecord, TurnResponse, SENTINEL_SCORE,
};

pub use call::{call_with_controls, CallFailure, CallOutcome};
pub use compare::{compare_results, pareto_frontier, AgentComparison};
pub use config::{BenchConfig, CallPolicy};
pub use encounter::{run_encounter, EncounterMachine, EncounterServices, EncounterState};
pub use ledger::{CostLedger, LedgerError};
pub use ports::{
    AgentFactory, CostModel, DiagnosticAgent, ExternalCallError, Gatekeeper, GatekeeperReply,
    Judge, JudgeVerdict, NamedFactory,
};
pub use reference::{reference_services, synthetic_cases};
pub use reporting::{
    read_results_json, render_comparison_md, render_report_md, render_results_csv,
    write_report_md, write_results_csv, write_results_json, write_transcripts, ResultsArtifact,
};
pub use runner::BenchmarkRunner;
pub use telemetry::init_tracing;

/// Crate version, reported in CLI output and results files.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
