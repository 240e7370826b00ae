//! SDBench domain model.

pub mod action;
pub mod case;
pub mod encounter;
pub mod error;
pub mod result;

pub use action::{
    extract_stated_diagnosis, parse_action_text, validate_request, ActionKind, AgentAction,
    RequestRejection,
};
pub use case::{
    dataset_digest, load_cases_jsonl, parse_cases_jsonl, CaseFile, CaseFilter, CaseLoadReport,
    RejectedRecord,
};
pub use encounter::{
    score_label, CostEntry, CostKind, DiagnosticEncounter, EncounterOutcome, EvidenceResponse,
    JudgeScore, ScoreSource, TurnRecord, TurnResponse, SENTINEL_SCORE,
};
pub use error::{CaseRecordError, Result, SdbenchError};
pub use result::{
    average_cost, average_score, diagnostic_accuracy, BenchmarkResult, OutcomeCounts, RunHeader,
};
