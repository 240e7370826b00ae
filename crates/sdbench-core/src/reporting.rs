use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::compare::AgentComparison;
use crate::domain::{BenchmarkResult, DiagnosticEncounter};

pub const RESULTS_SCHEMA_VERSION: &str = "1.0";

/// Persisted results file: the benchmark result plus envelope metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: BenchmarkResult,
}

impl ResultsArtifact {
    pub fn new(result: BenchmarkResult) -> Self {
        Self {
            schema_version: RESULTS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            result,
        }
    }
}

/// Write results.json in pretty JSON format.
pub fn write_results_json(path: &Path, result: &BenchmarkResult) -> Result<()> {
    let artifact = ResultsArtifact::new(result.clone());
    let content = serde_json::to_string_pretty(&artifact).context("serialize results artifact")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

pub fn read_results_json(path: &Path) -> Result<ResultsArtifact> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("parse results artifact {:?}", path))
}

/// File name for a case transcript. Ids that need sanitising get a short
/// digest of the original id appended, so `a/b` and `a_b` stay distinct.
fn transcript_file_name(case_id: &str) -> String {
    let safe: String = case_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe == case_id {
        return format!("{safe}.json");
    }
    let digest = hex::encode(Sha256::digest(case_id.as_bytes()));
    format!("{safe}-{}.json", &digest[..8])
}

/// Write one JSON transcript per encounter into `dir`, creating it if needed.
///
/// Fails instead of overwriting when two encounters map to the same file.
pub fn write_transcripts(dir: &Path, encounters: &[DiagnosticEncounter]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let mut taken = HashSet::with_capacity(encounters.len());
    let mut written = Vec::with_capacity(encounters.len());
    for enc in encounters {
        let name = transcript_file_name(&enc.case_id);
        if !taken.insert(name.clone()) {
            bail!(
                "transcript for case {:?} would overwrite {:?}",
                enc.case_id,
                name
            );
        }
        let path = dir.join(name);
        let content = serde_json::to_string_pretty(enc)
            .with_context(|| format!("serialize transcript for {}", enc.case_id))?;
        std::fs::write(&path, content).with_context(|| format!("write {:?}", path))?;
        written.push(path);
    }
    Ok(written)
}

const CSV_HEADER: &str = "agent,diagnostic_accuracy,average_cost,total_cases,correct_cases";

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// One summary row per agent, for spreadsheets and plotting.
pub fn render_results_csv(results: &[BenchmarkResult]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for r in results {
        out.push_str(&format!(
            "{},{:.6},{:.2},{},{}\n",
            csv_field(&r.agent_name),
            r.diagnostic_accuracy,
            r.average_cost,
            r.total_cases,
            r.correct_cases
        ));
    }
    out
}

/// Write results.csv.
pub fn write_results_csv(path: &Path, results: &[BenchmarkResult]) -> Result<()> {
    std::fs::write(path, render_results_csv(results))
        .with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render the per-run markdown report.
pub fn render_report_md(result: &BenchmarkResult) -> String {
    let mut out = String::new();
    out.push_str("# SDBench Evaluation Report\n\n");
    out.push_str(&format!("- agent: `{}`\n", result.agent_name));
    out.push_str(&format!("- run: `{}`\n", result.run_id));
    out.push_str(&format!("- dataset digest: `{}`\n", result.dataset_digest));
    if result.cancelled {
        out.push_str("- **run cancelled before all cases finished**\n");
    }
    out.push('\n');

    out.push_str("## Overall Performance\n");
    out.push_str(&format!(
        "- diagnostic accuracy: {:.2}% ({}/{} cases, threshold {})\n",
        result.diagnostic_accuracy * 100.0,
        result.correct_cases,
        result.total_cases,
        result.threshold
    ));
    out.push_str(&format!(
        "- accuracy excluding budget-exhausted: {:.2}%\n",
        result.accuracy_excluding_budget_exhausted * 100.0
    ));
    out.push_str(&format!("- average cost: ${:.2}\n", result.average_cost));
    match result.average_score {
        Some(s) => out.push_str(&format!("- average score: {s:.2}\n")),
        None => out.push_str("- average score: n/a\n"),
    }
    let o = &result.outcomes;
    out.push_str(&format!(
        "- outcomes: {} diagnosed, {} budget exhausted, {} agent failed, {} cancelled, {} crashed, {} unscored\n\n",
        o.diagnosed, o.budget_exhausted, o.agent_failed, o.cancelled, o.crashed, o.unscored
    ));

    if !result.encounters.is_empty() {
        out.push_str("## Cases\n");
        out.push_str("| case | diagnosis | score | cost | turns | outcome |\n");
        out.push_str("|---|---|---|---|---|---|\n");
        for e in &result.encounters {
            let diagnosis = e
                .terminal_diagnosis
                .as_deref()
                .or(e.last_stated_diagnosis.as_deref())
                .unwrap_or("-")
                .replace('|', "\\|");
            let score = e
                .judge_score
                .as_ref()
                .map(|s| format!("{} ({})", s.score, s.label))
                .unwrap_or_else(|| "unscored".to_string());
            out.push_str(&format!(
                "| `{}` | {} | {} | ${:.2} | {} | {} |\n",
                e.case_id,
                diagnosis,
                score,
                e.cumulative_cost,
                e.turn_count,
                e.outcome.label()
            ));
        }
    }
    out
}

/// Write report.md.
pub fn write_report_md(path: &Path, result: &BenchmarkResult) -> Result<()> {
    let md = render_report_md(result);
    std::fs::write(path, md).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render a multi-agent comparison.
pub fn render_comparison_md(cmp: &AgentComparison) -> String {
    let mut out = String::new();
    out.push_str("# Agent Comparison\n\n");
    if let Some(p) = &cmp.best_accuracy {
        out.push_str(&format!(
            "- best accuracy: `{}` ({:.2}%)\n",
            p.agent_name,
            p.diagnostic_accuracy * 100.0
        ));
    }
    if let Some(p) = &cmp.lowest_cost {
        out.push_str(&format!(
            "- lowest cost: `{}` (${:.2})\n",
            p.agent_name, p.average_cost
        ));
    }
    if let Some(e) = &cmp.best_efficiency {
        out.push_str(&format!(
            "- best efficiency: `{}` ({:.6} accuracy per dollar)\n",
            e.agent_name, e.accuracy_per_dollar
        ));
    }
    out.push_str(&format!(
        "- accuracy: mean {:.2}%, std {:.2}%\n- cost: mean ${:.2}, std ${:.2}\n\n",
        cmp.accuracy_mean * 100.0,
        cmp.accuracy_std * 100.0,
        cmp.cost_mean,
        cmp.cost_std
    ));
    out.push_str("## Pareto Frontier\n");
    for p in &cmp.pareto_frontier {
        out.push_str(&format!(
            "- `{}`: {:.2}% at ${:.2}\n",
            p.agent_name,
            p.diagnostic_accuracy * 100.0,
            p.average_cost
        ));
    }
    out
}
