//! Clinical case records and JSONL ingestion.

use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::error::{CaseRecordError, Result, SdbenchError};

/// One benchmark case. Immutable once loaded.
///
/// `full_case_text` is only ever read by the gatekeeper; agents see the
/// `initial_abstract` and whatever evidence they earn by asking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFile {
    pub case_id: String,
    pub initial_abstract: String,
    pub full_case_text: String,
    pub ground_truth_diagnosis: String,
    pub publication_year: i32,
    #[serde(default)]
    pub is_test_case: bool,
}

impl CaseFile {
    /// Validate a decoded JSON object and build a case from it.
    pub fn from_value(value: &Value) -> std::result::Result<Self, CaseRecordError> {
        let obj = value.as_object().ok_or_else(|| CaseRecordError::WrongType {
            field: "<record>".to_string(),
            expected: "a JSON object".to_string(),
        })?;

        let text = |field: &str| -> std::result::Result<String, CaseRecordError> {
            match obj.get(field) {
                None | Some(Value::Null) => Err(CaseRecordError::MissingField {
                    field: field.to_string(),
                }),
                Some(Value::String(s)) if s.trim().is_empty() => Err(CaseRecordError::BlankField {
                    field: field.to_string(),
                }),
                Some(Value::String(s)) => Ok(s.clone()),
                Some(_) => Err(CaseRecordError::WrongType {
                    field: field.to_string(),
                    expected: "a string".to_string(),
                }),
            }
        };

        let case_id = text("case_id")?;
        let initial_abstract = text("initial_abstract")?;
        let full_case_text = text("full_case_text")?;
        let ground_truth_diagnosis = text("ground_truth_diagnosis")?;

        let publication_year = match obj.get("publication_year") {
            None | Some(Value::Null) => {
                return Err(CaseRecordError::MissingField {
                    field: "publication_year".to_string(),
                })
            }
            Some(v) => v
                .as_i64()
                .and_then(|y| i32::try_from(y).ok())
                .ok_or_else(|| CaseRecordError::WrongType {
                    field: "publication_year".to_string(),
                    expected: "an integer".to_string(),
                })?,
        };

        let is_test_case = match obj.get("is_test_case") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(CaseRecordError::WrongType {
                    field: "is_test_case".to_string(),
                    expected: "a boolean".to_string(),
                })
            }
        };

        Ok(Self {
            case_id,
            initial_abstract,
            full_case_text,
            ground_truth_diagnosis,
            publication_year,
            is_test_case,
        })
    }
}

/// A record that failed validation during ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// 1-based line number in the source file.
    pub line: usize,
    pub reason: CaseRecordError,
}

impl RejectedRecord {
    pub fn into_error(self) -> SdbenchError {
        SdbenchError::InvalidCaseFile {
            line: self.line,
            reason: self.reason,
        }
    }
}

/// Outcome of loading a case file: accepted cases plus per-record rejections.
#[derive(Debug, Clone, Default)]
pub struct CaseLoadReport {
    pub cases: Vec<CaseFile>,
    pub rejected: Vec<RejectedRecord>,
}

impl CaseLoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Parse JSONL from any buffered reader.
///
/// Blank lines are skipped. A bad record is rejected on its own and does not
/// affect the records around it. Reader errors propagate.
pub fn parse_cases_jsonl<R: BufRead>(reader: R) -> Result<CaseLoadReport> {
    let mut report = CaseLoadReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = serde_json::from_str::<Value>(&line)
            .map_err(|e| CaseRecordError::Malformed(e.to_string()))
            .and_then(|v| CaseFile::from_value(&v));

        match parsed {
            Ok(case) if !seen.insert(case.case_id.clone()) => {
                report.rejected.push(RejectedRecord {
                    line: line_no,
                    reason: CaseRecordError::DuplicateCaseId(case.case_id),
                });
            }
            Ok(case) => report.cases.push(case),
            Err(reason) => {
                tracing::warn!(line = line_no, %reason, "rejected case record");
                report.rejected.push(RejectedRecord {
                    line: line_no,
                    reason,
                });
            }
        }
    }

    Ok(report)
}

/// Load cases from a JSONL file on disk.
pub fn load_cases_jsonl(path: &Path) -> Result<CaseLoadReport> {
    let file = std::fs::File::open(path)?;
    let report = parse_cases_jsonl(std::io::BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        accepted = report.cases.len(),
        rejected = report.rejected.len(),
        "loaded case file"
    );
    Ok(report)
}

/// Subset selection applied after loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseFilter {
    /// Keep only held-out test cases.
    pub test_only: bool,
    /// Keep only cases published in this year or later.
    pub min_publication_year: Option<i32>,
    /// Keep at most this many cases (after the other filters).
    pub limit: Option<usize>,
}

impl CaseFilter {
    pub fn apply(&self, cases: Vec<CaseFile>) -> Vec<CaseFile> {
        let selected = cases
            .into_iter()
            .filter(|c| !self.test_only || c.is_test_case)
            .filter(|c| {
                self.min_publication_year
                    .map_or(true, |y| c.publication_year >= y)
            });
        match self.limit {
            Some(n) => selected.take(n).collect(),
            None => selected.collect(),
        }
    }
}

/// SHA-256 over the ordered case ids, hex encoded.
///
/// Two runs over the same case list share a digest, which makes result files
/// comparable.
pub fn dataset_digest(cases: &[CaseFile]) -> String {
    let mut hasher = Sha256::new();
    for case in cases {
        hasher.update(case.case_id.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
