//! Rule-based work-up agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AgentAction, TurnRecord};
use crate::ports::{DiagnosticAgent, ExternalCallError};

pub const NO_DEFINITIVE_DIAGNOSIS: &str =
    "Based on available information, I cannot make a definitive diagnosis.";

/// A finding that settles the diagnosis when it shows up in evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisRule {
    /// Matched case-insensitively against evidence text.
    pub finding: String,
    pub diagnosis: String,
}

impl DiagnosisRule {
    pub fn new(finding: &str, diagnosis: &str) -> Self {
        Self {
            finding: finding.to_lowercase(),
            diagnosis: diagnosis.to_string(),
        }
    }
}

/// Findings checked in order; put the more specific phrase first when one
/// contains another.
pub fn default_rules() -> Vec<DiagnosisRule> {
    [
        ("non-caseating granuloma", "Sarcoidosis"),
        ("noncaseating granuloma", "Sarcoidosis"),
        ("caseating granuloma", "Tuberculosis"),
        ("acid-fast bacilli", "Tuberculosis"),
        ("reed-sternberg", "Hodgkin lymphoma"),
        ("schistocytes", "Thrombotic thrombocytopenic purpura"),
        ("anti-dsdna", "Systemic lupus erythematosus"),
        ("kayser-fleischer", "Wilson disease"),
        ("auer rods", "Acute myeloid leukemia"),
        ("anti-gbm", "Goodpasture syndrome"),
        ("owl's eye", "Cytomegalovirus infection"),
        ("ring-enhancing", "Cerebral toxoplasmosis"),
        ("st-segment elevation", "Acute myocardial infarction"),
        ("brucella", "Brucellosis"),
    ]
    .into_iter()
    .map(|(finding, diagnosis)| DiagnosisRule::new(finding, diagnosis))
    .collect()
}

/// Standard history, exam and first-line test sequence.
pub fn default_protocol() -> Vec<AgentAction> {
    vec![
        AgentAction::ask("What are the presenting symptoms and their duration?"),
        AgentAction::ask("What is the past medical history and current medication list?"),
        AgentAction::ask("Are there any recent exposures or travel?"),
        AgentAction::ask("What are the vital signs and physical examination findings?"),
        AgentAction::order("Complete blood count with differential"),
        AgentAction::order("Comprehensive metabolic panel"),
        AgentAction::order("Chest X-ray"),
        AgentAction::order("Urinalysis"),
        AgentAction::order("Biopsy of the most accessible lesion"),
    ]
}

/// History-heavy work-up: eight questions before five basic tests.
pub fn conservative_protocol() -> Vec<AgentAction> {
    vec![
        AgentAction::ask("What is the patient's detailed medical history?"),
        AgentAction::ask("What are the symptoms and how have they progressed?"),
        AgentAction::ask("What medications and allergies does the patient have?"),
        AgentAction::ask("What are the vital signs?"),
        AgentAction::ask("What are the physical examination findings?"),
        AgentAction::ask("Are there any recent exposures or travel?"),
        AgentAction::ask("What is the patient's family history?"),
        AgentAction::ask("Are there any associated symptoms or triggers?"),
        AgentAction::order("Complete blood count with differential"),
        AgentAction::order("Comprehensive metabolic panel"),
        AgentAction::order("Chest X-ray"),
        AgentAction::order("Basic metabolic panel"),
        AgentAction::order("Urinalysis"),
    ]
}

/// Test-first work-up: no questions, broad imaging early.
pub fn aggressive_protocol() -> Vec<AgentAction> {
    vec![
        AgentAction::order("Complete blood count with differential"),
        AgentAction::order("Comprehensive metabolic panel"),
        AgentAction::order("Chest X-ray"),
        AgentAction::order("CT of the chest with contrast"),
        AgentAction::order("Blood cultures"),
        AgentAction::order("Urinalysis"),
        AgentAction::order("Electrocardiogram"),
        AgentAction::order("Echocardiogram"),
        AgentAction::order("Liver function tests"),
        AgentAction::order("Thyroid function tests"),
        AgentAction::order("CT of the abdomen with contrast"),
    ]
}

/// Walks a fixed protocol and diagnoses as soon as evidence contains a
/// rule finding.
#[derive(Debug, Clone)]
pub struct ProtocolAgent {
    name: String,
    protocol: Vec<AgentAction>,
    rules: Vec<DiagnosisRule>,
}

impl Default for ProtocolAgent {
    fn default() -> Self {
        Self::new(default_protocol(), default_rules())
    }
}

impl ProtocolAgent {
    pub fn new(protocol: Vec<AgentAction>, rules: Vec<DiagnosisRule>) -> Self {
        Self {
            name: "protocol".to_string(),
            protocol,
            rules,
        }
    }

    pub fn conservative() -> Self {
        Self::new(conservative_protocol(), default_rules()).with_name("conservative")
    }

    pub fn aggressive() -> Self {
        Self::new(aggressive_protocol(), default_rules()).with_name("aggressive")
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn matching_rule(&self, history: &[TurnRecord]) -> Option<&DiagnosisRule> {
        let evidence: String = history
            .iter()
            .filter_map(|t| t.response.text())
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("\n");
        self.rules.iter().find(|r| evidence.contains(&r.finding))
    }
}

#[async_trait]
impl DiagnosticAgent for ProtocolAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_action(
        &self,
        _initial_abstract: &str,
        history: &[TurnRecord],
    ) -> Result<AgentAction, ExternalCallError> {
        if let Some(rule) = self.matching_rule(history) {
            return Ok(AgentAction::diagnose(rule.diagnosis.clone()));
        }
        Ok(self
            .protocol
            .get(history.len())
            .cloned()
            .unwrap_or_else(|| AgentAction::diagnose(NO_DEFINITIVE_DIAGNOSIS)))
    }

    // Stateless between calls; everything is derived from the history.
    fn reset(&mut self) {}
}
