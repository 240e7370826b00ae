//! CPT-table cost model.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::AgentAction;
use crate::ports::{CostModel, ExternalCallError};

/// Price charged when no table entry matches a test order.
pub const DEFAULT_TEST_COST: f64 = 100.0;

/// One priced CPT code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CptEntry {
    pub code: &'static str,
    pub description: &'static str,
    pub price: f64,
    /// At least one of these must appear in the order.
    any_of: &'static [&'static str],
    /// Every one of these must appear in the order.
    all_of: &'static [&'static str],
}

const CT: &[&str] = &["ct ", "ct-", "computed tomography", "cat scan"];
const MRI: &[&str] = &["mri", "magnetic resonance"];
const XRAY: &[&str] = &["x-ray", "xray", "radiograph", "film"];

macro_rules! cpt {
    ($code:expr, $desc:expr, $price:expr, any = $any:expr, all = $all:expr) => {
        CptEntry {
            code: $code,
            description: $desc,
            price: $price,
            any_of: $any,
            all_of: $all,
        }
    };
}

/// Most specific entries first; the first match wins.
static CPT_TABLE: &[CptEntry] = &[
    // Laboratory
    cpt!("80053", "Comprehensive metabolic panel", 25.0, any = &["comprehensive metabolic", "cmp"], all = &[]),
    cpt!("85025", "Complete blood count with differential", 15.0, any = &["complete blood count", "cbc", "blood count"], all = &[]),
    cpt!("80061", "Lipid panel", 20.0, any = &["lipid"], all = &[]),
    cpt!("80069", "Renal function panel", 30.0, any = &["renal function", "kidney function", "renal panel"], all = &[]),
    cpt!("80074", "Hepatic function panel", 35.0, any = &["hepatic function", "liver function", "lfts"], all = &[]),
    cpt!("80076", "Thyroid function panel", 40.0, any = &["thyroid", "tsh"], all = &[]),
    cpt!("80081", "Coagulation panel", 45.0, any = &["coagulation", "pt/inr", "ptt"], all = &[]),
    cpt!("80090", "Urinalysis complete", 50.0, any = &["urinalysis"], all = &[]),
    // Imaging
    cpt!("70460", "CT head with contrast", 250.0, any = CT, all = &["head", "with contrast"]),
    cpt!("70450", "CT head without contrast", 200.0, any = CT, all = &["head"]),
    cpt!("71260", "CT chest with contrast", 350.0, any = CT, all = &["chest", "with contrast"]),
    cpt!("71250", "CT chest without contrast", 300.0, any = CT, all = &["chest"]),
    cpt!("74160", "CT abdomen with contrast", 450.0, any = CT, all = &["abdom", "with contrast"]),
    cpt!("74150", "CT abdomen without contrast", 400.0, any = CT, all = &["abdom"]),
    cpt!("72142", "MRI lumbar spine with contrast", 550.0, any = MRI, all = &["lumbar", "with contrast"]),
    cpt!("72141", "MRI lumbar spine without contrast", 500.0, any = MRI, all = &["lumbar"]),
    cpt!("73020", "X-ray chest", 200.0, any = XRAY, all = &["chest"]),
    cpt!("73060", "X-ray knee", 150.0, any = XRAY, all = &["knee"]),
    cpt!("73090", "X-ray hand", 140.0, any = XRAY, all = &["hand"]),
    // Procedures
    cpt!("36415", "Venipuncture", 25.0, any = &["venipuncture", "blood culture", "blood draw"], all = &[]),
    cpt!("10021", "Fine needle aspiration biopsy", 200.0, any = &["fine needle", "fna"], all = &[]),
    cpt!("10022", "Core needle biopsy", 250.0, any = &["core needle"], all = &[]),
    cpt!("10024", "Excisional biopsy", 350.0, any = &["excisional"], all = &["biopsy"]),
    cpt!("10025", "Punch biopsy", 400.0, any = &["punch"], all = &["biopsy"]),
    cpt!("10031", "Bronchoscopic biopsy", 700.0, any = &["bronchoscop"], all = &[]),
    cpt!("10023", "Incisional biopsy", 300.0, any = &["biopsy"], all = &[]),
];

impl CptEntry {
    fn matches(&self, order: &str) -> bool {
        self.any_of.iter().any(|k| order.contains(k)) && self.all_of.iter().all(|k| order.contains(k))
    }
}

/// Prices test orders from a fixed CPT table with a flat fallback.
#[derive(Debug, Clone)]
pub struct CptCostModel {
    default_cost: f64,
}

impl Default for CptCostModel {
    fn default() -> Self {
        Self {
            default_cost: DEFAULT_TEST_COST,
        }
    }
}

impl CptCostModel {
    pub fn with_default_cost(default_cost: f64) -> Self {
        Self { default_cost }
    }

    /// First table entry matching a test order, if any.
    pub fn lookup(&self, order: &str) -> Option<&'static CptEntry> {
        // Padding lets "ct " match at the end of the order text too.
        let normalized = format!("{} ", order.to_lowercase());
        CPT_TABLE.iter().find(|e| e.matches(&normalized))
    }

    pub fn price(&self, action: &AgentAction) -> f64 {
        match action {
            AgentAction::OrderTest { content } => self
                .lookup(content)
                .map_or(self.default_cost, |entry| entry.price),
            _ => 0.0,
        }
    }
}

#[async_trait]
impl CostModel for CptCostModel {
    async fn estimate(&self, action: &AgentAction) -> Result<f64, ExternalCallError> {
        Ok(self.price(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lab_lookup() {
        let m = CptCostModel::default();
        assert_eq!(m.lookup("Complete Blood Count").map(|e| e.code), Some("85025"));
        assert_eq!(m.price(&AgentAction::order("CBC with diff")), 15.0);
        assert_eq!(m.price(&AgentAction::order("Liver function tests")), 35.0);
    }

    #[test]
    fn test_contrast_variants() {
        let m = CptCostModel::default();
        assert_eq!(m.price(&AgentAction::order("CT chest with contrast")), 350.0);
        assert_eq!(m.price(&AgentAction::order("CT chest without contrast")), 300.0);
        assert_eq!(m.price(&AgentAction::order("Abdominal CT")), 400.0);
    }

    #[test]
    fn test_fallback_and_non_tests() {
        let m = CptCostModel::default();
        assert_eq!(m.price(&AgentAction::order("Serum ACE level")), DEFAULT_TEST_COST);
        assert_eq!(m.price(&AgentAction::ask("Any fevers?")), 0.0);
        assert_eq!(
            CptCostModel::with_default_cost(75.0).price(&AgentAction::order("Something rare")),
            75.0
        );
    }

    #[test]
    fn test_biopsy_specificity() {
        let m = CptCostModel::default();
        assert_eq!(m.lookup("Excisional lymph node biopsy").map(|e| e.code), Some("10024"));
        assert_eq!(m.lookup("Skin biopsy").map(|e| e.code), Some("10023"));
    }
}
