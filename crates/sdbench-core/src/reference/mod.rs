//! Offline, deterministic collaborators so a benchmark can run end to end
//! without model access, plus a few built-in demo cases.

pub mod cost;
pub mod gatekeeper;
pub mod judge;
pub mod synthetic;
pub mod text;

pub use cost::{CptCostModel, CptEntry, DEFAULT_TEST_COST};
pub use gatekeeper::KeywordGatekeeper;
pub use judge::LexicalJudge;
pub use synthetic::synthetic_cases;

use std::sync::Arc;

use crate::encounter::EncounterServices;

/// Keyword gatekeeper, lexical judge and CPT cost model bundled together.
pub fn reference_services() -> EncounterServices {
    EncounterServices::new(
        Arc::new(KeywordGatekeeper::default()),
        Arc::new(LexicalJudge),
        Arc::new(CptCostModel::default()),
    )
}
