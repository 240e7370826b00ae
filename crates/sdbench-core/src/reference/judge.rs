//! Lexical-overlap judge.

use async_trait::async_trait;

use super::text::keywords;
use crate::ports::{ExternalCallError, Judge, JudgeVerdict};

/// Scores by content-word overlap between candidate and ground truth.
///
/// | condition                                   | score |
/// |---------------------------------------------|-------|
/// | every ground-truth word present, precision ≥ 0.5 | 5 |
/// | F1 ≥ 0.6                                    | 4     |
/// | F1 ≥ 0.3                                    | 3     |
/// | any overlap                                 | 2     |
/// | none                                        | 1     |
#[derive(Debug, Clone, Default)]
pub struct LexicalJudge;

impl LexicalJudge {
    pub fn verdict(&self, candidate: &str, ground_truth: &str) -> JudgeVerdict {
        let cand = keywords(candidate);
        let truth = keywords(ground_truth);
        let overlap = cand.intersection(&truth).count() as f64;

        if cand.is_empty() || truth.is_empty() || overlap == 0.0 {
            return JudgeVerdict {
                score: 1,
                rationale: Some("no overlap with the reference diagnosis".to_string()),
            };
        }

        let precision = overlap / cand.len() as f64;
        let recall = overlap / truth.len() as f64;
        let f1 = 2.0 * precision * recall / (precision + recall);

        let score = if recall >= 1.0 && precision >= 0.5 {
            5
        } else if f1 >= 0.6 {
            4
        } else if f1 >= 0.3 {
            3
        } else {
            2
        };

        JudgeVerdict {
            score,
            rationale: Some(format!(
                "precision {precision:.2}, recall {recall:.2}, f1 {f1:.2}"
            )),
        }
    }
}

#[async_trait]
impl Judge for LexicalJudge {
    async fn score(
        &self,
        candidate: &str,
        ground_truth: &str,
    ) -> Result<JudgeVerdict, ExternalCallError> {
        Ok(self.verdict(candidate, ground_truth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_scores_five() {
        let j = LexicalJudge;
        assert_eq!(j.verdict("Sarcoidosis", "sarcoidosis").score, 5);
        assert_eq!(
            j.verdict("Pulmonary sarcoidosis", "Sarcoidosis").score,
            5
        );
    }

    #[test]
    fn test_partial_overlap() {
        let j = LexicalJudge;
        // recall 1/2, precision 1/1 -> f1 0.67
        assert_eq!(j.verdict("Lymphoma", "Hodgkin lymphoma").score, 4);
        // recall 1/5, precision 1/3 -> f1 0.25
        assert_eq!(
            j.verdict("Acute renal failure", "Diffuse large B-cell lymphoma renal").score,
            2
        );
    }

    #[test]
    fn test_no_overlap_scores_one() {
        let j = LexicalJudge;
        let v = j.verdict("I cannot determine the diagnosis", "Brucellosis");
        assert_eq!(v.score, 1);
    }
}
