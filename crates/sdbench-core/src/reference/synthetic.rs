//! Built-in demo cases for smoke runs without a case file.

use crate::domain::CaseFile;

struct Seed {
    case_id: &'static str,
    initial_abstract: &'static str,
    full_case_text: &'static str,
    ground_truth_diagnosis: &'static str,
}

const SEEDS: &[Seed] = &[
    Seed {
        case_id: "SYNTH_001",
        initial_abstract: "A 34-year-old woman has six weeks of progressive dyspnea, dry cough \
            and fatigue, with weight loss and night sweats. Examination shows bilateral \
            cervical lymphadenopathy and reduced breath sounds at the right base.",
        full_case_text: "The patient was well until six weeks before admission, when exertional \
            dyspnea began and slowly worsened. She had a dry cough, worse at night, and lost \
            ten pounds over a month. Two months before the symptoms began she cleaned a \
            basement containing bird droppings. She had no recent travel. Her medical history \
            was notable only for mild asthma treated with an albuterol inhaler. She had no \
            known allergies and did not smoke. Her family history was unremarkable. \
            Temperature was 37.2 C, blood pressure 110/70, pulse 95 and oxygen saturation 94% \
            on room air. Firm nontender cervical nodes up to 2 cm were palpable. \
            Complete blood count showed hemoglobin 10.2 and white-cell count 12,400 with \
            neutrophil predominance. The metabolic panel was normal apart from albumin 3.1. \
            Chest X-ray showed bilateral hilar adenopathy and a small right pleural effusion. \
            CT of the chest with contrast showed mediastinal and hilar lymphadenopathy up to 3 cm. \
            Tuberculin skin test was negative. Histoplasma complement fixation titer was 1:32 \
            with H and M bands on immunodiffusion. Mediastinal lymph node biopsy showed \
            noncaseating granulomas with giant cells; fungal stains and cultures were negative. \
            She improved on itraconazole.",
        ground_truth_diagnosis: "Chronic pulmonary histoplasmosis with mediastinal lymphadenopathy",
    },
    Seed {
        case_id: "SYNTH_002",
        initial_abstract: "A 28-year-old woman has two weeks of fatigue, jaundice and dark \
            urine. Examination shows scleral icterus, pallor and mild splenomegaly.",
        full_case_text: "The patient was well until two weeks before admission, when she noticed \
            progressive fatigue, yellow eyes and dark brown urine. She took no medications and \
            had no known drug allergies. She had no recent travel or sick contacts. There was no \
            family history of blood disorders. Temperature was 36.8 C, blood pressure 105/65 and \
            pulse 88. Physical examination showed scleral icterus, a soft systolic murmur and a \
            spleen tip 2 cm below the costal margin. Complete blood count showed hemoglobin 7.8, \
            normal platelets and a reticulocyte count of 12%. The peripheral smear showed \
            spherocytes and polychromasia. Total bilirubin was 4.2 with direct bilirubin 0.8, \
            lactate dehydrogenase 450 and haptoglobin undetectable. Liver function tests were \
            otherwise normal. Direct antiglobulin test was positive for IgG and C3d. \
            Antinuclear antibody and viral serologies were negative. Urinalysis showed \
            urobilinogen without hematuria. She responded to prednisone.",
        ground_truth_diagnosis: "Autoimmune hemolytic anemia (warm type)",
    },
    Seed {
        case_id: "SYNTH_003",
        initial_abstract: "A 45-year-old man has episodic severe headaches, palpitations and \
            sweating lasting 10 to 15 minutes, two or three times a week. He is hypertensive \
            and tachycardic during an episode.",
        full_case_text: "Three months before presentation the patient began having spells of \
            pounding headache with palpitations and profuse sweating, often triggered by stress \
            or exertion. He had mild hypertension treated with lisinopril. He had no known drug \
            allergies and no family history of endocrine disease. He had no recent travel. \
            During an episode blood pressure was 180/110 and pulse 110; he was anxious and \
            diaphoretic. The physical examination was otherwise normal. Complete blood count \
            was normal. Serum glucose was 110 on the metabolic panel. Thyroid function tests \
            were normal. Electrocardiogram showed sinus tachycardia. Plasma normetanephrine was \
            2.1 nmol per liter and 24-hour urine metanephrines were markedly elevated. \
            CT of the abdomen with contrast showed a 4.5 cm heterogeneous left adrenal mass. \
            After alpha blockade with phenoxybenzamine he underwent laparoscopic adrenalectomy; \
            the specimen stained for chromogranin A.",
        ground_truth_diagnosis: "Pheochromocytoma of the left adrenal gland",
    },
];

/// Three held-out demo cases with short case texts.
pub fn synthetic_cases() -> Vec<CaseFile> {
    SEEDS
        .iter()
        .map(|s| CaseFile {
            case_id: s.case_id.to_string(),
            initial_abstract: s.initial_abstract.to_string(),
            full_case_text: s.full_case_text.to_string(),
            ground_truth_diagnosis: s.ground_truth_diagnosis.to_string(),
            publication_year: 2024,
            is_test_case: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_synthetic_cases_are_well_formed() {
        let cases = synthetic_cases();
        assert_eq!(cases.len(), 3);
        let ids: HashSet<&str> = cases.iter().map(|c| c.case_id.as_str()).collect();
        assert_eq!(ids.len(), cases.len());
        for c in &cases {
            assert!(c.is_test_case);
            assert!(!c.initial_abstract.trim().is_empty());
            assert!(!c.ground_truth_diagnosis.trim().is_empty());
            assert!(c.full_case_text.len() > c.initial_abstract.len());
        }
    }

    #[test]
    fn test_synthetic_cases_round_trip_through_loader() {
        let cases = synthetic_cases();
        let jsonl: String = cases
            .iter()
            .map(|c| serde_json::to_string(c).unwrap() + "\n")
            .collect();
        let report = crate::domain::parse_cases_jsonl(jsonl.as_bytes()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.cases, cases);
    }
}
