use serde::{Deserialize, Serialize};

/// Study design, bifurcated by study type.
///
/// The bifurcation is a hard switch: each variant carries only the fields
/// that apply to its type, so a persisted design can never hold the other
/// type's data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "study_type")]
pub enum StudyDesign {
    Interventional(InterventionalDesign),
    Observational(ObservationalDesign),
}

impl StudyDesign {
    #[must_use]
    pub const fn study_type(&self) -> &'static str {
        match self {
            StudyDesign::Interventional(_) => "Interventional",
            StudyDesign::Observational(_) => "Observational",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionalDesign {
    pub allocation: String,
    pub intervention_model: String,
    pub intervention_model_description: String,
    pub primary_purpose: String,
    pub masking: String,
    pub masking_description: String,
    pub who_masked: Vec<String>,
    pub phases: Vec<String>,
    pub enrollment_count: u64,
    pub enrollment_type: String,
    pub number_of_arms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationalDesign {
    pub patient_registry: bool,
    pub observational_models: Vec<String>,
    pub time_perspectives: Vec<String>,
    pub bio_spec_retention: String,
    pub bio_spec_description: String,
    pub target_duration: Option<TargetDuration>,
    pub enrollment_count: u64,
    pub enrollment_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetDuration {
    pub value: u64,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_tags_by_study_type() {
        let design = StudyDesign::Interventional(InterventionalDesign {
            allocation: "Randomized".into(),
            ..InterventionalDesign::default()
        });
        let json = serde_json::to_string(&design).expect("serialize design");
        assert!(json.contains(r#""study_type":"Interventional""#));
        assert!(json.contains(r#""allocation":"Randomized""#));
        let back: StudyDesign = serde_json::from_str(&json).expect("parse design");
        assert_eq!(back, design);
    }

    #[test]
    fn observational_variant_round_trips() {
        let design = StudyDesign::Observational(ObservationalDesign {
            patient_registry: true,
            observational_models: vec!["Cohort".into()],
            time_perspectives: vec!["Prospective".into()],
            bio_spec_retention: "Samples With DNA".into(),
            target_duration: Some(TargetDuration {
                value: 24,
                unit: "Months".into(),
            }),
            ..ObservationalDesign::default()
        });
        let json = serde_json::to_string(&design).expect("serialize design");
        let back: StudyDesign = serde_json::from_str(&json).expect("parse design");
        assert_eq!(back, design);
        assert_eq!(back.study_type(), "Observational");
    }
}
