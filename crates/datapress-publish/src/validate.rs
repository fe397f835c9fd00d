//! Metadata validation seam. Validation is an external concern: the
//! pipeline only needs a pass/fail verdict with per-field messages, so
//! the trait is deliberately narrow and a validator never errors, it
//! reports.

use async_trait::async_trait;
use datapress_model::{DatasetDraft, StudyDesign};
use std::collections::BTreeMap;
use std::fmt;

/// Which of the two metadata groupings a validation stage covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataFacet {
    Dataset,
    Study,
}

impl MetadataFacet {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MetadataFacet::Dataset => "dataset",
            MetadataFacet::Study => "study",
        }
    }
}

impl fmt::Display for MetadataFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of one validation call. Empty field errors mean pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationReport {
    #[must_use]
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.field_errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.field_errors.is_empty()
    }

    #[must_use]
    pub fn field_errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.field_errors
    }

    #[must_use]
    pub fn into_field_errors(self) -> BTreeMap<String, Vec<String>> {
        self.field_errors
    }
}

#[async_trait]
pub trait MetadataValidator: Send + Sync {
    async fn validate(&self, facet: MetadataFacet, draft: &DatasetDraft) -> ValidationReport;
}

/// Structural rules every deployment shares. Deployments with an external
/// validation service put it behind the same trait.
#[derive(Clone, Copy, Debug, Default)]
pub struct BaselineValidator;

#[async_trait]
impl MetadataValidator for BaselineValidator {
    async fn validate(&self, facet: MetadataFacet, draft: &DatasetDraft) -> ValidationReport {
        match facet {
            MetadataFacet::Dataset => dataset_rules(draft),
            MetadataFacet::Study => study_rules(draft),
        }
    }
}

fn require(report: &mut ValidationReport, field: &str, value: &str) {
    if value.trim().is_empty() {
        report.reject(field, "must not be empty");
    }
}

fn dataset_rules(draft: &DatasetDraft) -> ValidationReport {
    let mut report = ValidationReport::pass();
    require(&mut report, "title", &draft.title);
    require(&mut report, "description", &draft.description);
    require(&mut report, "version_title", &draft.version_title);
    require(&mut report, "changelog", &draft.changelog);
    require(&mut report, "readme", &draft.readme);
    if draft.creators.is_empty() {
        report.reject("creators", "at least one creator is required");
    }
    for (i, person) in draft.creators.iter().enumerate() {
        if person.name.trim().is_empty() {
            report.reject(&format!("creators[{i}].name"), "must not be empty");
        }
    }
    report
}

fn study_rules(draft: &DatasetDraft) -> ValidationReport {
    let mut report = ValidationReport::pass();
    let study = &draft.study;
    require(
        &mut report,
        "study.identification.primary.value",
        &study.identification.primary.value,
    );
    require(
        &mut report,
        "study.status.overall_status",
        &study.status.overall_status,
    );
    require(
        &mut report,
        "study.sponsors.lead_sponsor_name",
        &study.sponsors.lead_sponsor_name,
    );
    require(&mut report, "study.eligibility.sex", &study.eligibility.sex);
    match &study.design {
        None => report.reject("study.design", "a study design must be chosen"),
        Some(StudyDesign::Interventional(d)) => {
            require(&mut report, "study.design.allocation", &d.allocation);
            require(
                &mut report,
                "study.design.intervention_model",
                &d.intervention_model,
            );
            require(&mut report, "study.design.primary_purpose", &d.primary_purpose);
            require(&mut report, "study.design.masking", &d.masking);
        }
        Some(StudyDesign::Observational(d)) => {
            if d.observational_models.is_empty() {
                report.reject(
                    "study.design.observational_models",
                    "at least one model is required",
                );
            }
            if d.time_perspectives.is_empty() {
                report.reject(
                    "study.design.time_perspectives",
                    "at least one time perspective is required",
                );
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapress_model::{InterventionalDesign, ObservationalDesign};

    fn bare_draft() -> DatasetDraft {
        serde_json::from_value(serde_json::json!({
            "id": "ds-1",
            "canonical_id": "can-1",
            "container_id": "draft-ds-1",
            "title": "Study"
        }))
        .expect("draft fixture")
    }

    #[tokio::test]
    async fn bare_draft_fails_dataset_rules_with_field_paths() {
        let report = BaselineValidator
            .validate(MetadataFacet::Dataset, &bare_draft())
            .await;
        assert!(!report.is_pass());
        let fields: Vec<&str> = report.field_errors().keys().map(String::as_str).collect();
        assert!(fields.contains(&"description"));
        assert!(fields.contains(&"creators"));
        assert!(!fields.contains(&"title"));
    }

    #[tokio::test]
    async fn missing_design_is_a_study_error() {
        let report = BaselineValidator
            .validate(MetadataFacet::Study, &bare_draft())
            .await;
        assert!(report.field_errors().contains_key("study.design"));
    }

    #[tokio::test]
    async fn interventional_rules_do_not_apply_to_observational() {
        let mut draft = bare_draft();
        draft.study.design = Some(StudyDesign::Observational(ObservationalDesign {
            observational_models: vec!["Cohort".into()],
            time_perspectives: vec!["Prospective".into()],
            ..ObservationalDesign::default()
        }));
        let report = BaselineValidator.validate(MetadataFacet::Study, &draft).await;
        assert!(!report.field_errors().contains_key("study.design.allocation"));
        assert!(!report
            .field_errors()
            .contains_key("study.design.observational_models"));
    }

    #[tokio::test]
    async fn interventional_design_needs_its_core_fields() {
        let mut draft = bare_draft();
        draft.study.design = Some(StudyDesign::Interventional(InterventionalDesign {
            allocation: "Randomized".into(),
            ..InterventionalDesign::default()
        }));
        let report = BaselineValidator.validate(MetadataFacet::Study, &draft).await;
        assert!(!report.field_errors().contains_key("study.design.allocation"));
        assert!(report
            .field_errors()
            .contains_key("study.design.intervention_model"));
        assert!(report.field_errors().contains_key("study.design.masking"));
    }

    #[test]
    fn reports_accumulate_multiple_errors_per_field() {
        let mut report = ValidationReport::pass();
        report.reject("title", "must not be empty");
        report.reject("title", "must be shorter than 500 characters");
        assert_eq!(report.field_errors()["title"].len(), 2);
    }
}
