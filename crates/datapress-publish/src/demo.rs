use datapress_model::{
    AccessTerms, ContainerId, DatasetDraft, DatasetId, Eligibility, ExternalIdentifier, Funder,
    HealthsheetSections, ObservationalDesign, Oversight, Person, RightsStatement,
    SponsorCollaborators, StudyDesign, StudyIdentification, StudyIdentifier, StudyMetadata,
    StudyNarrative, StudyStatus, UserId,
};

/// A complete, validation-clean draft for local smoke runs and seeding.
#[must_use]
pub fn demo_draft(dataset: &DatasetId, container: &ContainerId, member: &UserId) -> DatasetDraft {
    let design = ObservationalDesign {
        patient_registry: false,
        observational_models: vec!["Cohort".to_string()],
        time_perspectives: vec!["Prospective".to_string()],
        bio_spec_retention: "None Retained".to_string(),
        bio_spec_description: String::new(),
        target_duration: None,
        enrollment_count: 240,
        enrollment_type: "Actual".to_string(),
    };
    DatasetDraft {
        id: dataset.clone(),
        canonical_id: format!("canonical-{dataset}"),
        container_id: container.clone(),
        title: "Retinal Fundus Photographs in Early Diabetic Retinopathy".to_string(),
        description: "Color fundus photographs and grading labels collected from adults \
                      screened for early-stage diabetic retinopathy across two clinics."
            .to_string(),
        version_title: "Version 1.0".to_string(),
        changelog: "# Changelog\n\n## 1.0\n\n- Initial release with 240 participant records.\n"
            .to_string(),
        readme: "# Retinal Fundus Photographs\n\nImages are organized per participant; see \
                 `participants.csv` for the grading key.\n"
            .to_string(),
        members: vec![member.clone()],
        access: AccessTerms {
            access_type: "open".to_string(),
            description: "Available to all signed-in researchers.".to_string(),
            url: String::new(),
        },
        rights: vec![RightsStatement {
            statement: "Creative Commons Attribution 4.0 International".to_string(),
            uri: "https://creativecommons.org/licenses/by/4.0/".to_string(),
            identifier: "CC-BY-4.0".to_string(),
            identifier_scheme: "SPDX".to_string(),
        }],
        creators: vec![Person {
            name: "Amara Okafor".to_string(),
            name_type: "Personal".to_string(),
            affiliations: vec!["Lakeside Eye Institute".to_string()],
            identifiers: vec![ExternalIdentifier {
                value: "0000-0002-1825-0097".to_string(),
                scheme: "ORCID".to_string(),
                scheme_uri: "https://orcid.org".to_string(),
            }],
            role: String::new(),
        }],
        contributors: vec![Person {
            name: "Priya Raman".to_string(),
            name_type: "Personal".to_string(),
            affiliations: vec!["Lakeside Eye Institute".to_string()],
            identifiers: Vec::new(),
            role: "DataCurator".to_string(),
        }],
        funders: vec![Funder {
            name: "National Eye Health Fund".to_string(),
            identifier: String::new(),
            identifier_scheme: String::new(),
            award_number: "NEHF-2023-114".to_string(),
            award_title: "Community retinopathy screening".to_string(),
        }],
        secondary_identifiers: Vec::new(),
        study: StudyMetadata {
            identification: StudyIdentification {
                primary: StudyIdentifier {
                    value: "LEI-DR-2023".to_string(),
                    identifier_type: "Registry Identifier".to_string(),
                    domain: "Lakeside Eye Institute".to_string(),
                    link: String::new(),
                },
                secondary: Vec::new(),
            },
            status: StudyStatus {
                overall_status: "Completed".to_string(),
                why_stopped: String::new(),
                start_date: "2023-02".to_string(),
                start_date_type: "Actual".to_string(),
                completion_date: "2024-05".to_string(),
                completion_date_type: "Actual".to_string(),
            },
            sponsors: SponsorCollaborators {
                responsible_party_type: "Principal Investigator".to_string(),
                responsible_party_name: "Amara Okafor".to_string(),
                lead_sponsor_name: "Lakeside Eye Institute".to_string(),
                collaborators: Vec::new(),
            },
            oversight: Oversight {
                has_dmc: Some(false),
                fda_regulated_drug: Some(false),
                fda_regulated_device: Some(false),
                human_subject_review_status: "Approved".to_string(),
            },
            description: StudyNarrative {
                brief_summary: "Prospective cohort documenting retinal changes during routine \
                                screening for diabetic retinopathy."
                    .to_string(),
                detailed_description: String::new(),
            },
            design: Some(StudyDesign::Observational(design)),
            arms: Vec::new(),
            interventions: Vec::new(),
            conditions: vec!["Diabetic Retinopathy".to_string()],
            keywords: vec!["retina".to_string(), "fundus photography".to_string()],
            eligibility: Eligibility {
                sex: "All".to_string(),
                minimum_age: "18 Years".to_string(),
                maximum_age: String::new(),
                healthy_volunteers: Some(false),
                criteria: "Adults with a diabetes diagnosis attending screening.".to_string(),
            },
            central_contacts: Vec::new(),
            overall_officials: Vec::new(),
            locations: Vec::new(),
        },
        healthsheet: HealthsheetSections {
            motivation: r#"{"version":1,"records":[{"id":1,"question":"For what purpose was the dataset created?","response":"To support automated grading research for early diabetic retinopathy."}]}"#.to_string(),
            composition: r#"{"version":1,"records":[{"id":1,"question":"What do the instances represent?","response":"One macula-centered fundus photograph per participant visit."}]}"#.to_string(),
            collection: String::new(),
            preprocessing: r#"{"version":1,"records":[{"id":1,"question":"Was any de-identification performed?","response":"All DICOM headers were stripped and filenames re-keyed."}]}"#.to_string(),
            uses: String::new(),
            distribution: String::new(),
            maintenance: String::new(),
        },
        publication_status: "draft".to_string(),
        published_id: None,
        published_identifier: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{BaselineValidator, MetadataFacet, MetadataValidator};

    #[tokio::test]
    async fn demo_draft_clears_both_validation_facets() {
        let dataset = DatasetId::parse("ds-demo").expect("id");
        let container = ContainerId::parse("draft-demo").expect("id");
        let member = UserId::parse("demo-user").expect("id");
        let draft = demo_draft(&dataset, &container, &member);
        assert!(draft.has_member(&member));

        let validator = BaselineValidator::default();
        let dataset_report = validator.validate(MetadataFacet::Dataset, &draft).await;
        assert!(dataset_report.is_pass(), "{:?}", dataset_report.field_errors());
        let study_report = validator.validate(MetadataFacet::Study, &draft).await;
        assert!(study_report.is_pass(), "{:?}", study_report.field_errors());
    }
}
