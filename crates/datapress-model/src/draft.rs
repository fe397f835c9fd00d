// SPDX-License-Identifier: Apache-2.0
use crate::design::StudyDesign;
use crate::healthsheet::HealthsheetSections;
use crate::ids::{ContainerId, DatasetId, UserId};
use serde::{Deserialize, Serialize};

/// The draft dataset aggregate as the pipeline reads it.
///
/// Drafts are created and mutated by the editing surface outside this
/// workspace. The pipeline treats a draft as read-only input and stamps it
/// exactly once, at the end of a successful attempt, with the published row
/// id and final identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetDraft {
    pub id: DatasetId,
    /// Shared by every published version of the same logical dataset.
    pub canonical_id: String,
    /// Draft-namespace container holding the uploaded files.
    pub container_id: ContainerId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version_title: String,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub readme: String,
    #[serde(default)]
    pub members: Vec<UserId>,
    #[serde(default)]
    pub access: AccessTerms,
    #[serde(default)]
    pub rights: Vec<RightsStatement>,
    #[serde(default)]
    pub creators: Vec<Person>,
    #[serde(default)]
    pub contributors: Vec<Person>,
    #[serde(default)]
    pub funders: Vec<Funder>,
    #[serde(default)]
    pub secondary_identifiers: Vec<SecondaryIdentifier>,
    #[serde(default)]
    pub study: StudyMetadata,
    #[serde(default)]
    pub healthsheet: HealthsheetSections,
    #[serde(default)]
    pub publication_status: String,
    #[serde(default)]
    pub published_id: Option<i64>,
    #[serde(default)]
    pub published_identifier: String,
}

impl DatasetDraft {
    /// Membership check applied by the repository fetch path.
    #[must_use]
    pub fn has_member(&self, user: &UserId) -> bool {
        self.members.iter().any(|member| member == user)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessTerms {
    pub access_type: String,
    pub description: String,
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RightsStatement {
    pub statement: String,
    pub uri: String,
    pub identifier: String,
    pub identifier_scheme: String,
}

/// A creator or contributor. Contributors additionally carry a `role`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    pub name: String,
    pub name_type: String,
    pub affiliations: Vec<String>,
    pub identifiers: Vec<ExternalIdentifier>,
    pub role: String,
}

/// Scheme-qualified external identifier, e.g. an ORCID.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalIdentifier {
    pub value: String,
    pub scheme: String,
    pub scheme_uri: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Funder {
    pub name: String,
    pub identifier: String,
    pub identifier_scheme: String,
    pub award_number: String,
    pub award_title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryIdentifier {
    pub value: String,
    pub identifier_type: String,
}

/// Study-level metadata, one sub-record per module.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyMetadata {
    pub identification: StudyIdentification,
    pub status: StudyStatus,
    pub sponsors: SponsorCollaborators,
    pub oversight: Oversight,
    pub description: StudyNarrative,
    /// Absent until the editor picks a study type.
    pub design: Option<StudyDesign>,
    pub arms: Vec<StudyArm>,
    pub interventions: Vec<Intervention>,
    pub conditions: Vec<String>,
    pub keywords: Vec<String>,
    pub eligibility: Eligibility,
    pub central_contacts: Vec<ContactPerson>,
    pub overall_officials: Vec<Official>,
    pub locations: Vec<StudyLocation>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyIdentification {
    pub primary: StudyIdentifier,
    pub secondary: Vec<StudyIdentifier>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyIdentifier {
    pub value: String,
    pub identifier_type: String,
    pub domain: String,
    pub link: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyStatus {
    pub overall_status: String,
    pub why_stopped: String,
    pub start_date: String,
    pub start_date_type: String,
    pub completion_date: String,
    pub completion_date_type: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SponsorCollaborators {
    pub responsible_party_type: String,
    pub responsible_party_name: String,
    pub lead_sponsor_name: String,
    pub collaborators: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Oversight {
    pub has_dmc: Option<bool>,
    pub fda_regulated_drug: Option<bool>,
    pub fda_regulated_device: Option<bool>,
    pub human_subject_review_status: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyNarrative {
    pub brief_summary: String,
    pub detailed_description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyArm {
    pub label: String,
    pub arm_type: String,
    pub description: String,
    pub intervention_names: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intervention {
    pub name: String,
    pub intervention_type: String,
    pub description: String,
    pub other_names: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Eligibility {
    pub sex: String,
    pub minimum_age: String,
    pub maximum_age: String,
    pub healthy_volunteers: Option<bool>,
    pub criteria: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactPerson {
    pub name: String,
    pub degree: String,
    pub affiliation: String,
    pub phone: String,
    pub phone_ext: String,
    pub email: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Official {
    pub name: String,
    pub affiliation: String,
    pub role: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyLocation {
    pub facility: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub status: String,
    pub contacts: Vec<ContactPerson>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::InterventionalDesign;

    fn minimal_draft_json() -> String {
        r#"{
            "id": "ds-1",
            "canonical_id": "can-1",
            "container_id": "draft-ds-1",
            "title": "A study"
        }"#
        .to_string()
    }

    #[test]
    fn minimal_draft_parses_with_defaults() {
        let draft: DatasetDraft =
            serde_json::from_str(&minimal_draft_json()).expect("parse minimal draft");
        assert_eq!(draft.title, "A study");
        assert!(draft.members.is_empty());
        assert!(draft.study.design.is_none());
        assert_eq!(draft.publication_status, "");
        assert_eq!(draft.published_id, None);
    }

    #[test]
    fn unknown_top_level_fields_are_rejected() {
        let raw = minimal_draft_json().replace("\"title\"", "\"surprise\": 1, \"title\"");
        assert!(serde_json::from_str::<DatasetDraft>(&raw).is_err());
    }

    #[test]
    fn membership_is_exact_match() {
        let mut draft: DatasetDraft =
            serde_json::from_str(&minimal_draft_json()).expect("parse minimal draft");
        let alice = UserId::parse("alice").expect("user id");
        draft.members.push(alice.clone());
        assert!(draft.has_member(&alice));
        assert!(!draft.has_member(&UserId::parse("bob").expect("user id")));
    }

    #[test]
    fn design_embeds_as_tagged_object() {
        let mut draft: DatasetDraft =
            serde_json::from_str(&minimal_draft_json()).expect("parse minimal draft");
        draft.study.design = Some(StudyDesign::Interventional(InterventionalDesign::default()));
        let json = serde_json::to_string(&draft).expect("serialize draft");
        assert!(json.contains(r#""study_type":"Interventional""#));
        let back: DatasetDraft = serde_json::from_str(&json).expect("parse draft");
        assert_eq!(back, draft);
    }
}
