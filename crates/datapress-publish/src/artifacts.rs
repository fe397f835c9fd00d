//! Metadata artifact generation. One successful publish uploads five
//! documents next to the dataset files; all five are rendered here from
//! the draft alone, so the same draft always yields the same bytes.

use datapress_core::canonical::stable_json_string;
use datapress_model::{
    DatasetDraft, HealthsheetPayload, HealthsheetSections, MetadataBundle, StudyDesign,
    StudyMetadata,
};
use serde::Serialize;
use std::fmt;

pub const DATASET_DESCRIPTION_FILE: &str = "dataset_description.json";
pub const STUDY_DESCRIPTION_FILE: &str = "study_description.json";
pub const HEALTHSHEET_FILE: &str = "healthsheet.md";
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";
pub const README_FILE: &str = "README.md";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactError(pub String);

impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ArtifactError {}

/// Renders all five artifacts or fails without rendering any.
pub fn render_all(draft: &DatasetDraft) -> Result<MetadataBundle, ArtifactError> {
    Ok(MetadataBundle {
        dataset_description: render_dataset_description(draft)?,
        study_description: render_study_description(draft)?,
        healthsheet: render_healthsheet(&draft.healthsheet)?,
        changelog: render_changelog(draft)?,
        readme: render_readme(draft)?,
    })
}

/// Artifact file names paired with their rendered content, in upload
/// order.
#[must_use]
pub fn bundle_files(bundle: &MetadataBundle) -> [(&'static str, &str); 5] {
    [
        (DATASET_DESCRIPTION_FILE, bundle.dataset_description.as_str()),
        (STUDY_DESCRIPTION_FILE, bundle.study_description.as_str()),
        (HEALTHSHEET_FILE, bundle.healthsheet.as_str()),
        (CHANGELOG_FILE, bundle.changelog.as_str()),
        (README_FILE, bundle.readme.as_str()),
    ]
}

fn opt(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn list(items: &[String]) -> Option<&[String]> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatasetDescriptionDoc<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<IdentifierDoc<'a>>,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    creators: Vec<PersonDoc<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    contributors: Vec<PersonDoc<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access: Option<AccessDoc<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rights: Vec<RightsDoc<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    funding_references: Vec<FundingDoc<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    alternate_identifiers: Vec<AlternateIdentifierDoc<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentifierDoc<'a> {
    identifier_value: &'a str,
    identifier_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonDoc<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliations: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    name_identifiers: Vec<NameIdentifierDoc<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contributor_type: Option<&'a str>,
}

impl<'a> PersonDoc<'a> {
    fn creator(person: &'a datapress_model::Person) -> Self {
        Self {
            name: &person.name,
            name_type: opt(&person.name_type),
            affiliations: list(&person.affiliations),
            name_identifiers: person
                .identifiers
                .iter()
                .map(|id| NameIdentifierDoc {
                    value: &id.value,
                    scheme: opt(&id.scheme),
                    scheme_uri: opt(&id.scheme_uri),
                })
                .collect(),
            contributor_type: None,
        }
    }

    fn contributor(person: &'a datapress_model::Person) -> Self {
        Self {
            contributor_type: opt(&person.role),
            ..Self::creator(person)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NameIdentifierDoc<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheme: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheme_uri: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessDoc<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    access_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RightsDoc<'a> {
    statement: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier_scheme: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FundingDoc<'a> {
    funder_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier_scheme: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    award_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    award_title: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlternateIdentifierDoc<'a> {
    value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier_type: Option<&'a str>,
}

/// Dataset-level metadata document. The identifier block appears once the
/// draft has been stamped with its final identifier; during the attempt
/// itself the draft still carries the provisional one, so first-time
/// publishes omit it.
pub fn render_dataset_description(draft: &DatasetDraft) -> Result<String, ArtifactError> {
    let access_empty = draft.access.access_type.is_empty()
        && draft.access.description.is_empty()
        && draft.access.url.is_empty();
    let doc = DatasetDescriptionDoc {
        identifier: opt(&draft.published_identifier).map(|value| IdentifierDoc {
            identifier_value: value,
            identifier_type: "DOI",
        }),
        title: &draft.title,
        version: opt(&draft.version_title),
        description: opt(&draft.description),
        creators: draft.creators.iter().map(PersonDoc::creator).collect(),
        contributors: draft.contributors.iter().map(PersonDoc::contributor).collect(),
        access: if access_empty {
            None
        } else {
            Some(AccessDoc {
                access_type: opt(&draft.access.access_type),
                description: opt(&draft.access.description),
                url: opt(&draft.access.url),
            })
        },
        rights: draft
            .rights
            .iter()
            .map(|r| RightsDoc {
                statement: &r.statement,
                uri: opt(&r.uri),
                identifier: opt(&r.identifier),
                identifier_scheme: opt(&r.identifier_scheme),
            })
            .collect(),
        funding_references: draft
            .funders
            .iter()
            .map(|f| FundingDoc {
                funder_name: &f.name,
                identifier: opt(&f.identifier),
                identifier_scheme: opt(&f.identifier_scheme),
                award_number: opt(&f.award_number),
                award_title: opt(&f.award_title),
            })
            .collect(),
        alternate_identifiers: draft
            .secondary_identifiers
            .iter()
            .map(|s| AlternateIdentifierDoc {
                value: &s.value,
                identifier_type: opt(&s.identifier_type),
            })
            .collect(),
    };
    stable_json_string(&doc).map_err(|e| ArtifactError(format!("render dataset description: {e}")))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudyDescriptionDoc<'a> {
    identification_module: IdentificationModule<'a>,
    status_module: StatusModule<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sponsor_collaborators_module: Option<SponsorsModule<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oversight_module: Option<OversightModule<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description_module: Option<DescriptionModule<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    design_module: Option<DesignModule<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arms_interventions_module: Option<ArmsInterventionsModule<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conditions_module: Option<ConditionsModule<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eligibility_module: Option<EligibilityModule<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contacts_locations_module: Option<ContactsLocationsModule<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentificationModule<'a> {
    org_study_id_info: StudyIdentifierDoc<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    secondary_id_info: Vec<StudyIdentifierDoc<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StudyIdentifierDoc<'a> {
    id: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    id_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a str>,
}

impl<'a> StudyIdentifierDoc<'a> {
    fn from_model(id: &'a datapress_model::StudyIdentifier) -> Self {
        Self {
            id: &id.value,
            id_type: opt(&id.identifier_type),
            domain: opt(&id.domain),
            link: opt(&id.link),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusModule<'a> {
    overall_status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    why_stopped: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date_struct: Option<DateDoc<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_date_struct: Option<DateDoc<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DateDoc<'a> {
    date: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    date_type: Option<&'a str>,
}

fn date_doc<'a>(date: &'a str, date_type: &'a str) -> Option<DateDoc<'a>> {
    opt(date).map(|date| DateDoc {
        date,
        date_type: opt(date_type),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SponsorsModule<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    responsible_party: Option<ResponsiblePartyDoc<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lead_sponsor_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collaborators: Option<&'a [String]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponsiblePartyDoc<'a> {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    party_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OversightModule<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    oversight_has_dmc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_fda_regulated_drug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_fda_regulated_device: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    human_subject_review_status: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionModule<'a> {
    brief_summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detailed_description: Option<&'a str>,
}

/// Design rendered flat: `studyType` plus only the keys of the matching
/// variant.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DesignModule<'a> {
    study_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    allocation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intervention_model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intervention_model_description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_purpose: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    masking: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    masking_description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    who_masked: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phases: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    number_of_arms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    patient_registry: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    observational_models: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_perspectives: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bio_spec_retention: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bio_spec_description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_duration_value: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_duration_unit: Option<&'a str>,
    enrollment_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrollment_type: Option<&'a str>,
}

impl<'a> DesignModule<'a> {
    fn from_design(design: &'a StudyDesign) -> Self {
        let mut doc = Self {
            study_type: design.study_type(),
            allocation: None,
            intervention_model: None,
            intervention_model_description: None,
            primary_purpose: None,
            masking: None,
            masking_description: None,
            who_masked: None,
            phases: None,
            number_of_arms: None,
            patient_registry: None,
            observational_models: None,
            time_perspectives: None,
            bio_spec_retention: None,
            bio_spec_description: None,
            target_duration_value: None,
            target_duration_unit: None,
            enrollment_count: 0,
            enrollment_type: None,
        };
        match design {
            StudyDesign::Interventional(d) => {
                doc.allocation = opt(&d.allocation);
                doc.intervention_model = opt(&d.intervention_model);
                doc.intervention_model_description = opt(&d.intervention_model_description);
                doc.primary_purpose = opt(&d.primary_purpose);
                doc.masking = opt(&d.masking);
                doc.masking_description = opt(&d.masking_description);
                doc.who_masked = list(&d.who_masked);
                doc.phases = list(&d.phases);
                doc.number_of_arms = Some(d.number_of_arms);
                doc.enrollment_count = d.enrollment_count;
                doc.enrollment_type = opt(&d.enrollment_type);
            }
            StudyDesign::Observational(d) => {
                doc.patient_registry = Some(d.patient_registry);
                doc.observational_models = list(&d.observational_models);
                doc.time_perspectives = list(&d.time_perspectives);
                doc.bio_spec_retention = opt(&d.bio_spec_retention);
                doc.bio_spec_description = opt(&d.bio_spec_description);
                doc.target_duration_value = d.target_duration.as_ref().map(|t| t.value);
                doc.target_duration_unit = d.target_duration.as_ref().map(|t| t.unit.as_str());
                doc.enrollment_count = d.enrollment_count;
                doc.enrollment_type = opt(&d.enrollment_type);
            }
        }
        doc
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArmsInterventionsModule<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    arm_groups: Vec<ArmDoc<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    interventions: Vec<InterventionDoc<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArmDoc<'a> {
    label: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    arm_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intervention_names: Option<&'a [String]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InterventionDoc<'a> {
    name: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    intervention_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    other_names: Option<&'a [String]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConditionsModule<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    conditions: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keywords: Option<&'a [String]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EligibilityModule<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sex: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    minimum_age: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    maximum_age: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    healthy_volunteers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eligibility_criteria: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactsLocationsModule<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    central_contacts: Vec<ContactDoc<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    overall_officials: Vec<OfficialDoc<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locations: Vec<LocationDoc<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactDoc<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    degree: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_ext: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

impl<'a> ContactDoc<'a> {
    fn from_model(contact: &'a datapress_model::ContactPerson) -> Self {
        Self {
            name: &contact.name,
            degree: opt(&contact.degree),
            affiliation: opt(&contact.affiliation),
            phone: opt(&contact.phone),
            phone_ext: opt(&contact.phone_ext),
            email: opt(&contact.email),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OfficialDoc<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationDoc<'a> {
    facility: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    contacts: Vec<ContactDoc<'a>>,
}

fn sponsors_module(study: &StudyMetadata) -> Option<SponsorsModule<'_>> {
    let s = &study.sponsors;
    if s.responsible_party_type.is_empty()
        && s.responsible_party_name.is_empty()
        && s.lead_sponsor_name.is_empty()
        && s.collaborators.is_empty()
    {
        return None;
    }
    let party = if s.responsible_party_type.is_empty() && s.responsible_party_name.is_empty() {
        None
    } else {
        Some(ResponsiblePartyDoc {
            party_type: opt(&s.responsible_party_type),
            name: opt(&s.responsible_party_name),
        })
    };
    Some(SponsorsModule {
        responsible_party: party,
        lead_sponsor_name: opt(&s.lead_sponsor_name),
        collaborators: list(&s.collaborators),
    })
}

fn oversight_module(study: &StudyMetadata) -> Option<OversightModule<'_>> {
    let o = &study.oversight;
    if o.has_dmc.is_none()
        && o.fda_regulated_drug.is_none()
        && o.fda_regulated_device.is_none()
        && o.human_subject_review_status.is_empty()
    {
        return None;
    }
    Some(OversightModule {
        oversight_has_dmc: o.has_dmc,
        is_fda_regulated_drug: o.fda_regulated_drug,
        is_fda_regulated_device: o.fda_regulated_device,
        human_subject_review_status: opt(&o.human_subject_review_status),
    })
}

fn eligibility_module(study: &StudyMetadata) -> Option<EligibilityModule<'_>> {
    let e = &study.eligibility;
    if e.sex.is_empty()
        && e.minimum_age.is_empty()
        && e.maximum_age.is_empty()
        && e.healthy_volunteers.is_none()
        && e.criteria.is_empty()
    {
        return None;
    }
    Some(EligibilityModule {
        sex: opt(&e.sex),
        minimum_age: opt(&e.minimum_age),
        maximum_age: opt(&e.maximum_age),
        healthy_volunteers: e.healthy_volunteers,
        eligibility_criteria: opt(&e.criteria),
    })
}

fn contacts_module(study: &StudyMetadata) -> Option<ContactsLocationsModule<'_>> {
    if study.central_contacts.is_empty()
        && study.overall_officials.is_empty()
        && study.locations.is_empty()
    {
        return None;
    }
    Some(ContactsLocationsModule {
        central_contacts: study
            .central_contacts
            .iter()
            .map(ContactDoc::from_model)
            .collect(),
        overall_officials: study
            .overall_officials
            .iter()
            .map(|o| OfficialDoc {
                name: &o.name,
                affiliation: opt(&o.affiliation),
                role: opt(&o.role),
            })
            .collect(),
        locations: study
            .locations
            .iter()
            .map(|l| LocationDoc {
                facility: &l.facility,
                city: opt(&l.city),
                state: opt(&l.state),
                country: opt(&l.country),
                status: opt(&l.status),
                contacts: l.contacts.iter().map(ContactDoc::from_model).collect(),
            })
            .collect(),
    })
}

/// Study-level metadata document, one JSON module per study sub-record.
/// Identification and status are always present; every other module is
/// emitted only when the draft has content for it.
pub fn render_study_description(draft: &DatasetDraft) -> Result<String, ArtifactError> {
    let study = &draft.study;
    let arms_empty = study.arms.is_empty() && study.interventions.is_empty();
    let conditions_empty = study.conditions.is_empty() && study.keywords.is_empty();
    let doc = StudyDescriptionDoc {
        identification_module: IdentificationModule {
            org_study_id_info: StudyIdentifierDoc::from_model(&study.identification.primary),
            secondary_id_info: study
                .identification
                .secondary
                .iter()
                .map(StudyIdentifierDoc::from_model)
                .collect(),
        },
        status_module: StatusModule {
            overall_status: &study.status.overall_status,
            why_stopped: opt(&study.status.why_stopped),
            start_date_struct: date_doc(&study.status.start_date, &study.status.start_date_type),
            completion_date_struct: date_doc(
                &study.status.completion_date,
                &study.status.completion_date_type,
            ),
        },
        sponsor_collaborators_module: sponsors_module(study),
        oversight_module: oversight_module(study),
        description_module: opt(&study.description.brief_summary).map(|brief_summary| {
            DescriptionModule {
                brief_summary,
                detailed_description: opt(&study.description.detailed_description),
            }
        }),
        design_module: study.design.as_ref().map(DesignModule::from_design),
        arms_interventions_module: if arms_empty {
            None
        } else {
            Some(ArmsInterventionsModule {
                arm_groups: study
                    .arms
                    .iter()
                    .map(|a| ArmDoc {
                        label: &a.label,
                        arm_type: opt(&a.arm_type),
                        description: opt(&a.description),
                        intervention_names: list(&a.intervention_names),
                    })
                    .collect(),
                interventions: study
                    .interventions
                    .iter()
                    .map(|i| InterventionDoc {
                        name: &i.name,
                        intervention_type: opt(&i.intervention_type),
                        description: opt(&i.description),
                        other_names: list(&i.other_names),
                    })
                    .collect(),
            })
        },
        conditions_module: if conditions_empty {
            None
        } else {
            Some(ConditionsModule {
                conditions: list(&study.conditions),
                keywords: list(&study.keywords),
            })
        },
        eligibility_module: eligibility_module(study),
        contacts_locations_module: contacts_module(study),
    };
    stable_json_string(&doc).map_err(|e| ArtifactError(format!("render study description: {e}")))
}

/// Healthsheet document: the seven sections in fixed order, questions
/// numbered by record id, responses indented beneath them. Sections with
/// no records are omitted entirely.
pub fn render_healthsheet(sections: &HealthsheetSections) -> Result<String, ArtifactError> {
    let mut out = String::new();
    for (title, raw) in sections.ordered() {
        let payload = HealthsheetPayload::parse_lenient(raw);
        if payload.records.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("## ");
        out.push_str(title);
        out.push('\n');
        for record in &payload.records {
            out.push('\n');
            out.push_str(&record.id.to_string());
            out.push_str(". ");
            out.push_str(record.question.trim());
            out.push_str("\n\n");
            let response = record.response.trim();
            if response.is_empty() {
                out.push_str("    N/A\n");
            } else {
                for line in response.lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
    if out.is_empty() {
        return Err(ArtifactError("healthsheet has no answered sections".to_string()));
    }
    Ok(out)
}

pub fn render_changelog(draft: &DatasetDraft) -> Result<String, ArtifactError> {
    verbatim("changelog", &draft.changelog)
}

pub fn render_readme(draft: &DatasetDraft) -> Result<String, ArtifactError> {
    verbatim("readme", &draft.readme)
}

fn verbatim(kind: &str, content: &str) -> Result<String, ArtifactError> {
    if content.trim().is_empty() {
        return Err(ArtifactError(format!("draft has no {kind} content")));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datapress_model::{InterventionalDesign, ObservationalDesign, TargetDuration};

    fn draft_with(raw: serde_json::Value) -> DatasetDraft {
        serde_json::from_value(raw).expect("draft fixture")
    }

    fn base_draft() -> DatasetDraft {
        draft_with(serde_json::json!({
            "id": "ds-1",
            "canonical_id": "can-1",
            "container_id": "draft-ds-1",
            "title": "Retinal OCT scans",
            "changelog": "Initial release.",
            "readme": "See docs.",
            "creators": [{"name": "Okafor, Ada"}]
        }))
    }

    #[test]
    fn dataset_description_omits_identifier_until_stamped() {
        let mut draft = base_draft();
        let first = render_dataset_description(&draft).expect("render");
        assert!(!first.contains("identifierValue"));
        draft.published_identifier = "10.60775/dataset.7".to_string();
        let second = render_dataset_description(&draft).expect("render");
        assert!(second.contains(r#""identifierValue":"10.60775/dataset.7""#));
        assert!(second.contains(r#""identifierType":"DOI""#));
    }

    #[test]
    fn dataset_description_is_deterministic_and_key_sorted() {
        let draft = base_draft();
        let a = render_dataset_description(&draft).expect("render");
        let b = render_dataset_description(&draft).expect("render");
        assert_eq!(a, b);
        // creators sorts before title
        let creators_at = a.find("creators").expect("creators key");
        let title_at = a.find("title").expect("title key");
        assert!(creators_at < title_at);
    }

    #[test]
    fn interventional_design_renders_only_its_own_keys() {
        let mut draft = base_draft();
        draft.study.design = Some(StudyDesign::Interventional(InterventionalDesign {
            allocation: "Randomized".into(),
            phases: vec!["Phase 2".into()],
            number_of_arms: 2,
            enrollment_count: 48,
            ..InterventionalDesign::default()
        }));
        let doc = render_study_description(&draft).expect("render");
        assert!(doc.contains(r#""studyType":"Interventional""#));
        assert!(doc.contains(r#""allocation":"Randomized""#));
        assert!(doc.contains(r#""numberOfArms":2"#));
        assert!(!doc.contains("patientRegistry"));
        assert!(!doc.contains("observationalModels"));
        assert!(!doc.contains("targetDuration"));
    }

    #[test]
    fn observational_design_renders_only_its_own_keys() {
        let mut draft = base_draft();
        draft.study.design = Some(StudyDesign::Observational(ObservationalDesign {
            patient_registry: true,
            observational_models: vec!["Cohort".into()],
            target_duration: Some(TargetDuration {
                value: 24,
                unit: "Months".into(),
            }),
            enrollment_count: 500,
            ..ObservationalDesign::default()
        }));
        let doc = render_study_description(&draft).expect("render");
        assert!(doc.contains(r#""studyType":"Observational""#));
        assert!(doc.contains(r#""patientRegistry":true"#));
        assert!(doc.contains(r#""targetDurationValue":24"#));
        assert!(doc.contains(r#""targetDurationUnit":"Months""#));
        assert!(!doc.contains("allocation"));
        assert!(!doc.contains("whoMasked"));
        assert!(!doc.contains("numberOfArms"));
    }

    #[test]
    fn study_description_without_design_has_no_design_module() {
        let doc = render_study_description(&base_draft()).expect("render");
        assert!(!doc.contains("designModule"));
        assert!(doc.contains("identificationModule"));
        assert!(doc.contains("statusModule"));
    }

    #[test]
    fn healthsheet_renders_sections_in_order_with_numbered_records() {
        let mut sections = HealthsheetSections::default();
        sections.motivation = serde_json::json!({
            "version": 1,
            "records": [
                {"id": 1, "question": "Why was the dataset created?", "response": "To share OCT scans."},
                {"id": 2, "question": "Who funded it?", "response": ""}
            ]
        })
        .to_string();
        sections.uses = serde_json::json!({
            "version": 1,
            "records": [{"id": 1, "question": "Known uses?", "response": "Line one.\nLine two."}]
        })
        .to_string();
        let doc = render_healthsheet(&sections).expect("render");
        assert_eq!(
            doc,
            "## Motivation\n\n1. Why was the dataset created?\n\n    To share OCT scans.\n\n2. Who funded it?\n\n    N/A\n\n## Uses\n\n1. Known uses?\n\n    Line one.\n    Line two.\n"
        );
    }

    #[test]
    fn healthsheet_with_no_records_anywhere_fails() {
        let err = render_healthsheet(&HealthsheetSections::default()).expect_err("empty");
        assert!(err.0.contains("no answered sections"));
    }

    #[test]
    fn malformed_section_payloads_are_treated_as_empty() {
        let mut sections = HealthsheetSections::default();
        sections.motivation = "{broken".to_string();
        sections.uses = serde_json::json!({
            "version": 1,
            "records": [{"id": 1, "question": "Q", "response": "A"}]
        })
        .to_string();
        let doc = render_healthsheet(&sections).expect("render");
        assert!(!doc.contains("Motivation"));
        assert!(doc.contains("## Uses"));
    }

    #[test]
    fn changelog_and_readme_are_verbatim_and_required() {
        let mut draft = base_draft();
        assert_eq!(render_changelog(&draft).expect("changelog"), "Initial release.");
        assert_eq!(render_readme(&draft).expect("readme"), "See docs.");
        draft.changelog = "  \n".to_string();
        assert!(render_changelog(&draft).is_err());
        draft.readme.clear();
        assert!(render_readme(&draft).is_err());
    }

    #[test]
    fn render_all_produces_the_five_documents() {
        let mut draft = base_draft();
        draft.healthsheet.motivation = serde_json::json!({
            "version": 1,
            "records": [{"id": 1, "question": "Q", "response": "A"}]
        })
        .to_string();
        let bundle = render_all(&draft).expect("bundle");
        let files = bundle_files(&bundle);
        let names: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec![
                "dataset_description.json",
                "study_description.json",
                "healthsheet.md",
                "CHANGELOG.md",
                "README.md"
            ]
        );
        assert!(files.iter().all(|(_, content)| !content.is_empty()));
    }
}
