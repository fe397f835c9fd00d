#![forbid(unsafe_code)]
//! Typed domain model for the datapress publishing pipeline.
//!
//! Everything the pipeline reads or persists is expressed here as explicit
//! structs and enums; in particular the study design is a two-variant sum
//! type, so a record can never carry the other design type's fields.

mod design;
mod draft;
mod healthsheet;
mod ids;
mod stage;
mod status;
mod tree;

pub use design::{InterventionalDesign, ObservationalDesign, StudyDesign, TargetDuration};
pub use draft::{
    AccessTerms, ContactPerson, DatasetDraft, Eligibility, ExternalIdentifier, Funder,
    Intervention, Official, Oversight, Person, RightsStatement, SecondaryIdentifier,
    SponsorCollaborators, StudyArm, StudyIdentification, StudyIdentifier, StudyLocation,
    StudyMetadata, StudyNarrative, StudyStatus,
};
pub use healthsheet::{HealthsheetPayload, HealthsheetRecord, HealthsheetSections};
pub use ids::{ContainerId, DatasetId, UserId, ValidationError, ID_MAX_LEN};
pub use stage::PublishStage;
pub use status::{MetadataBundle, ObjectEntry, PublishedDataset, PublishingStatus, Visibility};
pub use tree::{classify_path, FileClass, FileNode};

pub const CRATE_NAME: &str = "datapress-model";
