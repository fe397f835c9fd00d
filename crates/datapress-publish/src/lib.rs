// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Publishing pipeline: drives a dataset draft through validation, file
//! migration into a fresh published container, metadata artifact generation,
//! and two-phase identifier registration, with per-stage status reporting
//! along the way.

mod artifacts;
mod demo;
mod error;
mod lease;
mod manifest;
mod publisher;
mod registrar;
mod registry;
mod sqlite;
mod status;
mod validate;

pub use artifacts::{
    bundle_files, render_all, render_changelog, render_dataset_description, render_healthsheet,
    render_readme, render_study_description, ArtifactError, CHANGELOG_FILE,
    DATASET_DESCRIPTION_FILE, HEALTHSHEET_FILE, README_FILE, STUDY_DESCRIPTION_FILE,
};
pub use demo::demo_draft;
pub use error::{PublishError, PublishErrorCode};
pub use lease::{LeaseGuard, LeaseTable};
pub use manifest::build_tree;
pub use publisher::{PublishReceipt, Publisher, PublisherConfig, PublisherDeps};
pub use registrar::{
    IdentifierRegistrar, LocalRegistrar, RegistrarError, DEFAULT_IDENTIFIER_PREFIX,
};
pub use registry::{
    DraftRepository, MemoryRegistry, NewPublishedRecord, PublishedStore, StatusStore,
};
pub use sqlite::{SqliteRegistry, SQLITE_SCHEMA_VERSION};
pub use status::StatusTracker;
pub use validate::{
    BaselineValidator, MetadataFacet, MetadataValidator, ValidationReport,
};

pub const CRATE_NAME: &str = "datapress-publish";
