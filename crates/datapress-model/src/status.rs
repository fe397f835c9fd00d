use crate::ids::{ContainerId, DatasetId, ValidationError};
use crate::stage::PublishStage;
use crate::tree::FileNode;
use serde::{Deserialize, Serialize};

/// One status record per dataset: the externally pollable progress cursor.
///
/// Overwritten in place on every new attempt; pollers must tolerate the
/// stage resetting to `preparing` when a fresh attempt starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishingStatus {
    pub dataset_id: DatasetId,
    pub stage: PublishStage,
    pub comment: String,
    pub current_file_number: u64,
    pub file_count: u64,
    pub updated_at: i64,
}

impl PublishingStatus {
    /// The record shape written by a starting attempt.
    #[must_use]
    pub fn fresh(dataset_id: DatasetId, now: i64) -> Self {
        Self {
            dataset_id,
            stage: PublishStage::Preparing,
            comment: String::new(),
            current_file_number: 0,
            file_count: 0,
            updated_at: now,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Restricted,
}

impl Visibility {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Restricted => "restricted",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw {
            "public" => Ok(Visibility::Public),
            "restricted" => Ok(Visibility::Restricted),
            other => Err(ValidationError(format!("unknown visibility `{other}`"))),
        }
    }
}

/// The serialized metadata payloads stored alongside a published revision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataBundle {
    pub dataset_description: String,
    pub study_description: String,
    pub healthsheet: String,
    pub changelog: String,
    pub readme: String,
}

/// Immutable snapshot created by a successful publish attempt. The only
/// post-insert mutation is backfilling the final identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishedDataset {
    pub id: i64,
    pub dataset_id: DatasetId,
    pub canonical_id: String,
    pub container_id: ContainerId,
    pub version_title: String,
    pub files: Vec<FileNode>,
    pub bundle: MetadataBundle,
    pub identifier: String,
    pub visibility: Visibility,
    pub created_at: i64,
}

/// One entry from a container listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectEntry {
    pub path: String,
    #[serde(default)]
    pub is_directory: bool,
}

impl ObjectEntry {
    #[must_use]
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
        }
    }

    #[must_use]
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_status_is_zeroed_at_preparing() {
        let id = DatasetId::parse("ds-1").expect("dataset id");
        let status = PublishingStatus::fresh(id.clone(), 42);
        assert_eq!(status.dataset_id, id);
        assert_eq!(status.stage, PublishStage::Preparing);
        assert_eq!(status.comment, "");
        assert_eq!(status.current_file_number, 0);
        assert_eq!(status.file_count, 0);
        assert_eq!(status.updated_at, 42);
    }

    #[test]
    fn visibility_round_trips() {
        assert_eq!(Visibility::parse("public"), Ok(Visibility::Public));
        assert_eq!(Visibility::parse("restricted"), Ok(Visibility::Restricted));
        assert!(Visibility::parse("hidden").is_err());
        assert_eq!(Visibility::Public.as_str(), "public");
    }

    #[test]
    fn object_entry_serde_defaults_directory_flag() {
        let entry: ObjectEntry = serde_json::from_str(r#"{"path":"a.csv"}"#).expect("entry");
        assert_eq!(entry, ObjectEntry::file("a.csv"));
    }
}
