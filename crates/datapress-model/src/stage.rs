// SPDX-License-Identifier: Apache-2.0
use crate::ids::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed publish state machine, in execution order.
///
/// The ordinal is the externally visible `stage` number; the kebab-case name
/// is the wire and storage form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishStage {
    Preparing,
    ValidatingDatasetMetadata,
    ValidatingStudyMetadata,
    ValidatingHealthsheet,
    IndexingDataset,
    MovingDatasetToPublishedStorage,
    GeneratingUploadingMetadataFiles,
    RegisteringDoi,
    RegisteringDataset,
    Completed,
}

impl PublishStage {
    /// Every stage, in order. The table is total and never changes at run
    /// time.
    pub const ALL: [PublishStage; 10] = [
        PublishStage::Preparing,
        PublishStage::ValidatingDatasetMetadata,
        PublishStage::ValidatingStudyMetadata,
        PublishStage::ValidatingHealthsheet,
        PublishStage::IndexingDataset,
        PublishStage::MovingDatasetToPublishedStorage,
        PublishStage::GeneratingUploadingMetadataFiles,
        PublishStage::RegisteringDoi,
        PublishStage::RegisteringDataset,
        PublishStage::Completed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PublishStage::Preparing => "preparing",
            PublishStage::ValidatingDatasetMetadata => "validating-dataset-metadata",
            PublishStage::ValidatingStudyMetadata => "validating-study-metadata",
            PublishStage::ValidatingHealthsheet => "validating-healthsheet",
            PublishStage::IndexingDataset => "indexing-dataset",
            PublishStage::MovingDatasetToPublishedStorage => "moving-dataset-to-published-storage",
            PublishStage::GeneratingUploadingMetadataFiles => {
                "generating-uploading-metadata-files"
            }
            PublishStage::RegisteringDoi => "registering-doi",
            PublishStage::RegisteringDataset => "registering-dataset",
            PublishStage::Completed => "completed",
        }
    }

    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            PublishStage::Preparing => 0,
            PublishStage::ValidatingDatasetMetadata => 1,
            PublishStage::ValidatingStudyMetadata => 2,
            PublishStage::ValidatingHealthsheet => 3,
            PublishStage::IndexingDataset => 4,
            PublishStage::MovingDatasetToPublishedStorage => 5,
            PublishStage::GeneratingUploadingMetadataFiles => 6,
            PublishStage::RegisteringDoi => 7,
            PublishStage::RegisteringDataset => 8,
            PublishStage::Completed => 9,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == raw)
            .ok_or_else(|| ValidationError(format!("unknown publish stage `{raw}`")))
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, PublishStage::Completed)
    }

    /// The stage after this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.ordinal() as usize + 1).copied()
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
