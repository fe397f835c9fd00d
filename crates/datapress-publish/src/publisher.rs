// SPDX-License-Identifier: Apache-2.0

use crate::artifacts::{bundle_files, render_all};
use crate::error::PublishError;
use crate::lease::LeaseTable;
use crate::manifest::build_tree;
use crate::registrar::IdentifierRegistrar;
use crate::registry::{DraftRepository, NewPublishedRecord, PublishedStore, StatusStore};
use crate::status::StatusTracker;
use crate::validate::{MetadataFacet, MetadataValidator};
use datapress_core::unix_now_secs;
use datapress_model::{
    ContainerId, DatasetDraft, DatasetId, ObjectEntry, PublishStage, PublishingStatus, UserId,
    Visibility,
};
use datapress_store::{Namespace, ObjectStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Lets an operator push a draft through with known-bad metadata.
    /// Every skipped check is logged at warn.
    pub skip_metadata_validation: bool,
    pub lease_ttl: Duration,
    pub max_concurrent_attempts: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            skip_metadata_validation: false,
            lease_ttl: Duration::from_secs(900),
            max_concurrent_attempts: 4,
        }
    }
}

/// Everything an attempt touches, behind trait objects so tests can swap
/// in in-memory fakes.
pub struct PublisherDeps {
    pub store: Arc<dyn ObjectStore>,
    pub drafts: Arc<dyn DraftRepository>,
    pub status: Arc<dyn StatusStore>,
    pub published: Arc<dyn PublishedStore>,
    pub validator: Arc<dyn MetadataValidator>,
    pub registrar: Arc<dyn IdentifierRegistrar>,
}

/// What a successful attempt hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    pub dataset_id: DatasetId,
    pub published_id: i64,
    pub identifier: String,
    pub container_id: ContainerId,
    pub files_copied: u64,
}

/// Drives a draft through the publish stages in order. One attempt per
/// dataset at a time, enforced by a lease; total concurrency is capped by
/// a semaphore.
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    drafts: Arc<dyn DraftRepository>,
    published: Arc<dyn PublishedStore>,
    validator: Arc<dyn MetadataValidator>,
    registrar: Arc<dyn IdentifierRegistrar>,
    tracker: StatusTracker,
    leases: Arc<LeaseTable>,
    attempts: Arc<Semaphore>,
    skip_metadata_validation: bool,
}

impl Publisher {
    #[must_use]
    pub fn new(deps: PublisherDeps, config: &PublisherConfig) -> Self {
        Self {
            store: deps.store,
            drafts: deps.drafts,
            published: deps.published,
            validator: deps.validator,
            registrar: deps.registrar,
            tracker: StatusTracker::new(deps.status),
            leases: LeaseTable::new(config.lease_ttl),
            attempts: Arc::new(Semaphore::new(config.max_concurrent_attempts.max(1))),
            skip_metadata_validation: config.skip_metadata_validation,
        }
    }

    /// Runs a full publish attempt for `dataset` on behalf of `user`.
    ///
    /// The attempt holds the dataset lease until it returns, so a second
    /// call for the same dataset fails fast instead of interleaving stage
    /// writes with the first.
    pub async fn start_publish(
        &self,
        dataset: &DatasetId,
        user: &UserId,
    ) -> Result<PublishReceipt, PublishError> {
        let _permit = self
            .attempts
            .clone()
            .try_acquire_owned()
            .map_err(|_| PublishError::attempt_in_progress("publish capacity exhausted"))?;
        let _lease = self.leases.acquire(dataset).ok_or_else(|| {
            PublishError::attempt_in_progress(format!(
                "a publish attempt for `{dataset}` is already running"
            ))
        })?;

        let started = Instant::now();
        match self.run_attempt(dataset, user).await {
            Ok(receipt) => {
                info!(
                    dataset = %dataset,
                    published_id = receipt.published_id,
                    identifier = %receipt.identifier,
                    files_copied = receipt.files_copied,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "publish attempt succeeded"
                );
                Ok(receipt)
            }
            Err(err) => {
                error!(
                    dataset = %dataset,
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "publish attempt failed"
                );
                Err(err)
            }
        }
    }

    pub async fn status_of(
        &self,
        dataset: &DatasetId,
    ) -> Result<Option<PublishingStatus>, PublishError> {
        self.tracker.current(dataset).await
    }

    async fn run_attempt(
        &self,
        dataset: &DatasetId,
        user: &UserId,
    ) -> Result<PublishReceipt, PublishError> {
        self.tracker
            .start_attempt(dataset)
            .await
            .map_err(|err| err.at_stage(PublishStage::Preparing))?;
        let draft = self
            .drafts
            .fetch(dataset, user)
            .await
            .map_err(|err| err.at_stage(PublishStage::Preparing))?
            .ok_or_else(|| PublishError::not_found(format!("no draft `{dataset}` for this user")))?;

        self.advance(dataset, PublishStage::ValidatingDatasetMetadata)
            .await?;
        self.check_metadata(MetadataFacet::Dataset, &draft, PublishStage::ValidatingDatasetMetadata)
            .await?;

        self.advance(dataset, PublishStage::ValidatingStudyMetadata)
            .await?;
        self.check_metadata(MetadataFacet::Study, &draft, PublishStage::ValidatingStudyMetadata)
            .await?;

        // Reserved stage: recorded for progress consumers, checks nothing yet.
        self.advance(dataset, PublishStage::ValidatingHealthsheet)
            .await?;

        // Every attempt gets a fresh container. Nothing downstream ever
        // reuses one, so a failed attempt cannot poison the next.
        self.advance(dataset, PublishStage::IndexingDataset).await?;
        let container = ContainerId::mint();
        self.store
            .create_container(Namespace::Published, &container)
            .await
            .map_err(|err| PublishError::from(err).at_stage(PublishStage::IndexingDataset))?;

        match self.fill_container(dataset, &draft, &container).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                error!(
                    dataset = %dataset,
                    container = %container,
                    "published container orphaned by failed attempt"
                );
                Err(err)
            }
        }
    }

    /// Stages that run against the freshly provisioned published container.
    /// On failure the container is left behind for operator cleanup and the
    /// caller logs its id.
    async fn fill_container(
        &self,
        dataset: &DatasetId,
        draft: &DatasetDraft,
        container: &ContainerId,
    ) -> Result<PublishReceipt, PublishError> {
        let stage = PublishStage::MovingDatasetToPublishedStorage;
        self.advance(dataset, stage).await?;
        let entries = self
            .store
            .list_all_paths(Namespace::Draft, &draft.container_id)
            .await
            .map_err(|err| PublishError::from(err).at_stage(stage))?;
        let files: Vec<&ObjectEntry> = entries
            .iter()
            .filter(|entry| !entry.is_directory && !entry.path.is_empty())
            .collect();
        let total = files.len() as u64;
        self.tracker.progress(dataset, 0, total).await;

        let mut copied: u64 = 0;
        for entry in &files {
            let bytes = self
                .store
                .read_file(Namespace::Draft, &draft.container_id, &entry.path)
                .await
                .map_err(|err| PublishError::from(err).at_stage(stage))?;
            self.store
                .create_file(Namespace::Published, container, &entry.path)
                .await
                .map_err(|err| PublishError::from(err).at_stage(stage))?;
            self.store
                .write_file(Namespace::Published, container, &entry.path, &bytes)
                .await
                .map_err(|err| PublishError::from(err).at_stage(stage))?;
            copied += 1;
            self.tracker.progress(dataset, copied, total).await;
            self.tracker
                .comment(dataset, &format!("Copied {copied} of {total} files"))
                .await;
        }

        let stage = PublishStage::GeneratingUploadingMetadataFiles;
        self.advance(dataset, stage).await?;
        let bundle =
            render_all(draft).map_err(|err| PublishError::invalid_state(err.0).at_stage(stage))?;
        for (name, content) in bundle_files(&bundle) {
            self.store
                .create_file(Namespace::Published, container, name)
                .await
                .map_err(|err| PublishError::from(err).at_stage(stage))?;
            self.store
                .write_file(Namespace::Published, container, name, content.as_bytes())
                .await
                .map_err(|err| PublishError::from(err).at_stage(stage))?;
        }

        // The manifest covers migrated files plus the generated documents,
        // so consumers see the container exactly as it will be served.
        self.advance(dataset, PublishStage::RegisteringDoi).await?;
        let mut manifest: Vec<ObjectEntry> =
            files.into_iter().cloned().collect();
        for (name, _) in bundle_files(&bundle) {
            manifest.push(ObjectEntry::file(name));
        }
        let tree = build_tree(&manifest);

        let stage = PublishStage::RegisteringDataset;
        self.advance(dataset, stage).await?;
        let provisional = self
            .registrar
            .provisional()
            .await
            .map_err(|err| PublishError::persistence(err.0).at_stage(stage))?;
        let record = NewPublishedRecord {
            dataset_id: dataset.clone(),
            canonical_id: draft.canonical_id.clone(),
            container_id: container.clone(),
            version_title: draft.version_title.clone(),
            files: tree,
            bundle,
            identifier: provisional,
            visibility: Visibility::Public,
            created_at: unix_now_secs() as i64,
        };
        let published_id = self
            .published
            .insert(&record)
            .await
            .map_err(|err| err.at_stage(stage))?;
        let identifier = self
            .registrar
            .finalize(published_id)
            .await
            .map_err(|err| PublishError::persistence(err.0).at_stage(stage))?;
        self.published
            .set_identifier(published_id, &identifier)
            .await
            .map_err(|err| err.at_stage(stage))?;

        self.tracker
            .complete(dataset)
            .await
            .map_err(|err| err.at_stage(PublishStage::Completed))?;
        self.drafts
            .mark_published(dataset, published_id, &identifier)
            .await
            .map_err(|err| err.at_stage(stage))?;

        Ok(PublishReceipt {
            dataset_id: dataset.clone(),
            published_id,
            identifier,
            container_id: container.clone(),
            files_copied: copied,
        })
    }

    async fn advance(&self, dataset: &DatasetId, stage: PublishStage) -> Result<(), PublishError> {
        self.tracker
            .advance(dataset, stage)
            .await
            .map_err(|err| err.at_stage(stage))
    }

    async fn check_metadata(
        &self,
        facet: MetadataFacet,
        draft: &DatasetDraft,
        stage: PublishStage,
    ) -> Result<(), PublishError> {
        if self.skip_metadata_validation {
            warn!(
                dataset = %draft.id,
                facet = %facet,
                "metadata validation skipped by operator override"
            );
            return Ok(());
        }
        let report = self.validator.validate(facet, draft).await;
        if report.is_pass() {
            return Ok(());
        }
        Err(PublishError::validation(stage, report.into_field_errors()))
    }
}
