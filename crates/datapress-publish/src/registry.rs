// SPDX-License-Identifier: Apache-2.0
//! Persistence seams for the pipeline, plus the in-memory double used by
//! tests and the demo tooling.

use crate::error::PublishError;
use async_trait::async_trait;
use datapress_core::unix_now_secs;
use datapress_model::{
    ContainerId, DatasetDraft, DatasetId, FileNode, MetadataBundle, PublishStage,
    PublishedDataset, PublishingStatus, UserId, Visibility,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Draft-side persistence. `fetch` applies the membership check; an absent
/// dataset and a non-member requester are indistinguishable, both come
/// back `None`.
#[async_trait]
pub trait DraftRepository: Send + Sync {
    async fn fetch(
        &self,
        dataset: &DatasetId,
        user: &UserId,
    ) -> Result<Option<DatasetDraft>, PublishError>;

    /// Stamps the draft with the outcome of a successful attempt.
    async fn mark_published(
        &self,
        dataset: &DatasetId,
        published_id: i64,
        identifier: &str,
    ) -> Result<(), PublishError>;

    /// Inserts or replaces a draft. Used by the editing surface and demo
    /// seeding, never by an attempt.
    async fn put(&self, draft: &DatasetDraft) -> Result<(), PublishError>;
}

/// One status row per dataset, overwritten in place. There is no attempt
/// history.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Rewrites the row to the fresh `preparing` shape.
    async fn reset(&self, dataset: &DatasetId) -> Result<(), PublishError>;
    async fn set_stage(&self, dataset: &DatasetId, stage: PublishStage) -> Result<(), PublishError>;
    async fn set_progress(
        &self,
        dataset: &DatasetId,
        current: u64,
        total: u64,
    ) -> Result<(), PublishError>;
    async fn set_comment(&self, dataset: &DatasetId, comment: &str) -> Result<(), PublishError>;
    async fn get(&self, dataset: &DatasetId) -> Result<Option<PublishingStatus>, PublishError>;
}

/// Row content for a new published version; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewPublishedRecord {
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

/// Published-side registry.
#[async_trait]
pub trait PublishedStore: Send + Sync {
    async fn insert(&self, record: &NewPublishedRecord) -> Result<i64, PublishError>;
    async fn set_identifier(&self, id: i64, identifier: &str) -> Result<(), PublishError>;
    async fn get(&self, id: i64) -> Result<Option<PublishedDataset>, PublishError>;
    async fn count_for_dataset(&self, dataset: &DatasetId) -> Result<u64, PublishError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory implementation of all three persistence seams, with failure
/// injection for exercising attempt behavior under write refusal.
#[derive(Default)]
pub struct MemoryRegistry {
    drafts: Mutex<HashMap<DatasetId, DatasetDraft>>,
    statuses: Mutex<HashMap<DatasetId, PublishingStatus>>,
    published: Mutex<BTreeMap<i64, PublishedDataset>>,
    next_published_id: AtomicI64,
    fail_progress_writes: AtomicBool,
    fail_stage_writes: AtomicBool,
    fail_published_insert: AtomicBool,
    fail_identifier_update: AtomicBool,
}

impl MemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cosmetic status writes (progress and comment) start failing.
    pub fn fail_progress_writes(&self, on: bool) {
        self.fail_progress_writes.store(on, Ordering::Relaxed);
    }

    /// Stage transitions start failing; these are fatal to an attempt.
    pub fn fail_stage_writes(&self, on: bool) {
        self.fail_stage_writes.store(on, Ordering::Relaxed);
    }

    pub fn fail_published_insert(&self, on: bool) {
        self.fail_published_insert.store(on, Ordering::Relaxed);
    }

    pub fn fail_identifier_update(&self, on: bool) {
        self.fail_identifier_update.store(on, Ordering::Relaxed);
    }

    #[must_use]
    pub fn published_count(&self) -> usize {
        lock(&self.published).len()
    }

    #[must_use]
    pub fn published_rows(&self) -> Vec<PublishedDataset> {
        lock(&self.published).values().cloned().collect()
    }

    #[must_use]
    pub fn draft(&self, dataset: &DatasetId) -> Option<DatasetDraft> {
        lock(&self.drafts).get(dataset).cloned()
    }
}

#[async_trait]
impl DraftRepository for MemoryRegistry {
    async fn fetch(
        &self,
        dataset: &DatasetId,
        user: &UserId,
    ) -> Result<Option<DatasetDraft>, PublishError> {
        let drafts = lock(&self.drafts);
        Ok(drafts
            .get(dataset)
            .filter(|draft| draft.has_member(user))
            .cloned())
    }

    async fn mark_published(
        &self,
        dataset: &DatasetId,
        published_id: i64,
        identifier: &str,
    ) -> Result<(), PublishError> {
        let mut drafts = lock(&self.drafts);
        let draft = drafts.get_mut(dataset).ok_or_else(|| {
            PublishError::persistence(format!("draft `{dataset}` vanished before stamping"))
        })?;
        draft.published_id = Some(published_id);
        draft.published_identifier = identifier.to_string();
        draft.publication_status = "published".to_string();
        Ok(())
    }

    async fn put(&self, draft: &DatasetDraft) -> Result<(), PublishError> {
        lock(&self.drafts).insert(draft.id.clone(), draft.clone());
        Ok(())
    }
}

#[async_trait]
impl StatusStore for MemoryRegistry {
    async fn reset(&self, dataset: &DatasetId) -> Result<(), PublishError> {
        if self.fail_stage_writes.load(Ordering::Relaxed) {
            return Err(PublishError::persistence("injected status reset failure"));
        }
        let now = unix_now_secs() as i64;
        lock(&self.statuses).insert(dataset.clone(), PublishingStatus::fresh(dataset.clone(), now));
        Ok(())
    }

    async fn set_stage(&self, dataset: &DatasetId, stage: PublishStage) -> Result<(), PublishError> {
        if self.fail_stage_writes.load(Ordering::Relaxed) {
            return Err(PublishError::persistence("injected stage write failure"));
        }
        let now = unix_now_secs() as i64;
        let mut statuses = lock(&self.statuses);
        let record = statuses
            .entry(dataset.clone())
            .or_insert_with(|| PublishingStatus::fresh(dataset.clone(), now));
        record.stage = stage;
        record.updated_at = now;
        Ok(())
    }

    async fn set_progress(
        &self,
        dataset: &DatasetId,
        current: u64,
        total: u64,
    ) -> Result<(), PublishError> {
        if self.fail_progress_writes.load(Ordering::Relaxed) {
            return Err(PublishError::persistence("injected progress write failure"));
        }
        let now = unix_now_secs() as i64;
        let mut statuses = lock(&self.statuses);
        let record = statuses
            .entry(dataset.clone())
            .or_insert_with(|| PublishingStatus::fresh(dataset.clone(), now));
        record.current_file_number = current;
        record.file_count = total;
        record.updated_at = now;
        Ok(())
    }

    async fn set_comment(&self, dataset: &DatasetId, comment: &str) -> Result<(), PublishError> {
        if self.fail_progress_writes.load(Ordering::Relaxed) {
            return Err(PublishError::persistence("injected comment write failure"));
        }
        let now = unix_now_secs() as i64;
        let mut statuses = lock(&self.statuses);
        let record = statuses
            .entry(dataset.clone())
            .or_insert_with(|| PublishingStatus::fresh(dataset.clone(), now));
        record.comment = comment.to_string();
        record.updated_at = now;
        Ok(())
    }

    async fn get(&self, dataset: &DatasetId) -> Result<Option<PublishingStatus>, PublishError> {
        Ok(lock(&self.statuses).get(dataset).cloned())
    }
}

#[async_trait]
impl PublishedStore for MemoryRegistry {
    async fn insert(&self, record: &NewPublishedRecord) -> Result<i64, PublishError> {
        if self.fail_published_insert.load(Ordering::Relaxed) {
            return Err(PublishError::persistence("injected published insert failure"));
        }
        let id = self.next_published_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.published).insert(
            id,
            PublishedDataset {
                id,
                dataset_id: record.dataset_id.clone(),
                canonical_id: record.canonical_id.clone(),
                container_id: record.container_id.clone(),
                version_title: record.version_title.clone(),
                files: record.files.clone(),
                bundle: record.bundle.clone(),
                identifier: record.identifier.clone(),
                visibility: record.visibility,
                created_at: record.created_at,
            },
        );
        Ok(id)
    }

    async fn set_identifier(&self, id: i64, identifier: &str) -> Result<(), PublishError> {
        if self.fail_identifier_update.load(Ordering::Relaxed) {
            return Err(PublishError::persistence("injected identifier update failure"));
        }
        let mut published = lock(&self.published);
        let row = published.get_mut(&id).ok_or_else(|| {
            PublishError::persistence(format!("published row {id} not found"))
        })?;
        row.identifier = identifier.to_string();
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<PublishedDataset>, PublishError> {
        Ok(lock(&self.published).get(&id).cloned())
    }

    async fn count_for_dataset(&self, dataset: &DatasetId) -> Result<u64, PublishError> {
        Ok(lock(&self.published)
            .values()
            .filter(|row| &row.dataset_id == dataset)
            .count() as u64)
    }
}
