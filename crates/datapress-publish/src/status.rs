//! Status tracker: the write discipline over the status store. An attempt
//! that cannot record which stage it is in must stop, so `start_attempt`,
//! `advance` and `complete` propagate failure. Progress counters and the
//! comment are cosmetic; a refused write there is logged and dropped.

use crate::error::PublishError;
use crate::registry::StatusStore;
use datapress_model::{DatasetId, PublishStage, PublishingStatus};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<dyn StatusStore>,
}

impl StatusTracker {
    #[must_use]
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Create-or-reset to the fresh `preparing` shape. Idempotent.
    pub async fn start_attempt(&self, dataset: &DatasetId) -> Result<(), PublishError> {
        self.store.reset(dataset).await
    }

    /// Records entry into a stage. The tracker does not enforce ordering;
    /// callers advance strictly forward within one attempt.
    pub async fn advance(
        &self,
        dataset: &DatasetId,
        stage: PublishStage,
    ) -> Result<(), PublishError> {
        self.store.set_stage(dataset, stage).await
    }

    pub async fn progress(&self, dataset: &DatasetId, current: u64, total: u64) {
        if let Err(err) = self.store.set_progress(dataset, current, total).await {
            warn!(dataset = %dataset, current, total, error = %err, "progress update dropped");
        }
    }

    pub async fn comment(&self, dataset: &DatasetId, comment: &str) {
        if let Err(err) = self.store.set_comment(dataset, comment).await {
            warn!(dataset = %dataset, comment, error = %err, "comment update dropped");
        }
    }

    /// Marks the terminal stage and clears the transient fields.
    pub async fn complete(&self, dataset: &DatasetId) -> Result<(), PublishError> {
        self.store.set_stage(dataset, PublishStage::Completed).await?;
        if let Err(err) = self.store.set_progress(dataset, 0, 0).await {
            warn!(dataset = %dataset, error = %err, "progress clear dropped");
        }
        if let Err(err) = self.store.set_comment(dataset, "").await {
            warn!(dataset = %dataset, error = %err, "comment clear dropped");
        }
        Ok(())
    }

    pub async fn current(
        &self,
        dataset: &DatasetId,
    ) -> Result<Option<PublishingStatus>, PublishError> {
        self.store.get(dataset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    fn tracker() -> (Arc<MemoryRegistry>, StatusTracker) {
        let registry = Arc::new(MemoryRegistry::new());
        let tracker = StatusTracker::new(Arc::clone(&registry) as Arc<dyn StatusStore>);
        (registry, tracker)
    }

    #[tokio::test]
    async fn cosmetic_write_failures_do_not_surface() {
        let (registry, tracker) = tracker();
        let id = DatasetId::parse("ds-1").expect("id");
        tracker.start_attempt(&id).await.expect("start");
        registry.fail_progress_writes(true);
        // Neither call returns an error path to observe; both must simply
        // not panic and leave the stored record untouched.
        tracker.progress(&id, 1, 3).await;
        tracker.comment(&id, "Copied 1 of 3 files").await;
        let status = tracker.current(&id).await.expect("get").expect("present");
        assert_eq!(status.current_file_number, 0);
        assert_eq!(status.comment, "");
    }

    #[tokio::test]
    async fn stage_write_failures_are_fatal() {
        let (registry, tracker) = tracker();
        let id = DatasetId::parse("ds-1").expect("id");
        registry.fail_stage_writes(true);
        assert!(tracker.start_attempt(&id).await.is_err());
        assert!(tracker.advance(&id, PublishStage::IndexingDataset).await.is_err());
        assert!(tracker.complete(&id).await.is_err());
    }

    #[tokio::test]
    async fn complete_clears_counters_and_comment() {
        let (_registry, tracker) = tracker();
        let id = DatasetId::parse("ds-1").expect("id");
        tracker.start_attempt(&id).await.expect("start");
        tracker.progress(&id, 9, 9).await;
        tracker.comment(&id, "Copied 9 of 9 files").await;
        tracker.complete(&id).await.expect("complete");
        let status = tracker.current(&id).await.expect("get").expect("present");
        assert_eq!(status.stage, PublishStage::Completed);
        assert_eq!(status.current_file_number, 0);
        assert_eq!(status.file_count, 0);
        assert_eq!(status.comment, "");
    }
}
