//! End-to-end attempts against in-memory storage and registry fakes.

use datapress_model::{ContainerId, DatasetId, FileClass, PublishStage, UserId, Visibility};
use datapress_publish::{
    demo_draft, BaselineValidator, DraftRepository, LocalRegistrar, MemoryRegistry,
    PublishErrorCode, PublishedStore, Publisher, PublisherConfig, PublisherDeps,
};
use datapress_store::{MemoryStore, Namespace};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    publisher: Arc<Publisher>,
    store: Arc<MemoryStore>,
    registry: Arc<MemoryRegistry>,
    dataset: DatasetId,
    user: UserId,
}

async fn harness(config: PublisherConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(MemoryRegistry::new());
    let dataset = DatasetId::parse("ds-retina").expect("dataset id");
    let container = ContainerId::parse("draft-retina").expect("container id");
    let user = UserId::parse("alice").expect("user id");

    registry
        .put(&demo_draft(&dataset, &container, &user))
        .await
        .expect("seed draft");
    store.put_file(Namespace::Draft, &container, "a.csv", b"h1,h2\n1,2\n");
    store.put_directory(Namespace::Draft, &container, "b");
    store.put_file(Namespace::Draft, &container, "b/c.json", b"{\"k\":1}");
    store.put_file(Namespace::Draft, &container, "b/d.txt", b"notes");

    let publisher = Arc::new(Publisher::new(
        PublisherDeps {
            store: store.clone(),
            drafts: registry.clone(),
            status: registry.clone(),
            published: registry.clone(),
            validator: Arc::new(BaselineValidator::default()),
            registrar: Arc::new(LocalRegistrar::default()),
        },
        &config,
    ));
    Harness {
        publisher,
        store,
        registry,
        dataset,
        user,
    }
}

#[tokio::test]
async fn successful_attempt_migrates_files_and_registers_the_dataset() {
    let h = harness(PublisherConfig::default()).await;
    let receipt = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect("publish");

    assert_eq!(receipt.files_copied, 3);
    assert_eq!(
        receipt.identifier,
        format!("10.60775/dataset.{}", receipt.published_id)
    );

    // Three migrated files plus the five generated documents.
    assert_eq!(
        h.store.file_count(Namespace::Published, &receipt.container_id),
        8
    );
    assert_eq!(
        h.store
            .file_bytes(Namespace::Published, &receipt.container_id, "a.csv")
            .as_deref(),
        Some(b"h1,h2\n1,2\n".as_slice())
    );
    assert!(h
        .store
        .file_bytes(Namespace::Published, &receipt.container_id, "dataset_description.json")
        .is_some());

    let row = h
        .registry
        .get(receipt.published_id)
        .await
        .expect("row lookup")
        .expect("published row");
    assert_eq!(row.identifier, receipt.identifier);
    assert_eq!(row.visibility, Visibility::Public);
    assert_eq!(row.container_id, receipt.container_id);

    let labels: Vec<&str> = row.files.iter().map(|node| node.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "CHANGELOG.md",
            "README.md",
            "a.csv",
            "dataset_description.json",
            "healthsheet.md",
            "study_description.json",
            "b",
        ]
    );
    let a = &row.files[2];
    assert_eq!(a.classification, FileClass::Tabular);
    let b = row.files.last().expect("folder node");
    assert!(b.is_folder());
    assert!(b.collapsed);
    let children: Vec<&str> = b.children.iter().map(|node| node.label.as_str()).collect();
    assert_eq!(children, vec!["c.json", "d.txt"]);

    let status = h
        .publisher
        .status_of(&h.dataset)
        .await
        .expect("status")
        .expect("status row");
    assert_eq!(status.stage, PublishStage::Completed);
    assert_eq!(status.current_file_number, 0);
    assert_eq!(status.file_count, 0);
    assert_eq!(status.comment, "");

    let stamped = h.registry.draft(&h.dataset).expect("stamped draft");
    assert_eq!(stamped.published_id, Some(receipt.published_id));
    assert_eq!(stamped.published_identifier, receipt.identifier);
    assert_eq!(stamped.publication_status, "published");
}

#[tokio::test]
async fn validation_failure_stops_before_any_container_is_provisioned() {
    let h = harness(PublisherConfig::default()).await;
    let mut draft = h.registry.draft(&h.dataset).expect("seeded draft");
    draft.description = String::new();
    h.registry.put(&draft).await.expect("reseed");

    let err = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect_err("publish must fail");
    assert_eq!(err.code, PublishErrorCode::ValidationFailed);
    assert_eq!(err.stage, Some(PublishStage::ValidatingDatasetMetadata));
    assert!(err.field_errors.contains_key("description"));

    let status = h
        .publisher
        .status_of(&h.dataset)
        .await
        .expect("status")
        .expect("status row");
    assert_eq!(status.stage, PublishStage::ValidatingDatasetMetadata);
    assert!(h.store.containers_in(Namespace::Published).is_empty());
    assert_eq!(h.registry.published_count(), 0);
}

#[tokio::test]
async fn mid_copy_failure_leaves_the_orphan_container_and_progress_behind() {
    let h = harness(PublisherConfig::default()).await;
    h.store.fail_writes_matching("c.json");

    let err = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect_err("publish must fail");
    assert_eq!(err.code, PublishErrorCode::StorageUnreachable);
    assert_eq!(
        err.stage,
        Some(PublishStage::MovingDatasetToPublishedStorage)
    );

    let status = h
        .publisher
        .status_of(&h.dataset)
        .await
        .expect("status")
        .expect("status row");
    assert_eq!(status.stage, PublishStage::MovingDatasetToPublishedStorage);
    assert_eq!(status.current_file_number, 1);
    assert_eq!(status.file_count, 3);
    assert_eq!(status.comment, "Copied 1 of 3 files");

    assert_eq!(h.registry.published_count(), 0);
    let orphans = h.store.containers_in(Namespace::Published);
    assert_eq!(orphans.len(), 1);
    assert_eq!(h.store.file_count(Namespace::Published, &orphans[0]), 1);
}

#[tokio::test]
async fn retry_after_a_failure_provisions_a_fresh_container() {
    let h = harness(PublisherConfig::default()).await;
    h.store.fail_writes_matching("c.json");
    h.publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect_err("first attempt must fail");
    let orphan = h.store.containers_in(Namespace::Published)[0].clone();

    h.store.clear_failures();
    let receipt = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect("retry");
    assert_ne!(receipt.container_id, orphan);
    // The orphan is an operator concern; the retry never touches it.
    assert_eq!(h.store.file_count(Namespace::Published, &orphan), 1);
    assert_eq!(
        h.store.file_count(Namespace::Published, &receipt.container_id),
        8
    );

    let status = h
        .publisher
        .status_of(&h.dataset)
        .await
        .expect("status")
        .expect("status row");
    assert_eq!(status.stage, PublishStage::Completed);
}

#[tokio::test]
async fn republishing_mints_a_new_container_and_row_each_time() {
    let h = harness(PublisherConfig::default()).await;
    let first = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect("first publish");
    let second = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect("second publish");

    assert_ne!(first.container_id, second.container_id);
    assert_ne!(first.published_id, second.published_id);
    assert_eq!(h.registry.published_count(), 2);
    assert!(h.store.container_exists(Namespace::Published, &first.container_id));
    assert!(h.store.container_exists(Namespace::Published, &second.container_id));
}

#[tokio::test]
async fn unknown_datasets_and_non_members_read_as_not_found() {
    let h = harness(PublisherConfig::default()).await;

    let missing = DatasetId::parse("ds-missing").expect("dataset id");
    let err = h
        .publisher
        .start_publish(&missing, &h.user)
        .await
        .expect_err("missing dataset");
    assert_eq!(err.code, PublishErrorCode::NotFound);

    let outsider = UserId::parse("mallory").expect("user id");
    let err = h
        .publisher
        .start_publish(&h.dataset, &outsider)
        .await
        .expect_err("non-member");
    assert_eq!(err.code, PublishErrorCode::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_attempt_for_the_same_dataset_is_refused() {
    let h = harness(PublisherConfig::default()).await;
    h.store.set_read_delay_ms(100);

    let first = tokio::spawn({
        let publisher = h.publisher.clone();
        let dataset = h.dataset.clone();
        let user = h.user.clone();
        async move { publisher.start_publish(&dataset, &user).await }
    });
    tokio::time::sleep(Duration::from_millis(25)).await;

    let err = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect_err("second attempt must be refused");
    assert_eq!(err.code, PublishErrorCode::AttemptInProgress);

    let receipt = first.await.expect("join").expect("first publish");
    assert_eq!(receipt.files_copied, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn attempt_capacity_applies_across_datasets() {
    let config = PublisherConfig {
        max_concurrent_attempts: 1,
        ..PublisherConfig::default()
    };
    let h = harness(config).await;
    let other_dataset = DatasetId::parse("ds-other").expect("dataset id");
    let other_container = ContainerId::parse("draft-other").expect("container id");
    h.registry
        .put(&demo_draft(&other_dataset, &other_container, &h.user))
        .await
        .expect("seed second draft");
    h.store
        .put_file(Namespace::Draft, &other_container, "only.csv", b"x\n1\n");
    h.store.set_read_delay_ms(100);

    let first = tokio::spawn({
        let publisher = h.publisher.clone();
        let dataset = h.dataset.clone();
        let user = h.user.clone();
        async move { publisher.start_publish(&dataset, &user).await }
    });
    tokio::time::sleep(Duration::from_millis(25)).await;

    let err = h
        .publisher
        .start_publish(&other_dataset, &h.user)
        .await
        .expect_err("capacity must be exhausted");
    assert_eq!(err.code, PublishErrorCode::AttemptInProgress);

    first.await.expect("join").expect("first publish");
    h.store.set_read_delay_ms(0);
    h.publisher
        .start_publish(&other_dataset, &h.user)
        .await
        .expect("second dataset publishes once capacity frees");
}

#[tokio::test]
async fn validation_override_publishes_a_known_bad_draft() {
    let config = PublisherConfig {
        skip_metadata_validation: true,
        ..PublisherConfig::default()
    };
    let h = harness(config).await;
    let mut draft = h.registry.draft(&h.dataset).expect("seeded draft");
    draft.description = String::new();
    h.registry.put(&draft).await.expect("reseed");

    let receipt = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect("override publish");
    assert_eq!(receipt.files_copied, 3);
}

#[tokio::test]
async fn dropped_progress_writes_do_not_fail_the_attempt() {
    let h = harness(PublisherConfig::default()).await;
    h.registry.fail_progress_writes(true);

    let receipt = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect("publish");
    assert_eq!(receipt.files_copied, 3);

    let status = h
        .publisher
        .status_of(&h.dataset)
        .await
        .expect("status")
        .expect("status row");
    assert_eq!(status.stage, PublishStage::Completed);
}

#[tokio::test]
async fn stage_write_failure_is_fatal_and_persists_as_an_error() {
    let h = harness(PublisherConfig::default()).await;
    h.registry.fail_stage_writes(true);

    let err = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect_err("stage writes are fatal");
    assert_eq!(err.code, PublishErrorCode::PersistenceFailure);
    // The very first write, the reset to `preparing`, is already refused.
    assert_eq!(err.stage, Some(PublishStage::Preparing));
    assert!(h.store.containers_in(Namespace::Published).is_empty());
}

#[tokio::test]
async fn row_insert_failure_orphans_the_container_and_registers_nothing() {
    let h = harness(PublisherConfig::default()).await;
    h.registry.fail_published_insert(true);

    let err = h
        .publisher
        .start_publish(&h.dataset, &h.user)
        .await
        .expect_err("insert must fail");
    assert_eq!(err.code, PublishErrorCode::PersistenceFailure);
    assert_eq!(err.stage, Some(PublishStage::RegisteringDataset));

    assert_eq!(h.registry.published_count(), 0);
    let orphans = h.store.containers_in(Namespace::Published);
    assert_eq!(orphans.len(), 1);
    // All files landed before the row insert was attempted.
    assert_eq!(h.store.file_count(Namespace::Published, &orphans[0]), 8);
    let stamped = h.registry.draft(&h.dataset).expect("draft");
    assert_eq!(stamped.published_id, None);
}

#[tokio::test]
async fn empty_draft_container_publishes_documents_only() {
    let h = harness(PublisherConfig::default()).await;
    let dataset = DatasetId::parse("ds-empty").expect("dataset id");
    let container = ContainerId::parse("draft-empty").expect("container id");
    h.registry
        .put(&demo_draft(&dataset, &container, &h.user))
        .await
        .expect("seed draft");
    h.store.put_directory(Namespace::Draft, &container, "placeholder");

    let receipt = h
        .publisher
        .start_publish(&dataset, &h.user)
        .await
        .expect("publish");
    assert_eq!(receipt.files_copied, 0);
    assert_eq!(
        h.store.file_count(Namespace::Published, &receipt.container_id),
        5
    );
    let row = h
        .registry
        .get(receipt.published_id)
        .await
        .expect("row lookup")
        .expect("published row");
    assert_eq!(row.files.len(), 5);
    assert!(row.files.iter().all(|node| !node.is_folder()));
}
