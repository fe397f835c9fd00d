// SPDX-License-Identifier: Apache-2.0
use crate::error::PublishError;
use crate::registry::{DraftRepository, NewPublishedRecord, PublishedStore, StatusStore};
use async_trait::async_trait;
use datapress_core::unix_now_secs;
use datapress_model::{
    ContainerId, DatasetDraft, DatasetId, FileNode, MetadataBundle, PublishStage, PublishedDataset,
    PublishingStatus, UserId, Visibility,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

pub const SQLITE_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed registry serving all three persistence seams behind one
/// connection. Calls hop to the blocking pool; the mutex keeps statement
/// execution serial, which is all the publish path needs.
#[derive(Clone)]
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    pub fn open(path: &Path) -> Result<Self, PublishError> {
        let conn = Connection::open(path)
            .map_err(|err| PublishError::persistence(format!("open {}: {err}", path.display())))?;
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> Result<Self, PublishError> {
        let conn = Connection::open_in_memory()
            .map_err(|err| PublishError::persistence(format!("open in-memory: {err}")))?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Self, PublishError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
            CREATE TABLE IF NOT EXISTS drafts (
              dataset_id TEXT PRIMARY KEY,
              payload TEXT NOT NULL
            ) WITHOUT ROWID;
            CREATE TABLE IF NOT EXISTS publishing_status (
              dataset_id TEXT PRIMARY KEY,
              stage TEXT NOT NULL,
              comment TEXT NOT NULL DEFAULT '',
              current_file_number INTEGER NOT NULL DEFAULT 0,
              file_count INTEGER NOT NULL DEFAULT 0,
              updated_at INTEGER NOT NULL
            ) WITHOUT ROWID;
            CREATE TABLE IF NOT EXISTS published_datasets (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              dataset_id TEXT NOT NULL,
              canonical_id TEXT NOT NULL,
              container_id TEXT NOT NULL,
              version_title TEXT NOT NULL,
              files_json TEXT NOT NULL,
              bundle_json TEXT NOT NULL,
              identifier TEXT NOT NULL,
              visibility TEXT NOT NULL,
              created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_published_by_dataset
              ON published_datasets (dataset_id);
            ",
        )
        .map_err(sql_err)?;
        conn.execute_batch(&format!("PRAGMA user_version={SQLITE_SCHEMA_VERSION};"))
            .map_err(sql_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T, PublishError>
    where
        F: FnOnce(&mut Connection) -> Result<T, PublishError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut guard)
        })
        .await
        .map_err(|err| PublishError::persistence(format!("registry worker failed: {err}")))?
    }
}

fn sql_err(err: rusqlite::Error) -> PublishError {
    PublishError::persistence(format!("sqlite: {err}"))
}

fn json_err(what: &str, err: serde_json::Error) -> PublishError {
    PublishError::persistence(format!("{what} is not valid JSON: {err}"))
}

fn read_status(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, i64, i64, i64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

#[async_trait]
impl DraftRepository for SqliteRegistry {
    async fn fetch(
        &self,
        dataset: &DatasetId,
        user: &UserId,
    ) -> Result<Option<DatasetDraft>, PublishError> {
        let dataset = dataset.clone();
        let user = user.clone();
        self.with_conn(move |conn| {
            let payload: Option<String> = conn
                .query_row(
                    "SELECT payload FROM drafts WHERE dataset_id = ?1",
                    params![dataset.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err)?;
            let Some(payload) = payload else {
                return Ok(None);
            };
            let draft: DatasetDraft =
                serde_json::from_str(&payload).map_err(|err| json_err("draft payload", err))?;
            Ok(Some(draft).filter(|draft| draft.has_member(&user)))
        })
        .await
    }

    async fn mark_published(
        &self,
        dataset: &DatasetId,
        published_id: i64,
        identifier: &str,
    ) -> Result<(), PublishError> {
        let dataset = dataset.clone();
        let identifier = identifier.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(sql_err)?;
            let payload: Option<String> = tx
                .query_row(
                    "SELECT payload FROM drafts WHERE dataset_id = ?1",
                    params![dataset.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(sql_err)?;
            let Some(payload) = payload else {
                return Err(PublishError::persistence(format!(
                    "draft `{dataset}` vanished before stamping"
                )));
            };
            let mut draft: DatasetDraft =
                serde_json::from_str(&payload).map_err(|err| json_err("draft payload", err))?;
            draft.published_id = Some(published_id);
            draft.published_identifier = identifier;
            draft.publication_status = "published".to_string();
            let payload = serde_json::to_string(&draft)
                .map_err(|err| json_err("stamped draft", err))?;
            tx.execute(
                "UPDATE drafts SET payload = ?2 WHERE dataset_id = ?1",
                params![dataset.as_str(), payload],
            )
            .map_err(sql_err)?;
            tx.commit().map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn put(&self, draft: &DatasetDraft) -> Result<(), PublishError> {
        let dataset = draft.id.clone();
        let payload =
            serde_json::to_string(draft).map_err(|err| json_err("draft payload", err))?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO drafts (dataset_id, payload) VALUES (?1, ?2)
                 ON CONFLICT(dataset_id) DO UPDATE SET payload = excluded.payload",
                params![dataset.as_str(), payload],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl StatusStore for SqliteRegistry {
    async fn reset(&self, dataset: &DatasetId) -> Result<(), PublishError> {
        let dataset = dataset.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO publishing_status
                   (dataset_id, stage, comment, current_file_number, file_count, updated_at)
                 VALUES (?1, ?2, '', 0, 0, ?3)
                 ON CONFLICT(dataset_id) DO UPDATE SET
                   stage = excluded.stage,
                   comment = '',
                   current_file_number = 0,
                   file_count = 0,
                   updated_at = excluded.updated_at",
                params![
                    dataset.as_str(),
                    PublishStage::Preparing.as_str(),
                    unix_now_secs() as i64
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn set_stage(&self, dataset: &DatasetId, stage: PublishStage) -> Result<(), PublishError> {
        let dataset = dataset.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO publishing_status
                   (dataset_id, stage, comment, current_file_number, file_count, updated_at)
                 VALUES (?1, ?2, '', 0, 0, ?3)
                 ON CONFLICT(dataset_id) DO UPDATE SET
                   stage = excluded.stage,
                   updated_at = excluded.updated_at",
                params![dataset.as_str(), stage.as_str(), unix_now_secs() as i64],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn set_progress(
        &self,
        dataset: &DatasetId,
        current: u64,
        total: u64,
    ) -> Result<(), PublishError> {
        let dataset = dataset.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO publishing_status
                   (dataset_id, stage, comment, current_file_number, file_count, updated_at)
                 VALUES (?1, ?2, '', ?3, ?4, ?5)
                 ON CONFLICT(dataset_id) DO UPDATE SET
                   current_file_number = excluded.current_file_number,
                   file_count = excluded.file_count,
                   updated_at = excluded.updated_at",
                params![
                    dataset.as_str(),
                    PublishStage::Preparing.as_str(),
                    current as i64,
                    total as i64,
                    unix_now_secs() as i64
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn set_comment(&self, dataset: &DatasetId, comment: &str) -> Result<(), PublishError> {
        let dataset = dataset.clone();
        let comment = comment.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO publishing_status
                   (dataset_id, stage, comment, current_file_number, file_count, updated_at)
                 VALUES (?1, ?2, ?3, 0, 0, ?4)
                 ON CONFLICT(dataset_id) DO UPDATE SET
                   comment = excluded.comment,
                   updated_at = excluded.updated_at",
                params![
                    dataset.as_str(),
                    PublishStage::Preparing.as_str(),
                    comment,
                    unix_now_secs() as i64
                ],
            )
            .map_err(sql_err)?;
            Ok(())
        })
        .await
    }

    async fn get(&self, dataset: &DatasetId) -> Result<Option<PublishingStatus>, PublishError> {
        let dataset = dataset.clone();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT dataset_id, stage, comment, current_file_number, file_count, updated_at
                     FROM publishing_status WHERE dataset_id = ?1",
                    params![dataset.as_str()],
                    read_status,
                )
                .optional()
                .map_err(sql_err)?;
            let Some((dataset_id, stage, comment, current, total, updated_at)) = row else {
                return Ok(None);
            };
            let dataset_id = DatasetId::parse(&dataset_id)
                .map_err(|err| PublishError::persistence(format!("status row: {err}")))?;
            let stage = PublishStage::parse(&stage)
                .map_err(|err| PublishError::persistence(format!("status row: {err}")))?;
            Ok(Some(PublishingStatus {
                dataset_id,
                stage,
                comment,
                current_file_number: current as u64,
                file_count: total as u64,
                updated_at,
            }))
        })
        .await
    }
}

#[async_trait]
impl PublishedStore for SqliteRegistry {
    async fn insert(&self, record: &NewPublishedRecord) -> Result<i64, PublishError> {
        let files_json =
            serde_json::to_string(&record.files).map_err(|err| json_err("file tree", err))?;
        let bundle_json =
            serde_json::to_string(&record.bundle).map_err(|err| json_err("bundle", err))?;
        let dataset = record.dataset_id.clone();
        let canonical = record.canonical_id.clone();
        let container = record.container_id.clone();
        let version_title = record.version_title.clone();
        let identifier = record.identifier.clone();
        let visibility = record.visibility;
        let created_at = record.created_at;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO published_datasets
                   (dataset_id, canonical_id, container_id, version_title,
                    files_json, bundle_json, identifier, visibility, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    dataset.as_str(),
                    canonical,
                    container.as_str(),
                    version_title,
                    files_json,
                    bundle_json,
                    identifier,
                    visibility.as_str(),
                    created_at
                ],
            )
            .map_err(sql_err)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn set_identifier(&self, id: i64, identifier: &str) -> Result<(), PublishError> {
        let identifier = identifier.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE published_datasets SET identifier = ?2 WHERE id = ?1",
                    params![id, identifier],
                )
                .map_err(sql_err)?;
            if changed == 0 {
                return Err(PublishError::persistence(format!(
                    "published row {id} is missing"
                )));
            }
            Ok(())
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<PublishedDataset>, PublishError> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT dataset_id, canonical_id, container_id, version_title,
                            files_json, bundle_json, identifier, visibility, created_at
                     FROM published_datasets WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, String>(7)?,
                            row.get::<_, i64>(8)?,
                        ))
                    },
                )
                .optional()
                .map_err(sql_err)?;
            let Some((
                dataset_id,
                canonical_id,
                container_id,
                version_title,
                files_json,
                bundle_json,
                identifier,
                visibility,
                created_at,
            )) = row
            else {
                return Ok(None);
            };
            let bad_row =
                |err: String| PublishError::persistence(format!("published row {id}: {err}"));
            let files: Vec<FileNode> =
                serde_json::from_str(&files_json).map_err(|err| json_err("file tree", err))?;
            let bundle: MetadataBundle =
                serde_json::from_str(&bundle_json).map_err(|err| json_err("bundle", err))?;
            Ok(Some(PublishedDataset {
                id,
                dataset_id: DatasetId::parse(&dataset_id).map_err(|err| bad_row(err.0))?,
                canonical_id,
                container_id: ContainerId::parse(&container_id).map_err(|err| bad_row(err.0))?,
                version_title,
                files,
                bundle,
                identifier,
                visibility: Visibility::parse(&visibility).map_err(|err| bad_row(err.0))?,
                created_at,
            }))
        })
        .await
    }

    async fn count_for_dataset(&self, dataset: &DatasetId) -> Result<u64, PublishError> {
        let dataset = dataset.clone();
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM published_datasets WHERE dataset_id = ?1",
                    params![dataset.as_str()],
                    |row| row.get(0),
                )
                .map_err(sql_err)?;
            Ok(count as u64)
        })
        .await
    }
}
