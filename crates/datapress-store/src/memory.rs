// SPDX-License-Identifier: Apache-2.0
//! In-memory store double with failure injection. Not a production
//! backend; it exists so pipeline behavior under storage failure is
//! testable without a blob service.

use crate::{validate_rel_path, Namespace, ObjectStore, StoreError};
use async_trait::async_trait;
use datapress_model::{ContainerId, ObjectEntry};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct Container {
    files: BTreeMap<String, Vec<u8>>,
    directories: BTreeSet<String>,
}

type ContainerMap = HashMap<(Namespace, ContainerId), Container>;

#[derive(Default)]
pub struct MemoryStore {
    containers: Mutex<ContainerMap>,
    fail_writes: Mutex<Option<String>>,
    fail_reads: Mutex<Option<String>>,
    read_delay_ms: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ContainerMap> {
        self.containers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn knob<'a>(&self, knob: &'a Mutex<Option<String>>) -> MutexGuard<'a, Option<String>> {
        knob.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `create_file` and `write_file` fail for any path containing
    /// `needle`.
    pub fn fail_writes_matching(&self, needle: &str) {
        *self.knob(&self.fail_writes) = Some(needle.to_string());
    }

    /// Makes `read_file` fail for any path containing `needle`.
    pub fn fail_reads_matching(&self, needle: &str) {
        *self.knob(&self.fail_reads) = Some(needle.to_string());
    }

    pub fn clear_failures(&self) {
        *self.knob(&self.fail_writes) = None;
        *self.knob(&self.fail_reads) = None;
    }

    /// Stalls every `read_file` call; used to hold a publish attempt open
    /// while another request races it.
    pub fn set_read_delay_ms(&self, ms: u64) {
        self.read_delay_ms.store(ms, Ordering::Relaxed);
    }

    /// Seeds a file, creating the container on demand.
    pub fn put_file(&self, ns: Namespace, container: &ContainerId, path: &str, bytes: &[u8]) {
        self.state()
            .entry((ns, container.clone()))
            .or_default()
            .files
            .insert(path.to_string(), bytes.to_vec());
    }

    /// Seeds a bare directory entry, creating the container on demand.
    pub fn put_directory(&self, ns: Namespace, container: &ContainerId, path: &str) {
        self.state()
            .entry((ns, container.clone()))
            .or_default()
            .directories
            .insert(path.to_string());
    }

    #[must_use]
    pub fn container_exists(&self, ns: Namespace, container: &ContainerId) -> bool {
        self.state().contains_key(&(ns, container.clone()))
    }

    #[must_use]
    pub fn containers_in(&self, ns: Namespace) -> Vec<ContainerId> {
        let state = self.state();
        let mut ids: Vec<ContainerId> = state
            .keys()
            .filter(|(key_ns, _)| *key_ns == ns)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn file_count(&self, ns: Namespace, container: &ContainerId) -> usize {
        self.state()
            .get(&(ns, container.clone()))
            .map_or(0, |c| c.files.len())
    }

    #[must_use]
    pub fn file_bytes(&self, ns: Namespace, container: &ContainerId, path: &str) -> Option<Vec<u8>> {
        self.state()
            .get(&(ns, container.clone()))
            .and_then(|c| c.files.get(path).cloned())
    }

    #[must_use]
    pub fn read_calls(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn write_blocked(&self, path: &str) -> bool {
        self.knob(&self.fail_writes)
            .as_deref()
            .is_some_and(|needle| path.contains(needle))
    }

    fn read_blocked(&self, path: &str) -> bool {
        self.knob(&self.fail_reads)
            .as_deref()
            .is_some_and(|needle| path.contains(needle))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create_container(
        &self,
        ns: Namespace,
        container: &ContainerId,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let key = (ns, container.clone());
        if state.contains_key(&key) {
            return Err(StoreError::already_exists(format!(
                "container `{container}` already exists"
            )));
        }
        state.insert(key, Container::default());
        Ok(())
    }

    async fn list_all_paths(
        &self,
        ns: Namespace,
        container: &ContainerId,
    ) -> Result<Vec<ObjectEntry>, StoreError> {
        let state = self.state();
        let Some(found) = state.get(&(ns, container.clone())) else {
            return Err(StoreError::not_found(format!(
                "container `{container}` not found"
            )));
        };
        let mut entries: Vec<ObjectEntry> = found
            .directories
            .iter()
            .map(ObjectEntry::directory)
            .chain(found.files.keys().map(ObjectEntry::file))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn read_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<Vec<u8>, StoreError> {
        validate_rel_path(path)?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        let delay = self.read_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.read_blocked(path) {
            return Err(StoreError::unreachable(format!(
                "injected read failure for `{path}`"
            )));
        }
        let state = self.state();
        let Some(found) = state.get(&(ns, container.clone())) else {
            return Err(StoreError::not_found(format!(
                "container `{container}` not found"
            )));
        };
        found.files.get(path).cloned().ok_or_else(|| {
            StoreError::not_found(format!("object `{path}` not found"))
        })
    }

    async fn create_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<(), StoreError> {
        validate_rel_path(path)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.write_blocked(path) {
            return Err(StoreError::unreachable(format!(
                "injected create failure for `{path}`"
            )));
        }
        let mut state = self.state();
        let Some(found) = state.get_mut(&(ns, container.clone())) else {
            return Err(StoreError::not_found(format!(
                "container `{container}` not found"
            )));
        };
        found.files.insert(path.to_string(), Vec::new());
        Ok(())
    }

    async fn write_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        validate_rel_path(path)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.write_blocked(path) {
            return Err(StoreError::unreachable(format!(
                "injected write failure for `{path}`"
            )));
        }
        let mut state = self.state();
        let Some(found) = state.get_mut(&(ns, container.clone())) else {
            return Err(StoreError::not_found(format!(
                "container `{container}` not found"
            )));
        };
        found.files.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> ContainerId {
        ContainerId::mint()
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let store = MemoryStore::new();
        let id = container();
        store
            .create_container(Namespace::Draft, &id)
            .await
            .expect("create");
        store.put_file(Namespace::Draft, &id, "data/a.csv", b"x");
        store.put_directory(Namespace::Draft, &id, "data");
        let listing = store
            .list_all_paths(Namespace::Draft, &id)
            .await
            .expect("list");
        let paths: Vec<&str> = listing.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["data", "data/a.csv"]);
        assert!(listing[0].is_directory);
        assert!(!listing[1].is_directory);
    }

    #[tokio::test]
    async fn double_create_is_refused() {
        let store = MemoryStore::new();
        let id = container();
        store
            .create_container(Namespace::Published, &id)
            .await
            .expect("first");
        let err = store
            .create_container(Namespace::Published, &id)
            .await
            .expect_err("second");
        assert_eq!(err.code, crate::StoreErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn namespaces_are_disjoint() {
        let store = MemoryStore::new();
        let id = container();
        store
            .create_container(Namespace::Draft, &id)
            .await
            .expect("create");
        assert!(store.container_exists(Namespace::Draft, &id));
        assert!(!store.container_exists(Namespace::Published, &id));
    }

    #[tokio::test]
    async fn injected_write_failure_hits_matching_paths_only() {
        let store = MemoryStore::new();
        let id = container();
        store
            .create_container(Namespace::Published, &id)
            .await
            .expect("create");
        store.fail_writes_matching("bad");
        store
            .create_file(Namespace::Published, &id, "good.csv")
            .await
            .expect("good path");
        let err = store
            .create_file(Namespace::Published, &id, "bad.csv")
            .await
            .expect_err("bad path");
        assert_eq!(err.code, crate::StoreErrorCode::Unreachable);
        assert_eq!(store.file_count(Namespace::Published, &id), 1);
    }

    #[tokio::test]
    async fn read_failure_injection_and_counters() {
        let store = MemoryStore::new();
        let id = container();
        store.put_file(Namespace::Draft, &id, "a.txt", b"hello");
        store.fail_reads_matching("a.txt");
        assert!(store.read_file(Namespace::Draft, &id, "a.txt").await.is_err());
        store.clear_failures();
        let bytes = store
            .read_file(Namespace::Draft, &id, "a.txt")
            .await
            .expect("read");
        assert_eq!(bytes, b"hello");
        assert_eq!(store.read_calls(), 2);
    }
}
