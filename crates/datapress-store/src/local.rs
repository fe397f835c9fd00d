// SPDX-License-Identifier: Apache-2.0
//! Filesystem backend: one root directory per namespace, one directory per
//! container beneath it. Used by self-hosted deployments and the CLI.

use crate::{validate_rel_path, Namespace, ObjectStore, StoreError};
use async_trait::async_trait;
use datapress_model::{ContainerId, ObjectEntry};
use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct LocalFsStore {
    draft_root: PathBuf,
    published_root: PathBuf,
}

impl LocalFsStore {
    /// Opens the store, creating both namespace roots if absent.
    pub fn new(
        draft_root: impl Into<PathBuf>,
        published_root: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let store = Self {
            draft_root: draft_root.into(),
            published_root: published_root.into(),
        };
        fs::create_dir_all(&store.draft_root)
            .map_err(|e| StoreError::io(format!("create draft root: {e}")))?;
        fs::create_dir_all(&store.published_root)
            .map_err(|e| StoreError::io(format!("create published root: {e}")))?;
        Ok(store)
    }

    fn root(&self, ns: Namespace) -> &Path {
        match ns {
            Namespace::Draft => &self.draft_root,
            Namespace::Published => &self.published_root,
        }
    }

    fn container_dir(&self, ns: Namespace, container: &ContainerId) -> PathBuf {
        self.root(ns).join(container.as_str())
    }

    fn object_path(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<PathBuf, StoreError> {
        validate_rel_path(path)?;
        Ok(self.container_dir(ns, container).join(path))
    }
}

async fn run_blocking<T, F>(op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StoreError::io(format!("blocking storage task: {e}")))?
}

fn tmp_sibling(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("object"));
    name.push(".tmp");
    target.with_file_name(name)
}

#[async_trait]
impl ObjectStore for LocalFsStore {
    async fn create_container(
        &self,
        ns: Namespace,
        container: &ContainerId,
    ) -> Result<(), StoreError> {
        let dir = self.container_dir(ns, container);
        let name = container.as_str().to_string();
        run_blocking(move || match fs::create_dir(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::already_exists(
                format!("container `{name}` already exists"),
            )),
            Err(e) => Err(StoreError::io(format!("create container `{name}`: {e}"))),
        })
        .await
    }

    async fn list_all_paths(
        &self,
        ns: Namespace,
        container: &ContainerId,
    ) -> Result<Vec<ObjectEntry>, StoreError> {
        let dir = self.container_dir(ns, container);
        let name = container.as_str().to_string();
        run_blocking(move || {
            if !dir.is_dir() {
                return Err(StoreError::not_found(format!("container `{name}` not found")));
            }
            let mut entries = Vec::new();
            let mut stack = vec![dir.clone()];
            while let Some(current) = stack.pop() {
                let listing = fs::read_dir(&current)
                    .map_err(|e| StoreError::io(format!("list `{name}`: {e}")))?;
                for item in listing {
                    let item = item.map_err(|e| StoreError::io(format!("list `{name}`: {e}")))?;
                    let path = item.path();
                    let rel = path
                        .strip_prefix(&dir)
                        .map_err(|e| StoreError::io(format!("list `{name}`: {e}")))?
                        .to_string_lossy()
                        .replace('\\', "/");
                    let kind = item
                        .file_type()
                        .map_err(|e| StoreError::io(format!("stat `{rel}`: {e}")))?;
                    if kind.is_dir() {
                        entries.push(ObjectEntry::directory(&rel));
                        stack.push(path);
                    } else if kind.is_file() {
                        entries.push(ObjectEntry::file(&rel));
                    } else {
                        warn!(container = %name, path = %rel, "skipping non-regular file");
                    }
                }
            }
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(entries)
        })
        .await
    }

    async fn read_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<Vec<u8>, StoreError> {
        let target = self.object_path(ns, container, path)?;
        let label = path.to_string();
        run_blocking(move || match fs::read(&target) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::not_found(format!("object `{label}` not found")))
            }
            Err(e) => Err(StoreError::io(format!("read `{label}`: {e}"))),
        })
        .await
    }

    async fn create_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<(), StoreError> {
        let dir = self.container_dir(ns, container);
        let target = self.object_path(ns, container, path)?;
        let name = container.as_str().to_string();
        let label = path.to_string();
        run_blocking(move || {
            if !dir.is_dir() {
                return Err(StoreError::not_found(format!("container `{name}` not found")));
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::io(format!("create dirs for `{label}`: {e}")))?;
            }
            fs::File::create(&target)
                .map_err(|e| StoreError::io(format!("create `{label}`: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn write_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        let dir = self.container_dir(ns, container);
        let target = self.object_path(ns, container, path)?;
        let name = container.as_str().to_string();
        let label = path.to_string();
        let payload = bytes.to_vec();
        run_blocking(move || {
            if !dir.is_dir() {
                return Err(StoreError::not_found(format!("container `{name}` not found")));
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::io(format!("create dirs for `{label}`: {e}")))?;
            }
            // Write to a sibling and rename so readers never observe a
            // half-written object.
            let tmp = tmp_sibling(&target);
            {
                let mut out = fs::File::create(&tmp)
                    .map_err(|e| StoreError::io(format!("create tmp for `{label}`: {e}")))?;
                out.write_all(&payload)
                    .map_err(|e| StoreError::io(format!("write `{label}`: {e}")))?;
                out.sync_all()
                    .map_err(|e| StoreError::io(format!("sync `{label}`: {e}")))?;
            }
            fs::rename(&tmp, &target)
                .map_err(|e| StoreError::io(format!("publish `{label}`: {e}")))?;
            Ok(())
        })
        .await
    }
}
