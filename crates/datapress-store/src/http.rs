// SPDX-License-Identifier: Apache-2.0
//! HTTP gateway backend. The gateway exposes containers as URL prefixes:
//! `PUT {base}/{container}` provisions, `GET {base}/{container}?list=all`
//! returns the recursive listing as JSON, and objects live at
//! `{base}/{container}/{path}`.

use crate::{validate_rel_path, Namespace, ObjectStore, StoreError};
use async_trait::async_trait;
use datapress_model::{ContainerId, ObjectEntry};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct HttpBlobStoreConfig {
    pub draft_base_url: String,
    pub published_base_url: String,
    pub bearer_token: Option<String>,
    pub timeout: Duration,
    /// Permits localhost and RFC1918 hosts. Off outside tests and
    /// single-box setups.
    pub allow_private_hosts: bool,
}

impl Default for HttpBlobStoreConfig {
    fn default() -> Self {
        Self {
            draft_base_url: String::new(),
            published_base_url: String::new(),
            bearer_token: None,
            timeout: Duration::from_secs(15),
            allow_private_hosts: false,
        }
    }
}

/// Store backed by an HTTP blob gateway. Calls carry one fixed timeout and
/// are never retried here.
pub struct HttpBlobStore {
    cfg: HttpBlobStoreConfig,
    client: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(cfg: HttpBlobStoreConfig) -> Result<Self, StoreError> {
        validate_base_url(&cfg.draft_base_url, cfg.allow_private_hosts)?;
        validate_base_url(&cfg.published_base_url, cfg.allow_private_hosts)?;
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| StoreError::unreachable(format!("build blob http client: {e}")))?;
        Ok(Self { cfg, client })
    }

    fn base(&self, ns: Namespace) -> &str {
        match ns {
            Namespace::Draft => &self.cfg.draft_base_url,
            Namespace::Published => &self.cfg.published_base_url,
        }
    }

    fn container_url(&self, ns: Namespace, container: &ContainerId) -> String {
        format!("{}/{}", self.base(ns).trim_end_matches('/'), container)
    }

    fn object_url(&self, ns: Namespace, container: &ContainerId, path: &str) -> String {
        format!("{}/{}", self.container_url(ns, container), path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, url);
        if let Some(token) = &self.cfg.bearer_token {
            req = req.bearer_auth(token);
        }
        req
    }
}

fn validate_base_url(url: &str, allow_private: bool) -> Result<(), StoreError> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(StoreError::invalid_path(format!(
            "blob base url `{url}` must start with http:// or https://"
        )));
    }
    let rest = url.splitn(2, "://").nth(1).unwrap_or("");
    let host = rest.split(['/', ':']).next().unwrap_or("");
    if host.is_empty() {
        return Err(StoreError::invalid_path(format!(
            "blob base url `{url}` has no host"
        )));
    }
    if !allow_private && is_private_host(host) {
        return Err(StoreError::invalid_path(format!(
            "blob base url host `{host}` is private; set allow_private_hosts to use it"
        )));
    }
    Ok(())
}

fn is_private_host(host: &str) -> bool {
    if host == "localhost" || host == "127.0.0.1" || host == "0.0.0.0" {
        return true;
    }
    if host.starts_with("10.") || host.starts_with("192.168.") || host.starts_with("169.254.") {
        return true;
    }
    host.strip_prefix("172.")
        .and_then(|rest| rest.split('.').next())
        .and_then(|octet| octet.parse::<u8>().ok())
        .is_some_and(|octet| (16..=31).contains(&octet))
}

#[async_trait]
impl ObjectStore for HttpBlobStore {
    async fn create_container(
        &self,
        ns: Namespace,
        container: &ContainerId,
    ) -> Result<(), StoreError> {
        let url = self.container_url(ns, container);
        let resp = self
            .request(reqwest::Method::PUT, &url)
            .send()
            .await
            .map_err(|e| StoreError::unreachable(format!("create container `{container}`: {e}")))?;
        match resp.status().as_u16() {
            200 | 201 | 204 => Ok(()),
            409 => Err(StoreError::already_exists(format!(
                "container `{container}` already exists"
            ))),
            status => Err(StoreError::unreachable(format!(
                "create container `{container}`: gateway returned {status}"
            ))),
        }
    }

    async fn list_all_paths(
        &self,
        ns: Namespace,
        container: &ContainerId,
    ) -> Result<Vec<ObjectEntry>, StoreError> {
        let url = format!("{}?list=all", self.container_url(ns, container));
        let resp = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| StoreError::unreachable(format!("list container `{container}`: {e}")))?;
        if resp.status().as_u16() == 404 {
            return Err(StoreError::not_found(format!(
                "container `{container}` not found"
            )));
        }
        if !resp.status().is_success() {
            return Err(StoreError::unreachable(format!(
                "list container `{container}`: gateway returned {}",
                resp.status().as_u16()
            )));
        }
        resp.json::<Vec<ObjectEntry>>()
            .await
            .map_err(|e| StoreError::unreachable(format!("decode listing for `{container}`: {e}")))
    }

    async fn read_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<Vec<u8>, StoreError> {
        validate_rel_path(path)?;
        let url = self.object_url(ns, container, path);
        let resp = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| StoreError::unreachable(format!("read `{path}`: {e}")))?;
        if resp.status().as_u16() == 404 {
            return Err(StoreError::not_found(format!("object `{path}` not found")));
        }
        if !resp.status().is_success() {
            return Err(StoreError::unreachable(format!(
                "read `{path}`: gateway returned {}",
                resp.status().as_u16()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StoreError::unreachable(format!("read `{path}`: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn create_file(
        &self,
        ns: Namespace,
        container: &ContainerId,
        path: &str,
    ) -> Result<(), StoreError> {
        validate_rel_path(path)?;
        let url = format!("{}?create=empty", self.object_url(ns, container, path));
        let resp = self
            .request(reqwest::Method::PUT, &url)
            .send()
            .await
            .map_err(|e| StoreError::unreachable(format!("create `{path}`: {e}")))?;
        if !resp.status().is_success() {
            return Err(StoreError::unreachable(format!(
                "create `{path}`: gateway returned {}",
                resp.status().as_u16()
            )));
        }
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
        let url = self.object_url(ns, container, path);
        let resp = self
            .request(reqwest::Method::PUT, &url)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StoreError::unreachable(format!("write `{path}`: {e}")))?;
        if !resp.status().is_success() {
            return Err(StoreError::unreachable(format!(
                "write `{path}`: gateway returned {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_hosts_need_the_escape_hatch() {
        let mut cfg = HttpBlobStoreConfig {
            draft_base_url: "http://localhost:9000/draft".into(),
            published_base_url: "http://localhost:9000/published".into(),
            ..HttpBlobStoreConfig::default()
        };
        assert!(HttpBlobStore::new(cfg.clone()).is_err());
        cfg.allow_private_hosts = true;
        assert!(HttpBlobStore::new(cfg).is_ok());
    }

    #[test]
    fn rfc1918_ranges_count_as_private() {
        assert!(is_private_host("10.1.2.3"));
        assert!(is_private_host("172.16.0.9"));
        assert!(is_private_host("172.31.255.1"));
        assert!(is_private_host("192.168.0.1"));
        assert!(!is_private_host("172.32.0.1"));
        assert!(!is_private_host("172.example.org"));
        assert!(!is_private_host("blobs.example.org"));
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        let cfg = HttpBlobStoreConfig {
            draft_base_url: "ftp://blobs.example.org/draft".into(),
            published_base_url: "https://blobs.example.org/published".into(),
            ..HttpBlobStoreConfig::default()
        };
        assert!(HttpBlobStore::new(cfg).is_err());
    }

    #[test]
    fn object_urls_compose_without_double_slashes() {
        let cfg = HttpBlobStoreConfig {
            draft_base_url: "https://blobs.example.org/draft/".into(),
            published_base_url: "https://blobs.example.org/published".into(),
            ..HttpBlobStoreConfig::default()
        };
        let store = HttpBlobStore::new(cfg).expect("store");
        let container = ContainerId::parse("c0ffee").expect("container id");
        assert_eq!(
            store.object_url(Namespace::Draft, &container, "sub/a.csv"),
            "https://blobs.example.org/draft/c0ffee/sub/a.csv"
        );
    }
}
