// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object store gateway.
//!
//! Prefixes are treated like directories: `upload` stores every file under
//! a local path at `<prefix>/<relative path>`, and `download` recreates every
//! key under a prefix relative to that prefix.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload, WriteMultipart};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Files at or below this size go up in a single request.
const MULTIPART_THRESHOLD: usize = 8 * 1024 * 1024;
/// Part size for multipart uploads.
const PART_SIZE: usize = 8 * 1024 * 1024;
/// Parts in flight per multipart upload.
const MAX_IN_FLIGHT_PARTS: usize = 4;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),
    #[error("io error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("nothing stored under {bucket}/{prefix}")]
    NotFound { bucket: String, prefix: String },
    #[error("object store configuration error: {0}")]
    Config(String),
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch { path: PathBuf, expected: String, actual: String },
}

impl TransferError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> TransferError + '_ {
        move |source| TransferError::Io { path: path.to_path_buf(), source }
    }

    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Store(object_store::Error::NotFound { .. }) => false,
            TransferError::Store(object_store::Error::NotImplemented) => false,
            TransferError::Store(_) => true,
            TransferError::ChecksumMismatch { .. } => true,
            TransferError::Io { .. } | TransferError::NotFound { .. } | TransferError::Config(_) => {
                false
            }
        }
    }
}

/// Adapter for the remote object store
#[async_trait]
pub trait ObjectStoreGateway: Clone + Send + Sync + 'static {
    /// Upload a file or directory tree. Returns the keys written.
    async fn upload(&self, local: &Path, bucket: &str, prefix: &str) -> Result<Vec<String>, TransferError>;

    /// Download every key under `prefix` into `local`. Returns the files written.
    async fn download(&self, bucket: &str, prefix: &str, local: &Path) -> Result<Vec<PathBuf>, TransferError>;

    /// All keys under `prefix`, sorted.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, TransferError>;
}

/// Which object store backs the gateway.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreConfig {
    S3 {
        region: String,
        access_key_id: String,
        secret_access_key: String,
        /// Custom endpoint for S3-compatible services.
        endpoint: Option<String>,
    },
    /// A directory per bucket under `root`.
    Local { root: PathBuf },
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreConfig::S3 { region, access_key_id, endpoint, .. } => f
                .debug_struct("S3")
                .field("region", region)
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"***")
                .field("endpoint", endpoint)
                .finish(),
            StoreConfig::Local { root } => f.debug_struct("Local").field("root", root).finish(),
        }
    }
}

/// Gateway backed by the `object_store` crate.
#[derive(Clone)]
pub struct ObjectStoreBackend {
    config: StoreConfig,
    stores: Arc<Mutex<HashMap<String, Arc<dyn ObjectStore>>>>,
}

impl ObjectStoreBackend {
    pub fn new(config: StoreConfig) -> Self {
        Self { config, stores: Arc::new(Mutex::new(HashMap::new())) }
    }

    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, TransferError> {
        if let Some(store) = self.stores.lock().get(bucket) {
            return Ok(Arc::clone(store));
        }

        let store: Arc<dyn ObjectStore> = match &self.config {
            StoreConfig::S3 { region, access_key_id, secret_access_key, endpoint } => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_region(region)
                    .with_access_key_id(access_key_id)
                    .with_secret_access_key(secret_access_key);
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint).with_allow_http(true);
                }
                Arc::new(builder.build()?)
            }
            StoreConfig::Local { root } => {
                let dir = root.join(bucket);
                std::fs::create_dir_all(&dir).map_err(TransferError::io(&dir))?;
                Arc::new(LocalFileSystem::new_with_prefix(&dir)?)
            }
        };

        self.stores.lock().insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    async fn put_file(
        store: &dyn ObjectStore,
        path: &Path,
        key: &ObjectPath,
    ) -> Result<u64, TransferError> {
        let mut file = tokio::fs::File::open(path).await.map_err(TransferError::io(path))?;
        let size = file.metadata().await.map_err(TransferError::io(path))?.len();

        if size as usize <= MULTIPART_THRESHOLD {
            let mut bytes = Vec::with_capacity(size as usize);
            file.read_to_end(&mut bytes).await.map_err(TransferError::io(path))?;
            store.put(key, PutPayload::from(bytes)).await?;
            return Ok(size);
        }

        let mut upload = WriteMultipart::new_with_chunk_size(store.put_multipart(key).await?, PART_SIZE);
        let mut buf = vec![0u8; PART_SIZE];
        loop {
            let n = match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(source) => {
                    let _ = upload.abort().await;
                    return Err(TransferError::Io { path: path.to_path_buf(), source });
                }
            };
            upload.wait_for_capacity(MAX_IN_FLIGHT_PARTS).await?;
            upload.write(&buf[..n]);
        }
        upload.finish().await?;
        Ok(size)
    }
}

#[async_trait]
impl ObjectStoreGateway for ObjectStoreBackend {
    async fn upload(&self, local: &Path, bucket: &str, prefix: &str) -> Result<Vec<String>, TransferError> {
        let store = self.store(bucket)?;
        let files = collect_files(local)?;
        let mut keys = Vec::with_capacity(files.len());

        for (path, relative) in files {
            let key = ObjectPath::from(join_key(prefix, &relative));
            let size = Self::put_file(store.as_ref(), &path, &key).await?;
            tracing::info!(bucket, key = %key, size, "uploaded object");
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    async fn download(&self, bucket: &str, prefix: &str, local: &Path) -> Result<Vec<PathBuf>, TransferError> {
        let store = self.store(bucket)?;
        let prefix_path = ObjectPath::from(prefix);
        let objects: Vec<_> = store.list(Some(&prefix_path)).try_collect().await?;
        if objects.is_empty() {
            return Err(TransferError::NotFound { bucket: bucket.to_string(), prefix: prefix.to_string() });
        }

        let mut written = Vec::with_capacity(objects.len());
        for meta in objects {
            let Some(parts) = meta.location.prefix_match(&prefix_path) else {
                continue;
            };
            let dest = parts.fold(local.to_path_buf(), |acc, part| acc.join(part.as_ref()));

            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(TransferError::io(parent))?;
            }
            let mut file = tokio::fs::File::create(&dest).await.map_err(TransferError::io(&dest))?;
            let mut stream = store.get(&meta.location).await?.into_stream();
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await.map_err(TransferError::io(&dest))?;
            }
            file.flush().await.map_err(TransferError::io(&dest))?;

            tracing::info!(bucket, key = %meta.location, size = meta.size, "downloaded object");
            written.push(dest);
        }
        Ok(written)
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, TransferError> {
        let store = self.store(bucket)?;
        let prefix_path = ObjectPath::from(prefix);
        let mut keys: Vec<String> = store
            .list(Some(&prefix_path))
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;
        keys.sort();
        Ok(keys)
    }
}

/// `prefix` + `relative` with exactly one `/` between them.
pub fn join_key(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let relative = relative.trim_start_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix, relative)
    }
}

/// Every regular file under `local` with its `/`-separated relative path.
///
/// A plain file maps to its own name.
pub(crate) fn collect_files(local: &Path) -> Result<Vec<(PathBuf, String)>, TransferError> {
    let meta = std::fs::metadata(local).map_err(TransferError::io(local))?;
    if meta.is_file() {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| TransferError::Config(format!("no file name in {}", local.display())))?;
        return Ok(vec![(local.to_path_buf(), name)]);
    }

    let mut files = Vec::new();
    let mut pending = vec![(local.to_path_buf(), String::new())];
    while let Some((dir, rel)) = pending.pop() {
        for entry in std::fs::read_dir(&dir).map_err(TransferError::io(&dir))? {
            let entry = entry.map_err(TransferError::io(&dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_rel = if rel.is_empty() { name } else { format!("{}/{}", rel, name) };
            let path = entry.path();
            let file_type = entry.file_type().map_err(TransferError::io(&path))?;
            if file_type.is_dir() {
                pending.push((path, child_rel));
            } else if file_type.is_file() {
                files.push((path, child_rel));
            }
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{collect_files, join_key, ObjectStoreGateway, TransferError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Recorded object store call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum StoreCall {
        Upload { local: PathBuf, bucket: String, prefix: String },
        Download { bucket: String, prefix: String, local: PathBuf },
        List { bucket: String, prefix: String },
    }

    #[derive(Default)]
    struct FakeStoreState {
        calls: Vec<StoreCall>,
        /// (bucket, key) → bytes
        objects: BTreeMap<(String, String), Vec<u8>>,
        fail_uploads: u32,
        fail_downloads: u32,
        fail_lists: u32,
    }

    /// In-memory object store for testing
    #[derive(Clone, Default)]
    pub struct FakeObjectStore {
        inner: Arc<Mutex<FakeStoreState>>,
    }

    fn injected() -> TransferError {
        TransferError::Store(object_store::Error::Generic {
            store: "fake",
            source: "injected failure".into(),
        })
    }

    fn take_failure(counter: &mut u32) -> Result<(), TransferError> {
        if *counter > 0 {
            *counter -= 1;
            return Err(injected());
        }
        Ok(())
    }

    fn under_prefix(key: &str, prefix: &str) -> Option<String> {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return Some(key.to_string());
        }
        key.strip_prefix(prefix)?.strip_prefix('/').map(str::to_string)
    }

    impl FakeObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_uploads(&self, times: u32) {
            self.inner.lock().fail_uploads = times;
        }

        pub fn fail_downloads(&self, times: u32) {
            self.inner.lock().fail_downloads = times;
        }

        pub fn fail_lists(&self, times: u32) {
            self.inner.lock().fail_lists = times;
        }

        pub fn calls(&self) -> Vec<StoreCall> {
            self.inner.lock().calls.clone()
        }

        /// All keys stored in `bucket`, sorted.
        pub fn keys(&self, bucket: &str) -> Vec<String> {
            let inner = self.inner.lock();
            inner.objects.keys().filter(|(b, _)| b == bucket).map(|(_, k)| k.clone()).collect()
        }

        pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
            self.inner.lock().objects.get(&(bucket.to_string(), key.to_string())).cloned()
        }

        pub fn insert(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
            self.inner.lock().objects.insert((bucket.to_string(), key.to_string()), bytes.into());
        }

        pub fn remove(&self, bucket: &str, key: &str) {
            self.inner.lock().objects.remove(&(bucket.to_string(), key.to_string()));
        }
    }

    #[async_trait]
    impl ObjectStoreGateway for FakeObjectStore {
        async fn upload(&self, local: &Path, bucket: &str, prefix: &str) -> Result<Vec<String>, TransferError> {
            {
                let mut inner = self.inner.lock();
                inner.calls.push(StoreCall::Upload {
                    local: local.to_path_buf(),
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                });
                take_failure(&mut inner.fail_uploads)?;
            }

            let mut keys = Vec::new();
            for (path, relative) in collect_files(local)? {
                let bytes = std::fs::read(&path).map_err(TransferError::io(&path))?;
                let key = join_key(prefix, &relative);
                self.inner.lock().objects.insert((bucket.to_string(), key.clone()), bytes);
                keys.push(key);
            }
            Ok(keys)
        }

        async fn download(&self, bucket: &str, prefix: &str, local: &Path) -> Result<Vec<PathBuf>, TransferError> {
            let matching: Vec<(String, Vec<u8>)> = {
                let mut inner = self.inner.lock();
                inner.calls.push(StoreCall::Download {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                    local: local.to_path_buf(),
                });
                take_failure(&mut inner.fail_downloads)?;
                inner
                    .objects
                    .iter()
                    .filter(|((b, _), _)| b == bucket)
                    .filter_map(|((_, k), v)| under_prefix(k, prefix).map(|rel| (rel, v.clone())))
                    .collect()
            };
            if matching.is_empty() {
                return Err(TransferError::NotFound { bucket: bucket.to_string(), prefix: prefix.to_string() });
            }

            let mut written = Vec::new();
            for (relative, bytes) in matching {
                let dest = relative.split('/').fold(local.to_path_buf(), |acc, part| acc.join(part));
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent).map_err(TransferError::io(parent))?;
                }
                std::fs::write(&dest, bytes).map_err(TransferError::io(&dest))?;
                written.push(dest);
            }
            Ok(written)
        }

        async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, TransferError> {
            let mut inner = self.inner.lock();
            inner.calls.push(StoreCall::List { bucket: bucket.to_string(), prefix: prefix.to_string() });
            take_failure(&mut inner.fail_lists)?;
            Ok(inner
                .objects
                .keys()
                .filter(|(b, k)| b == bucket && under_prefix(k, prefix).is_some())
                .map(|(_, k)| k.clone())
                .collect())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeObjectStore, StoreCall};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
