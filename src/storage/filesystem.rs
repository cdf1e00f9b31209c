//! Filesystem-based state store
//!
//! State lives as JSON files in a single data directory:
//! `orders-<key>.json` holds the cached order list of one customer and
//! `progress.json` holds the product map together with the processed set.
//! Every write goes to a sibling temp file which is synced and then renamed
//! over the target, so readers never observe a half-written file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::StorageError;
use crate::models::{OrderSnapshot, ProcessedOrderSet, ProductMap};

use super::traits::StateStore;

const PROGRESS_FILE: &str = "progress.json";

/// Durable progress, written as one file so both halves change together
#[derive(Debug, Default, Deserialize)]
struct Progress {
    #[serde(default)]
    products: ProductMap,
    #[serde(default)]
    processed: ProcessedOrderSet,
}

/// Borrowed form of [`Progress`] used when writing
#[derive(Serialize)]
struct ProgressRef<'a> {
    products: &'a ProductMap,
    processed: &'a ProcessedOrderSet,
}

/// JSON files in a data directory
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    data_dir: PathBuf,
}

impl FilesystemStore {
    /// Creates a store rooted at `data_dir`
    ///
    /// The directory is created on the first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Creates a store and makes sure the data directory exists
    pub async fn new_with_init(data_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let store = Self::new(data_dir);
        fs::create_dir_all(&store.data_dir).await?;
        Ok(store)
    }

    /// Returns the data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Encodes a customer id to a safe filename component using URL-safe base64
    fn encode_key(customer_id: &str) -> String {
        URL_SAFE_NO_PAD.encode(customer_id.as_bytes())
    }

    fn orders_path(&self, customer_id: &str) -> PathBuf {
        self.data_dir
            .join(format!("orders-{}.json", Self::encode_key(customer_id)))
    }

    fn progress_path(&self) -> PathBuf {
        self.data_dir.join(PROGRESS_FILE)
    }

    async fn load_progress(&self) -> Result<Progress, StorageError> {
        Ok(read_json::<Progress>(&self.progress_path())
            .await?
            .unwrap_or_default())
    }

    async fn write_progress(
        &self,
        products: &ProductMap,
        processed: &ProcessedOrderSet,
    ) -> Result<(), StorageError> {
        let progress = ProgressRef {
            products,
            processed,
        };
        write_json_atomic(&self.progress_path(), &progress).await
    }
}

/// Reads and decodes a JSON file, `None` if it does not exist
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Writes a JSON file by replacing it with a fully synced temp file
async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json =
        serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serialization(e.to_string()))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("state");
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    if let Some(parent) = path.parent() {
        sync_dir(parent).await?;
    }

    debug!(path = %path.display(), bytes = json.len(), "State file written");
    Ok(())
}

/// Flushes a directory entry so a completed rename survives power loss
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), StorageError> {
    Ok(())
}

#[async_trait]
impl StateStore for FilesystemStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn load_orders(&self, customer_id: &str) -> Result<Option<OrderSnapshot>, StorageError> {
        read_json(&self.orders_path(customer_id)).await
    }

    async fn save_orders(&self, snapshot: &OrderSnapshot) -> Result<(), StorageError> {
        write_json_atomic(&self.orders_path(&snapshot.customer_id), snapshot).await
    }

    async fn load_processed(&self) -> Result<ProcessedOrderSet, StorageError> {
        Ok(self.load_progress().await?.processed)
    }

    async fn load_products(&self) -> Result<ProductMap, StorageError> {
        Ok(self.load_progress().await?.products)
    }

    async fn commit(
        &self,
        products: &ProductMap,
        processed: &ProcessedOrderSet,
    ) -> Result<(), StorageError> {
        self.write_progress(products, processed).await
    }

    async fn reset(&self) -> Result<(), StorageError> {
        self.write_progress(&ProductMap::new(), &ProcessedOrderSet::new())
            .await
    }
}
