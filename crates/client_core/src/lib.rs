use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::try_join_all;
use shared::domain::{BucketItem, Identity, ItemId, NewItem};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};
use url::Url;

pub mod remote;

const EVENT_CHANNEL_CAPACITY: usize = 64;
/// Prefix under which user media lives in the blob store.
const MEDIA_ROOT: &str = "media";

/// Storage path for an image key, namespaced by the owning identity.
pub fn media_path(identity: &Identity, image_key: &str) -> String {
    format!("{MEDIA_ROOT}/{identity}/{image_key}")
}

/// Supplies the authenticated user's identity token. Errors when no session
/// is active, which gates every controller operation.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Result<Identity>;
}

/// The remote record store holding structured bucket-list data, scoped to
/// the authenticated user. The store assigns ids; no update capability
/// exists.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_items(&self) -> Result<Vec<BucketItem>>;
    async fn create_item(&self, fields: NewItem) -> Result<BucketItem>;
    async fn delete_item(&self, id: &ItemId) -> Result<()>;
}

/// The remote blob store holding raw file bytes, addressed by path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()>;
    async fn resolve_url(&self, path: &str) -> Result<Url>;
}

/// Client-side view copy of a record. The stored image key is replaced by a
/// time-scoped fetchable URL; this type is never written back to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayItem {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub image: Option<Url>,
}

/// A file payload attached to a create request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Form fields for creating a bucket-list item.
#[derive(Debug, Clone)]
pub struct CreateItemInput {
    pub title: String,
    pub description: String,
    pub image: Option<ImageUpload>,
}

/// Signals published to the front end so it can re-render.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    LoadingChanged(bool),
    ListUpdated,
    FormCleared,
    Error(String),
}

#[derive(Default)]
struct ControllerState {
    items: Vec<DisplayItem>,
    loading: bool,
}

/// Owns the in-memory bucket-list collection and orchestrates
/// fetch/create/delete against the remote collaborators.
///
/// The collection is a cache fully rebuilt after every mutation; it holds no
/// independent state and is never merged incrementally. Remote failures are
/// logged and published as [`ControllerEvent::Error`], never propagated to
/// the caller.
pub struct BucketListController {
    identity: Arc<dyn IdentityProvider>,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl BucketListController {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            identity,
            records,
            blobs,
            inner: Mutex::new(ControllerState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the displayed collection.
    pub async fn items(&self) -> Vec<DisplayItem> {
        self.inner.lock().await.items.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.loading
    }

    /// Rebuilds the displayed collection from the remote store, resolving
    /// every stored image key to a display URL.
    ///
    /// Resolutions for distinct items run concurrently; the new collection
    /// is published only after all of them settle. On any failure the
    /// previous collection is kept. The loading flag clears unconditionally.
    pub async fn refresh(&self) {
        self.set_loading(true).await;
        match self.fetch_display_items().await {
            Ok(items) => {
                info!(count = items.len(), "bucket list refreshed");
                self.inner.lock().await.items = items;
                self.emit(ControllerEvent::ListUpdated);
            }
            Err(err) => {
                error!("failed to refresh bucket list: {err:#}");
                self.emit(ControllerEvent::Error(err.to_string()));
            }
        }
        self.set_loading(false).await;
    }

    /// Creates a record from the form fields and, when a file was supplied,
    /// uploads its bytes under the created record's image key.
    ///
    /// The input form clears whatever the outcome. Only a fully successful
    /// create (and upload, when one is due) re-synchronizes the displayed
    /// collection. An upload failure leaves the already-created record in
    /// place, still referencing a key whose blob was never stored.
    pub async fn create_item(&self, input: CreateItemInput) {
        let created = self.submit_create(input).await;
        self.emit(ControllerEvent::FormCleared);
        if created {
            self.refresh().await;
        }
    }

    /// Deletes the record by id and re-synchronizes on success. The record's
    /// stored blob, if any, is left in place.
    pub async fn delete_item(&self, id: &ItemId) {
        match self.records.delete_item(id).await {
            Ok(()) => {
                info!(item_id = %id, "bucket item deleted");
                self.refresh().await;
            }
            Err(err) => {
                error!(item_id = %id, "failed to delete bucket item: {err:#}");
                self.emit(ControllerEvent::Error(err.to_string()));
            }
        }
    }

    async fn fetch_display_items(&self) -> Result<Vec<DisplayItem>> {
        let records = self.records.list_items().await?;
        let identity = self.identity.current_identity().await?;
        let resolutions = records.into_iter().map(|record| {
            let identity = identity.clone();
            async move {
                let image = match record.image_key() {
                    Some(key) => {
                        let path = media_path(&identity, key);
                        Some(self.blobs.resolve_url(&path).await?)
                    }
                    None => None,
                };
                Ok::<_, anyhow::Error>(DisplayItem {
                    id: record.id,
                    title: record.title,
                    description: record.description,
                    image,
                })
            }
        });
        try_join_all(resolutions).await
    }

    async fn submit_create(&self, input: CreateItemInput) -> bool {
        let upload = input.image.filter(|file| !file.filename.is_empty());
        let fields = match NewItem::new(
            input.title,
            input.description,
            upload.as_ref().map(|file| file.filename.clone()),
        ) {
            Ok(fields) => fields,
            Err(err) => {
                error!("rejected bucket item fields: {err}");
                self.emit(ControllerEvent::Error(err.to_string()));
                return false;
            }
        };

        let record = match self.records.create_item(fields).await {
            Ok(record) => record,
            Err(err) => {
                error!("failed to create bucket item: {err:#}");
                self.emit(ControllerEvent::Error(err.to_string()));
                return false;
            }
        };

        if let (Some(key), Some(file)) = (record.image_key(), upload) {
            // The record is not rolled back on upload failure; it keeps
            // referencing a key with no stored blob.
            if let Err(err) = self.upload_image(key, file.bytes).await {
                error!(image_key = key, "failed to upload bucket item image: {err:#}");
                self.emit(ControllerEvent::Error(err.to_string()));
                return false;
            }
        }

        true
    }

    async fn upload_image(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let identity = self.identity.current_identity().await?;
        self.blobs.upload(&media_path(&identity, key), bytes).await
    }

    async fn set_loading(&self, loading: bool) {
        self.inner.lock().await.loading = loading;
        self.emit(ControllerEvent::LoadingChanged(loading));
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
