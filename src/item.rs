//! Engine boundary: the capability the engine's per-item handle exposes, and
//! the adapter that narrows it into a concrete [`Item`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::types::{ItemId, MessageId};

/// Writable resource a transfer writes into
///
/// Owned exclusively by the observer between `on_add` and `on_done`.
#[async_trait]
pub trait Destination: Send {
    /// Path of the file on disk, including the in-progress suffix
    fn path(&self) -> &Path;

    /// Flush and close the resource
    ///
    /// A failure here is fatal for the item, whatever the transfer outcome was.
    async fn close(&mut self) -> std::io::Result<()>;
}

/// Per-item handle passed by the engine to every callback
pub trait TransferElem: Send {
    /// Destination resource type
    type Dest: Destination;

    /// Identifier, unique per run
    fn id(&self) -> ItemId;
    /// Source locator
    fn url(&self) -> &str;
    /// Originating message identifier
    fn message_id(&self) -> MessageId;
    /// Declared total size in bytes
    fn size(&self) -> u64;
    /// Give up the destination resource; called once, from `on_done`
    fn into_destination(self) -> Self::Dest;
}

/// Item fields every lifecycle event carries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemInfo {
    /// Item identifier
    pub id: ItemId,
    /// Source locator
    pub url: String,
    /// Originating message identifier
    pub message_id: MessageId,
    /// Declared total size in bytes
    pub size: u64,
}

impl ItemInfo {
    /// Read the item fields from an engine handle without taking ownership
    pub fn from_elem<E: TransferElem>(elem: &E) -> Self {
        Self {
            id: elem.id(),
            url: elem.url().to_string(),
            message_id: elem.message_id(),
            size: elem.size(),
        }
    }
}

/// One transfer unit, narrowed from the engine's handle
pub struct Item<D> {
    /// Item fields
    pub info: ItemInfo,
    /// Destination resource, owned until closed
    pub dest: D,
}

impl<D: Destination> Item<D> {
    /// Consume an engine handle into an item
    pub fn from_elem<E: TransferElem<Dest = D>>(elem: E) -> Self {
        let info = ItemInfo::from_elem(&elem);
        Self {
            info,
            dest: elem.into_destination(),
        }
    }
}

/// Temporary file destination backed by a tokio [`File`]
///
/// The file is created under `<name><suffix>` so that it is never mistaken for
/// a finished download.
#[derive(Debug)]
pub struct PartFile {
    path: PathBuf,
    file: Option<File>,
}

impl PartFile {
    /// Create (or truncate) `dir/<name><suffix>`
    pub async fn create(dir: &Path, name: &str, suffix: &str) -> std::io::Result<Self> {
        let path = dir.join(format!("{name}{suffix}"));
        let file = File::create(&path).await?;
        Ok(Self::from_parts(path, file))
    }

    /// Wrap an already opened file
    pub fn from_parts(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file: Some(file),
        }
    }

    /// The open file, `None` once closed
    pub fn file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }
}

#[async_trait]
impl Destination for PartFile {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn close(&mut self) -> std::io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}
