//! Common test utilities for transfer-lifecycle integration tests

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use transfer_lifecycle::{Destination, ItemId, LifecycleEvent, MessageId, TransferElem};

/// Cloneable in-memory writer standing in for stdout
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Everything written so far, as UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Parse every line into an event
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.contents()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Destination backed by a plain path, optionally failing to close
pub struct TestDest {
    pub path: PathBuf,
    pub close_error: Option<String>,
}

#[async_trait]
impl Destination for TestDest {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn close(&mut self) -> std::io::Result<()> {
        match self.close_error.take() {
            Some(msg) => Err(std::io::Error::other(msg)),
            None => Ok(()),
        }
    }
}

/// Engine-side item handle
pub struct TestElem {
    pub id: u64,
    pub url: String,
    pub message_id: i64,
    pub size: u64,
    pub dest: TestDest,
}

impl TestElem {
    /// Create `<dir>/<name>.tmp` filled with `content` and a handle for it
    pub async fn with_content(dir: &Path, id: u64, name: &str, content: &[u8]) -> Self {
        let path = dir.join(format!("{name}.tmp"));
        tokio::fs::write(&path, content).await.unwrap();

        Self {
            id,
            url: format!("https://t.me/c/42/{id}"),
            message_id: id as i64 + 1000,
            size: content.len() as u64,
            dest: TestDest {
                path,
                close_error: None,
            },
        }
    }
}

impl TransferElem for TestElem {
    type Dest = TestDest;

    fn id(&self) -> ItemId {
        ItemId(self.id)
    }
    fn url(&self) -> &str {
        &self.url
    }
    fn message_id(&self) -> MessageId {
        MessageId(self.message_id)
    }
    fn size(&self) -> u64 {
        self.size
    }
    fn into_destination(self) -> TestDest {
        self.dest
    }
}
