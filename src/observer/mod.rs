//! Per-item lifecycle state machine.
//!
//! The engine calls [`TransferObserver::on_add`] once, then
//! [`TransferObserver::on_download`] any number of times, then
//! [`TransferObserver::on_done`] once. Each item ends in exactly one of:
//!
//! - finished: file published, `done` emitted
//! - failed: `fail` emitted
//! - cancelled: nothing emitted, temporary file removed
//!
//! ## Completion order
//!
//! 1. Close the destination. A close failure is fatal whatever the transfer result.
//! 2. On a transfer error, report it (unless it is a cancellation) and discard
//!    the temporary file.
//! 3. Otherwise mark the item finished in the tracker, then finalize. A
//!    finalization failure leaves the temporary file on disk for manual recovery.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::emitter::EventSink;
use crate::error::{Error, Result, TransferError};
use crate::finalizer::Finalizer;
use crate::item::{Destination, Item, ItemInfo, TransferElem};
use crate::tracker::CompletionTracker;
use crate::types::{EventState, LifecycleEvent, ProgressSample};

mod cleanup;

use cleanup::discard_temp;

/// Reacts to engine callbacks and publishes lifecycle events
///
/// Shared across engine workers; callbacks for distinct items may run
/// concurrently.
pub struct TransferObserver {
    config: Config,
    sink: Arc<dyn EventSink>,
    tracker: Arc<dyn CompletionTracker>,
    finalizer: Finalizer,
}

impl TransferObserver {
    /// Create an observer using the default content sniffer
    pub fn new(
        config: Config,
        sink: Arc<dyn EventSink>,
        tracker: Arc<dyn CompletionTracker>,
    ) -> Result<Self> {
        let finalizer = Finalizer::new(&config);
        Self::with_finalizer(config, sink, tracker, finalizer)
    }

    /// Create an observer with a custom finalizer
    pub fn with_finalizer(
        config: Config,
        sink: Arc<dyn EventSink>,
        tracker: Arc<dyn CompletionTracker>,
        finalizer: Finalizer,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            tracker,
            finalizer,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The engine registered an item
    pub fn on_add<E: TransferElem>(&self, elem: &E) {
        let info = ItemInfo::from_elem(elem);
        debug!(item_id = info.id.0, url = %info.url, total = info.size, "transfer started");

        self.emit(
            &info,
            EventState::Start {
                total: info.size,
                downloaded: 0,
            },
        );
    }

    /// The engine reported progress for an item
    pub fn on_download<E: TransferElem>(&self, elem: &E, sample: ProgressSample) {
        let info = ItemInfo::from_elem(elem);

        self.emit(
            &info,
            EventState::Downloading {
                total: sample.total,
                downloaded: sample.downloaded,
            },
        );
    }

    /// The engine finished with an item, successfully or not
    ///
    /// Consumes the item handle; its destination is closed here.
    pub async fn on_done<E: TransferElem>(
        &self,
        elem: E,
        result: std::result::Result<(), TransferError>,
    ) {
        let Item { info, mut dest } = Item::from_elem(elem);

        if let Err(e) = dest.close().await {
            self.fail(&info, Error::Close(e));
            return;
        }

        if let Err(e) = result {
            if e.is_cancelled() {
                debug!(item_id = info.id.0, "transfer cancelled by user");
            } else {
                self.fail(&info, Error::Transfer(e));
            }
            discard_temp(info.id, dest.path()).await;
            return;
        }

        self.tracker.finish(info.id).await;

        match self.finalizer.finalize(dest.path()).await {
            Ok(path) => {
                info!(item_id = info.id.0, path = ?path, "transfer complete");
                self.emit(
                    &info,
                    EventState::Done {
                        total: info.size,
                        downloaded: info.size,
                    },
                );
            }
            Err(e) => {
                self.fail(&info, Error::Finalize(e));
            }
        }
    }

    fn fail(&self, info: &ItemInfo, error: Error) {
        warn!(item_id = info.id.0, url = %info.url, error = %error, "transfer failed");

        self.emit(
            info,
            EventState::Fail {
                total: info.size,
                err_msg: Some(error.to_string()),
            },
        );
    }

    fn emit(&self, info: &ItemInfo, payload: EventState) {
        self.sink.emit(&LifecycleEvent {
            id: info.id,
            url: info.url.clone(),
            message_id: info.message_id,
            payload,
        });
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
