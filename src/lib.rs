//! # transfer-lifecycle
//!
//! Observer for file transfers driven by an external download engine.
//!
//! The engine reports three callbacks per item (added, progressing, done).
//! This crate turns them into a line-oriented JSON event stream, and once a
//! transfer succeeds it corrects the file extension by content sniffing and
//! publishes the file under its final name.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI, the engine embeds the observer
//! - **One failure channel** - Consumers learn about failures from the event stream only
//! - **No partial publishes** - A finished file is either renamed into place or left untouched
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use transfer_lifecycle::{
//!     Config, ItemId, JsonLineEmitter, MemoryTracker, MessageId, PartFile, ProgressSample,
//!     TransferObserver,
//! };
//!
//! # struct Elem { dest: PartFile }
//! # impl transfer_lifecycle::TransferElem for Elem {
//! #     type Dest = PartFile;
//! #     fn id(&self) -> ItemId { ItemId(1) }
//! #     fn url(&self) -> &str { "https://t.me/c/1/2" }
//! #     fn message_id(&self) -> MessageId { MessageId(2) }
//! #     fn size(&self) -> u64 { 1024 }
//! #     fn into_destination(self) -> PartFile { self.dest }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         rewrite_ext: true,
//!         ..Default::default()
//!     };
//!     let observer = TransferObserver::new(
//!         config,
//!         Arc::new(JsonLineEmitter::stdout()),
//!         Arc::new(MemoryTracker::new()),
//!     )?;
//!
//!     let dir = std::path::Path::new("downloads");
//!     let dest = PartFile::create(dir, "clip", &observer.config().temp_suffix).await?;
//!     let elem = Elem { dest };
//!
//!     observer.on_add(&elem);
//!     observer.on_download(&elem, ProgressSample::new(1024, 1024));
//!     observer.on_done(elem, Ok(())).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Lifecycle event sinks
pub mod emitter;
/// Error types
pub mod error;
/// Extension correction and publishing of finished files
pub mod finalizer;
/// Engine boundary: item handles and destination resources
pub mod item;
/// Per-item lifecycle state machine
pub mod observer;
/// Completion tracking for resume logic
pub mod tracker;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use emitter::{BroadcastEmitter, EventSink, JsonLineEmitter};
pub use error::{DatabaseError, Error, FinalizeError, Result, TransferError};
pub use finalizer::{ContentSniffer, Finalizer, InferSniffer};
pub use item::{Destination, Item, ItemInfo, PartFile, TransferElem};
pub use observer::TransferObserver;
pub use tracker::{CompletionTracker, MemoryTracker, SqliteTracker};
pub use types::{EventState, ItemId, LifecycleEvent, MessageId, ProgressSample, State};
