//! Core types for transfer-lifecycle

use serde::{Deserialize, Serialize};

/// Unique identifier for an item within one run
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ItemId> for u64 {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the message an item was taken from
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bytes transferred for one item at a point in time
///
/// `downloaded <= total` is guaranteed by the engine and not re-checked here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressSample {
    /// Total bytes expected
    pub total: u64,
    /// Bytes written so far
    pub downloaded: u64,
}

impl ProgressSample {
    /// Create a new sample
    pub fn new(total: u64, downloaded: u64) -> Self {
        Self { total, downloaded }
    }
}

/// State tag carried by every lifecycle event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Transfer registered with the engine
    Start,
    /// Transfer in progress
    Downloading,
    /// File published under its final name
    Done,
    /// Transfer or finalization failed
    Fail,
}

impl State {
    /// Whether no further events follow this state for the same item
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done | State::Fail)
    }
}

/// State-specific payload of a [`LifecycleEvent`]
///
/// Only `Fail` can carry an error message, and `Fail` carries no
/// `downloaded` count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum EventState {
    /// Emitted once when the engine adds the item
    Start {
        /// Declared size
        total: u64,
        /// Always 0
        downloaded: u64,
    },
    /// Emitted for every progress sample
    Downloading {
        /// Total bytes reported by the sample
        total: u64,
        /// Downloaded bytes reported by the sample
        downloaded: u64,
    },
    /// Emitted once the file is published
    Done {
        /// Declared size
        total: u64,
        /// Declared size
        downloaded: u64,
    },
    /// Emitted once when the item fails
    Fail {
        /// Declared size
        total: u64,
        /// Human-readable error chain, absent when no underlying error exists
        #[serde(default, skip_serializing_if = "Option::is_none")]
        err_msg: Option<String>,
    },
}

impl EventState {
    /// The state tag of this payload
    pub fn state(&self) -> State {
        match self {
            EventState::Start { .. } => State::Start,
            EventState::Downloading { .. } => State::Downloading,
            EventState::Done { .. } => State::Done,
            EventState::Fail { .. } => State::Fail,
        }
    }
}

/// Event emitted during an item's lifecycle
///
/// Serializes to one flat JSON object:
/// `{"id":1,"url":"...","message_id":2,"state":"downloading","total":1024,"downloaded":512}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Item identifier
    pub id: ItemId,
    /// Source locator
    pub url: String,
    /// Originating message identifier
    pub message_id: MessageId,
    /// State tag and state-specific fields
    #[serde(flatten)]
    pub payload: EventState,
}

impl LifecycleEvent {
    /// The state tag of this event
    pub fn state(&self) -> State {
        self.payload.state()
    }

    /// Total bytes carried by this event
    pub fn total(&self) -> u64 {
        match self.payload {
            EventState::Start { total, .. }
            | EventState::Downloading { total, .. }
            | EventState::Done { total, .. }
            | EventState::Fail { total, .. } => total,
        }
    }

    /// Downloaded bytes, `None` for `fail` events
    pub fn downloaded(&self) -> Option<u64> {
        match self.payload {
            EventState::Start { downloaded, .. }
            | EventState::Downloading { downloaded, .. }
            | EventState::Done { downloaded, .. } => Some(downloaded),
            EventState::Fail { .. } => None,
        }
    }

    /// Error message, only ever present on `fail` events
    pub fn err_msg(&self) -> Option<&str> {
        match &self.payload {
            EventState::Fail { err_msg, .. } => err_msg.as_deref(),
            _ => None,
        }
    }
}
