//! Change notification primitives shared by all reminder stores.
//!
//! # Responsibility
//! - Give every store an owned, cloneable event emitter.
//! - Merge the change feeds of several stores into one stream.
//!
//! # Invariants
//! - Emitting never fails, even when nobody is listening.
//! - A lagging subscriber observes a `Refreshed` event instead of an error.
//! - Reads never emit events.

use crate::model::reminder::ReminderId;
use log::warn;
use std::fmt::{Display, Formatter};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{StreamExt, StreamMap};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Which backend produced a result or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreSource {
    Local,
    Remote,
    Fallback,
}

impl StoreSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Fallback => "fallback",
        }
    }
}

impl Display for StoreSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
    /// The collection changed in a way not tied to one record.
    Refreshed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub source: StoreSource,
    pub kind: ChangeKind,
    pub id: Option<ReminderId>,
}

impl ChangeEvent {
    pub fn new(source: StoreSource, kind: ChangeKind, id: impl Into<ReminderId>) -> Self {
        Self {
            source,
            kind,
            id: Some(id.into()),
        }
    }

    pub fn refreshed(source: StoreSource) -> Self {
        Self {
            source,
            kind: ChangeKind::Refreshed,
            id: None,
        }
    }
}

/// Broadcast emitter owned by one store.
///
/// Clones share the same channel, so every clone of a store notifies the
/// same set of subscribers.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    source: StoreSource,
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new(source: StoreSource) -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { source, tx }
    }

    pub fn source(&self) -> StoreSource {
        self.source
    }

    /// Emits one event. A send with no receivers is not an error.
    pub fn notify(&self, kind: ChangeKind, id: Option<&str>) {
        let event = ChangeEvent {
            source: self.source,
            kind,
            id: id.map(str::to_string),
        };
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> ChangeStream {
        ChangeStream::single(self.source, self.tx.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Stream of change events from one or more stores.
///
/// Dropping the stream unsubscribes from every source.
pub struct ChangeStream {
    streams: StreamMap<usize, BroadcastStream<ChangeEvent>>,
    sources: Vec<StoreSource>,
}

impl ChangeStream {
    pub fn empty() -> Self {
        Self {
            streams: StreamMap::new(),
            sources: Vec::new(),
        }
    }

    fn single(source: StoreSource, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        let mut stream = Self::empty();
        stream.push(source, BroadcastStream::new(rx));
        stream
    }

    fn push(&mut self, source: StoreSource, stream: BroadcastStream<ChangeEvent>) {
        let key = self.sources.len();
        self.sources.push(source);
        self.streams.insert(key, stream);
    }

    /// Combines several streams into one that yields events from all of them.
    pub fn merge(streams: impl IntoIterator<Item = ChangeStream>) -> Self {
        let mut merged = Self::empty();
        for mut stream in streams {
            let keys: Vec<usize> = stream.streams.keys().copied().collect();
            for key in keys {
                if let Some(inner) = stream.streams.remove(&key) {
                    merged.push(stream.sources[key], inner);
                }
            }
        }
        merged
    }

    /// Number of still-open sources.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Waits for the next event from any source.
    ///
    /// Returns `None` once every source has been dropped.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        let (key, item) = self.streams.next().await?;
        Some(match item {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                let source = self.sources[key];
                warn!("event=change_lagged module=notify status=degraded source={source} skipped={skipped}");
                ChangeEvent::refreshed(source)
            }
        })
    }
}
