//! # Event Bus System
//!
//! Typed broadcast events shared by the store, the album sync service and the
//! host UI, built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`StoreEvent`] for durable writes, [`AlbumEvent`] for fetch lifecycle
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  emit (after commit)  ┌───────────┐
//! │ Store       ├──────────────────────>│           │    subscribe   ┌─────────────┐
//! └─────────────┘                       │ EventBus  ├───────────────>│ UI observer │
//! ┌─────────────┐  emit                 │           │                └─────────────┘
//! │ Album sync  ├──────────────────────>│           │
//! └─────────────┘                       └───────────┘
//! ```
//!
//! ## Ordering
//!
//! The store publishes while it still holds its writer lock, so every
//! subscriber observes store events in commit order. A subscriber that falls
//! more than the buffer size behind receives `RecvError::Lagged` and should
//! re-read the store.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ChangeKind, CoreEvent, EntityChange, EntityKind, EventBus, StoreEvent, WriterContext};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Store(StoreEvent::Changed(EntityChange {
//!         kind: ChangeKind::Insert,
//!         entity: EntityKind::Pin,
//!         id: "pin-1".to_string(),
//!         pin_id: "pin-1".to_string(),
//!         origin: WriterContext::Interactive,
//!         cascade: false,
//!     })))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Store(_)));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Durable store changes
    Store(StoreEvent),
    /// Album fetch lifecycle
    Album(AlbumEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Store(e) => e.description(),
            CoreEvent::Album(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Album(AlbumEvent::FetchFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Album(AlbumEvent::FetchCommitted { .. }) => EventSeverity::Info,
            CoreEvent::Store(StoreEvent::PhotosReplaced { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Pin the event concerns.
    pub fn pin_id(&self) -> &str {
        match self {
            CoreEvent::Store(StoreEvent::Changed(change)) => &change.pin_id,
            CoreEvent::Store(StoreEvent::PhotosReplaced { pin_id, .. }) => pin_id,
            CoreEvent::Album(AlbumEvent::FetchStarted { pin_id, .. })
            | CoreEvent::Album(AlbumEvent::FetchCommitted { pin_id, .. })
            | CoreEvent::Album(AlbumEvent::FetchFailed { pin_id, .. }) => pin_id,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Store Events
// ============================================================================

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Entity a change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Pin,
    Photo,
}

/// Writer context a change was made through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterContext {
    /// Foreground edits driven by the user
    Interactive,
    /// Writes from background album fetches
    Background,
}

impl WriterContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriterContext::Interactive => "interactive",
            WriterContext::Background => "background",
        }
    }

    /// The context that has to merge to see writes made through this one.
    pub fn other(&self) -> Self {
        match self {
            WriterContext::Interactive => WriterContext::Background,
            WriterContext::Background => WriterContext::Interactive,
        }
    }
}

impl fmt::Display for WriterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single committed row change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityChange {
    pub kind: ChangeKind,
    pub entity: EntityKind,
    /// Id of the changed row
    pub id: String,
    /// Owning pin (the pin itself for pin changes)
    pub pin_id: String,
    /// Context the write went through
    pub origin: WriterContext,
    /// Photo rows touched as part of a pin delete or an album replace
    pub cascade: bool,
}

/// Events published by the store after a write is durable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum StoreEvent {
    /// One row inserted, updated or deleted.
    Changed(EntityChange),
    /// A pin's album was swapped for a new batch. Follows the row events of the swap.
    PhotosReplaced {
        pin_id: String,
        photo_count: usize,
        origin: WriterContext,
    },
}

impl StoreEvent {
    fn description(&self) -> &str {
        match self {
            StoreEvent::Changed(change) => match (change.entity, change.kind) {
                (EntityKind::Pin, ChangeKind::Insert) => "Pin created",
                (EntityKind::Pin, ChangeKind::Update) => "Pin moved",
                (EntityKind::Pin, ChangeKind::Delete) => "Pin deleted",
                (EntityKind::Photo, ChangeKind::Insert) => "Photo added",
                (EntityKind::Photo, ChangeKind::Update) => "Photo updated",
                (EntityKind::Photo, ChangeKind::Delete) => "Photo deleted",
            },
            StoreEvent::PhotosReplaced { .. } => "Album replaced",
        }
    }
}

// ============================================================================
// Album Events
// ============================================================================

/// Fetch lifecycle of a pin's album.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AlbumEvent {
    /// A search for the pin's location went out.
    FetchStarted {
        pin_id: String,
        /// True for an explicit "new collection" request
        refresh: bool,
    },
    /// The new batch is committed. Zero photos is a valid, empty album.
    FetchCommitted { pin_id: String, photo_count: usize },
    /// The search failed; the previous album is untouched.
    FetchFailed { pin_id: String, message: String },
}

impl AlbumEvent {
    fn description(&self) -> &str {
        match self {
            AlbumEvent::FetchStarted { .. } => "Album fetch started",
            AlbumEvent::FetchCommitted { .. } => "Album fetch committed",
            AlbumEvent::FetchFailed { .. } => "Album fetch failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let album_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Album(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Restricts the stream to events about one pin.
    pub fn for_pin(self, pin_id: impl Into<String>) -> Self {
        let pin_id = pin_id.into();
        self.filter(move |event| event.pin_id() == pin_id)
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pin_change(kind: ChangeKind, id: &str) -> CoreEvent {
        CoreEvent::Store(StoreEvent::Changed(EntityChange {
            kind,
            entity: EntityKind::Pin,
            id: id.to_string(),
            pin_id: id.to_string(),
            origin: WriterContext::Interactive,
            cascade: false,
        }))
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(pin_change(ChangeKind::Insert, "pin-1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Album(AlbumEvent::FetchStarted {
            pin_id: "pin-1".to_string(),
            refresh: false,
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_events_arrive_in_emit_order() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        bus.emit(pin_change(ChangeKind::Insert, "pin-1")).ok();
        bus.emit(pin_change(ChangeKind::Update, "pin-1")).ok();
        bus.emit(pin_change(ChangeKind::Delete, "pin-1")).ok();

        for expected in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            match sub.recv().await.unwrap() {
                CoreEvent::Store(StoreEvent::Changed(change)) => assert_eq!(change.kind, expected),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Album(_)));

        bus.emit(pin_change(ChangeKind::Insert, "pin-1")).ok();
        let album_event = CoreEvent::Album(AlbumEvent::FetchCommitted {
            pin_id: "pin-1".to_string(),
            photo_count: 2,
        });
        bus.emit(album_event.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), album_event);
    }

    #[tokio::test]
    async fn test_event_stream_for_pin() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).for_pin("pin-2");

        bus.emit(pin_change(ChangeKind::Insert, "pin-1")).ok();
        bus.emit(pin_change(ChangeKind::Insert, "pin-2")).ok();

        assert_eq!(stream.recv().await.unwrap().pin_id(), "pin-2");
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(pin_change(ChangeKind::Insert, &format!("pin-{}", i))).ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn test_try_recv_reports_closed() {
        let bus = EventBus::new(4);
        let mut stream = EventStream::new(bus.subscribe());
        drop(bus);

        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Closed))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Album(AlbumEvent::FetchFailed {
            pin_id: "pin-1".to_string(),
            message: "timeout".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);
        assert_eq!(
            pin_change(ChangeKind::Insert, "pin-1").severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_descriptions() {
        assert_eq!(pin_change(ChangeKind::Update, "p").description(), "Pin moved");
        let replaced = CoreEvent::Store(StoreEvent::PhotosReplaced {
            pin_id: "p".to_string(),
            photo_count: 0,
            origin: WriterContext::Background,
        });
        assert_eq!(replaced.description(), "Album replaced");
    }

    #[test]
    fn test_event_serialization_shape() {
        let json = serde_json::to_value(pin_change(ChangeKind::Delete, "pin-9")).unwrap();
        assert_eq!(json["type"], "Store");
        assert_eq!(json["payload"]["event"], "Changed");
        assert_eq!(json["payload"]["kind"], "delete");
        assert_eq!(json["payload"]["entity"], "pin");
        assert_eq!(json["payload"]["origin"], "interactive");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, pin_change(ChangeKind::Delete, "pin-9"));
    }

    #[test]
    fn test_writer_context_other() {
        assert_eq!(WriterContext::Interactive.other(), WriterContext::Background);
        assert_eq!(WriterContext::Background.other(), WriterContext::Interactive);
    }
}
