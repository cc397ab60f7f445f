//! UI collaborator callbacks derived from the event bus.
//!
//! Row-level photo events produced by an album replace or a pin delete are
//! folded into `on_photos_replaced` / `on_pin_deleted`; only photos the user
//! deleted one by one reach `on_photo_deleted`.

use core_runtime::events::{
    AlbumEvent, ChangeKind, CoreEvent, EntityKind, EventBus, StoreEvent,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Callbacks a presentation layer implements. All default to no-ops.
pub trait AlbumObserver: Send + Sync {
    fn on_pin_created(&self, _pin_id: &str) {}

    fn on_pin_moved(&self, _pin_id: &str) {}

    fn on_pin_deleted(&self, _pin_id: &str) {}

    fn on_photos_replaced(&self, _pin_id: &str, _photo_count: usize) {}

    fn on_photo_deleted(&self, _pin_id: &str, _photo_id: &str) {}

    fn on_fetch_failed(&self, _pin_id: &str, _message: &str) {}
}

/// Route one bus event to the matching callback.
pub fn dispatch_event(event: &CoreEvent, observer: &dyn AlbumObserver) {
    match event {
        CoreEvent::Store(StoreEvent::Changed(change)) => match (change.entity, change.kind) {
            (EntityKind::Pin, ChangeKind::Insert) => observer.on_pin_created(&change.pin_id),
            (EntityKind::Pin, ChangeKind::Update) => observer.on_pin_moved(&change.pin_id),
            (EntityKind::Pin, ChangeKind::Delete) => observer.on_pin_deleted(&change.pin_id),
            (EntityKind::Photo, ChangeKind::Delete) if !change.cascade => {
                observer.on_photo_deleted(&change.pin_id, &change.id)
            }
            (EntityKind::Photo, _) => {}
        },
        CoreEvent::Store(StoreEvent::PhotosReplaced {
            pin_id,
            photo_count,
            ..
        }) => observer.on_photos_replaced(pin_id, *photo_count),
        CoreEvent::Album(AlbumEvent::FetchFailed { pin_id, message }) => {
            observer.on_fetch_failed(pin_id, message)
        }
        CoreEvent::Album(_) => {}
    }
}

/// Feed every event published from now on to `observer` on a tokio task.
///
/// The task ends once the bus is dropped. Events missed because the
/// observer fell behind are logged and skipped.
pub fn spawn_observer(event_bus: &EventBus, observer: Arc<dyn AlbumObserver>) -> JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => dispatch_event(&event, observer.as_ref()),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Observer lagged behind the event bus");
                }
                Err(RecvError::Closed) => {
                    debug!("Event bus closed; observer stopped");
                    break;
                }
            }
        }
    })
}
