//! Album sync orchestration
//!
//! Decides when a pin's album needs photos, runs the search and commits
//! the batch through the store's background context.
//!
//! ## Rules
//!
//! - Opening an album fetches only if it has no photos.
//! - A refresh always fetches, but the old photos stay until the new batch
//!   replaces them in one transaction.
//! - One fetch per pin at a time; extra triggers are ignored.
//! - A failed fetch writes nothing and is reported to the caller. There are
//!   no automatic retries.
//! - A pin deleted mid-fetch turns the commit into a no-op.
//! - Dropping the caller's future mid-fetch releases the pin.

use core_runtime::events::{AlbumEvent, CoreEvent, EventBus};
use core_store::{PinId, ReplaceOutcome, Store};
use provider_flickr::PhotoSearch;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::state::{AlbumState, SyncOutcome};

type StateMap = HashMap<PinId, AlbumState>;

fn lock_states(states: &Mutex<StateMap>) -> MutexGuard<'_, StateMap> {
    states.lock().unwrap_or_else(PoisonError::into_inner)
}

fn put_state(states: &mut StateMap, pin_id: &PinId, state: AlbumState) {
    if state == AlbumState::Idle {
        states.remove(pin_id);
    } else {
        states.insert(pin_id.clone(), state);
    }
}

/// A pin held in `Fetching`.
///
/// Settling the claim records the outcome. Dropping it unsettled puts the
/// state from before the fetch back.
struct FetchClaim<'a> {
    states: &'a Mutex<StateMap>,
    pin_id: PinId,
    previous: Option<AlbumState>,
}

impl<'a> FetchClaim<'a> {
    /// Move `pin_id` to `Fetching`, or `None` if a fetch already holds it.
    fn acquire(states: &'a Mutex<StateMap>, pin_id: &PinId) -> Result<Option<Self>> {
        let mut map = lock_states(states);
        let current = map.get(pin_id).cloned().unwrap_or_default();
        if current.is_in_flight() {
            return Ok(None);
        }
        map.insert(pin_id.clone(), current.start_fetch()?);

        Ok(Some(Self {
            states,
            pin_id: pin_id.clone(),
            previous: Some(current),
        }))
    }

    fn settle(mut self, next: impl FnOnce(&AlbumState) -> Result<AlbumState>) -> Result<()> {
        let mut map = lock_states(self.states);
        let current = map.get(&self.pin_id).cloned().unwrap_or_default();
        let state = next(&current)?;
        put_state(&mut map, &self.pin_id, state);
        self.previous = None;
        Ok(())
    }

    fn commit(self, photo_count: usize) -> Result<()> {
        self.settle(|current| current.commit(photo_count))
    }

    fn fail(self, message: String) -> Result<()> {
        self.settle(|current| current.fail(message))
    }

    /// The pin is gone; keep no state for it.
    fn release(self) -> Result<()> {
        self.settle(|_| Ok(AlbumState::Idle))
    }
}

impl Drop for FetchClaim<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let mut map = lock_states(self.states);
            if map.get(&self.pin_id).is_some_and(AlbumState::is_in_flight) {
                put_state(&mut map, &self.pin_id, previous);
            }
            debug!(pin_id = %self.pin_id, "Fetch abandoned, claim released");
        }
    }
}

/// Fetches and commits pin albums.
///
/// Cheap to clone; clones share per-pin state.
///
/// # Example
///
/// ```ignore
/// let sync = AlbumSyncService::new(store.clone(), Arc::new(flickr), event_bus);
/// match sync.open_album(&pin.id).await? {
///     SyncOutcome::Committed { photo_count } => println!("{photo_count} photos"),
///     other => println!("{other:?}"),
/// }
/// ```
#[derive(Clone)]
pub struct AlbumSyncService {
    store: Store,
    search: Arc<dyn PhotoSearch>,
    event_bus: EventBus,
    states: Arc<Mutex<StateMap>>,
}

impl AlbumSyncService {
    pub fn new(store: Store, search: Arc<dyn PhotoSearch>, event_bus: EventBus) -> Self {
        Self {
            store,
            search,
            event_bus,
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Populate the album if it is empty.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Store`] with `NotFound` if the pin does not exist
    /// - [`SyncError::Fetch`] if the search failed
    #[instrument(skip(self, pin_id), fields(pin_id = %pin_id))]
    pub async fn open_album(&self, pin_id: &PinId) -> Result<SyncOutcome> {
        self.sync(pin_id, false).await
    }

    /// Replace the album with a fresh random page of photos.
    ///
    /// # Errors
    ///
    /// Same as [`open_album`](Self::open_album)
    #[instrument(skip(self, pin_id), fields(pin_id = %pin_id))]
    pub async fn refresh_album(&self, pin_id: &PinId) -> Result<SyncOutcome> {
        self.sync(pin_id, true).await
    }

    /// Current fetch state of a pin; `Idle` if it was never fetched.
    pub async fn state(&self, pin_id: &PinId) -> AlbumState {
        lock_states(&self.states)
            .get(pin_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop the resting state of a pin. An in-flight fetch keeps its state.
    pub async fn forget(&self, pin_id: &PinId) {
        let mut states = lock_states(&self.states);
        if !states.get(pin_id).is_some_and(AlbumState::is_in_flight) {
            states.remove(pin_id);
        }
    }

    async fn sync(&self, pin_id: &PinId, refresh: bool) -> Result<SyncOutcome> {
        let context = self.store.background();
        context.merge();

        let pin = context.get_pin(pin_id).await?;

        // Checked before claiming, so a refresh is never turned away by an
        // open that will not fetch.
        if !refresh {
            let photos = context.list_photos(pin_id).await?;
            if !photos.is_empty() {
                return Ok(SyncOutcome::AlreadyPopulated {
                    photo_count: photos.len(),
                });
            }
        }

        let Some(claim) = FetchClaim::acquire(&self.states, pin_id)? else {
            debug!("Fetch already in flight, ignoring trigger");
            return Ok(SyncOutcome::AlreadyInFlight);
        };

        self.emit(AlbumEvent::FetchStarted {
            pin_id: pin_id.to_string(),
            refresh,
        });

        match self.search.search_by_location(pin.latitude, pin.longitude).await {
            Ok(urls) => self.commit(claim, pin_id, urls).await,
            Err(e) => {
                warn!(error = %e, "Album fetch failed");
                context.merge();
                match context.get_pin(pin_id).await {
                    Err(gone) if gone.is_not_found() => {
                        claim.release()?;
                        info!("Pin deleted during failed fetch; state dropped");
                    }
                    _ => self.record_failure(claim, pin_id, e.to_string())?,
                }
                Err(SyncError::Fetch(e))
            }
        }
    }

    async fn commit(
        &self,
        claim: FetchClaim<'_>,
        pin_id: &PinId,
        urls: Vec<String>,
    ) -> Result<SyncOutcome> {
        match self.store.background().replace_photos(pin_id, &urls).await {
            Ok(ReplaceOutcome::Replaced { photo_count }) => {
                claim.commit(photo_count)?;

                self.emit(AlbumEvent::FetchCommitted {
                    pin_id: pin_id.to_string(),
                    photo_count,
                });

                info!(photo_count, "Album committed");
                Ok(SyncOutcome::Committed { photo_count })
            }
            Ok(ReplaceOutcome::PinMissing) => {
                claim.release()?;
                info!("Pin deleted during fetch; batch dropped");
                Ok(SyncOutcome::PinDeleted)
            }
            Err(e) => {
                warn!(error = %e, "Album commit failed");
                self.record_failure(claim, pin_id, e.to_string())?;
                Err(SyncError::Store(e))
            }
        }
    }

    fn record_failure(&self, claim: FetchClaim<'_>, pin_id: &PinId, message: String) -> Result<()> {
        claim.fail(message.clone())?;

        self.emit(AlbumEvent::FetchFailed {
            pin_id: pin_id.to_string(),
            message,
        });
        Ok(())
    }

    fn emit(&self, event: AlbumEvent) {
        self.event_bus.emit(CoreEvent::Album(event)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::ManualClock;
    use core_store::create_test_pool;
    use provider_flickr::SearchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    /// Scripted search: pops one result per call, optionally parking each
    /// call until released.
    #[derive(Default)]
    struct FakeSearch {
        results: StdMutex<Vec<std::result::Result<Vec<String>, SearchError>>>,
        calls: AtomicUsize,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeSearch {
        fn with_results(results: Vec<std::result::Result<Vec<String>, SearchError>>) -> Self {
            Self {
                results: StdMutex::new(results.into_iter().rev().collect()),
                ..Default::default()
            }
        }

        fn gated(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
            self.gate = Some((entered, release));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PhotoSearch for FakeSearch {
        async fn search_by_location(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> provider_flickr::Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn urls(prefix: &str, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("http://x/{prefix}{i}.jpg"))
            .collect()
    }

    async fn setup(search: Arc<FakeSearch>) -> (Store, AlbumSyncService) {
        let pool = create_test_pool().await.unwrap();
        let bus = EventBus::new(256);
        let store = Store::new(pool, bus.clone(), Arc::new(ManualClock::from_millis(1_000)));
        let service = AlbumSyncService::new(store.clone(), search, bus);
        (store, service)
    }

    #[tokio::test]
    async fn test_open_empty_album_fetches_and_commits() {
        let search = Arc::new(FakeSearch::with_results(vec![Ok(urls("a", 3))]));
        let (store, service) = setup(search.clone()).await;
        let pin = store.interactive().create_pin(37.0, -122.0).await.unwrap();

        let outcome = service.open_album(&pin.id).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Committed { photo_count: 3 });
        assert_eq!(
            service.state(&pin.id).await,
            AlbumState::Committed { photo_count: 3 }
        );

        let again = service.open_album(&pin.id).await.unwrap();
        assert_eq!(again, SyncOutcome::AlreadyPopulated { photo_count: 3 });
        assert_eq!(search.calls(), 1);
        assert_eq!(
            service.state(&pin.id).await,
            AlbumState::Committed { photo_count: 3 }
        );
    }

    #[tokio::test]
    async fn test_refresh_replaces_album() {
        let search = Arc::new(FakeSearch::with_results(vec![
            Ok(urls("old", 3)),
            Ok(urls("new", 2)),
        ]));
        let (store, service) = setup(search).await;
        let pin = store.interactive().create_pin(1.0, 1.0).await.unwrap();

        service.open_album(&pin.id).await.unwrap();
        let outcome = service.refresh_album(&pin.id).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Committed { photo_count: 2 });

        let ui = store.interactive();
        ui.merge();
        let photos = ui.list_photos(&pin.id).await.unwrap();
        assert_eq!(photos.len(), 2);
        assert!(photos.iter().all(|p| p.url_string.contains("new")));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_old_album() {
        let search = Arc::new(FakeSearch::with_results(vec![
            Ok(urls("keep", 2)),
            Err(SearchError::Network("offline".to_string())),
        ]));
        let (store, service) = setup(search).await;
        let pin = store.interactive().create_pin(1.0, 1.0).await.unwrap();
        service.open_album(&pin.id).await.unwrap();

        let before = store.interactive().list_photos(&pin.id).await.unwrap();
        let err = service.refresh_album(&pin.id).await.unwrap_err();
        assert!(matches!(err, SyncError::Fetch(SearchError::Network(_))));

        let ui = store.interactive();
        ui.merge();
        assert_eq!(ui.list_photos(&pin.id).await.unwrap(), before);
        assert!(matches!(
            service.state(&pin.id).await,
            AlbumState::Failed { .. }
        ));

        // Failure re-enables the trigger
        let outcome = service.refresh_album(&pin.id).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Committed { photo_count: 0 });
    }

    #[tokio::test]
    async fn test_empty_result_is_committed_not_failed() {
        let search = Arc::new(FakeSearch::with_results(vec![Ok(Vec::new())]));
        let (store, service) = setup(search).await;
        let pin = store.interactive().create_pin(0.0, -150.0).await.unwrap();

        let outcome = service.open_album(&pin.id).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Committed { photo_count: 0 });
        assert_eq!(
            service.state(&pin.id).await,
            AlbumState::Committed { photo_count: 0 }
        );
    }

    #[tokio::test]
    async fn test_second_trigger_while_fetching_is_ignored() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let search = Arc::new(
            FakeSearch::with_results(vec![Ok(urls("a", 4)), Ok(urls("b", 4))])
                .gated(entered.clone(), release.clone()),
        );
        let (store, service) = setup(search.clone()).await;
        let pin = store.interactive().create_pin(5.0, 5.0).await.unwrap();

        let first = {
            let service = service.clone();
            let pin_id = pin.id.clone();
            tokio::spawn(async move { service.open_album(&pin_id).await })
        };
        entered.notified().await;

        assert_eq!(service.state(&pin.id).await, AlbumState::Fetching);
        assert_eq!(
            service.refresh_album(&pin.id).await.unwrap(),
            SyncOutcome::AlreadyInFlight
        );
        assert_eq!(
            service.open_album(&pin.id).await.unwrap(),
            SyncOutcome::AlreadyInFlight
        );

        release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, SyncOutcome::Committed { photo_count: 4 });
        assert_eq!(search.calls(), 1);

        assert_eq!(photo_rows(&store).await, 4);
    }

    #[tokio::test]
    async fn test_pin_deleted_mid_fetch_is_noop() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let search = Arc::new(
            FakeSearch::with_results(vec![Ok(urls("late", 3))])
                .gated(entered.clone(), release.clone()),
        );
        let (store, service) = setup(search).await;
        let pin = store.interactive().create_pin(5.0, 5.0).await.unwrap();

        let fetch = {
            let service = service.clone();
            let pin_id = pin.id.clone();
            tokio::spawn(async move { service.open_album(&pin_id).await })
        };
        entered.notified().await;

        store.interactive().delete_pin(&pin.id).await.unwrap();
        release.notify_one();

        assert_eq!(fetch.await.unwrap().unwrap(), SyncOutcome::PinDeleted);
        assert_eq!(service.state(&pin.id).await, AlbumState::Idle);
        assert_eq!(photo_rows(&store).await, 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_for_deleted_pin_keeps_no_state() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let search = Arc::new(
            FakeSearch::with_results(vec![Err(SearchError::Network("offline".to_string()))])
                .gated(entered.clone(), release.clone()),
        );
        let (store, service) = setup(search).await;
        let pin = store.interactive().create_pin(5.0, 5.0).await.unwrap();

        let fetch = {
            let service = service.clone();
            let pin_id = pin.id.clone();
            tokio::spawn(async move { service.open_album(&pin_id).await })
        };
        entered.notified().await;

        store.interactive().delete_pin(&pin.id).await.unwrap();
        service.forget(&pin.id).await;
        release.notify_one();

        let err = fetch.await.unwrap().unwrap_err();
        assert!(matches!(err, SyncError::Fetch(SearchError::Network(_))));
        assert_eq!(service.state(&pin.id).await, AlbumState::Idle);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_releases_pin() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let search = Arc::new(
            FakeSearch::with_results(vec![Ok(urls("b", 3))])
                .gated(entered.clone(), release.clone()),
        );
        let (store, service) = setup(search.clone()).await;
        let pin = store.interactive().create_pin(5.0, 5.0).await.unwrap();

        // The open is dropped while parked in the search
        tokio::select! {
            outcome = service.open_album(&pin.id) => panic!("fetch finished early: {outcome:?}"),
            _ = entered.notified() => {}
        }
        assert_eq!(service.state(&pin.id).await, AlbumState::Idle);

        release.notify_one();
        assert_eq!(
            service.refresh_album(&pin.id).await.unwrap(),
            SyncOutcome::Committed { photo_count: 3 }
        );
        assert_eq!(search.calls(), 2);
        assert_eq!(photo_rows(&store).await, 3);
    }

    #[tokio::test]
    async fn test_refresh_is_not_blocked_by_open_on_populated_album() {
        let mut results = vec![Ok(urls("first", 2))];
        results.extend((0..5).map(|round| Ok(urls(&format!("round{round}-"), 2))));
        let search = Arc::new(FakeSearch::with_results(results));
        let (store, service) = setup(search.clone()).await;
        let pin = store.interactive().create_pin(5.0, 5.0).await.unwrap();
        service.open_album(&pin.id).await.unwrap();

        for _ in 0..5 {
            let (opened, refreshed) =
                tokio::join!(service.open_album(&pin.id), service.refresh_album(&pin.id));
            assert_eq!(
                opened.unwrap(),
                SyncOutcome::AlreadyPopulated { photo_count: 2 }
            );
            assert_eq!(
                refreshed.unwrap(),
                SyncOutcome::Committed { photo_count: 2 }
            );
        }
        assert_eq!(search.calls(), 6);
    }

    #[tokio::test]
    async fn test_unknown_pin_is_not_found() {
        let search = Arc::new(FakeSearch::default());
        let (_, service) = setup(search.clone()).await;

        let err = service.open_album(&PinId::new()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn test_album_events() {
        let search = Arc::new(FakeSearch::with_results(vec![
            Ok(urls("a", 1)),
            Err(SearchError::Api {
                message: "boom".to_string(),
            }),
        ]));
        let (store, service) = setup(search).await;
        let pin = store.interactive().create_pin(5.0, 5.0).await.unwrap();
        let mut rx = store.subscribe();

        service.open_album(&pin.id).await.unwrap();
        let _ = service.refresh_album(&pin.id).await;

        let mut album_events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CoreEvent::Album(e) = event {
                album_events.push(e);
            }
        }

        let id = pin.id.to_string();
        assert_eq!(
            album_events,
            vec![
                AlbumEvent::FetchStarted { pin_id: id.clone(), refresh: false },
                AlbumEvent::FetchCommitted { pin_id: id.clone(), photo_count: 1 },
                AlbumEvent::FetchStarted { pin_id: id.clone(), refresh: true },
                AlbumEvent::FetchFailed {
                    pin_id: id,
                    message: "Photo search API error: boom".to_string()
                },
            ]
        );
    }

    async fn photo_rows(store: &Store) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM photos")
            .fetch_one(store.pool())
            .await
            .unwrap()
    }
}
