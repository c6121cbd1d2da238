//! Persistent market store
//!
//! Holds the current [`MarketState`] behind a `watch` channel and mirrors it
//! into [`LocalStorage`]. Every mutation publishes a fresh snapshot at once
//! and queues a debounced write; the write serializes whatever state is
//! current when it fires, so a burst of updates lands as one write of the
//! final state.
//!
//! Nothing here returns an error to callers. A missing or corrupt stored
//! value loads as the empty state, and failed writes are logged and dropped
//! until the next mutation tries again.

use crate::storage::LocalStorage;
use crate::store::debounce::Debouncer;
use crate::store::models::{MarketState, Stock};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Reactive market data store with debounced write-back
pub struct MarketStore {
    storage: Arc<dyn LocalStorage>,
    key: String,
    write_delay: Duration,
    debouncer: Debouncer,
    state: watch::Sender<Arc<MarketState>>,
}

impl MarketStore {
    /// Load the persisted state (or the empty default) and start the store
    pub fn open(
        storage: Arc<dyn LocalStorage>,
        key: impl Into<String>,
        write_delay: Duration,
        runtime: Handle,
    ) -> Self {
        let key = key.into();
        let initial = load_state(storage.as_ref(), &key);

        info!(
            "Market store opened with {} stocks (key: {})",
            initial.stocks.len(),
            key
        );

        let (state, _) = watch::channel(Arc::new(initial));

        Self {
            storage,
            key,
            write_delay,
            debouncer: Debouncer::new(runtime),
            state,
        }
    }

    /// Current snapshot
    pub fn state(&self) -> Arc<MarketState> {
        Arc::clone(&self.state.borrow())
    }

    /// Receiver notified on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<MarketState>> {
        self.state.subscribe()
    }

    pub fn last_updated(&self) -> Option<i64> {
        self.state.borrow().last_updated
    }

    /// Replace the whole stock list and stamp it with the current time
    pub fn update_market_data(&self, stocks: Vec<Stock>) -> Arc<MarketState> {
        let next = Arc::new(MarketState {
            stocks,
            last_updated: Some(chrono::Utc::now().timestamp_millis()),
        });

        self.state.send_replace(Arc::clone(&next));
        debug!("Market data replaced: {} stocks", next.stocks.len());

        self.schedule_write();
        next
    }

    /// Whether a write-back is still waiting for its quiet period
    pub fn pending_write(&self) -> bool {
        self.debouncer.is_pending(&self.key)
    }

    /// Persist a pending write now instead of after its quiet period
    ///
    /// Without a pending write there is nothing newer than storage, so
    /// nothing is written.
    pub fn flush(&self) {
        if self.debouncer.cancel(&self.key) {
            save_state(self.storage.as_ref(), &self.key, &self.state());
        }
    }

    fn schedule_write(&self) {
        let storage = Arc::clone(&self.storage);
        let key = self.key.clone();
        let current = self.state.subscribe();

        self.debouncer.schedule(&self.key, self.write_delay, move || async move {
            let write = tokio::task::spawn_blocking(move || {
                let snapshot = Arc::clone(&current.borrow());
                save_state(storage.as_ref(), &key, &snapshot);
            });
            if let Err(e) = write.await {
                error!("Market data write-back task failed: {}", e);
            }
        });
    }
}

/// Read and parse the stored state, falling back to the empty default
fn load_state(storage: &dyn LocalStorage, key: &str) -> MarketState {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No persisted market data under {}", key);
            return MarketState::default();
        }
        Err(e) => {
            warn!("Failed to read persisted market data: {}", e);
            return MarketState::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(state) => state,
        Err(e) => {
            warn!("Discarding unreadable market data under {}: {}", key, e);
            MarketState::default()
        }
    }
}

/// Serialize and store the state; failures are logged only
fn save_state(storage: &dyn LocalStorage, key: &str, state: &MarketState) {
    let json = match serde_json::to_string(state) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize market data: {}", e);
            return;
        }
    };

    match storage.set_item(key, &json) {
        Ok(()) => debug!(
            "Persisted market data: {} stocks, {} bytes",
            state.stocks.len(),
            json.len()
        ),
        Err(e) => error!("Failed to persist market data: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteDb;
    use crate::error::{AppError, Result};
    use crate::storage::MemoryStorage;
    use crate::store::models::ExtraValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const KEY: &str = "cranepoint_market_data";
    const DELAY: Duration = Duration::from_millis(1000);

    fn spdb(price: f64) -> Stock {
        Stock {
            code: "600000".to_string(),
            name: "SPDB".to_string(),
            price,
            ..Default::default()
        }
    }

    fn open(storage: Arc<dyn LocalStorage>) -> MarketStore {
        MarketStore::open(storage, KEY, DELAY, Handle::current())
    }

    /// Fails every read
    struct BrokenStorage;

    impl LocalStorage for BrokenStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Err(AppError::Storage("storage unavailable".to_string()))
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
            Err(AppError::Storage("storage unavailable".to_string()))
        }

        fn remove_item(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Fails the first `failures` writes, then delegates
    struct FlakyStorage {
        inner: MemoryStorage,
        failures: AtomicUsize,
    }

    impl LocalStorage for FlakyStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::Storage("quota exceeded".to_string()));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<()> {
            self.inner.remove_item(key)
        }
    }

    /// Holds persisted data but fails every read
    struct UnreadableStorage {
        inner: MemoryStorage,
    }

    impl LocalStorage for UnreadableStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Err(AppError::Storage("read timed out".to_string()))
        }

        fn set_item(&self, key: &str, value: &str) -> Result<()> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<()> {
            self.inner.remove_item(key)
        }
    }

    fn stored(storage: &MemoryStorage) -> MarketState {
        let raw = storage.get_item(KEY).unwrap().expect("state persisted");
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_storage_loads_default() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open(storage.clone());

        assert_eq!(*store.state(), MarketState::default());
        assert_eq!(store.last_updated(), None);

        // Loading never writes back
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_value_loads_default() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(KEY, "{not json").unwrap();

        let store = open(storage.clone());
        assert_eq!(*store.state(), MarketState::default());

        // Valid JSON with the wrong shape is treated the same way
        storage.set_item(KEY, "[1, 2, 3]").unwrap();
        let store = open(storage);
        assert_eq!(*store.state(), MarketState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_loads_default() {
        let store = open(Arc::new(BrokenStorage));
        assert_eq!(*store.state(), MarketState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_is_visible_before_write_back() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open(storage.clone());
        let mut observer = store.subscribe();

        let before = chrono::Utc::now().timestamp_millis();
        store.update_market_data(vec![spdb(10.5)]);
        let after = chrono::Utc::now().timestamp_millis();

        assert!(observer.has_changed().unwrap());
        let seen = observer.borrow_and_update().clone();
        assert_eq!(seen.stocks, vec![spdb(10.5)]);

        let stamped = store.last_updated().unwrap();
        assert!(stamped >= before && stamped <= after);

        assert!(store.pending_write());
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_persists_final_state_once() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open(storage.clone());

        for price in [10.5, 10.6, 10.7] {
            store.update_market_data(vec![spdb(price)]);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tokio::time::sleep(DELAY * 2).await;

        assert_eq!(storage.write_count(), 1);
        let persisted = stored(&storage);
        assert_eq!(persisted.stocks.len(), 1);
        assert_eq!(persisted.stocks[0].price, 10.7);
        assert_eq!(persisted.last_updated, store.last_updated());
        assert!(!store.pending_write());
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_after_quiet_period_write_again() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open(storage.clone());

        store.update_market_data(vec![spdb(10.5)]);
        tokio::time::sleep(DELAY * 2).await;
        store.update_market_data(vec![spdb(11.0)]);
        tokio::time::sleep(DELAY * 2).await;

        assert_eq!(storage.write_count(), 2);
        assert_eq!(stored(&storage).stocks[0].price, 11.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_keeps_memory_and_retries_on_next_mutation() {
        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new(),
            failures: AtomicUsize::new(1),
        });
        let store = open(storage.clone());

        store.update_market_data(vec![spdb(10.5)]);
        tokio::time::sleep(DELAY * 2).await;

        // Write failed: nothing stored, memory untouched
        assert_eq!(storage.inner.get_item(KEY).unwrap(), None);
        assert_eq!(store.state().stocks[0].price, 10.5);

        store.update_market_data(vec![spdb(10.6)]);
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(stored(&storage.inner).stocks[0].price, 10.6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately_and_cancels_pending() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open(storage.clone());

        store.update_market_data(vec![spdb(10.5)]);
        store.flush();
        assert_eq!(storage.write_count(), 1);
        assert!(!store.pending_write());

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_without_pending_write_keeps_storage() {
        let inner = MemoryStorage::new();
        let persisted = serde_json::to_string(&MarketState {
            stocks: vec![spdb(10.5)],
            last_updated: Some(1_700_000_000_000),
        })
        .unwrap();
        inner.set_item(KEY, &persisted).unwrap();
        let storage = Arc::new(UnreadableStorage { inner });

        // Startup read fails, so memory holds the empty default
        let store = open(storage.clone());
        assert_eq!(*store.state(), MarketState::default());

        store.flush();
        assert_eq!(storage.inner.get_item(KEY).unwrap(), Some(persisted));
        assert_eq!(storage.inner.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nan_price_does_not_lose_records_on_reload() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open(storage.clone());

        let mut halted = spdb(f64::NAN);
        halted.code = "600001".to_string();
        store.update_market_data(vec![spdb(10.5), halted]);
        store.flush();

        let reopened = open(storage);
        let stocks = &reopened.state().stocks;
        assert_eq!(stocks.len(), 2);
        assert_eq!(stocks[0].price, 10.5);
        assert_eq!(stocks[1].code, "600001");
        assert_eq!(stocks[1].price, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_roundtrip_through_fresh_store() {
        let storage = Arc::new(MemoryStorage::new());
        let store = open(storage.clone());

        let mut stock = spdb(10.5);
        stock.prev_close = 10.2;
        stock
            .extra
            .insert("industry".to_string(), ExtraValue::Text("Banking".to_string()));
        store.update_market_data(vec![stock, spdb(9.9)]);
        tokio::time::sleep(DELAY * 2).await;

        let reopened = open(storage);
        assert_eq!(*reopened.state(), *store.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sqlite_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cranepoint.db");

        let expected = {
            let db: Arc<dyn LocalStorage> = Arc::new(SqliteDb::new(&path).unwrap());
            let store = open(db);
            store.update_market_data(vec![spdb(10.7)]);
            store.flush();
            store.state()
        };

        let db: Arc<dyn LocalStorage> = Arc::new(SqliteDb::new(&path).unwrap());
        let store = open(db);
        assert_eq!(store.state(), expected);
    }
}
