//! Fixed-interval polling of backend collections.
//!
//! Each [`Poller`] owns one background task that fetches immediately, then on
//! every tick, and publishes a [`PollState`] through a watch channel. A fetch
//! whose projection equals the current data leaves the data `Arc` untouched,
//! so watchers only wake when something they display changed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::api::{ApiClient, CategoryItem, StockItem};
use crate::error::ApiError;

/// A remote collection that can be projected into local rows.
#[async_trait]
pub trait Collection: Send + Sync + 'static {
    type Item: Clone + PartialEq + Send + Sync + 'static;

    /// Human label, as in "Failed to load {label} data".
    fn label(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<Self::Item>, ApiError>;
}

pub struct StockCollection {
    client: ApiClient,
}

impl StockCollection {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collection for StockCollection {
    type Item = StockItem;

    fn label(&self) -> &'static str {
        "stock"
    }

    async fn fetch(&self) -> Result<Vec<StockItem>, ApiError> {
        self.client.get_stock().await
    }
}

pub struct CategoryCollection {
    client: ApiClient,
}

impl CategoryCollection {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collection for CategoryCollection {
    type Item = CategoryItem;

    fn label(&self) -> &'static str {
        "category"
    }

    async fn fetch(&self) -> Result<Vec<CategoryItem>, ApiError> {
        self.client.get_category_stock().await
    }
}

#[derive(Debug, Clone)]
pub struct PollState<T> {
    pub data: Arc<Vec<T>>,
    /// True until the first fetch finished, whatever its outcome.
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            data: Arc::new(Vec::new()),
            loading: true,
            error: None,
        }
    }
}

/// Folds one fetch outcome into `state`. Returns whether anything changed.
fn apply_outcome<T: PartialEq>(
    state: &mut PollState<T>,
    outcome: Result<Vec<T>, ApiError>,
    label: &str,
) -> bool {
    let mut changed = false;

    match outcome {
        Ok(items) => {
            if *state.data != items {
                state.data = Arc::new(items);
                changed = true;
            }
            if state.error.take().is_some() {
                changed = true;
            }
        }
        Err(err) => {
            error!("Error fetching {} data: {}", label, err);
            let message = format!("Failed to load {} data", label);
            if state.error.as_deref() != Some(message.as_str()) {
                state.error = Some(message);
                changed = true;
            }
        }
    }

    if state.loading {
        state.loading = false;
        changed = true;
    }
    changed
}

pub struct Poller<T> {
    state: watch::Receiver<PollState<T>>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Poller<T> {
    pub fn spawn<C>(collection: C, interval: Duration) -> Self
    where
        C: Collection<Item = T>,
    {
        let (tx, state) = watch::channel(PollState::default());
        let cancel_token = CancellationToken::new();

        info!("polling {} every {:?}", collection.label(), interval);
        let handle = tokio::spawn(poll_loop(collection, interval, tx, cancel_token.clone()));

        Self {
            state,
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn state(&self) -> PollState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.state.clone()
    }

    /// Cancels the schedule and any fetch in flight, then waits for the task.
    pub async fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!("poller task failed to join: {}", err);
            }
        }
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn poll_loop<C: Collection>(
    collection: C,
    interval: Duration,
    tx: watch::Sender<PollState<C::Item>>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = cancel_token.cancelled() => break,
            outcome = collection.fetch() => outcome,
        };

        let label = collection.label();
        tx.send_if_modified(|state| apply_outcome(state, outcome, label));
    }

    debug!("{} poller stopped", collection.label());
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Scripted = Result<Vec<u32>, StatusCode>;

    #[derive(Clone, Default)]
    struct Scripts {
        queue: Arc<Mutex<VecDeque<Scripted>>>,
        calls: Arc<AtomicUsize>,
    }

    struct FakeCollection(Scripts);

    #[async_trait]
    impl Collection for FakeCollection {
        type Item = u32;

        fn label(&self) -> &'static str {
            "widget"
        }

        async fn fetch(&self) -> Result<Vec<u32>, ApiError> {
            self.0.calls.fetch_add(1, Ordering::SeqCst);
            let mut queue = self.0.queue.lock().unwrap();
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            next.unwrap_or(Ok(Vec::new())).map_err(ApiError::Status)
        }
    }

    fn scripted(results: Vec<Scripted>) -> (FakeCollection, Scripts) {
        let scripts = Scripts::default();
        scripts.queue.lock().unwrap().extend(results);
        (FakeCollection(scripts.clone()), scripts)
    }

    const INTERVAL: Duration = Duration::from_secs(5);

    #[test]
    fn identical_data_keeps_the_same_allocation() {
        let mut state = PollState::default();
        assert!(apply_outcome(&mut state, Ok(vec![1, 2]), "widget"));
        let first = state.data.clone();

        assert!(!apply_outcome(&mut state, Ok(vec![1, 2]), "widget"));
        assert!(Arc::ptr_eq(&first, &state.data));

        assert!(apply_outcome(&mut state, Ok(vec![2, 1]), "widget"));
        assert_eq!(*state.data, vec![2, 1]);
    }

    #[test]
    fn failure_keeps_previous_data() {
        let mut state = PollState::default();
        apply_outcome(&mut state, Ok(vec![7]), "widget");

        assert!(apply_outcome(
            &mut state,
            Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
            "widget"
        ));
        assert_eq!(*state.data, vec![7]);
        assert_eq!(state.error.as_deref(), Some("Failed to load widget data"));

        // Repeating the same failure is not a change.
        assert!(!apply_outcome(
            &mut state,
            Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
            "widget"
        ));

        assert!(apply_outcome(&mut state, Ok(vec![7]), "widget"));
        assert_eq!(state.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_on_interval() {
        let (collection, scripts) = scripted(vec![Ok(vec![1]), Ok(vec![1, 2])]);
        let mut poller = Poller::spawn(collection, INTERVAL);
        let mut rx = poller.subscribe();
        assert!(poller.state().loading);

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(!state.loading);
        assert_eq!(*state.data, vec![1]);
        assert_eq!(scripts.calls.load(Ordering::SeqCst), 1);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update().data, vec![1, 2]);
        assert_eq!(scripts.calls.load(Ordering::SeqCst), 2);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_poll_signals_nothing() {
        let (collection, scripts) = scripted(vec![Ok(vec![4, 5])]);
        let mut poller = Poller::spawn(collection, INTERVAL);
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        let first = rx.borrow_and_update().data.clone();

        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(scripts.calls.load(Ordering::SeqCst), 2);
        assert!(!rx.has_changed().unwrap());
        assert!(Arc::ptr_eq(&first, &poller.state().data));

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_failure_ends_loading_with_error() {
        let (collection, _scripts) =
            scripted(vec![Err(StatusCode::UNAUTHORIZED), Ok(vec![9])]);
        let mut poller = Poller::spawn(collection, INTERVAL);
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(!state.loading);
        assert!(state.data.is_empty());
        assert_eq!(state.error.as_deref(), Some("Failed to load widget data"));

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(!state.loading);
        assert_eq!(state.error, None);
        assert_eq!(*state.data, vec![9]);

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_polling() {
        let (collection, scripts) = scripted(vec![Ok(vec![1])]);
        let mut poller = Poller::spawn(collection, INTERVAL);
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        poller.stop().await;
        let calls = scripts.calls.load(Ordering::SeqCst);
        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(scripts.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn stock_collection_maps_backend_rows() {
        use crate::api::testing::FakeTransport;
        use crate::session::MemorySessionStore;
        use serde_json::json;

        let transport = Arc::new(FakeTransport::new());
        transport.respond(
            "http://erp.test/api/stock/",
            StatusCode::OK,
            json!([{"name": "Gear", "available_quantity": 3}]),
        );
        let client = ApiClient::new("http://erp.test", transport, Arc::new(MemorySessionStore::new()));

        let rows = StockCollection::new(client).fetch().await.unwrap();
        assert_eq!(rows[0].product_name, "Gear");
        assert_eq!(rows[0].available, 3);
        assert_eq!(rows[0].sold, 0);
    }
}
