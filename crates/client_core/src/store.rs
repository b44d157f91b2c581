use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::{Order, OrderDraft, OrderId, OrderRecord, OrderStatus};
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::{
    error::{StoreError, TransportError},
    transport::OrderTransport,
};

pub const DEFAULT_FETCH_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Whether `update_status` checks the requested status against the order's
/// current one before contacting the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    #[default]
    Unrestricted,
    Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transition policy '{0}' (expected 'unrestricted' or 'lifecycle')")]
pub struct UnknownTransitionPolicy(pub String);

impl FromStr for TransitionPolicy {
    type Err = UnknownTransitionPolicy;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unrestricted" => Ok(Self::Unrestricted),
            "lifecycle" => Ok(Self::Lifecycle),
            _ => Err(UnknownTransitionPolicy(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Extra attempts `fetch_all` makes after a transient failure.
    pub fetch_retries: u32,
    pub retry_delay: Duration,
    pub transition_policy: TransitionPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fetch_retries: DEFAULT_FETCH_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            transition_policy: TransitionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NetworkState {
    #[default]
    Idle,
    Loading,
    Error(String),
}

/// Owns the cached order collection and publishes every confirmed change.
///
/// The collection lives inside a `watch` channel: subscribers always observe
/// the latest snapshot, including ones that subscribe after the change.
pub struct OrderStore {
    transport: Arc<dyn OrderTransport>,
    config: StoreConfig,
    orders: watch::Sender<Vec<Order>>,
    network: watch::Sender<NetworkState>,
    fetch_generation: AtomicU64,
    applied_generation: AtomicU64,
}

impl OrderStore {
    pub fn new(transport: Arc<dyn OrderTransport>) -> Self {
        Self::with_config(transport, StoreConfig::default())
    }

    pub fn with_config(transport: Arc<dyn OrderTransport>, config: StoreConfig) -> Self {
        let (orders, _) = watch::channel(Vec::new());
        let (network, _) = watch::channel(NetworkState::Idle);
        Self {
            transport,
            config,
            orders,
            network,
            fetch_generation: AtomicU64::new(0),
            applied_generation: AtomicU64::new(0),
        }
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.borrow().clone()
    }

    pub fn get(&self, id: OrderId) -> Option<Order> {
        self.orders.borrow().iter().find(|order| order.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Order>> {
        self.orders.subscribe()
    }

    /// Stream of published collections, starting with the current one.
    pub fn updates(&self) -> WatchStream<Vec<Order>> {
        WatchStream::new(self.orders.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.orders.receiver_count()
    }

    pub fn network_state(&self) -> NetworkState {
        self.network.borrow().clone()
    }

    pub fn subscribe_network(&self) -> watch::Receiver<NetworkState> {
        self.network.subscribe()
    }

    /// Replaces the whole collection with the server's. When two fetches
    /// overlap, a response that arrives after a newer one was applied is
    /// returned to its caller but not published.
    pub async fn fetch_all(&self) -> Result<Vec<Order>, StoreError> {
        let generation = self.fetch_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.network.send_replace(NetworkState::Loading);

        let records = self
            .get_all_with_retry()
            .await
            .map_err(|err| self.fail("fetch_all", err.into()))?;
        let orders = records
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| self.fail("fetch_all", err.into()))?;

        let applied = self.orders.send_if_modified(|current| {
            if self.applied_generation.load(Ordering::SeqCst) > generation {
                return false;
            }
            self.applied_generation.store(generation, Ordering::SeqCst);
            *current = orders.clone();
            true
        });
        self.network.send_replace(NetworkState::Idle);

        if applied {
            info!(count = orders.len(), "orders: collection refreshed");
        } else {
            debug!(generation, "orders: stale fetch result not published");
        }
        Ok(orders)
    }

    /// Reads one order straight from the server. The cached collection is
    /// left untouched even when the fetched copy is newer.
    pub async fn fetch_one(&self, id: OrderId) -> Result<Order, StoreError> {
        let record = self
            .transport
            .get_by_id(id)
            .await
            .map_err(|err| self.fail("fetch_one", err.into()))?;
        let order = self.normalize("fetch_one", record)?;
        self.network.send_replace(NetworkState::Idle);
        Ok(order)
    }

    pub async fn create(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        if let Err(err) = draft.validate() {
            warn!(error = %err, "orders: draft rejected before submission");
            return Err(err.into());
        }

        let record = self
            .transport
            .create(&draft)
            .await
            .map_err(|err| self.fail("create", err.into()))?;
        let order = self.normalize("create", record)?;

        self.orders.send_modify(|orders| orders.push(order.clone()));
        self.network.send_replace(NetworkState::Idle);
        info!(order_id = order.id.0, "orders: order created");
        Ok(order)
    }

    /// Confirmed-only update: the local copy changes after the server answers,
    /// never before. Asking for the status a cached order already has is a
    /// no-op that returns the cached copy.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        if let Some(current) = self.get(id) {
            if current.status == status {
                debug!(order_id = id.0, %status, "orders: status unchanged; nothing sent");
                return Ok(current);
            }
            if self.config.transition_policy == TransitionPolicy::Lifecycle
                && !current.status.can_transition_to(status)
            {
                let err = StoreError::IllegalTransition {
                    id,
                    from: current.status,
                    to: status,
                };
                warn!(order_id = id.0, error = %err, "orders: status change refused");
                return Err(err);
            }
        }

        let record = self
            .transport
            .patch_status(id, status)
            .await
            .map_err(|err| self.fail("update_status", err.into()))?;
        let updated = self.normalize("update_status", record)?;

        let merged = self.orders.send_if_modified(|orders| {
            match orders.iter_mut().find(|order| order.id == id) {
                Some(slot) => {
                    *slot = updated.clone();
                    true
                }
                None => false,
            }
        });
        self.network.send_replace(NetworkState::Idle);

        if merged {
            info!(order_id = id.0, status = %updated.status, "orders: status updated");
        } else {
            debug!(
                order_id = id.0,
                "orders: updated order is not cached locally; nothing merged"
            );
        }
        Ok(updated)
    }

    async fn get_all_with_retry(&self) -> Result<Vec<OrderRecord>, TransportError> {
        let max_attempts = self.config.fetch_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.transport.get_all().await {
                Ok(records) => {
                    if attempt > 1 {
                        info!(attempt, max_attempts, "orders: fetch succeeded after retry");
                    }
                    return Ok(records);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %err,
                        "orders: fetch attempt failed; retrying"
                    );
                    if !self.config.retry_delay.is_zero() {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn normalize(&self, operation: &'static str, record: OrderRecord) -> Result<Order, StoreError> {
        Order::try_from(record).map_err(|err| self.fail(operation, err.into()))
    }

    fn fail(&self, operation: &'static str, err: StoreError) -> StoreError {
        warn!(operation, error = %err, "orders: request failed");
        self.network.send_replace(NetworkState::Error(err.to_string()));
        err
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
