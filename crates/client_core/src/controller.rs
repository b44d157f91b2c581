//! View-facing controller for the order list: UI intents in, view model out.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use futures::StreamExt;
use shared::{Order, OrderId, OrderStatus};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{error::StoreError, store::OrderStore};

pub const STATUS_UPDATE_ERROR_PREFIX: &str = "Failed to update order";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewPhase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Read-only projection handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderListView {
    pub orders: Vec<Order>,
    pub selected: Option<Order>,
    pub loading: bool,
    pub error: Option<String>,
    pub phase: ViewPhase,
}

impl OrderListView {
    fn apply_orders(&mut self, orders: Vec<Order>) {
        if let Some(selected) = self.selected.as_mut() {
            if let Some(fresh) = orders.iter().find(|order| order.id == selected.id) {
                *selected = fresh.clone();
            }
        }
        self.orders = orders;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    Failed { message: String },
    /// A newer `load()` started before this one finished; its result was dropped.
    Superseded,
}

pub struct OrderListController {
    store: Arc<OrderStore>,
    view: Arc<watch::Sender<OrderListView>>,
    generation: AtomicU64,
    follower: Option<JoinHandle<()>>,
}

impl OrderListController {
    pub fn new(store: Arc<OrderStore>) -> Self {
        let (view, _) = watch::channel(OrderListView::default());
        Self {
            store,
            view: Arc::new(view),
            generation: AtomicU64::new(0),
            follower: None,
        }
    }

    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    pub fn view(&self) -> OrderListView {
        self.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<OrderListView> {
        self.view.subscribe()
    }

    /// Keeps the visible list in step with the store's published collection,
    /// including changes made by other store users. Must be called inside a
    /// tokio runtime.
    pub fn attach(&mut self) {
        if self.follower.is_some() {
            return;
        }
        let mut updates = self.store.updates();
        let view = Arc::clone(&self.view);
        self.follower = Some(tokio::spawn(async move {
            while let Some(orders) = updates.next().await {
                view.send_modify(|state| state.apply_orders(orders));
            }
        }));
        debug!("orders: controller attached to store updates");
    }

    /// Stops following the store and waits until the subscription is released.
    pub async fn detach(&mut self) {
        if let Some(follower) = self.follower.take() {
            follower.abort();
            let _ = follower.await;
            debug!("orders: controller detached from store updates");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.follower.is_some()
    }

    pub async fn load(&self) -> LoadOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.view.send_modify(|view| {
            view.loading = true;
            view.error = None;
            view.phase = ViewPhase::Loading;
        });

        let result = self.store.fetch_all().await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "orders: dropping superseded load result");
            return LoadOutcome::Superseded;
        }

        match result {
            Ok(_) => {
                let orders = self.store.orders();
                let count = orders.len();
                self.view.send_modify(|view| {
                    view.apply_orders(orders);
                    view.loading = false;
                    view.phase = ViewPhase::Success;
                });
                LoadOutcome::Loaded { count }
            }
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "orders: load failed");
                self.view.send_modify(|view| {
                    view.loading = false;
                    view.error = Some(message.clone());
                    view.phase = ViewPhase::Error;
                });
                LoadOutcome::Failed { message }
            }
        }
    }

    pub fn select(&self, order: Option<Order>) {
        if let Some(order) = &order {
            info!(order_id = order.id.0, "orders: order selected");
        }
        self.view.send_modify(|view| view.selected = order);
    }

    pub async fn change_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        match self.store.update_status(id, status).await {
            Ok(order) => {
                let orders = self.store.orders();
                self.view.send_modify(|view| view.apply_orders(orders));
                Ok(order)
            }
            Err(err) => {
                let message = format!("{STATUS_UPDATE_ERROR_PREFIX}: {err}");
                self.view.send_modify(|view| view.error = Some(message));
                Err(err)
            }
        }
    }

    pub fn orders_with_status(&self, status: OrderStatus) -> Vec<Order> {
        self.view
            .borrow()
            .orders
            .iter()
            .filter(|order| order.status == status)
            .cloned()
            .collect()
    }
}

impl Drop for OrderListController {
    fn drop(&mut self) {
        if let Some(follower) = self.follower.take() {
            follower.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
