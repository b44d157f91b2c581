use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{OrderDraft, OrderId, OrderItemRecord, OrderRecord, OrderStatus, ProductId};

use crate::{error::TransportError, transport::OrderTransport};

pub(crate) fn record(id: i64, customer: &str, status: OrderStatus) -> OrderRecord {
    OrderRecord {
        id: Some(OrderId(id)),
        customer_name: customer.to_string(),
        items: vec![OrderItemRecord {
            product_id: ProductId(100 + id),
            product_name: format!("Product {id}"),
            quantity: 1,
            unit_price: 25.0,
        }],
        total_amount: 25.0,
        status,
        created_at: format!("2024-01-{:02}T10:00:00Z", id.clamp(1, 28)),
    }
}

struct ScriptedFetch {
    delay: Duration,
    response: Result<Vec<OrderRecord>, TransportError>,
}

/// In-process stand-in for the order API.
///
/// `get_all` replays a script of responses in order. The other operations act
/// on a small server-side table seeded with `with_server_orders`.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    fetches: Mutex<VecDeque<ScriptedFetch>>,
    server_orders: Mutex<Vec<OrderRecord>>,
    patch_failure: Mutex<Option<TransportError>>,
    next_id: AtomicUsize,
    pub get_all_calls: AtomicUsize,
    pub get_by_id_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub patch_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1000),
            ..Self::default()
        }
    }

    pub(crate) fn with_server_orders(self, orders: Vec<OrderRecord>) -> Self {
        *self.server_orders.lock().expect("server orders") = orders;
        self
    }

    pub(crate) fn push_fetch(&self, response: Result<Vec<OrderRecord>, TransportError>) {
        self.push_delayed_fetch(Duration::ZERO, response);
    }

    pub(crate) fn push_delayed_fetch(
        &self,
        delay: Duration,
        response: Result<Vec<OrderRecord>, TransportError>,
    ) {
        self.fetches
            .lock()
            .expect("fetch script")
            .push_back(ScriptedFetch { delay, response });
    }

    pub(crate) fn fail_next_patch(&self, err: TransportError) {
        *self.patch_failure.lock().expect("patch failure") = Some(err);
    }

    pub(crate) fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub(crate) fn unavailable() -> TransportError {
    TransportError::server(503, "Service Unavailable")
}

#[async_trait]
impl OrderTransport for ScriptedTransport {
    async fn get_all(&self) -> Result<Vec<OrderRecord>, TransportError> {
        self.get_all_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.fetches.lock().expect("fetch script").pop_front();
        let Some(ScriptedFetch { delay, response }) = next else {
            return Err(TransportError::server(500, "no scripted response left"));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn get_by_id(&self, id: OrderId) -> Result<OrderRecord, TransportError> {
        self.get_by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.server_orders
            .lock()
            .expect("server orders")
            .iter()
            .find(|record| record.id == Some(id))
            .cloned()
            .ok_or(TransportError::NotFound(id))
    }

    async fn create(&self, draft: &OrderDraft) -> Result<OrderRecord, TransportError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
        let mut created = OrderRecord::from(draft);
        created.id = Some(OrderId(id));
        self.server_orders
            .lock()
            .expect("server orders")
            .push(created.clone());
        Ok(created)
    }

    async fn patch_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderRecord, TransportError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.patch_failure.lock().expect("patch failure").take() {
            return Err(err);
        }
        let mut server_orders = self.server_orders.lock().expect("server orders");
        let record = server_orders
            .iter_mut()
            .find(|record| record.id == Some(id))
            .ok_or(TransportError::NotFound(id))?;
        record.status = status;
        Ok(record.clone())
    }
}
