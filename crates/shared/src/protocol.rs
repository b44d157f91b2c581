//! JSON wire shapes exchanged with the order API.
//!
//! Keys are camelCase and `createdAt` travels as an ISO-8601 string. Records
//! are converted into the typed [`Order`] before anything else sees them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Order, OrderDraft, OrderId, OrderItem, OrderStatus, ProductId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRecord {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderId>,
    pub customer_name: String,
    pub items: Vec<OrderItemRecord>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: String,
}

/// Body of `PATCH {api}/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPatch {
    pub status: OrderStatus,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("order record has no id")]
    MissingId,
    #[error("invalid createdAt timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RecordError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| RecordError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<OrderItemRecord> for OrderItem {
    fn from(record: OrderItemRecord) -> Self {
        Self {
            product_id: record.product_id,
            product_name: record.product_name,
            quantity: record.quantity,
            unit_price: record.unit_price,
        }
    }
}

impl From<&OrderItem> for OrderItemRecord {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = RecordError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let id = record.id.ok_or(RecordError::MissingId)?;
        let created_at = parse_timestamp(&record.created_at)?;
        Ok(Self {
            id,
            customer_name: record.customer_name,
            items: record.items.into_iter().map(OrderItem::from).collect(),
            total_amount: record.total_amount,
            status: record.status,
            created_at,
        })
    }
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            id: Some(order.id),
            customer_name: order.customer_name.clone(),
            items: order.items.iter().map(OrderItemRecord::from).collect(),
            total_amount: order.total_amount,
            status: order.status,
            created_at: format_timestamp(&order.created_at),
        }
    }
}

impl From<&OrderDraft> for OrderRecord {
    fn from(draft: &OrderDraft) -> Self {
        Self {
            id: None,
            customer_name: draft.customer_name.clone(),
            items: draft.items.iter().map(OrderItemRecord::from).collect(),
            total_amount: draft.total_amount,
            status: draft.status,
            created_at: format_timestamp(&draft.created_at),
        }
    }
}
