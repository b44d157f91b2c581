//! Order data model and JSON wire records shared by the client crates.

pub mod domain;
pub mod error;
pub mod protocol;

pub use domain::{
    DraftError, Order, OrderDraft, OrderId, OrderItem, OrderStatus, ProductId, UnknownStatus,
};
pub use protocol::{OrderItemRecord, OrderRecord, RecordError, StatusPatch};
