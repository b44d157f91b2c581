//! Client-side order management core: transport seam, cached store and the
//! order list controller that a presentation layer drives.

pub mod controller;
pub mod error;
pub mod store;
pub mod transport;

pub use controller::{LoadOutcome, OrderListController, OrderListView, ViewPhase};
pub use error::{ErrorOrigin, NetworkError, StoreError, TransportError};
pub use store::{NetworkState, OrderStore, StoreConfig, TransitionPolicy};
pub use transport::{HttpOrderTransport, HttpTransportConfig, OrderTransport};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
