//! Implementations of the collaborator contracts that live inside the process.
pub mod events;
pub mod memory;
pub mod payment;

pub use events::{NatsPublisher, RecordingPublisher, TracingPublisher};
pub use memory::{InMemoryCartStore, InMemoryCatalog, InMemoryCouponStore, InMemoryOrderStore};
pub use payment::MockPaymentGateway;
