//! Domain model: aggregates, value objects, pricing and events
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod value_objects;
