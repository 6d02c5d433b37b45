//! Domain model: aggregates, value objects and lifecycle events.
pub mod aggregates;
pub mod events;
pub mod value_objects;
