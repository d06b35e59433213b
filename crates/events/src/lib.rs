//! Meridian import event bus.
//!
//! This crate provides the in-process publish/subscribe hub the import
//! pipeline reports through:
//!
//! - [`EventBus`]: fan-out hub backed by `tokio::sync::broadcast`.
//! - [`ImportEvent`]: the typed import lifecycle event.
//!
//! The API crate subscribes to feed the SSE progress stream; the engine
//! publishes as commits advance.

pub mod bus;

pub use bus::{EventBus, ImportEvent};
