//! # Registry Infrastructure
//!
//! Correlation between asynchronous native completions and the script-side
//! callbacks that requested them.
//!
//! ## Components
//!
//! - **IdAllocator**: wait-free, strictly increasing correlation ids
//! - **CallbackRegistry**: sharded id → handle map with metrics and teardown
//!
//! ```text
//! start operation ──→ IdAllocator::next ──→ CallbackRegistry::set ──→ transport
//! transport thread ──→ CallbackRegistry::remove / get ──→ Dispatcher
//! ```

pub mod callback_registry;
pub mod id_allocator;

pub use callback_registry::{CallbackRegistry, RegistryMetrics};
pub use id_allocator::IdAllocator;

/// Integer identifying one in-flight operation (fetch id or socket token)
pub type CorrelationId = i64;
