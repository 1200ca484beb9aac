// ============================================================================
// Domain Layer - Order Model
// ============================================================================
//
// Plain data types for orders and their line items, plus the boundary
// validation applied to incoming payloads. Everything stateful (storage,
// messaging, the pipeline itself) lives in the outer layers and works
// against these types.
//
// ============================================================================

pub mod order;

pub use order::{
    LineItem, NewLineItem, NewOrder, Order, OrderDraft, OrderStatus, ValidationError,
};
