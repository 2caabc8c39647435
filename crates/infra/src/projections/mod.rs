//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. They are rebuildable from the event store and idempotent under
//! at-least-once delivery.

pub mod guest_stay_details;

pub use guest_stay_details::{
    FolioTransaction, GuestStayDetails, GuestStayDetailsProjection, GuestStayProjectionError, GuestStayStatus,
    TransactionKind,
};
