//! Guest stay folio (event-sourced decider).
//!
//! Pure decision model for a guest's on-property account: check-in opens it,
//! charges and payments move its balance, and check-out closes it only once the
//! balance is settled. No IO, no HTTP, no storage.

pub mod amount;
pub mod decider;
pub mod ids;

pub use amount::Amount;
pub use decider::{
    ChargeRecorded, CheckIn, CheckOut, CheckoutFailureReason, GuestCheckedIn, GuestCheckedOut,
    GuestCheckoutFailed, GuestStayAccountState, GuestStayCommand, GuestStayDecider, GuestStayError,
    GuestStayEvent, PaymentRecorded, RecordCharge, RecordPayment, STREAM_TYPE, check_in, check_out,
    evolve, initial_state, record_charge, record_payment,
};
pub use ids::{GuestId, GuestStayAccountId, RoomId, STAY_DATE_FORMAT, parse_stay_date};
