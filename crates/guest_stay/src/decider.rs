use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use folio_core::{Decider, DomainError, StreamId};
use folio_events::{Command, Event};

use crate::amount::Amount;
use crate::ids::{GuestId, GuestStayAccountId, RoomId};

/// Stream type recorded alongside every guest stay event.
pub const STREAM_TYPE: &str = "guest_stay.account";

/// Current state of a folio, rebuilt by replaying its events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuestStayAccountState {
    #[default]
    NotOpened,
    /// `balance` = charges − payments since check-in.
    Opened { balance: Decimal },
    CheckedOut,
}

impl GuestStayAccountState {
    pub fn balance(&self) -> Option<Decimal> {
        match self {
            GuestStayAccountState::Opened { balance } => Some(*balance),
            _ => None,
        }
    }

    pub fn is_opened(&self) -> bool {
        matches!(self, GuestStayAccountState::Opened { .. })
    }
}

/// Command: CheckIn. Opens the account for the calendar day of `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub guest_id: GuestId,
    pub room_id: RoomId,
    pub now: DateTime<Utc>,
}

impl CheckIn {
    pub fn check_in_date(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn guest_stay_account_id(&self) -> GuestStayAccountId {
        GuestStayAccountId::new(&self.guest_id, &self.room_id, self.check_in_date())
    }
}

/// Command: RecordCharge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCharge {
    pub guest_stay_account_id: GuestStayAccountId,
    pub charge_id: Uuid,
    pub amount: Amount,
    pub now: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub guest_stay_account_id: GuestStayAccountId,
    pub payment_id: Uuid,
    pub amount: Amount,
    pub now: DateTime<Utc>,
}

/// Command: CheckOut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOut {
    pub guest_stay_account_id: GuestStayAccountId,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuestStayCommand {
    CheckIn(CheckIn),
    RecordCharge(RecordCharge),
    RecordPayment(RecordPayment),
    CheckOut(CheckOut),
}

impl Command for GuestStayCommand {
    fn target_stream(&self) -> StreamId {
        let id = match self {
            GuestStayCommand::CheckIn(cmd) => cmd.guest_stay_account_id(),
            GuestStayCommand::RecordCharge(cmd) => cmd.guest_stay_account_id.clone(),
            GuestStayCommand::RecordPayment(cmd) => cmd.guest_stay_account_id.clone(),
            GuestStayCommand::CheckOut(cmd) => cmd.guest_stay_account_id.clone(),
        };
        id.into()
    }
}

/// Event: GuestCheckedIn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCheckedIn {
    pub guest_stay_account_id: GuestStayAccountId,
    pub guest_id: GuestId,
    pub room_id: RoomId,
    pub check_in_date: NaiveDate,
    pub checked_in_at: DateTime<Utc>,
}

/// Event: ChargeRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRecorded {
    pub guest_stay_account_id: GuestStayAccountId,
    pub charge_id: Uuid,
    pub amount: Amount,
    pub recorded_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub guest_stay_account_id: GuestStayAccountId,
    pub payment_id: Uuid,
    pub amount: Amount,
    pub recorded_at: DateTime<Utc>,
}

/// Event: GuestCheckedOut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCheckedOut {
    pub guest_stay_account_id: GuestStayAccountId,
    pub checked_out_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutFailureReason {
    BalanceNotSettled,
}

impl CheckoutFailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckoutFailureReason::BalanceNotSettled => "balance not settled",
        }
    }
}

impl core::fmt::Display for CheckoutFailureReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event: GuestCheckoutFailed.
///
/// A recorded business rejection, not an error: it documents the attempt and
/// leaves the balance untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCheckoutFailed {
    pub guest_stay_account_id: GuestStayAccountId,
    pub reason: CheckoutFailureReason,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuestStayEvent {
    GuestCheckedIn(GuestCheckedIn),
    ChargeRecorded(ChargeRecorded),
    PaymentRecorded(PaymentRecorded),
    GuestCheckedOut(GuestCheckedOut),
    GuestCheckoutFailed(GuestCheckoutFailed),
}

impl GuestStayEvent {
    pub fn guest_stay_account_id(&self) -> &GuestStayAccountId {
        match self {
            GuestStayEvent::GuestCheckedIn(e) => &e.guest_stay_account_id,
            GuestStayEvent::ChargeRecorded(e) => &e.guest_stay_account_id,
            GuestStayEvent::PaymentRecorded(e) => &e.guest_stay_account_id,
            GuestStayEvent::GuestCheckedOut(e) => &e.guest_stay_account_id,
            GuestStayEvent::GuestCheckoutFailed(e) => &e.guest_stay_account_id,
        }
    }
}

impl Event for GuestStayEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GuestStayEvent::GuestCheckedIn(_) => "guest_stay.checked_in",
            GuestStayEvent::ChargeRecorded(_) => "guest_stay.charge_recorded",
            GuestStayEvent::PaymentRecorded(_) => "guest_stay.payment_recorded",
            GuestStayEvent::GuestCheckedOut(_) => "guest_stay.checked_out",
            GuestStayEvent::GuestCheckoutFailed(_) => "guest_stay.checkout_failed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GuestStayEvent::GuestCheckedIn(e) => e.checked_in_at,
            GuestStayEvent::ChargeRecorded(e) => e.recorded_at,
            GuestStayEvent::PaymentRecorded(e) => e.recorded_at,
            GuestStayEvent::GuestCheckedOut(e) => e.checked_out_at,
            GuestStayEvent::GuestCheckoutFailed(e) => e.attempted_at,
        }
    }
}

/// Command rejected because the account is in the wrong lifecycle state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuestStayError {
    #[error("guest stay account is not open")]
    NotOpen,

    #[error("guest stay account is already opened")]
    AlreadyOpened,

    #[error("guest stay account is already checked out")]
    AlreadyClosed,

    #[error("entry would push the balance out of the representable range")]
    BalanceOutOfRange,
}

impl GuestStayError {
    pub fn code(&self) -> &'static str {
        match self {
            GuestStayError::NotOpen => "not_open",
            GuestStayError::AlreadyOpened => "already_opened",
            GuestStayError::AlreadyClosed => "already_closed",
            GuestStayError::BalanceOutOfRange => "balance_out_of_range",
        }
    }
}

impl From<GuestStayError> for DomainError {
    fn from(value: GuestStayError) -> Self {
        match value {
            GuestStayError::BalanceOutOfRange => DomainError::validation(value.to_string()),
            other => DomainError::precondition(other.code(), other.to_string()),
        }
    }
}

pub fn initial_state() -> GuestStayAccountState {
    GuestStayAccountState::NotOpened
}

/// Fold one event into state.
///
/// Total: combinations that cannot come out of a well-ordered stream (e.g. a
/// second `GuestCheckedIn`) leave the state unchanged.
pub fn evolve(state: GuestStayAccountState, event: &GuestStayEvent) -> GuestStayAccountState {
    use GuestStayAccountState::{CheckedOut, NotOpened, Opened};

    match (state, event) {
        (NotOpened, GuestStayEvent::GuestCheckedIn(_)) => Opened {
            balance: Decimal::ZERO,
        },
        // Decisions refuse entries that would overflow, so saturation never kicks in for
        // streams this crate produced.
        (Opened { balance }, GuestStayEvent::ChargeRecorded(e)) => Opened {
            balance: balance.saturating_add(e.amount.value()),
        },
        (Opened { balance }, GuestStayEvent::PaymentRecorded(e)) => Opened {
            balance: balance.saturating_sub(e.amount.value()),
        },
        (Opened { .. }, GuestStayEvent::GuestCheckedOut(_)) => CheckedOut,
        (state @ Opened { .. }, GuestStayEvent::GuestCheckoutFailed(_)) => state,
        (state, _) => state,
    }
}

/// Balance of an open account; lifecycle errors otherwise.
fn open_balance(state: &GuestStayAccountState) -> Result<Decimal, GuestStayError> {
    match state {
        GuestStayAccountState::Opened { balance } => Ok(*balance),
        GuestStayAccountState::NotOpened => Err(GuestStayError::NotOpen),
        GuestStayAccountState::CheckedOut => Err(GuestStayError::AlreadyClosed),
    }
}

pub fn check_in(
    command: &CheckIn,
    state: &GuestStayAccountState,
) -> Result<Vec<GuestStayEvent>, GuestStayError> {
    match state {
        GuestStayAccountState::NotOpened => {}
        GuestStayAccountState::Opened { .. } => return Err(GuestStayError::AlreadyOpened),
        GuestStayAccountState::CheckedOut => return Err(GuestStayError::AlreadyClosed),
    }

    Ok(vec![GuestStayEvent::GuestCheckedIn(GuestCheckedIn {
        guest_stay_account_id: command.guest_stay_account_id(),
        guest_id: command.guest_id.clone(),
        room_id: command.room_id.clone(),
        check_in_date: command.check_in_date(),
        checked_in_at: command.now,
    })])
}

pub fn record_charge(
    command: &RecordCharge,
    state: &GuestStayAccountState,
) -> Result<Vec<GuestStayEvent>, GuestStayError> {
    let balance = open_balance(state)?;
    balance
        .checked_add(command.amount.value())
        .ok_or(GuestStayError::BalanceOutOfRange)?;

    Ok(vec![GuestStayEvent::ChargeRecorded(ChargeRecorded {
        guest_stay_account_id: command.guest_stay_account_id.clone(),
        charge_id: command.charge_id,
        amount: command.amount,
        recorded_at: command.now,
    })])
}

pub fn record_payment(
    command: &RecordPayment,
    state: &GuestStayAccountState,
) -> Result<Vec<GuestStayEvent>, GuestStayError> {
    let balance = open_balance(state)?;
    balance
        .checked_sub(command.amount.value())
        .ok_or(GuestStayError::BalanceOutOfRange)?;

    Ok(vec![GuestStayEvent::PaymentRecorded(PaymentRecorded {
        guest_stay_account_id: command.guest_stay_account_id.clone(),
        payment_id: command.payment_id,
        amount: command.amount,
        recorded_at: command.now,
    })])
}

/// Close the folio if it is settled; otherwise record the failed attempt.
///
/// An unsettled balance is not an `Err`: the returned `GuestCheckoutFailed`
/// is appended like any other event and callers branch on the event type.
pub fn check_out(
    command: &CheckOut,
    state: &GuestStayAccountState,
) -> Result<Vec<GuestStayEvent>, GuestStayError> {
    let balance = open_balance(state)?;

    if !balance.is_zero() {
        return Ok(vec![GuestStayEvent::GuestCheckoutFailed(GuestCheckoutFailed {
            guest_stay_account_id: command.guest_stay_account_id.clone(),
            reason: CheckoutFailureReason::BalanceNotSettled,
            attempted_at: command.now,
        })]);
    }

    Ok(vec![GuestStayEvent::GuestCheckedOut(GuestCheckedOut {
        guest_stay_account_id: command.guest_stay_account_id.clone(),
        checked_out_at: command.now,
    })])
}

/// The guest stay folio as a `Decider`.
#[derive(Debug, Default, Copy, Clone)]
pub struct GuestStayDecider;

impl Decider for GuestStayDecider {
    type State = GuestStayAccountState;
    type Command = GuestStayCommand;
    type Event = GuestStayEvent;
    type Error = GuestStayError;

    fn initial_state() -> Self::State {
        initial_state()
    }

    fn evolve(state: Self::State, event: &Self::Event) -> Self::State {
        evolve(state, event)
    }

    fn decide(command: &Self::Command, state: &Self::State) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GuestStayCommand::CheckIn(cmd) => check_in(cmd, state),
            GuestStayCommand::RecordCharge(cmd) => record_charge(cmd, state),
            GuestStayCommand::RecordPayment(cmd) => record_payment(cmd, state),
            GuestStayCommand::CheckOut(cmd) => check_out(cmd, state),
        }
    }
}
