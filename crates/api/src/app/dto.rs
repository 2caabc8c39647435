use axum::extract::rejection::JsonRejection;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use folio_core::DomainError;
use folio_guest_stay::{Amount, GuestId, GuestStayAccountId, RoomId, STAY_DATE_FORMAT, parse_stay_date};
use folio_infra::projections::GuestStayDetails;

// -------------------------
// Request DTOs
// -------------------------

/// Body of charge and payment requests. Accepts `"100.00"` or `100.00`.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

impl AmountRequest {
    pub fn into_amount(self) -> Result<Amount, DomainError> {
        Amount::new(self.amount)
    }
}

/// Unwrap a JSON body, turning extractor rejections into validation errors.
pub fn body<T>(payload: Result<axum::Json<T>, JsonRejection>) -> Result<T, DomainError> {
    payload
        .map(|axum::Json(v)| v)
        .map_err(|e| DomainError::validation(format!("invalid request body: {}", e.body_text())))
}

// -------------------------
// Path parsing
// -------------------------

pub fn stay_ids(guest_id: &str, room_id: &str) -> Result<(GuestId, RoomId), DomainError> {
    Ok((GuestId::new(guest_id)?, RoomId::new(room_id)?))
}

pub fn account_id(guest_id: &str, room_id: &str, check_in_date: &str) -> Result<GuestStayAccountId, DomainError> {
    let (guest_id, room_id) = stay_ids(guest_id, room_id)?;
    let date = parse_stay_date(check_in_date)?;
    Ok(GuestStayAccountId::new(&guest_id, &room_id, date))
}

// -------------------------
// Response mapping
// -------------------------

pub fn details_to_json(rm: GuestStayDetails) -> serde_json::Value {
    json!({
        "guest_stay_account_id": rm.guest_stay_account_id.as_str(),
        "guest_id": rm.guest_id.as_str(),
        "room_id": rm.room_id.as_str(),
        "check_in_date": rm.check_in_date.format(STAY_DATE_FORMAT).to_string(),
        "status": rm.status,
        "balance": rm.balance.to_string(),
        "transactions": rm.transactions.iter().map(|t| json!({
            "id": t.transaction_id,
            "kind": t.kind,
            "amount": t.amount.to_string(),
            "recorded_at": t.recorded_at.to_rfc3339(),
        })).collect::<Vec<_>>(),
        "checked_in_at": rm.checked_in_at.to_rfc3339(),
        "checked_out_at": rm.checked_out_at.map(|t| t.to_rfc3339()),
        "failed_checkout_attempts": rm.failed_checkout_attempts,
        "last_checkout_failure": rm.last_checkout_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_is_deterministic_and_validated() {
        let id = account_id("g-1", "12", "2024-05-17").unwrap();
        assert_eq!(id.as_str(), "guest_stay_account-g-1-12-2024-05-17");

        assert!(matches!(account_id(" ", "12", "2024-05-17"), Err(DomainError::InvalidId(_))));
        assert!(matches!(account_id("g-1", "12", "17/05/2024"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn amounts_must_be_positive() {
        let ok: AmountRequest = serde_json::from_str(r#"{"amount":"100.00"}"#).unwrap();
        assert_eq!(ok.into_amount().unwrap().to_string(), "100.00");

        let zero: AmountRequest = serde_json::from_str(r#"{"amount":"0"}"#).unwrap();
        assert!(zero.into_amount().is_err());
    }
}
