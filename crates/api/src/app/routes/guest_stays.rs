use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde_json::json;

use folio_guest_stay::STAY_DATE_FORMAT;

use crate::app::services::{AppServices, CheckoutOutcome};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:guest_id/stays/:room_id", post(check_in))
        .route(
            "/:guest_id/stays/:room_id/periods/:check_in_date",
            axum::routing::get(get_details).delete(check_out),
        )
        .route(
            "/:guest_id/stays/:room_id/periods/:check_in_date/charges",
            post(record_charge),
        )
        .route(
            "/:guest_id/stays/:room_id/periods/:check_in_date/payments",
            post(record_payment),
        )
}

pub async fn check_in(
    Extension(services): Extension<Arc<AppServices>>,
    Path((guest_id, room_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (guest_id, room_id) = match dto::stay_ids(&guest_id, &room_id) {
        Ok(ids) => ids,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let (id, check_in_date) = match services.check_in(guest_id, room_id).await {
        Ok(v) => v,
        Err(e) => return errors::service_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "guest_stay_account_id": id.as_str(),
            "check_in_date": check_in_date.format(STAY_DATE_FORMAT).to_string(),
        })),
    )
        .into_response()
}

pub async fn record_charge(
    Extension(services): Extension<Arc<AppServices>>,
    Path((guest_id, room_id, check_in_date)): Path<(String, String, String)>,
    payload: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> axum::response::Response {
    let (id, amount) = match dto::account_id(&guest_id, &room_id, &check_in_date)
        .and_then(|id| Ok((id, dto::body(payload)?.into_amount()?)))
    {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.record_charge(&id, amount).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path((guest_id, room_id, check_in_date)): Path<(String, String, String)>,
    payload: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> axum::response::Response {
    let (id, amount) = match dto::account_id(&guest_id, &room_id, &check_in_date)
        .and_then(|id| Ok((id, dto::body(payload)?.into_amount()?)))
    {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.record_payment(&id, amount).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn check_out(
    Extension(services): Extension<Arc<AppServices>>,
    Path((guest_id, room_id, check_in_date)): Path<(String, String, String)>,
) -> axum::response::Response {
    let id = match dto::account_id(&guest_id, &room_id, &check_in_date) {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.check_out(&id).await {
        Ok(CheckoutOutcome::CheckedOut) => StatusCode::NO_CONTENT.into_response(),
        Ok(CheckoutOutcome::Failed(reason)) => {
            let balance = services.balance(&id).await.ok().flatten();
            (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "checkout_failed",
                    "reason": reason,
                    "message": reason.to_string(),
                    "balance": balance.map(|b| b.to_string()),
                })),
            )
                .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_details(
    Extension(services): Extension<Arc<AppServices>>,
    Path((guest_id, room_id, check_in_date)): Path<(String, String, String)>,
) -> axum::response::Response {
    let id = match dto::account_id(&guest_id, &room_id, &check_in_date) {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.details(&id) {
        Some(rm) => (StatusCode::OK, Json(dto::details_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "guest stay not found"),
    }
}
