use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use folio_core::DomainError;
use folio_infra::command_dispatcher::DispatchError;

use crate::app::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Dispatch(e) => dispatch_error_to_response(e),
        ServiceError::StayNotFound { .. } => json_error(StatusCode::NOT_FOUND, "stay_not_found", err.to_string()),
        ServiceError::Registry(e) => json_error(StatusCode::SERVICE_UNAVAILABLE, "registry_unavailable", e.to_string()),
    }
}

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::Precondition { code, message } => {
            let status = match code {
                "already_opened" => StatusCode::CONFLICT,
                _ => StatusCode::FORBIDDEN,
            };
            json_error(status, code, message)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg),
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Internal(msg) => {
            tracing::error!(error = %msg, "internal invariant violated");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
        }
    }
}

/// Boundary validation failures (bad ids, dates, amounts, bodies).
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        other => dispatch_error_to_response(DispatchError::from(other)),
    }
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
