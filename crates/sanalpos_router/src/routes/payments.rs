//! Payment route handlers. The JSON API maps errors through
//! [`ApiErrorResponse`]; the public browser routes always answer with
//! HTML.

use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use tracing::instrument;

use crate::{
    core::{
        api_models::{BinQueryRequest, PaymentRequest},
        errors::ApiErrorResponse,
    },
    routes::app::AppState,
    services,
};

/// Unwrap a core result, logging the full report and surfacing the
/// API-facing context.
fn api_error(report: error_stack::Report<ApiErrorResponse>) -> ApiErrorResponse {
    tracing::error!(?report, "payment operation failed");
    report.current_context().clone()
}

fn gateway_user(request: &HttpRequest) -> Option<String> {
    request
        .headers()
        .get("x-gateway-user")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

#[instrument(skip_all)]
pub async fn query_bin(
    state: web::Data<AppState>,
    payload: web::Json<BinQueryRequest>,
) -> Result<HttpResponse, ApiErrorResponse> {
    let response = state
        .core
        .query_bin(payload.into_inner())
        .await
        .map_err(api_error)?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip_all)]
pub async fn create_payment(
    state: web::Data<AppState>,
    request: HttpRequest,
    payload: web::Json<PaymentRequest>,
) -> Result<HttpResponse, ApiErrorResponse> {
    let response = state
        .core
        .create_payment(payload.into_inner(), gateway_user(&request))
        .await
        .map_err(api_error)?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip_all)]
pub async fn transaction_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiErrorResponse> {
    let response = state
        .core
        .get_transaction_status(&path.into_inner())
        .await
        .map_err(api_error)?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip_all)]
pub async fn refund(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiErrorResponse> {
    let response = state
        .core
        .refund_payment(&path.into_inner())
        .await
        .map_err(api_error)?;
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip_all)]
pub async fn cancel(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiErrorResponse> {
    let response = state
        .core
        .cancel_payment(&path.into_inner())
        .await
        .map_err(api_error)?;
    Ok(HttpResponse::Ok().json(response))
}

fn html_response(status: actix_web::http::StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body)
}

/// `GET /payment/{id}/form` - the browser-facing redirect document.
/// Errors come back as HTML, not JSON.
#[instrument(skip_all)]
pub async fn payment_form(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    use actix_web::http::StatusCode;

    match state.core.get_payment_form(&path.into_inner()).await {
        Ok(html) => html_response(StatusCode::OK, html),
        Err(report) => {
            let error = api_error(report);
            let status = match error {
                ApiErrorResponse::NotFound { .. } => StatusCode::NOT_FOUND,
                ApiErrorResponse::State { .. } | ApiErrorResponse::Validation { .. } => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            html_response(status, services::error_page(&error.to_string()))
        }
    }
}

/// `POST /payment/{id}/callback` - the bank-facing completion hook.
/// Always answers with a result page; a bank callback must never fetch
/// an unknown transaction without an explanatory response.
#[instrument(skip_all)]
pub async fn payment_callback(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Form<HashMap<String, String>>,
) -> HttpResponse {
    use actix_web::http::StatusCode;

    match state
        .core
        .process_callback(&path.into_inner(), &form.into_inner())
        .await
    {
        Ok(outcome) => html_response(StatusCode::OK, services::result_page(&outcome)),
        Err(report) => {
            let error = api_error(report);
            let status = match error {
                ApiErrorResponse::NotFound { .. } => StatusCode::NOT_FOUND,
                ApiErrorResponse::State { .. } => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            html_response(status, services::error_page(&error.to_string()))
        }
    }
}
