use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::{
    error::StoreError,
    models::{
        ClientInput, HealthResponse, InvoiceInput, InvoiceList, ItemUpdate, NextNumber,
        PreviewInput, StatusChange, StatusInput,
    },
    query::{search_clients, InvoiceQuery},
    reports,
    store::{InvoiceDefaults, Store},
    totals,
};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub defaults: InvoiceDefaults,
}

fn internal_error(msg: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    error!("{}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": msg.to_string()})),
    )
}

fn not_found(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": msg})))
}

fn bad_request(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({"error": msg})))
}

fn conflict(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::CONFLICT, Json(json!({"error": msg})))
}

fn store_error(e: StoreError) -> Response {
    match &e {
        StoreError::NotFound { .. } | StoreError::ItemNotFound { .. } => {
            not_found(&e.to_string()).into_response()
        }
        StoreError::ClientInUse { .. }
        | StoreError::DuplicateInvoice(_)
        | StoreError::NumberingExhausted(_) => {
            warn!("{}", e);
            conflict(&e.to_string()).into_response()
        }
        StoreError::UnknownClient(_) => bad_request(&e.to_string()).into_response(),
        StoreError::Validation(invalid) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": e.to_string(), "fields": invalid.errors})),
        )
            .into_response(),
        StoreError::LockPoisoned => internal_error(&e).into_response(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request logging (nginx-style)
// ────────────────────────────────────────────────────────────────────────────

fn log_request(method: &Method, uri: &Uri, headers: &HeaderMap, status: StatusCode) {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    let referer = headers
        .get("referer")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info!(
        "{} {} {} {} \"{}\" \"{}\"",
        method.as_str(),
        uri.path(),
        uri.query().unwrap_or(""),
        status.as_u16(),
        user_agent,
        referer
    );
}

fn logged(response: Response, method: &Method, uri: &Uri, headers: &HeaderMap) -> Response {
    log_request(method, uri, headers, response.status());
    response
}

// ────────────────────────────────────────────────────────────────────────────
// Router
// ────────────────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Clients
        .route("/api/clients", get(list_clients).post(create_client))
        .route(
            "/api/clients/:id",
            get(get_client).put(update_client).delete(delete_client),
        )
        // Invoices
        .route("/api/invoices", get(list_invoices).post(create_invoice))
        .route("/api/invoices/preview", post(preview_totals))
        .route("/api/invoices/next-number", get(next_number))
        .route(
            "/api/invoices/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/api/invoices/:id/status", put(update_status))
        .route("/api/invoices/:id/items", post(add_item))
        .route(
            "/api/invoices/:id/items/:index",
            axum::routing::patch(update_item).delete(remove_item),
        )
        // Overview
        .route("/api/dashboard", get(dashboard))
        .route("/api/reports", get(report))
        .with_state(state)
}

// ────────────────────────────────────────────────────────────────────────────
// Clients
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    match state.store.list_clients() {
        Ok(clients) => {
            let clients = search_clients(clients, params.q.as_deref());
            (StatusCode::OK, Json(json!(clients))).into_response()
        }
        Err(e) => store_error(e),
    }
}

pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_client(&id) {
        Ok(Some(client)) => (StatusCode::OK, Json(json!(client))).into_response(),
        Ok(None) => not_found("client not found").into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn create_client(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(input): Json<ClientInput>,
) -> impl IntoResponse {
    let response = match state.store.create_client(&input) {
        Ok(client) => (StatusCode::CREATED, Json(json!(client))).into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(input): Json<ClientInput>,
) -> impl IntoResponse {
    let response = match state.store.update_client(&id, &input) {
        Ok(client) => (StatusCode::OK, Json(json!(client))).into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let response = match state.store.delete_client(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

// ────────────────────────────────────────────────────────────────────────────
// Invoices
// ────────────────────────────────────────────────────────────────────────────

pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InvoiceQuery>,
) -> impl IntoResponse {
    match state.store.list_invoices() {
        Ok(invoices) => {
            let total = invoices.len();
            let invoices = query.apply(invoices);
            let list = InvoiceList {
                shown: invoices.len(),
                total,
                invoices,
            };
            (StatusCode::OK, Json(json!(list))).into_response()
        }
        Err(e) => store_error(e),
    }
}

pub async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_invoice(&id) {
        Ok(Some(invoice)) => (StatusCode::OK, Json(json!(invoice))).into_response(),
        Ok(None) => not_found("invoice not found").into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn create_invoice(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(input): Json<InvoiceInput>,
) -> impl IntoResponse {
    let response = match state.store.create_invoice(&input) {
        Ok(invoice) => (StatusCode::CREATED, Json(json!(invoice))).into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn update_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(input): Json<InvoiceInput>,
) -> impl IntoResponse {
    let response = match state.store.update_invoice(&id, &input) {
        Ok(invoice) => (StatusCode::OK, Json(json!(invoice))).into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn delete_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let response = match state.store.delete_invoice(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(input): Json<StatusInput>,
) -> impl IntoResponse {
    let result = state.store.modify_invoice(&id, &mut |invoice| {
        invoice.status = input.status;
        Ok(())
    });
    let response = match result {
        Ok(invoice) => {
            let change = StatusChange {
                next_actions: invoice.status.suggested_next().to_vec(),
                invoice,
            };
            (StatusCode::OK, Json(json!(change))).into_response()
        }
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let result = state.store.modify_invoice(&id, &mut |invoice| {
        invoice.items = totals::add_item(&invoice.items);
        Ok(())
    });
    let response = match result {
        Ok(invoice) => (StatusCode::OK, Json(json!(invoice))).into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, usize)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(update): Json<ItemUpdate>,
) -> impl IntoResponse {
    let result = state.store.modify_invoice(&id, &mut |invoice| {
        let item = invoice
            .items
            .get(index)
            .ok_or_else(|| StoreError::ItemNotFound {
                invoice: invoice.id.clone(),
                index,
            })?;
        let updated = totals::recompute_item(item, update.clone());
        invoice.items[index] = updated;
        Ok(())
    });
    let response = match result {
        Ok(invoice) => (StatusCode::OK, Json(json!(invoice))).into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(String, usize)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let result = state.store.modify_invoice(&id, &mut |invoice| {
        if index >= invoice.items.len() {
            return Err(StoreError::ItemNotFound {
                invoice: invoice.id.clone(),
                index,
            });
        }
        invoice.items = totals::remove_item(&invoice.items, index);
        Ok(())
    });
    let response = match result {
        Ok(invoice) => (StatusCode::OK, Json(json!(invoice))).into_response(),
        Err(e) => store_error(e),
    };
    logged(response, &method, &uri, &headers)
}

pub async fn preview_totals(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PreviewInput>,
) -> impl IntoResponse {
    let tax_rate = input.tax_rate.unwrap_or(state.defaults.tax_rate);
    let preview = totals::preview(&input.items, tax_rate);
    (StatusCode::OK, Json(json!(preview)))
}

#[derive(Deserialize)]
pub struct NextNumberParams {
    pub year: Option<i32>,
}

pub async fn next_number(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NextNumberParams>,
) -> impl IntoResponse {
    let year = params.year.unwrap_or_else(|| Utc::now().year());
    match state.store.next_invoice_number(year) {
        Ok(id) => (StatusCode::OK, Json(json!(NextNumber { id }))).into_response(),
        Err(e) => store_error(e),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Dashboard and reports
// ────────────────────────────────────────────────────────────────────────────

pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list_invoices() {
        Ok(invoices) => (StatusCode::OK, Json(json!(reports::dashboard(&invoices)))).into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list_invoices() {
        Ok(invoices) => (StatusCode::OK, Json(json!(reports::report(&invoices)))).into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.store.list_clients().is_ok();

    let resp = HealthResponse {
        status: "ok".to_string(),
        store: if store_ok { "ok".to_string() } else { "error".to_string() },
    };
    (StatusCode::OK, Json(json!(resp)))
}
