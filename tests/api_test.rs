//! HTTP tests for the invoicing API, driven through the router without a socket.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use invoicedesk::handlers::{router, AppState};
use invoicedesk::models::{Client, Dashboard, Invoice, InvoiceList, Report, StatusChange, TotalsPreview};
use invoicedesk::store::{InMemoryStore, InvoiceDefaults};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::util::ServiceExt;

fn app() -> Router {
    let defaults = InvoiceDefaults::default();
    let store = InMemoryStore::new(defaults);
    store.seed_data().expect("seed store");
    router(Arc::new(AppState {
        store: Arc::new(store),
        defaults,
    }))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).expect("valid json body")
}

fn new_client() -> Value {
    json!({
        "name": "Initech",
        "email": "ap@initech.com",
        "address": "4120 Freidrich Lane",
        "city": "Austin",
        "state": "TX",
        "zipCode": "78744",
        "country": "USA"
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = parse(&body);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "ok");
}

#[tokio::test]
async fn invoice_json_uses_camel_case_fields() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/invoices/INV-2023-001", None).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = parse(&body);
    assert_eq!(body["clientId"], "client-001");
    assert_eq!(body["issueDate"], "2023-06-01");
    assert_eq!(body["status"], "paid");
    assert_eq!(body["subtotal"], 2300.0);
    assert_eq!(body["items"][0]["unitPrice"], 2000.0);
    assert_eq!(body["client"]["zipCode"], "94105");
}

#[tokio::test]
async fn list_filters_by_status() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/invoices?status=overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    let list: InvoiceList = parse(&body);
    assert_eq!(list.shown, 1);
    assert_eq!(list.total, 7);
    assert_eq!(list.invoices[0].id, "INV-2023-004");
}

#[tokio::test]
async fn list_applies_client_dates_and_sort() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/invoices?clientId=client-003&startDate=2023-07-01&endDate=2023-12-31&sortBy=total&sortOrder=asc",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let list: InvoiceList = parse(&body);
    let ids: Vec<&str> = list.invoices.iter().map(|i| i.id.as_str()).collect();
    // 3850 before 7700
    assert_eq!(ids, vec!["INV-2023-007", "INV-2023-003"]);
}

#[tokio::test]
async fn empty_filters_list_everything_newest_first() {
    let app = app();
    let (_, body) = send(&app, Method::GET, "/api/invoices?status=&clientId=", None).await;
    let list: InvoiceList = parse(&body);
    assert_eq!(list.shown, 7);
    assert_eq!(list.invoices[0].id, "INV-2023-007");
}

#[tokio::test]
async fn blank_dates_and_sort_fields_are_ignored() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/invoices?status=&clientId=&startDate=&endDate=&sortBy=&sortOrder=",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let list: InvoiceList = parse(&body);
    assert_eq!(list.shown, 7);
    assert_eq!(list.invoices[0].id, "INV-2023-007");

    let (status, body) = send(&app, Method::GET, "/api/invoices?sortBy=&endDate=2023-06-15", None).await;
    assert_eq!(status, StatusCode::OK);
    let list: InvoiceList = parse(&body);
    let ids: Vec<&str> = list.invoices.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["INV-2023-002", "INV-2023-001"]);

    let (status, _) = send(&app, Method::GET, "/api/invoices?startDate=soon", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_invoice_is_not_found() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/invoices/INV-1999-001", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn client_search_and_crud() {
    let app = app();

    let (_, body) = send(&app, Method::GET, "/api/clients?q=WAYNE", None).await;
    let found: Vec<Client> = parse(&body);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "client-004");

    let (status, body) = send(&app, Method::POST, "/api/clients", Some(new_client())).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: Client = parse(&body);
    assert_eq!(created.name, "Initech");

    let mut edit = new_client();
    edit["name"] = json!("Initech LLC");
    let uri = format!("/api/clients/{}", created.id);
    let (status, body) = send(&app, Method::PUT, &uri, Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    let updated: Client = parse(&body);
    assert_eq!(updated.name, "Initech LLC");
    assert_eq!(updated.created_at, created.created_at);

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_client_reports_fields() {
    let app = app();
    let mut input = new_client();
    input["email"] = json!("initech");
    input["city"] = json!("");
    let (status, body) = send(&app, Method::POST, "/api/clients", Some(input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = parse(&body);
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["city", "email"]);
}

#[tokio::test]
async fn referenced_client_cannot_be_deleted() {
    let app = app();
    let (status, _) = send(&app, Method::DELETE, "/api/clients/client-001", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn create_invoice_computes_totals_and_number() {
    let app = app();
    let input = json!({
        "clientId": "client-002",
        "issueDate": "2023-10-02",
        "items": [
            {"description": "Web Development Services", "quantity": 1, "unitPrice": 2000},
            {"description": "Hosting (Annual)", "quantity": 1, "unitPrice": 300}
        ],
        "taxRate": 0.1
    });
    let (status, body) = send(&app, Method::POST, "/api/invoices", Some(input)).await;
    assert_eq!(status, StatusCode::CREATED);
    let invoice: Invoice = parse(&body);
    assert_eq!(invoice.id, "INV-2023-008");
    assert_eq!(invoice.subtotal, 2300.0);
    assert!((invoice.tax_amount - 230.0).abs() < 1e-9);
    assert!((invoice.total - 2530.0).abs() < 1e-9);
    assert_eq!(invoice.due_date.to_string(), "2023-11-01");

    let (_, body) = send(&app, Method::GET, "/api/invoices/next-number?year=2023", None).await;
    let next: Value = parse(&body);
    assert_eq!(next["id"], "INV-2023-009");
}

#[tokio::test]
async fn create_invoice_rejects_bad_input() {
    let app = app();
    let no_items = json!({"clientId": "client-002", "items": []});
    let (status, _) = send(&app, Method::POST, "/api/invoices", Some(no_items)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let bad_rate = json!({
        "clientId": "client-002",
        "items": [{"description": "Audit", "quantity": 1, "unitPrice": 10}],
        "taxRate": 1.5
    });
    let (status, _) = send(&app, Method::POST, "/api/invoices", Some(bad_rate)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown_client = json!({
        "clientId": "client-404",
        "items": [{"description": "Audit", "quantity": 1, "unitPrice": 10}]
    });
    let (status, _) = send(&app, Method::POST, "/api/invoices", Some(unknown_client)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let duplicate = json!({
        "id": "INV-2023-001",
        "clientId": "client-002",
        "items": [{"description": "Audit", "quantity": 1, "unitPrice": 10}]
    });
    let (status, _) = send(&app, Method::POST, "/api/invoices", Some(duplicate)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn numbering_survives_an_oversized_explicit_number() {
    let app = app();
    let item = json!([{"description": "Audit", "quantity": 1, "unitPrice": 10}]);
    let oversized = json!({
        "id": "INV-2023-4294967295",
        "clientId": "client-002",
        "issueDate": "2023-10-02",
        "items": item
    });
    let (status, body) = send(&app, Method::POST, "/api/invoices", Some(oversized)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = parse(&body);
    assert_eq!(body["fields"][0]["field"], "id");

    let auto = json!({"clientId": "client-002", "issueDate": "2023-10-02", "items": item});
    let (status, body) = send(&app, Method::POST, "/api/invoices", Some(auto)).await;
    assert_eq!(status, StatusCode::CREATED);
    let invoice: Invoice = parse(&body);
    assert_eq!(invoice.id, "INV-2023-008");

    let (status, _) = send(&app, Method::GET, "/api/clients", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn line_item_editing_keeps_totals_in_step() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/api/invoices/INV-2023-005/items", None).await;
    assert_eq!(status, StatusCode::OK);
    let invoice: Invoice = parse(&body);
    assert_eq!(invoice.items.len(), 3);
    assert_eq!(invoice.subtotal, 2000.0);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/invoices/INV-2023-005/items/2",
        Some(json!({"field": "unitPrice", "value": 500})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let invoice: Invoice = parse(&body);
    assert_eq!(invoice.items[2].amount, 500.0);
    assert_eq!(invoice.subtotal, 2500.0);
    assert!((invoice.total - 2750.0).abs() < 1e-9);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/invoices/INV-2023-005/items/2",
        Some(json!({"field": "description", "value": "Support retainer"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let invoice: Invoice = parse(&body);
    assert_eq!(invoice.items[2].description, "Support retainer");
    assert_eq!(invoice.subtotal, 2500.0);

    let (status, body) =
        send(&app, Method::DELETE, "/api/invoices/INV-2023-005/items/0", None).await;
    assert_eq!(status, StatusCode::OK);
    let invoice: Invoice = parse(&body);
    assert_eq!(invoice.items.len(), 2);
    assert_eq!(invoice.subtotal, 1700.0);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/invoices/INV-2023-005/items/9",
        Some(json!({"field": "quantity", "value": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn last_line_item_is_never_removed() {
    let app = app();
    let (_, body) = send(&app, Method::DELETE, "/api/invoices/INV-2023-001/items/0", None).await;
    let invoice: Invoice = parse(&body);
    assert_eq!(invoice.items.len(), 1);

    let (status, body) =
        send(&app, Method::DELETE, "/api/invoices/INV-2023-001/items/0", None).await;
    assert_eq!(status, StatusCode::OK);
    let again: Invoice = parse(&body);
    assert_eq!(again.items, invoice.items);
    assert_eq!(again.subtotal, 300.0);
}

#[tokio::test]
async fn status_change_suggests_next_actions() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/invoices/INV-2023-005/status",
        Some(json!({"status": "sent"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let change: StatusChange = parse(&body);
    assert_eq!(change.invoice.status.as_str(), "sent");
    let next: Vec<&str> = change.next_actions.iter().map(|s| s.as_str()).collect();
    assert_eq!(next, vec!["paid", "overdue"]);

    // any status may still be set directly
    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/invoices/INV-2023-001/status",
        Some(json!({"status": "draft"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let change: StatusChange = parse(&body);
    assert_eq!(change.invoice.status.as_str(), "draft");
}

#[tokio::test]
async fn preview_uses_default_tax_rate() {
    let app = app();
    let input = json!({
        "items": [
            {"description": "SEO Consulting", "quantity": 10, "unitPrice": 150},
            {"description": "Content Creation", "quantity": 5, "unitPrice": 200}
        ]
    });
    let (status, body) = send(&app, Method::POST, "/api/invoices/preview", Some(input)).await;
    assert_eq!(status, StatusCode::OK);
    let preview: TotalsPreview = parse(&body);
    assert_eq!(preview.tax_rate, 0.1);
    assert_eq!(preview.subtotal, 2500.0);
    assert!((preview.total - 2750.0).abs() < 1e-9);
}

#[tokio::test]
async fn dashboard_and_reports() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    let dashboard: Dashboard = parse(&body);
    assert_eq!(dashboard.stats.total_invoices, 7);
    assert_eq!(dashboard.stats.unpaid_invoices, 3);
    assert_eq!(dashboard.recent_invoices.len(), 5);
    assert_eq!(dashboard.overdue_invoices[0].id, "INV-2023-004");

    let (status, body) = send(&app, Method::GET, "/api/reports", None).await;
    assert_eq!(status, StatusCode::OK);
    let report: Report = parse(&body);
    assert_eq!(report.top_clients[0].client, "Acme Corporation");
    assert_eq!(report.status_distribution.pending, 2);
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn line_item_edits_are_request_logged() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = app();
    send(&app, Method::POST, "/api/invoices/INV-2023-005/items", None).await;
    send(
        &app,
        Method::PATCH,
        "/api/invoices/INV-2023-005/items/2",
        Some(json!({"field": "quantity", "value": 3})),
    )
    .await;
    send(&app, Method::DELETE, "/api/invoices/INV-2023-005/items/9", None).await;

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("POST /api/invoices/INV-2023-005/items  200"), "{output}");
    assert!(output.contains("PATCH /api/invoices/INV-2023-005/items/2  200"), "{output}");
    assert!(output.contains("DELETE /api/invoices/INV-2023-005/items/9  404"), "{output}");
}
