use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientInput {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub zip_code: String,
    #[validate(length(min = 1))]
    pub country: String,
}

impl ClientInput {
    /// Copy with surrounding whitespace removed and a blank phone dropped.
    pub fn trimmed(&self) -> ClientInput {
        ClientInput {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            zip_code: self.zip_code.trim().to_string(),
            country: self.country.trim().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Conventional follow-up statuses offered on the invoice detail view.
    ///
    /// Purely advisory: any status may still be assigned to any invoice.
    pub fn suggested_next(&self) -> &'static [InvoiceStatus] {
        match self {
            InvoiceStatus::Draft => &[InvoiceStatus::Sent],
            InvoiceStatus::Sent => &[InvoiceStatus::Paid, InvoiceStatus::Overdue],
            InvoiceStatus::Overdue => &[InvoiceStatus::Paid],
            InvoiceStatus::Paid | InvoiceStatus::Cancelled => &[],
        }
    }

    /// Sent and overdue invoices are still waiting for money.
    pub fn is_unpaid(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: String,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(custom(function = "crate::validation::positive_amount"))]
    pub quantity: f64,
    #[validate(custom(function = "crate::validation::positive_amount"))]
    pub unit_price: f64,
}

/// A single field edit on a line item, as sent by the invoice form.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ItemUpdate {
    Description(String),
    Quantity(f64),
    UnitPrice(f64),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub client: Client,
    pub client_id: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceInput {
    /// Explicit invoice number; generated when absent.
    pub id: Option<String>,
    pub client_id: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub items: Vec<ItemInput>,
    pub tax_rate: Option<f64>,
    pub notes: Option<String>,
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StatusInput {
    pub status: InvoiceStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub invoice: Invoice,
    pub next_actions: Vec<InvoiceStatus>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PreviewInput {
    pub items: Vec<ItemInput>,
    #[serde(default)]
    pub tax_rate: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TotalsPreview {
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InvoiceList {
    pub invoices: Vec<Invoice>,
    pub shown: usize,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NextNumber {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_invoices: usize,
    pub unpaid_invoices: usize,
    pub overdue_invoices: usize,
    pub active_clients: usize,
    pub total_revenue: f64,
    pub outstanding_amount: f64,
}

/// Table row shown on the dashboard, with display-ready values.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRow {
    pub id: String,
    pub client_name: String,
    pub amount: String,
    pub issue_date: String,
    pub due_date: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_invoices: Vec<InvoiceRow>,
    pub overdue_invoices: Vec<InvoiceRow>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MonthlyRevenue {
    pub month: String,
    pub label: String,
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientRevenue {
    pub client: String,
    pub revenue: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct StatusDistribution {
    pub paid: usize,
    pub pending: usize,
    pub overdue: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub top_clients: Vec<ClientRevenue>,
    pub status_distribution: StatusDistribution,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
}
