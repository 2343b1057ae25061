//! Filtering and ordering of invoice and client lists.
//!
//! The invoice pipeline runs status, client, date range, then sort. Each
//! stage takes and returns an owned list so stages can be tested alone.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::de::value::StringDeserializer;
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Client, Invoice};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    IssueDate,
    DueDate,
    Total,
    Status,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Active filters of the invoice list. The default is the list's reset
/// state: no filters, newest issue date first.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceQuery {
    pub status: Option<String>,
    pub client_id: Option<String>,
    #[serde(deserialize_with = "blank_as_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(deserialize_with = "blank_as_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(deserialize_with = "blank_as_default")]
    pub sort_by: SortKey,
    #[serde(deserialize_with = "blank_as_default")]
    pub sort_order: SortOrder,
}

/// Non-blank query-string value, trimmed.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

// a reset form submits `startDate=&sortBy=`; blank means unset
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match present(deserializer)? {
        Some(value) => T::deserialize(StringDeserializer::<D::Error>::new(value)).map(Some),
        None => Ok(None),
    }
}

fn blank_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(blank_as_none(deserializer)?.unwrap_or_default())
}

impl InvoiceQuery {
    pub fn apply(&self, invoices: Vec<Invoice>) -> Vec<Invoice> {
        let invoices = filter_by_status(invoices, self.status.as_deref());
        let invoices = filter_by_client(invoices, self.client_id.as_deref());
        let invoices = filter_by_date_range(invoices, self.start_date, self.end_date);
        sort_invoices(invoices, self.sort_by, self.sort_order)
    }
}

fn blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn filter_by_status(invoices: Vec<Invoice>, status: Option<&str>) -> Vec<Invoice> {
    let Some(status) = blank(status) else {
        return invoices;
    };
    invoices
        .into_iter()
        .filter(|invoice| invoice.status.as_str().eq_ignore_ascii_case(status))
        .collect()
}

pub fn filter_by_client(invoices: Vec<Invoice>, client_id: Option<&str>) -> Vec<Invoice> {
    let Some(client_id) = blank(client_id) else {
        return invoices;
    };
    invoices
        .into_iter()
        .filter(|invoice| invoice.client_id == client_id)
        .collect()
}

/// Keeps invoices issued within `[start, end]`; either bound may be open.
pub fn filter_by_date_range(
    invoices: Vec<Invoice>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<Invoice> {
    if start.is_none() && end.is_none() {
        return invoices;
    }
    invoices
        .into_iter()
        .filter(|invoice| {
            start.map_or(true, |start| invoice.issue_date >= start)
                && end.map_or(true, |end| invoice.issue_date <= end)
        })
        .collect()
}

fn compare(a: &Invoice, b: &Invoice, key: SortKey) -> Ordering {
    match key {
        SortKey::IssueDate => a.issue_date.cmp(&b.issue_date),
        SortKey::DueDate => a.due_date.cmp(&b.due_date),
        // NaN totals compare equal to everything
        SortKey::Total => a.total.partial_cmp(&b.total).unwrap_or(Ordering::Equal),
        SortKey::Status => a
            .status
            .as_str()
            .to_lowercase()
            .cmp(&b.status.as_str().to_lowercase()),
    }
}

/// Stable sort; ties keep their input order in both directions.
pub fn sort_invoices(mut invoices: Vec<Invoice>, key: SortKey, order: SortOrder) -> Vec<Invoice> {
    match order {
        SortOrder::Asc => invoices.sort_by(|a, b| compare(a, b, key)),
        SortOrder::Desc => invoices.sort_by(|a, b| compare(b, a, key)),
    }
    invoices
}

/// Case-insensitive substring match over client name and email.
pub fn search_clients(clients: Vec<Client>, q: Option<&str>) -> Vec<Client> {
    let Some(q) = blank(q) else {
        return clients;
    };
    let needle = q.to_lowercase();
    clients
        .into_iter()
        .filter(|client| {
            client.name.to_lowercase().contains(&needle)
                || client.email.to_lowercase().contains(&needle)
        })
        .collect()
}
