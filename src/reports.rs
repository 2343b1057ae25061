//! Figures for the dashboard and reports pages.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};

use crate::format::{format_currency, format_date, format_status};
use crate::models::{
    ClientRevenue, Dashboard, DashboardStats, Invoice, InvoiceRow, InvoiceStatus, MonthlyRevenue,
    Report, StatusDistribution,
};
use crate::query::{filter_by_status, sort_invoices, SortKey, SortOrder};

pub const RECENT_LIMIT: usize = 5;
pub const TOP_CLIENTS_LIMIT: usize = 5;

pub fn dashboard_stats(invoices: &[Invoice]) -> DashboardStats {
    let unpaid = || invoices.iter().filter(|i| i.status.is_unpaid());
    let active_clients: HashSet<&str> = invoices.iter().map(|i| i.client_id.as_str()).collect();

    DashboardStats {
        total_invoices: invoices.len(),
        unpaid_invoices: unpaid().count(),
        overdue_invoices: invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Overdue)
            .count(),
        active_clients: active_clients.len(),
        total_revenue: invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .fold(0.0, |sum, i| sum + i.total),
        outstanding_amount: unpaid().fold(0.0, |sum, i| sum + i.total),
    }
}

pub fn invoice_row(invoice: &Invoice) -> InvoiceRow {
    InvoiceRow {
        id: invoice.id.clone(),
        client_name: invoice.client.name.clone(),
        amount: format_currency(invoice.total),
        issue_date: format_date(invoice.issue_date),
        due_date: format_date(invoice.due_date),
        status: format_status(invoice.status.as_str()),
    }
}

/// Most recently issued invoices, newest first.
pub fn recent_invoices(invoices: &[Invoice], limit: usize) -> Vec<Invoice> {
    let mut recent = sort_invoices(invoices.to_vec(), SortKey::IssueDate, SortOrder::Desc);
    recent.truncate(limit);
    recent
}

pub fn dashboard(invoices: &[Invoice]) -> Dashboard {
    let overdue = filter_by_status(invoices.to_vec(), Some(InvoiceStatus::Overdue.as_str()));
    Dashboard {
        stats: dashboard_stats(invoices),
        recent_invoices: recent_invoices(invoices, RECENT_LIMIT)
            .iter()
            .map(invoice_row)
            .collect(),
        overdue_invoices: overdue.iter().map(invoice_row).collect(),
    }
}

/// Paid revenue per calendar month of issue, oldest month first.
pub fn monthly_revenue(invoices: &[Invoice]) -> Vec<MonthlyRevenue> {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for invoice in invoices.iter().filter(|i| i.status == InvoiceStatus::Paid) {
        let key = (invoice.issue_date.year(), invoice.issue_date.month());
        *months.entry(key).or_insert(0.0) += invoice.total;
    }
    months
        .into_iter()
        .map(|((year, month), amount)| MonthlyRevenue {
            month: format!("{year:04}-{month:02}"),
            label: NaiveDate::from_ymd_opt(year, month, 1)
                .map(|d| d.format("%B %Y").to_string())
                .unwrap_or_default(),
            amount,
        })
        .collect()
}

/// Paid revenue per client name, largest first; ties fall back to name order.
pub fn revenue_by_client(invoices: &[Invoice], limit: usize) -> Vec<ClientRevenue> {
    let mut by_client: BTreeMap<&str, f64> = BTreeMap::new();
    for invoice in invoices.iter().filter(|i| i.status == InvoiceStatus::Paid) {
        *by_client.entry(invoice.client.name.as_str()).or_insert(0.0) += invoice.total;
    }
    let mut ranked: Vec<ClientRevenue> = by_client
        .into_iter()
        .map(|(client, revenue)| ClientRevenue {
            client: client.to_string(),
            revenue,
        })
        .collect();
    ranked.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    ranked.truncate(limit);
    ranked
}

pub fn status_distribution(invoices: &[Invoice]) -> StatusDistribution {
    let mut distribution = StatusDistribution::default();
    for invoice in invoices {
        match invoice.status {
            InvoiceStatus::Paid => distribution.paid += 1,
            InvoiceStatus::Sent => distribution.pending += 1,
            InvoiceStatus::Overdue => distribution.overdue += 1,
            InvoiceStatus::Draft | InvoiceStatus::Cancelled => {}
        }
    }
    distribution
}

pub fn report(invoices: &[Invoice]) -> Report {
    Report {
        monthly_revenue: monthly_revenue(invoices),
        top_clients: revenue_by_client(invoices, TOP_CLIENTS_LIMIT),
        status_distribution: status_distribution(invoices),
    }
}
