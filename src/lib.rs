//! Invoicing and client-management backend: line-item totals, invoice list
//! filtering, dashboard figures and a JSON API over an in-memory store.

pub mod error;
pub mod format;
pub mod handlers;
pub mod models;
pub mod numbering;
pub mod query;
pub mod reports;
pub mod store;
pub mod totals;
pub mod validation;
