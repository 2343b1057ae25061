use serde::Serialize;
use thiserror::Error;

/// One rejected form field, with the message key shown next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: &'static str,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid input: {}", summary(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} ({})", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} \"{id}\" not found")]
    NotFound { kind: &'static str, id: String },
    #[error("invoice \"{invoice}\" has no line item at index {index}")]
    ItemNotFound { invoice: String, index: usize },
    #[error("client \"{id}\" is referenced by {invoices} invoice(s)")]
    ClientInUse { id: String, invoices: usize },
    #[error("unknown client \"{0}\"")]
    UnknownClient(String),
    #[error("invoice \"{0}\" already exists")]
    DuplicateInvoice(String),
    #[error("no invoice numbers left for {0}")]
    NumberingExhausted(i32),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn client_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "client",
            id: id.to_string(),
        }
    }

    pub fn invoice_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: "invoice",
            id: id.to_string(),
        }
    }
}
