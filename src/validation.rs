//! Checks applied when a client or invoice form is submitted.
//!
//! The calculator in [`crate::totals`] never rejects anything; these rules
//! are the only place negative amounts or out-of-range tax rates are refused.
//! Per-field rules live on the input types as `validator` derives; the
//! invoice-level rules that span several fields are checked here.

use validator::{Validate, ValidationErrors};

use crate::error::{FieldError, ValidationError};
use crate::models::{ClientInput, InvoiceInput, ItemInput};
use crate::numbering;

pub const REQUIRED: &str = "validation.required";
pub const EMAIL: &str = "validation.email";
pub const POSITIVE: &str = "validation.positive";
pub const RANGE: &str = "validation.range";
pub const DATE_ORDER: &str = "validation.dateOrder";

/// Quantities and unit prices must be finite and above zero.
pub fn positive_amount(value: f64) -> Result<(), validator::ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(validator::ValidationError::new("positive"))
    }
}

fn message_key(code: &str) -> &'static str {
    match code {
        "email" => EMAIL,
        "positive" => POSITIVE,
        "range" => RANGE,
        _ => REQUIRED,
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Flattens `validator` field errors into wire field names, ordered by field.
fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    for (field, errs) in fields {
        for err in errs.iter() {
            out.push(FieldError {
                field: format!("{prefix}{}", camel_case(&field)),
                message: message_key(&err.code),
            });
        }
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), ValidationError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

fn required(field: &str) -> FieldError {
    FieldError {
        field: field.to_string(),
        message: REQUIRED,
    }
}

pub fn validate_client(input: &ClientInput) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    if let Err(e) = input.trimmed().validate() {
        collect(&e, "", &mut errors);
    }
    finish(errors)
}

pub fn validate_invoice(input: &InvoiceInput) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    if input.client_id.trim().is_empty() {
        errors.push(required("clientId"));
    }

    if input.items.is_empty() {
        errors.push(required("items"));
    }
    for (i, item) in input.items.iter().enumerate() {
        let item = ItemInput {
            description: item.description.trim().to_string(),
            ..item.clone()
        };
        if let Err(e) = item.validate() {
            collect(&e, &format!("items[{i}]."), &mut errors);
        }
    }

    if let Some(rate) = input.tax_rate {
        if !(rate.is_finite() && (0.0..=1.0).contains(&rate)) {
            errors.push(FieldError {
                field: "taxRate".into(),
                message: RANGE,
            });
        }
    }

    if let (Some(issue), Some(due)) = (input.issue_date, input.due_date) {
        if due < issue {
            errors.push(FieldError {
                field: "dueDate".into(),
                message: DATE_ORDER,
            });
        }
    }

    if let Some(id) = &input.id {
        let id = id.trim();
        if id.is_empty() {
            errors.push(required("id"));
        } else if numbering::is_exhausted(id) {
            errors.push(FieldError {
                field: "id".into(),
                message: RANGE,
            });
        }
    }

    finish(errors)
}
