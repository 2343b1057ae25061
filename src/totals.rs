//! Derived invoice amounts.
//!
//! Every function here is total over `f64`: nothing is rejected, and
//! non-finite input flows straight into the derived fields. Form-level
//! checks live in [`crate::validation`].

use uuid::Uuid;

use crate::models::{Invoice, InvoiceItem, ItemInput, ItemUpdate, TotalsPreview};

pub fn line_amount(quantity: f64, unit_price: f64) -> f64 {
    quantity * unit_price
}

/// Applies one field edit to a copy of `item`.
///
/// Quantity and unit price edits recompute `amount`; a description edit
/// leaves it untouched.
pub fn recompute_item(item: &InvoiceItem, update: ItemUpdate) -> InvoiceItem {
    let mut updated = item.clone();
    match update {
        ItemUpdate::Description(description) => updated.description = description,
        ItemUpdate::Quantity(quantity) => {
            updated.quantity = quantity;
            updated.amount = line_amount(updated.quantity, updated.unit_price);
        }
        ItemUpdate::UnitPrice(unit_price) => {
            updated.unit_price = unit_price;
            updated.amount = line_amount(updated.quantity, updated.unit_price);
        }
    }
    updated
}

pub fn subtotal(items: &[InvoiceItem]) -> f64 {
    // fold from +0.0 so an empty list serializes as 0, not -0
    items.iter().fold(0.0, |sum, item| sum + item.amount)
}

pub fn tax_amount(subtotal: f64, tax_rate: f64) -> f64 {
    subtotal * tax_rate
}

pub fn total(subtotal: f64, tax_amount: f64) -> f64 {
    subtotal + tax_amount
}

/// Blank line item as offered by the "add line" button.
pub fn blank_item() -> InvoiceItem {
    InvoiceItem {
        id: Uuid::new_v4().to_string(),
        description: String::new(),
        quantity: 1.0,
        unit_price: 0.0,
        amount: 0.0,
    }
}

pub fn add_item(items: &[InvoiceItem]) -> Vec<InvoiceItem> {
    let mut items = items.to_vec();
    items.push(blank_item());
    items
}

/// Removes the item at `index`.
///
/// A single remaining item is never removed, and an out-of-range index
/// leaves the list as it was.
pub fn remove_item(items: &[InvoiceItem], index: usize) -> Vec<InvoiceItem> {
    let mut items = items.to_vec();
    if items.len() > 1 && index < items.len() {
        items.remove(index);
    }
    items
}

pub fn item_from_input(input: &ItemInput) -> InvoiceItem {
    InvoiceItem {
        id: input
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        description: input.description.clone(),
        quantity: input.quantity,
        unit_price: input.unit_price,
        amount: line_amount(input.quantity, input.unit_price),
    }
}

pub fn preview(inputs: &[ItemInput], tax_rate: f64) -> TotalsPreview {
    let items: Vec<InvoiceItem> = inputs.iter().map(item_from_input).collect();
    let subtotal = subtotal(&items);
    let tax_amount = tax_amount(subtotal, tax_rate);
    TotalsPreview {
        items,
        subtotal,
        tax_rate,
        tax_amount,
        total: total(subtotal, tax_amount),
    }
}

impl Invoice {
    /// Recomputes every derived field: each item's amount, then subtotal,
    /// tax and total.
    pub fn recompute(&mut self) {
        for item in &mut self.items {
            item.amount = line_amount(item.quantity, item.unit_price);
        }
        self.subtotal = subtotal(&self.items);
        self.tax_amount = tax_amount(self.subtotal, self.tax_rate);
        self.total = total(self.subtotal, self.tax_amount);
    }
}
