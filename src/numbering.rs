//! Human-readable invoice numbers of the form `INV-2023-007`.

const PREFIX: &str = "INV";

/// Year and sequence parts of an `INV-<year>-<seq>` id, unparsed.
fn parts(id: &str) -> Option<(&str, &str)> {
    let mut parts = id.split('-');
    let (Some(prefix), Some(year), Some(seq), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    (prefix == PREFIX).then_some((year, seq))
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Sequence part of `id` when it is an invoice number issued in `year`.
pub fn sequence_in_year(id: &str, year: i32) -> Option<u32> {
    let (id_year, seq) = parts(id)?;
    if id_year != year.to_string() {
        return None;
    }
    seq.parse().ok()
}

/// True when `id` has the invoice number shape but no number can follow it.
pub fn is_exhausted(id: &str) -> bool {
    match parts(id) {
        Some((year, seq)) if all_digits(year) && all_digits(seq) => {
            seq.parse::<u32>().map_or(true, |seq| seq == u32::MAX)
        }
        _ => false,
    }
}

/// Number following `last` within `year`, or `None` once the sequence is
/// used up.
///
/// The counter restarts at 001 when `last` belongs to another year or
/// cannot be parsed.
pub fn next_invoice_number(last: Option<&str>, year: i32) -> Option<String> {
    let next = match last.and_then(|last| sequence_in_year(last, year)) {
        Some(seq) => seq.checked_add(1)?,
        None => 1,
    };
    Some(format!("{PREFIX}-{year}-{next:03}"))
}
