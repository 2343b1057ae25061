use chrono::NaiveDate;

/// US-dollar amount with thousands separators and two decimals.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return format!("${amount}");
    }
    let fixed = format!("{:.2}", amount.abs());
    let (dollars, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, digit) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    // amounts that round to zero drop their sign
    let nonzero = fixed.bytes().any(|b| matches!(b, b'1'..=b'9'));
    let sign = if amount < 0.0 && nonzero { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

pub fn format_status(status: &str) -> String {
    let mut chars = status.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rewrites the first run of ten digits as `(555) 123-4567`.
pub fn format_phone_number(phone: &str) -> String {
    let bytes = phone.as_bytes();
    let Some(start) = bytes
        .windows(10)
        .position(|window| window.iter().all(u8::is_ascii_digit))
    else {
        return phone.to_string();
    };
    let digits = &phone[start..start + 10];
    format!(
        "{}({}) {}-{}{}",
        &phone[..start],
        &digits[..3],
        &digits[3..6],
        &digits[6..],
        &phone[start + 10..]
    )
}
