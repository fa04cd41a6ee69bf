//! Formatting helpers shared by the front ends.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so multi-byte names are safe.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Format a dollar amount with two decimals, e.g. `$1234.50`.
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", -amount)
    } else {
        format!("${amount:.2}")
    }
}

/// Parse a user-supplied amount such as `1000`, `$1,250.75` or ` 300 `.
pub fn parse_amount(s: &str) -> Result<f64, String> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return Err("Empty amount".into());
    }
    let value: f64 = cleaned
        .parse()
        .map_err(|_| format!("Invalid amount: {s}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("Amount must be non-negative: {s}"));
    }
    Ok(value)
}
