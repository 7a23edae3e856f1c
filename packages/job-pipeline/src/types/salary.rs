//! Currency normalisation for AI-reported salary bounds.
//!
//! Models report bounds as numbers or as strings like `"$120,000"`,
//! `"£85,000.50"` or `"120k"`. Anything that does not yield a positive amount
//! is unknown (`None`), never zero.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a currency string into whole units, dropping any fraction.
pub fn currency_to_int(text: &str) -> Option<i64> {
    let lowered = text.trim().to_lowercase();

    // First numeric run only; "$120,000 - $150,000" is a lower bound of 120000
    let start = lowered.find(|c: char| c.is_ascii_digit())?;
    let rest = &lowered[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
        .unwrap_or(rest.len());

    let digits: String = rest[..end].chars().filter(|c| *c != ',').collect();
    let amount: f64 = digits.trim_end_matches('.').parse().ok()?;

    let mut suffix = rest[end..].trim_start().chars();
    let multiplier = match (suffix.next(), suffix.next()) {
        (Some('k'), next) if !next.is_some_and(char::is_alphabetic) => 1_000.0,
        (Some('m'), next) if !next.is_some_and(char::is_alphabetic) => 1_000_000.0,
        _ => 1.0,
    };

    let amount = (amount * multiplier).trunc();
    if amount <= 0.0 || !amount.is_finite() {
        return None;
    }
    Some(amount as i64)
}

/// Normalise a JSON value (number, string or null) to a salary bound.
pub fn value_to_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .filter(|amount| *amount > 0),
        Value::String(s) => currency_to_int(s),
        _ => None,
    }
}

/// Render a salary bound for display, coercing unknown to 0.
pub fn display_amount(amount: Option<i64>) -> String {
    amount.unwrap_or(0).to_string()
}

pub(crate) fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_currency_strings() {
        assert_eq!(currency_to_int("$120,000"), Some(120_000));
        assert_eq!(currency_to_int("£85,000.50"), Some(85_000));
        assert_eq!(currency_to_int("$99,999.99"), Some(99_999));
        assert_eq!(currency_to_int("120k"), Some(120_000));
        assert_eq!(currency_to_int("1.5M"), Some(1_500_000));
        assert_eq!(currency_to_int(" 95000 "), Some(95_000));
        assert_eq!(currency_to_int("$120,000 - $150,000"), Some(120_000));
        assert_eq!(currency_to_int("90,000 monthly"), Some(90_000));
    }

    #[test]
    fn test_unknown_is_none_not_zero() {
        assert_eq!(currency_to_int(""), None);
        assert_eq!(currency_to_int("Unknown"), None);
        assert_eq!(currency_to_int("$0"), None);
        assert_eq!(value_to_amount(&Value::Null), None);
        assert_eq!(value_to_amount(&json!(0)), None);
        assert_eq!(value_to_amount(&json!(true)), None);
    }

    #[test]
    fn test_json_numbers() {
        assert_eq!(value_to_amount(&json!(150000)), Some(150_000));
        assert_eq!(value_to_amount(&json!(99999.6)), Some(99_999));
        assert_eq!(value_to_amount(&json!(0.9)), None);
        assert_eq!(value_to_amount(&json!("$70,000")), Some(70_000));
    }

    #[test]
    fn test_display_amount() {
        assert_eq!(display_amount(None), "0");
        assert_eq!(display_amount(Some(5)), "5");
    }
}
