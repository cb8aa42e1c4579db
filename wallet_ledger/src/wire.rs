//! Lenient field decoders for provider payloads.
//!
//! Providers are not consistent about quoting: ids and amounts arrive as
//! either JSON strings or JSON numbers.

use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

fn scalar_to_string<E: de::Error>(value: Value) -> Result<String, E> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(E::custom(format!("expected string or number, got {other}"))),
    }
}

/// String field that may be sent as a number
pub fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    scalar_to_string(Value::deserialize(deserializer)?)
}

/// Optional string field that may be sent as a number
pub fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(value).map(Some),
    }
}

/// Parse a decimal amount from its textual form
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Decimal field that may be sent as a string or a number
pub fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let text = scalar_to_string(Value::deserialize(deserializer)?)?;
    parse_decimal(&text).ok_or_else(|| de::Error::custom(format!("invalid amount {text:?}")))
}

/// Integer minor-unit field that may be sent as a string or a number
pub fn minor_units<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let text = scalar_to_string(Value::deserialize(deserializer)?)?;
    text.trim()
        .parse()
        .map_err(|_| de::Error::custom(format!("invalid minor-unit amount {text:?}")))
}

/// Optional integer minor-unit field
pub fn opt_minor_units<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let text = scalar_to_string::<D::Error>(value)?;
            text.trim()
                .parse()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("invalid minor-unit amount {text:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(deserialize_with = "decimal")]
        amount: Decimal,
        #[serde(default, deserialize_with = "opt_minor_units")]
        cents: Option<i64>,
    }

    #[test]
    fn test_accepts_numbers_and_strings() {
        let sample: Sample = serde_json::from_value(json!({ "id": 42, "amount": "50.5" })).unwrap();
        assert_eq!(sample.id, "42");
        assert_eq!(sample.amount, Decimal::new(505, 1));
        assert_eq!(sample.cents, None);

        let sample: Sample =
            serde_json::from_value(json!({ "id": "g-1", "amount": 12, "cents": "2000" })).unwrap();
        assert_eq!(sample.amount, Decimal::from(12));
        assert_eq!(sample.cents, Some(2000));
    }

    #[test]
    fn test_rejects_garbage_amount() {
        let result: Result<Sample, _> = serde_json::from_value(json!({ "id": 1, "amount": "ten" }));
        assert!(result.is_err());
    }
}
