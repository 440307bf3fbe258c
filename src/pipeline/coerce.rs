//! Coercion of loosely-typed JSON values into primitives.
//!
//! Everything here is total: absent or ill-typed input produces a default,
//! never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("valid regex")
});

/// Trimmed, non-empty text. Numbers and booleans are stringified.
pub fn as_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// First non-empty text among `keys`.
pub fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| as_text(obj.get(*k)))
}

pub fn text_or(obj: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    text_field(obj, keys).unwrap_or_else(|| default.to_string())
}

/// Numeric value. Strings are parsed after stripping a trailing `%`; anything
/// else, or a non-finite result, is 0.
pub fn as_number(value: Option<&Value>) -> f64 {
    value.and_then(parse_number).unwrap_or(0.0)
}

/// Finite number from a JSON number or numeric string.
///
/// Strings with trailing units (`"7.9 mg/dL"`) keep their leading number.
pub fn parse_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_numeric_text(s)?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.trim_end_matches('%').trim().parse::<f64>() {
        return Some(n);
    }
    match LEADING_NUMBER.find(trimmed) {
        Some(m) => {
            tracing::debug!(raw = %trimmed, "Numeric text has trailing content, using leading number");
            m.as_str().parse::<f64>().ok()
        }
        None => {
            if !trimmed.is_empty() {
                tracing::debug!(raw = %trimmed, "Non-numeric text coerced to 0");
            }
            None
        }
    }
}

/// First key among `keys` holding a usable number, or 0.
pub fn number_field(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(parse_number))
        .unwrap_or(0.0)
}

/// Non-negative quantity (grams, kcal, amounts).
pub fn quantity_field(obj: &Map<String, Value>, keys: &[&str]) -> f64 {
    number_field(obj, keys).max(0.0)
}

/// Rounded and clamped into 0..=100.
pub fn as_percent(value: Option<&Value>) -> u8 {
    clamp_percent(as_number(value))
}

pub fn percent_field(obj: &Map<String, Value>, keys: &[&str]) -> u8 {
    clamp_percent(number_field(obj, keys))
}

fn clamp_percent(n: f64) -> u8 {
    n.round().clamp(0.0, 100.0) as u8
}

/// Strings from an array; empty items dropped. Non-arrays give an empty list.
pub fn as_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| as_text(Some(v))).collect(),
        _ => Vec::new(),
    }
}

/// The first non-empty list among `keys`, checked in priority order.
pub fn aliased_list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .map(|k| as_string_list(obj.get(*k)))
        .find(|list| !list.is_empty())
        .unwrap_or_default()
}

/// The first array among `keys`, as raw values.
pub fn aliased_array<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Union of lists in order of first appearance, case-insensitively
/// de-duplicated, capped at `cap` items.
pub fn union_dedup<'a, I>(lists: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in lists.into_iter().flatten() {
        if out.len() >= cap {
            break;
        }
        if seen.insert(item.to_lowercase()) {
            out.push(item.clone());
        }
    }
    out
}

/// Truncate in place, returning how many items were dropped.
pub fn cap<T>(items: &mut Vec<T>, max: usize) -> usize {
    let dropped = items.len().saturating_sub(max);
    items.truncate(max);
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn text_trims_and_rejects_empty() {
        assert_eq!(as_text(Some(&json!("  flu "))), Some("flu".into()));
        assert_eq!(as_text(Some(&json!("   "))), None);
        assert_eq!(as_text(Some(&json!(null))), None);
        assert_eq!(as_text(Some(&json!(42))), Some("42".into()));
        assert_eq!(as_text(None), None);
    }

    #[test]
    fn number_parses_strings_and_percent() {
        assert_eq!(as_number(Some(&json!("85%"))), 85.0);
        assert_eq!(as_number(Some(&json!(" 12.5 "))), 12.5);
        assert_eq!(as_number(Some(&json!("high"))), 0.0);
        assert_eq!(as_number(Some(&json!([1]))), 0.0);
        assert_eq!(as_number(None), 0.0);
    }

    #[test]
    fn number_keeps_leading_value_before_unit() {
        assert_eq!(as_number(Some(&json!("7.9 mg/dL"))), 7.9);
        assert_eq!(as_number(Some(&json!("-2.5e1 units"))), -25.0);
        assert_eq!(as_number(Some(&json!("mg 7.9"))), 0.0);
    }

    #[test]
    fn number_field_skips_null_and_non_numeric_keys() {
        let o = obj(json!({"currentValue": null, "value": 160}));
        assert_eq!(number_field(&o, &["currentValue", "value"]), 160.0);
        let o = obj(json!({"currentValue": "pending", "value": "5.4"}));
        assert_eq!(number_field(&o, &["currentValue", "value"]), 5.4);
        let o = obj(json!({"currentValue": null}));
        assert_eq!(number_field(&o, &["currentValue", "value"]), 0.0);
    }

    #[test]
    fn percent_field_falls_through_to_alias() {
        let o = obj(json!({"probability": null, "likelihood": 80}));
        assert_eq!(percent_field(&o, &["probability", "likelihood"]), 80);
        let o = obj(json!({"probability": "unknown", "likelihood": "65%"}));
        assert_eq!(percent_field(&o, &["probability", "likelihood"]), 65);
    }

    #[test]
    fn non_finite_numbers_become_zero() {
        assert_eq!(as_number(Some(&json!("inf"))), 0.0);
        assert_eq!(as_number(Some(&json!("NaN"))), 0.0);
    }

    #[test]
    fn percent_clamps_and_rounds() {
        assert_eq!(as_percent(Some(&json!(150))), 100);
        assert_eq!(as_percent(Some(&json!(-20))), 0);
        assert_eq!(as_percent(Some(&json!(72.6))), 73);
        assert_eq!(as_percent(Some(&json!("not a number"))), 0);
        assert_eq!(as_percent(Some(&json!(1e300))), 100);
    }

    #[test]
    fn string_list_drops_empty_and_non_text() {
        let v = json!(["a", "", "  b ", null, {"x": 1}, 3]);
        assert_eq!(as_string_list(Some(&v)), vec!["a", "b", "3"]);
        assert!(as_string_list(Some(&json!("not a list"))).is_empty());
    }

    #[test]
    fn aliased_list_takes_first_non_empty() {
        let o = obj(json!({"medications": [], "meds": ["X"], "medication": ["Y"]}));
        assert_eq!(
            aliased_list(&o, &["medications", "meds", "medication"]),
            vec!["X"]
        );
    }

    #[test]
    fn aliased_array_skips_non_arrays() {
        let o = obj(json!({"conditions": "none", "diseases": [{"name": "Flu"}]}));
        assert_eq!(aliased_array(&o, &["conditions", "diseases"]).len(), 1);
        assert!(aliased_array(&o, &["missing"]).is_empty());
    }

    #[test]
    fn union_dedups_in_first_seen_order() {
        let a = vec!["A".to_string(), "B".to_string()];
        let b = vec!["b".to_string(), "C".to_string()];
        assert_eq!(union_dedup([&a, &b], 10), vec!["A", "B", "C"]);
        assert_eq!(union_dedup([&a, &b], 2), vec!["A", "B"]);
    }

    #[test]
    fn cap_reports_dropped() {
        let mut v = vec![1, 2, 3, 4];
        assert_eq!(cap(&mut v, 3), 1);
        assert_eq!(v, vec![1, 2, 3]);
        assert_eq!(cap(&mut v, 10), 0);
    }

    #[test]
    fn quantity_never_negative() {
        let o = obj(json!({"protein": -5, "fat": "12"}));
        assert_eq!(quantity_field(&o, &["protein"]), 0.0);
        assert_eq!(quantity_field(&o, &["fat"]), 12.0);
    }
}
