//! Locale-free formatting helpers shared by the computation engine and the CLI.
//!
//! Numbers are rendered the way a browser renders them with `String(n)` or an
//! `en`-style number format, so chart ids, group keys and labels stay stable no
//! matter where the model is computed.

pub mod units;

use serde_json::{Map, Value};

use crate::query::{Aggregation, QueryRequest};

pub use units::{fields_meta_to_value_formatters, FieldValueFormatters, FormatOptions, FormattedValue, ValueFormat};

/// Largest integer an IEEE double represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// 31-polynomial string hash over UTF-16 code units, wrapped to 32 bits.
///
/// Must stay in sync with every other producer of query hashes, since the result
/// seeds the color of the empty group across page loads.
pub fn hash_code(text: &str) -> u32 {
    let mut hash: i32 = 0;

    for unit in text.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }

    hash.unsigned_abs()
}

/// Renders a number like JavaScript's `String(n)`: integers carry no fraction.
pub fn js_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        // Shortest digits, with an explicit sign on positive exponents (`1e+21`).
        let formatted = format!("{:e}", value);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{}e+{}", mantissa, exponent),
            _ => formatted,
        };
    }

    // Display already prints shortest digits and no `.0` for integral values.
    format!("{}", value)
}

/// Renders a JSON number without a trailing `.0` for integral floats.
pub fn json_number(number: &serde_json::Number) -> String {
    if let Some(i) = number.as_i64() {
        i.to_string()
    } else if let Some(u) = number.as_u64() {
        u.to_string()
    } else {
        js_number(number.as_f64().unwrap_or(f64::NAN))
    }
}

/// Canonical JSON: object keys are sorted at every nesting level.
pub fn ordered_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_ordered(value, &mut out);
    out
}

fn write_ordered(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&json_number(n)),
        Value::String(s) => out.push_str(&Value::String(s.clone()).to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_ordered(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_ordered(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

/// `P` followed by the zero-padded percentile with its decimal point removed.
pub fn format_percentile(percentile: f64) -> String {
    let mut pretty = js_number(percentile);

    if pretty.len() == 1 || pretty.find('.') == Some(1) {
        pretty.insert(0, '0');
    }

    format!("P{}", pretty.replace('.', ""))
}

/// Splits an identifier into words and capitalizes each (`stdev` -> `Stdev`,
/// `topKValues` -> `Top K Values`).
pub fn start_case(text: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in text.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Chart title: the alias, or `Op(field)`.
pub fn format_aggregation_chart_title(aggregation: &Aggregation) -> String {
    if let Some(alias) = aggregation.alias.as_deref().filter(|a| !a.is_empty()) {
        return alias.to_string();
    }

    let pretty_op = start_case(aggregation.op.as_str());

    if aggregation.field.is_empty() {
        pretty_op
    } else {
        format!("{}({})", pretty_op, aggregation.field)
    }
}

/// Table header: the alias, or `OP(field)`.
pub fn format_aggregation_header(aggregation: &Aggregation) -> String {
    if let Some(alias) = aggregation.alias.as_deref().filter(|a| !a.is_empty()) {
        return alias.to_string();
    }

    let pretty_op = aggregation.op.as_str().to_uppercase();

    if aggregation.field.is_empty() {
        pretty_op
    } else {
        format!("{}({})", pretty_op, aggregation.field)
    }
}

/// True when every `|`-separated part of a field type is numeric.
pub fn is_number_type(field_type: &str) -> bool {
    !field_type.is_empty()
        && field_type
            .split('|')
            .all(|t| t == "float" || t == "integer")
}

/// Formats with `max_fraction_digits`, trailing zeros trimmed and `,` thousands separators.
pub fn format_decimal(value: f64, max_fraction_digits: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    let digits = max_fraction_digits.min(20);
    let factor = 10f64.powi(digits as i32);
    let rounded = if (value * factor).is_finite() {
        (value * factor).round() / factor
    } else {
        value
    };

    let fixed = format!("{:.*}", digits, rounded);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part.trim_end_matches('0')),
        None => (fixed.as_str(), ""),
    };

    let negative = int_part.starts_with('-');
    let int_digits = int_part.trim_start_matches('-');
    let is_zero = int_digits.chars().all(|c| c == '0') && frac_part.is_empty();

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3);
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(&group_thousands(int_digits));
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Default mantissa for a value: 3 fraction digits, 4 below one, none above 2^53.
pub fn default_mantissa(value: f64) -> usize {
    if value > -1.0 && value < 1.0 {
        4
    } else if value > MAX_SAFE_INTEGER {
        0
    } else {
        3
    }
}

/// Human formatting of an optional number, optionally through a unit formatter.
pub fn format_number(value: Option<f64>, formatter: Option<&ValueFormat>) -> String {
    let value = match value {
        Some(v) if !v.is_nan() => v,
        _ => return String::new(),
    };

    match formatter {
        Some(format) => format
            .format(
                value,
                &FormatOptions {
                    skip_scale: true,
                    ..FormatOptions::default()
                },
            )
            .to_string(),
        None => format_decimal(value, default_mantissa(value)),
    }
}

/// Stable seed for a request's empty-group color.
pub fn hash_query(request: &QueryRequest, dataset_id: Option<&str>) -> u64 {
    let mut canonical = Map::new();

    match request {
        QueryRequest::Structured(query) => {
            let aggregations: Vec<Value> = query
                .aggregations
                .iter()
                .filter_map(|agg| serde_json::to_value(agg).ok())
                .collect();
            canonical.insert("aggregations".to_string(), Value::Array(aggregations));

            if let Some(filter) = query.filter.as_ref().filter(|f| !f.is_null()) {
                canonical.insert("filter".to_string(), filter.clone());
            }
            if let Some(group_by) = &query.group_by {
                canonical.insert(
                    "groupBy".to_string(),
                    Value::Array(group_by.iter().cloned().map(Value::String).collect()),
                );
            }
            if let Some(order) = query.order.as_ref().filter(|o| !o.is_null()) {
                canonical.insert("order".to_string(), order.clone());
            }
            if let Some(fields) = query.virtual_fields.as_ref().filter(|v| !v.is_null()) {
                canonical.insert("virtualFields".to_string(), fields.clone());
            }
            if let Some(dataset) = dataset_id {
                canonical.insert("dataset".to_string(), Value::String(dataset.to_string()));
            }

            hash_code(&ordered_stringify(&Value::Object(canonical))) as u64
        }
        QueryRequest::Apl(apl) => {
            canonical.insert("apl".to_string(), Value::String(apl.apl.clone()));
            hash_code(&Value::Object(canonical).to_string()) as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::AggregationOp;
    use serde_json::json;

    #[test]
    fn test_hash_code_known_values() {
        assert_eq!(hash_code(""), 0);
        assert_eq!(hash_code("a"), 97);
        assert_eq!(hash_code("ab"), 97 * 31 + 98);
    }

    #[test]
    fn test_hash_code_wraps_to_positive() {
        // Long input overflows 32 bits several times; result stays non-negative and stable.
        let text = "service.name, us-east-1, production-cluster-042";
        assert_eq!(hash_code(text), hash_code(text));
    }

    #[test]
    fn test_ordered_stringify_sorts_nested_keys() {
        let a = json!({"b": 1, "a": {"z": true, "y": [1, {"d": 2, "c": 1}]}});
        let b = json!({"a": {"y": [1, {"c": 1, "d": 2}], "z": true}, "b": 1});

        assert_eq!(ordered_stringify(&a), ordered_stringify(&b));
        assert_eq!(
            ordered_stringify(&a),
            r#"{"a":{"y":[1,{"c":1,"d":2}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn test_js_number() {
        assert_eq!(js_number(1.0), "1");
        assert_eq!(js_number(-0.0), "0");
        assert_eq!(js_number(2.5), "2.5");
        assert_eq!(js_number(99.9), "99.9");
    }

    #[test]
    fn test_js_number_exponent_forms() {
        assert_eq!(js_number(1e-7), "1e-7");
        assert_eq!(js_number(-1.5e-7), "-1.5e-7");
        assert_eq!(js_number(0.000001), "0.000001");
        assert_eq!(js_number(1e21), "1e+21");
        assert_eq!(js_number(1.23e22), "1.23e+22");
        assert_eq!(js_number(123456789012345680000.0), "123456789012345680000");
    }

    #[test]
    fn test_format_percentile() {
        assert_eq!(format_percentile(95.0), "P95");
        assert_eq!(format_percentile(99.9), "P999");
        assert_eq!(format_percentile(5.0), "P05");
        assert_eq!(format_percentile(0.5), "P005");
        assert_eq!(format_percentile(99.99), "P9999");
    }

    #[test]
    fn test_start_case() {
        assert_eq!(start_case("count"), "Count");
        assert_eq!(start_case("topk"), "Topk");
        assert_eq!(start_case("topKValues"), "Top K Values");
        assert_eq!(start_case("not-exists"), "Not Exists");
    }

    #[test]
    fn test_chart_title_and_header() {
        let agg = Aggregation::new(AggregationOp::Avg, "duration");
        assert_eq!(format_aggregation_chart_title(&agg), "Avg(duration)");
        assert_eq!(format_aggregation_header(&agg), "AVG(duration)");

        let count = Aggregation::new(AggregationOp::Count, "");
        assert_eq!(format_aggregation_chart_title(&count), "Count");

        let aliased = Aggregation::new(AggregationOp::Sum, "bytes").with_alias("Traffic");
        assert_eq!(format_aggregation_chart_title(&aliased), "Traffic");
        assert_eq!(format_aggregation_header(&aliased), "Traffic");
    }

    #[test]
    fn test_is_number_type() {
        assert!(is_number_type("integer"));
        assert!(is_number_type("float|integer"));
        assert!(!is_number_type("string|integer"));
        assert!(!is_number_type(""));
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(1234567.891, 0), "1,234,568");
        assert_eq!(format_decimal(1234.5, 3), "1,234.5");
        assert_eq!(format_decimal(-0.00001, 4), "0");
        assert_eq!(format_decimal(-1500.25, 1), "-1,500.3");
        assert_eq!(format_decimal(2.5, 0), "3");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(None, None), "");
        assert_eq!(format_number(Some(f64::NAN), None), "");
        assert_eq!(format_number(Some(0.123456), None), "0.1235");
        assert_eq!(format_number(Some(12345.6789), None), "12,345.679");
    }
}
