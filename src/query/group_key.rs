use serde_json::Value;

use crate::format::{json_number, ordered_stringify};
use crate::query::EntryGroup;

/// Stable string identity of a group, used for colors, series names and totals matching.
///
/// With a group-by list the values follow its order; otherwise the group's own
/// keys are taken in sorted order. An ungrouped entry yields `""`.
pub fn group_key(group: &EntryGroup, group_by: Option<&[String]>) -> String {
    let parts: Vec<String> = match group_by {
        Some(fields) => fields
            .iter()
            .map(|field| key_part(group.group.get(field)))
            .collect(),
        None => {
            let mut fields: Vec<&String> = group.group.keys().collect();
            fields.sort();
            fields
                .into_iter()
                .map(|field| key_part(group.group.get(field)))
                .collect()
        }
    };

    parts.join(", ")
}

/// Renders one group value: strings verbatim, numbers without a trailing `.0`, a missing field as `""`.
pub fn key_part(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => json_number(n),
        Some(other) => ordered_stringify(other),
    }
}
