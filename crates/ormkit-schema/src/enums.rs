//! PostgreSQL enum label lists and the ordering of new labels.

use crate::ddl::EnumPosition;
use ormkit_core::Value;
use regex::Regex;
use std::sync::OnceLock;

fn array_item_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#""((?:[^"\\]|\\.)*)"|([^,{}]+)"#).ok())
        .as_ref()
}

/// Labels of an `array_agg` result, either decoded or in `{a,b,"c d"}` text form.
pub fn parse_enum_labels(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        other => other.as_str().map(parse_array_text).unwrap_or_default(),
    }
}

fn parse_array_text(text: &str) -> Vec<String> {
    let Some(pattern) = array_item_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            caps.get(1)
                .map(|quoted| quoted.as_str().replace("\\\"", "\"").replace("\\\\", "\\"))
                .or_else(|| caps.get(2).map(|bare| bare.as_str().trim().to_string()))
        })
        .filter(|label| !label.is_empty())
        .collect()
}

/// Labels of `declared` missing from `existing`, in execution order, each
/// with the anchor that places it at its declared position.
///
/// New labels declared before an existing one are added `BEFORE` it in
/// declaration order; labels after the last matched one are added `AFTER`
/// the last existing label in reverse order, so each lands in place.
pub fn missing_labels(declared: &[String], existing: &[String]) -> Vec<(String, EnumPosition)> {
    let mut additions = Vec::new();
    let mut rightmost: Option<usize> = None;
    let mut last_existing: Option<&String> = None;

    for label in existing {
        last_existing = Some(label);
        let Some(index) = declared.iter().position(|d| d == label) else {
            continue;
        };
        let start = rightmost.map_or(0, |r| r + 1);
        if index >= start {
            additions.extend(
                declared[start..index]
                    .iter()
                    .filter(|new| !existing.contains(*new))
                    .map(|new| (new.clone(), EnumPosition::Before(label.clone()))),
            );
            rightmost = Some(index);
        }
    }

    if let Some(last) = last_existing {
        let start = rightmost.map_or(0, |r| r + 1);
        additions.extend(
            declared[start..]
                .iter()
                .rev()
                .filter(|new| !existing.contains(*new))
                .map(|new| (new.clone(), EnumPosition::After(last.clone()))),
        );
    }
    additions
}
