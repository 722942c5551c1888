//! Minimal dotted-path extraction for lookup responses.
//!
//! `data.items[].code` walks `data`, then `items`, then collects `code` from
//! every element of `items`. `[]` on its own addresses the current node as
//! an array. Scalars are taken as strings; numbers are rendered as written.

use serde_json::Value;

/// Values at `path` in `doc`. An empty path expects the document itself to
/// be an array of strings.
pub fn extract(doc: &Value, path: &str) -> Result<Vec<String>, String> {
    let segments: Vec<&str> = path
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return serde_json::from_value::<Vec<String>>(doc.clone())
            .map_err(|e| format!("expected a JSON array of strings: {e}"));
    }
    walk(doc, &segments, path)
}

fn walk(node: &Value, segments: &[&str], path: &str) -> Result<Vec<String>, String> {
    let Some((segment, rest)) = segments.split_first() else {
        return match scalar(node) {
            Some(s) => Ok(vec![s]),
            None => Err(format!("'{path}' does not end at a string or number")),
        };
    };

    if let Some(field) = segment.strip_suffix("[]") {
        let target = if field.is_empty() {
            node
        } else {
            node.get(field)
                .ok_or_else(|| format!("missing field '{field}' in '{path}'"))?
        };
        let items = target
            .as_array()
            .ok_or_else(|| format!("'{segment}' in '{path}' is not an array"))?;

        // Elements that do not match the rest of the path are skipped.
        let values = items
            .iter()
            .filter_map(|item| {
                if rest.is_empty() {
                    scalar(item).map(|s| vec![s])
                } else {
                    walk(item, rest, path).ok()
                }
            })
            .flatten()
            .collect();
        return Ok(values);
    }

    let next = node
        .get(*segment)
        .ok_or_else(|| format!("missing field '{segment}' in '{path}'"))?;
    walk(next, rest, path)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
