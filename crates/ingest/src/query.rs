// File: src/query.rs
// Purpose: Turns query strings and url-encoded form bodies into nested JSON

use serde_json::{json, Map, Value as JsonValue};

/// Parses `a=1&user[name]=john&tags[]=x&tags[]=y` into a JSON object
///
/// - `+` and percent escapes are decoded
/// - bracketed keys nest objects, `[]` appends to an array, numeric
///   brackets index arrays
/// - integer and float values that print back identically become numbers,
///   `true`/`false` become booleans, everything else stays a string
///
/// ```
/// use ingest::query::parse_query;
/// use serde_json::json;
///
/// let value = parse_query("page=2&user[name]=john+doe&tags[]=a&tags[]=b");
/// assert_eq!(value, json!({
///     "page": 2,
///     "user": { "name": "john doe" },
///     "tags": ["a", "b"]
/// }));
/// ```
pub fn parse_query(query: &str) -> JsonValue {
    let query = query.strip_prefix('?').unwrap_or(query);

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .fold(JsonValue::Object(Map::new()), |mut root, (key, value)| {
            let key = decode(key);
            if key.is_empty() {
                return root;
            }
            let parts = parse_key(&key);
            assign(&mut root, &parts, parse_value(&decode(value)));
            root
        })
}

/// Decodes `+` and percent escapes, keeping the raw text when malformed
fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

/// Pure function to parse a string value into appropriate JSON type
fn parse_value(value: &str) -> JsonValue {
    match value {
        "true" => return json!(true),
        "false" => return json!(false),
        _ => {}
    }

    value
        .parse::<i64>()
        .ok()
        .filter(|num| num.to_string() == value)
        .map(|num| json!(num))
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|num| num.is_finite() && num.to_string() == value)
                .map(|num| json!(num))
        })
        .unwrap_or_else(|| json!(value))
}

/// Splits `a[b][]` into `["a", "b", ""]`
fn parse_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };

    let mut parts = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        match inner.find(']') {
            Some(close) => {
                parts.push(inner[..close].to_string());
                rest = &inner[close + 1..];
            }
            // Unbalanced bracket: treat the whole key as a flat name
            None => return vec![key.to_string()],
        }
    }

    if !rest.is_empty() {
        return vec![key.to_string()];
    }
    parts
}

fn assign(slot: &mut JsonValue, parts: &[String], value: JsonValue) {
    let Some((part, rest)) = parts.split_first() else {
        *slot = value;
        return;
    };

    // `[]` appends
    if part.is_empty() {
        if !slot.is_array() {
            *slot = JsonValue::Array(Vec::new());
        }
        if let JsonValue::Array(items) = slot {
            items.push(JsonValue::Null);
            if let Some(last) = items.last_mut() {
                assign(last, rest, value);
            }
        }
        return;
    }

    // `[0]` indexes arrays while the index is contiguous
    if let Ok(index) = part.parse::<usize>() {
        if slot.is_null() {
            *slot = JsonValue::Array(Vec::new());
        }
        if let JsonValue::Array(items) = slot {
            if index <= items.len() {
                if index == items.len() {
                    items.push(JsonValue::Null);
                }
                assign(&mut items[index], rest, value);
                return;
            }
        }
    }

    if !slot.is_object() {
        *slot = into_object(std::mem::take(slot));
    }
    if let JsonValue::Object(map) = slot {
        let next = map.entry(part.clone()).or_insert(JsonValue::Null);
        assign(next, rest, value);
    }
}

/// Arrays become objects keyed by index; scalars are dropped
fn into_object(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Array(items) => JsonValue::Object(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
        ),
        JsonValue::Object(map) => JsonValue::Object(map),
        _ => JsonValue::Object(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flat_pairs() {
        assert_eq!(parse_query("a=1&b=two&c"), json!({ "a": 1, "b": "two", "c": "" }));
    }

    #[test]
    fn test_leading_question_mark_and_empty_pairs() {
        assert_eq!(parse_query("?&a=x&&"), json!({ "a": "x" }));
        assert_eq!(parse_query(""), json!({}));
    }

    #[test]
    fn test_percent_decoding() {
        assert_eq!(
            parse_query("q=hello%20world&name%5Bfirst%5D=jo"),
            json!({ "q": "hello world", "name": { "first": "jo" } })
        );
    }

    #[test]
    fn test_values_keep_leading_zeros() {
        assert_eq!(
            parse_query("zip=007&n=1.5&flag=true"),
            json!({ "zip": "007", "n": 1.5, "flag": true })
        );
    }

    #[test]
    fn test_indexed_arrays() {
        assert_eq!(
            parse_query("list[0]=a&list[1]=b&list[5]=c"),
            json!({ "list": { "0": "a", "1": "b", "5": "c" } })
        );
    }

    #[test]
    fn test_array_of_objects() {
        assert_eq!(
            parse_query("rows[][name]=a&rows[][name]=b"),
            json!({ "rows": [{ "name": "a" }, { "name": "b" }] })
        );
    }

    #[test]
    fn test_unbalanced_brackets_stay_flat() {
        assert_eq!(parse_query("a[b=1"), json!({ "a[b": 1 }));
    }
}
