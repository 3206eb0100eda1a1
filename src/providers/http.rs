use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{Map, Value};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("listing-radar/0.1")
        .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
});

pub async fn get_json(
    url: &str,
    headers: &[(&str, String)],
    query: &[(&str, String)],
) -> Result<Value> {
    let mut request = HTTP_CLIENT.get(url).query(query);
    for (name, value) in headers {
        request = request.header(*name, value.as_str());
    }
    let response = request
        .send()
        .await
        .with_context(|| format!("failed GET request: {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?;
    if !status.is_success() {
        let preview: String = body.chars().take(180).collect();
        return Err(anyhow!("GET {url} returned {status}: {preview}"));
    }
    serde_json::from_str(&body).with_context(|| format!("invalid JSON response: {url}"))
}

/// Array lookup at a dotted path, accepting the payload itself being the
/// array. Upstream APIs disagree on nesting, so providers name the shapes
/// they know and fall back to an empty slice.
pub fn items_at<'a>(value: &'a Value, path: &str) -> Vec<&'a Value> {
    let target = if path.is_empty() {
        Some(value)
    } else {
        value.as_object().and_then(|object| path_value(object, path))
    };
    match target.or(Some(value)) {
        Some(Value::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    }
}

pub fn string_at(object: &Map<String, Value>, path: &str) -> Option<String> {
    match path_value(object, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn f64_at(object: &Map<String, Value>, path: &str) -> Option<f64> {
    to_f64(path_value(object, path)?)
}

pub fn i64_at(object: &Map<String, Value>, path: &str) -> Option<i64> {
    to_f64(path_value(object, path)?).map(|v| v.round() as i64)
}

pub fn u32_at(object: &Map<String, Value>, path: &str) -> Option<u32> {
    i64_at(object, path).and_then(|v| u32::try_from(v).ok())
}

fn path_value<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = get_case_insensitive(object, first)?;
    for segment in segments {
        let nested = current.as_object()?;
        current = get_case_insensitive(nested, segment)?;
    }
    Some(current)
}

fn get_case_insensitive<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let sanitized = s.trim().replace([',', '$', '_'], "");
            sanitized.parse::<f64>().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{f64_at, i64_at, items_at, string_at, u32_at};

    #[test]
    fn dotted_paths_traverse_nested_objects_case_insensitively() {
        let payload = json!({
            "Location": {"Address": {"line": "123 Main St", "zip": 92037}}
        });
        let object = payload.as_object().unwrap();
        assert_eq!(
            string_at(object, "location.address.line").as_deref(),
            Some("123 Main St")
        );
        assert_eq!(string_at(object, "location.address.zip").as_deref(), Some("92037"));
        assert!(string_at(object, "location.address.city").is_none());
    }

    #[test]
    fn numbers_parse_from_strings_with_currency_noise() {
        let payload = json!({"price": "1,500,000", "beds": 3, "baths": 2.5});
        let object = payload.as_object().unwrap();
        assert_eq!(i64_at(object, "price"), Some(1_500_000));
        assert_eq!(u32_at(object, "beds"), Some(3));
        assert_eq!(f64_at(object, "baths"), Some(2.5));
    }

    #[test]
    fn items_at_accepts_nested_and_bare_arrays() {
        let nested = json!({"data": {"results": [{"a": 1}, {"a": 2}]}});
        assert_eq!(items_at(&nested, "data.results").len(), 2);

        let bare = json!([{"a": 1}]);
        assert_eq!(items_at(&bare, "properties").len(), 1);

        let scalar = json!({"data": 42});
        assert!(items_at(&scalar, "data").is_empty());
    }
}
