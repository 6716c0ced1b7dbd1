// SPDX-License-Identifier: MIT OR Apache-2.0

//! Soft-failing accessor for values found in a snapshot.
//!
//! A [`ConfigValue`] is the result of walking a [`ConfigPath`] through a
//! decoded snapshot. Its typed getters never fail: a missing path, a `null`
//! or a value that cannot be converted yields the caller's default. Scalars
//! are coerced, so `"42"` reads as an integer and `8080` reads as a string.

use crate::domain::config_path::ConfigPath;
use crate::domain::errors::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// A value looked up from a snapshot, possibly absent.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::{ConfigPath, ConfigValue};
/// use serde_json::json;
///
/// let tree = json!({"default": {"port": "8080", "debug": "yes"}});
///
/// let port = ConfigValue::lookup(&tree, &ConfigPath::from(["default", "port"]));
/// assert_eq!(port.int(0), 8080);
///
/// let debug = ConfigValue::lookup(&tree, &ConfigPath::from(["default", "debug"]));
/// assert!(debug.boolean(false));
///
/// let missing = ConfigValue::lookup(&tree, &ConfigPath::from(["default", "missing"]));
/// assert_eq!(missing.string("fallback"), "fallback");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigValue {
    path: ConfigPath,
    value: Option<Value>,
}

impl ConfigValue {
    /// Wraps a value found at `path`.
    pub fn new(path: ConfigPath, value: Option<Value>) -> Self {
        Self { path, value }
    }

    /// Walks `path` through `tree`.
    ///
    /// Objects are indexed by key, arrays by a numeric segment. The empty path
    /// returns the whole tree.
    pub fn lookup(tree: &Value, path: &ConfigPath) -> Self {
        let mut current = Some(tree);
        for segment in path.segments() {
            current = current.and_then(|node| step(node, segment));
        }
        Self::new(path.clone(), current.cloned())
    }

    /// Navigates further below this value.
    pub fn get(&self, path: impl Into<ConfigPath>) -> ConfigValue {
        let sub = path.into();
        let mut full = self.path.clone();
        for segment in sub.segments() {
            full = full.join(segment.clone());
        }
        match &self.value {
            Some(value) => {
                let found = ConfigValue::lookup(value, &sub);
                ConfigValue::new(full, found.value)
            }
            None => ConfigValue::new(full, None),
        }
    }

    /// The path this value was looked up with.
    pub fn path(&self) -> &ConfigPath {
        &self.path
    }

    /// Returns `true` when a non-null value exists at the path.
    pub fn exists(&self) -> bool {
        matches!(&self.value, Some(v) if !v.is_null())
    }

    /// The raw value, if any.
    pub fn raw(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consumes the accessor and returns the raw value.
    pub fn into_raw(self) -> Option<Value> {
        self.value
    }

    /// Reads a string. Numbers and booleans are rendered; containers fall back.
    pub fn string(&self, default: &str) -> String {
        self.value
            .as_ref()
            .and_then(scalar_string)
            .unwrap_or_else(|| default.to_string())
    }

    /// Reads a signed integer.
    pub fn int(&self, default: i64) -> i64 {
        match &self.value {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| {
                            f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64
                        })
                        .map(|f| f as i64)
                })
                .unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            Some(Value::Bool(b)) => i64::from(*b),
            _ => default,
        }
    }

    /// Reads an unsigned integer. Negative values fall back.
    pub fn uint(&self, default: u64) -> u64 {
        match &self.value {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            Some(Value::Bool(b)) => u64::from(*b),
            _ => default,
        }
    }

    /// Reads a float.
    pub fn float(&self, default: f64) -> f64 {
        match &self.value {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Reads a boolean.
    ///
    /// Strings are matched case-insensitively: `true`, `yes`, `1`, `on` and
    /// `false`, `no`, `0`, `off`.
    pub fn boolean(&self, default: bool) -> bool {
        match &self.value {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => true,
                "false" | "no" | "0" | "off" => false,
                _ => default,
            },
            _ => default,
        }
    }

    /// Reads raw bytes.
    ///
    /// A string yields its UTF-8 bytes; any other present value yields its
    /// JSON encoding.
    pub fn bytes(&self, default: &[u8]) -> Vec<u8> {
        match &self.value {
            None | Some(Value::Null) => default.to_vec(),
            Some(Value::String(s)) => s.as_bytes().to_vec(),
            Some(other) => serde_json::to_vec(other).unwrap_or_else(|_| default.to_vec()),
        }
    }

    /// Reads a duration.
    ///
    /// Accepts unit strings such as `300ms`, `1h30m` or `2.5s`. Bare numbers
    /// are seconds.
    pub fn duration(&self, default: Duration) -> Duration {
        match &self.value {
            Some(Value::Number(n)) => n
                .as_f64()
                .and_then(|f| Duration::try_from_secs_f64(f).ok())
                .unwrap_or(default),
            Some(Value::String(s)) => parse_duration(s).unwrap_or(default),
            _ => default,
        }
    }

    /// Reads a list of strings. Scalar items are rendered, others skipped.
    pub fn string_list(&self, default: &[&str]) -> Vec<String> {
        match &self.value {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
            _ => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Reads a map of strings. Scalar entries are rendered, others skipped.
    pub fn string_map(&self, default: HashMap<String, String>) -> HashMap<String, String> {
        match &self.value {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| scalar_string(v).map(|s| (k.clone(), s)))
                .collect(),
            _ => default,
        }
    }

    /// Decodes the value into a typed structure.
    ///
    /// Unlike the getters above this is strict: a missing value or a shape
    /// mismatch is a `DecodeError`.
    pub fn scan<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.value.clone().ok_or_else(|| ConfigError::DecodeError {
            format: "json".to_string(),
            message: format!("no value at '{}'", self.path),
            source: None,
        })?;
        serde_json::from_value(value).map_err(|e| ConfigError::decode("json", e))
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}", scalar_string(v).unwrap_or_else(|| v.to_string())),
            None => Ok(()),
        }
    }
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parses a duration string made of `<number><unit>` pairs.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare number is seconds.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::config_value::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
/// assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
/// assert_eq!(parse_duration("soon"), None);
/// ```
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let mut total_nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let number: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += number * scale;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn tree() -> Value {
        json!({
            "default": {
                "name": "svc",
                "port": 8080,
                "ratio": "0.25",
                "flags": ["a", 1, true, {"x": 1}],
                "labels": {"tier": "web", "replicas": 3},
                "timeout": "1m30s",
                "nothing": null,
                "db.yaml": {"host": "localhost", "port": 5432}
            }
        })
    }

    fn at(segments: &[&str]) -> ConfigValue {
        ConfigValue::lookup(&tree(), &ConfigPath::from(segments))
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(at(&["default", "name"]).string(""), "svc");
        assert_eq!(at(&["default", "port"]).string(""), "8080");
        assert_eq!(at(&["default", "labels"]).string("dflt"), "dflt");
    }

    #[test]
    fn test_missing_and_null_fall_back() {
        assert_eq!(at(&["default", "missing"]).string("fallback"), "fallback");
        assert_eq!(at(&["default", "nothing"]).int(7), 7);
        assert!(!at(&["default", "nothing"]).exists());
        assert!(!at(&["nope", "deeper", "still"]).exists());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(at(&["default", "port"]).int(0), 8080);
        assert_eq!(at(&["default", "port"]).uint(0), 8080);
        assert_eq!(at(&["default", "ratio"]).float(0.0), 0.25);
        assert_eq!(at(&["default", "name"]).int(-1), -1);
    }

    #[test]
    fn test_int_from_float() {
        let whole = ConfigValue::new(ConfigPath::default(), Some(json!(4.0)));
        assert_eq!(whole.int(0), 4);

        let huge = ConfigValue::new(ConfigPath::default(), Some(json!(1e300)));
        assert_eq!(huge.int(3), 3);
        let tiny = ConfigValue::new(ConfigPath::default(), Some(json!(-1e300)));
        assert_eq!(tiny.int(3), 3);
    }

    #[test]
    fn test_uint_rejects_negative() {
        let v = ConfigValue::new(ConfigPath::default(), Some(json!(-5)));
        assert_eq!(v.uint(9), 9);
        assert_eq!(v.int(9), -5);
    }

    #[test]
    fn test_boolean_variants() {
        for s in ["true", "YES", "1", "On"] {
            let v = ConfigValue::new(ConfigPath::default(), Some(json!(s)));
            assert!(v.boolean(false), "{} should be true", s);
        }
        for s in ["false", "no", "0", "OFF"] {
            let v = ConfigValue::new(ConfigPath::default(), Some(json!(s)));
            assert!(!v.boolean(true), "{} should be false", s);
        }
        let junk = ConfigValue::new(ConfigPath::default(), Some(json!("maybe")));
        assert!(junk.boolean(true));
    }

    #[test]
    fn test_bytes() {
        assert_eq!(at(&["default", "name"]).bytes(b""), b"svc".to_vec());
        assert_eq!(at(&["default", "port"]).bytes(b""), b"8080".to_vec());
        assert_eq!(at(&["default", "missing"]).bytes(b"d"), b"d".to_vec());
    }

    #[test]
    fn test_duration() {
        assert_eq!(
            at(&["default", "timeout"]).duration(Duration::ZERO),
            Duration::from_secs(90)
        );
        assert_eq!(
            at(&["default", "port"]).duration(Duration::ZERO),
            Duration::from_secs(8080)
        );
        assert_eq!(
            at(&["default", "name"]).duration(Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("2.5s"), Some(Duration::from_millis(2500)));
        assert_eq!(parse_duration("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("5x"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            at(&["default", "flags"]).string_list(&[]),
            vec!["a", "1", "true"]
        );
        assert_eq!(at(&["default", "name"]).string_list(&["x"]), vec!["x"]);

        let labels = at(&["default", "labels"]).string_map(HashMap::new());
        assert_eq!(labels.get("tier").map(String::as_str), Some("web"));
        assert_eq!(labels.get("replicas").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_array_index_and_nested_get() {
        assert_eq!(at(&["default", "flags", "0"]).string(""), "a");
        let db = at(&["default", "db.yaml"]);
        assert_eq!(db.get("host").string(""), "localhost");
        assert_eq!(db.get("host").path().to_string(), "default.db.yaml.host");
        assert_eq!(at(&["default", "missing"]).get("x").string("d"), "d");
    }

    #[test]
    fn test_scan() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Db {
            host: String,
            port: u16,
        }

        let db: Db = at(&["default", "db.yaml"]).scan().unwrap();
        assert_eq!(
            db,
            Db {
                host: "localhost".to_string(),
                port: 5432
            }
        );

        let mismatch = at(&["default", "name"]).scan::<Db>();
        assert!(matches!(mismatch, Err(ConfigError::DecodeError { .. })));

        let missing = at(&["default", "missing"]).scan::<Db>();
        assert!(matches!(missing, Err(ConfigError::DecodeError { .. })));
    }

    #[test]
    fn test_display() {
        assert_eq!(at(&["default", "port"]).to_string(), "8080");
        assert_eq!(at(&["default", "missing"]).to_string(), "");
    }
}
