//! Log records as they flow through the deduplication engine.
//!
//! A [`Record`] is value-like: the engine clones what it needs to keep and only
//! ever appends attributes to a record it is about to forward.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Severity of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Canonical uppercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// A typed attribute value.
///
/// Every variant has a canonical string form (its `Display` impl), which is
/// what the content hasher consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Time(DateTime<Utc>),
    Duration(Duration),
}

impl Value {
    /// Returns the unsigned integer payload, widening non-negative signed ints.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{}", v),
            Value::Uint(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Value::Duration(d) => write!(f, "{:?}", d),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Uint(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Time(_) | Value::Duration(_) => serializer.collect_str(self),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Uint(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

/// A single key/value attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Where a record was logged from.
///
/// Opaque to the engine: it is carried into summaries for attribution and
/// never hashed or interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallSite {
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl CallSite {
    pub fn from_metadata(metadata: &tracing::Metadata<'_>) -> Self {
        Self {
            module_path: metadata.module_path().map(str::to_string),
            file: metadata.file().map(str::to_string),
            line: metadata.line(),
        }
    }
}

/// A log event being processed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub attrs: Vec<Attr>,
    pub call_site: Option<CallSite>,
}

impl Record {
    /// Create a record stamped with the current wall-clock time.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            message: message.into(),
            attrs: Vec::new(),
            call_site: None,
        }
    }

    /// Builder-style attribute append.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(key, value);
        self
    }

    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// Append an attribute. Existing attributes with the same key are kept.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attrs.push(Attr::new(key, value));
    }

    /// First attribute with the given key.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.iter().find(|a| a.key == key).map(|a| &a.value)
    }
}

/// Attributes are nested under `fields` so no attribute key can shadow the
/// record's own `time`, `level`, `msg` or `source`.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(!self.attrs.is_empty()) + usize::from(self.call_site.is_some());
        let mut map = serializer.serialize_map(Some(3 + extra))?;
        map.serialize_entry("time", &Value::Time(self.time))?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("msg", &self.message)?;
        if !self.attrs.is_empty() {
            map.serialize_entry("fields", &Fields(&self.attrs))?;
        }
        if let Some(call_site) = &self.call_site {
            map.serialize_entry("source", call_site)?;
        }
        map.end()
    }
}

struct Fields<'a>(&'a [Attr]);

impl Serialize for Fields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for attr in self.0 {
            map.serialize_entry(&attr.key, &attr.value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_level_ordering_and_names() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
        assert_eq!(Level::Warn.to_string(), "WARN");
        assert_eq!(Level::from(&tracing::Level::ERROR), Level::Error);
    }

    #[test]
    fn test_attr_lookup_returns_first_match() {
        let record = Record::new(Level::Info, "hello")
            .with_attr("k", "first")
            .with_attr("k", "second");

        assert_eq!(record.attr("k").and_then(Value::as_str), Some("first"));
        assert!(record.attr("missing").is_none());
    }

    #[test]
    fn test_value_display_is_canonical() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(Value::from(t).to_string(), "2024-05-01T12:00:00.000000000Z");
        assert_eq!(Value::from(42u64).to_string(), "42");
        assert_eq!(Value::from(-3i64).to_string(), "-3");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(Duration::from_millis(1500)).to_string(), "1.5s");
    }

    #[test]
    fn test_as_u64_widens_non_negative_ints() {
        assert_eq!(Value::Int(7).as_u64(), Some(7));
        assert_eq!(Value::Int(-1).as_u64(), None);
        assert_eq!(Value::Uint(9).as_u64(), Some(9));
        assert_eq!(Value::from("9").as_u64(), None);
    }

    #[test]
    fn test_record_serializes_attrs_under_fields() {
        let mut record = Record::new(Level::Warn, "disk low").with_attr("free_mb", 12u64);
        record.time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["level"], "WARN");
        assert_eq!(json["msg"], "disk low");
        assert_eq!(json["fields"]["free_mb"], 12);
        assert!(json.get("free_mb").is_none());
        assert_eq!(json["time"], "2024-01-02T03:04:05.000000000Z");
        assert!(json.get("source").is_none());

        let bare = serde_json::to_value(Record::new(Level::Info, "x")).unwrap();
        assert!(bare.get("fields").is_none());
    }
}
