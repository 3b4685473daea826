//! Text and JSON rendering shared by the shell and the one-shot commands.

use crate::bus::{BusEvent, ChangeRecord};
use crate::error::ShellError;
use crate::tree::{ChangeKind, NodePath, Stamp, Value};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Output format of `get` and `save`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Human-readable values, one leaf per line
    #[default]
    String,
    /// Structured JSON mirror with sorted keys
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(Format::String),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown format '{}', expected string or json", other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::String => f.write_str("string"),
            Format::Json => f.write_str("json"),
        }
    }
}

/// Wall-clock time as printed everywhere.
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Last refresh time, `never` if the node was never refreshed.
pub fn format_stamp(stamp: Option<Stamp>) -> String {
    match stamp {
        Some(stamp) => format_time(&stamp.wall),
        None => "never".to_string(),
    }
}

/// `<path>: <value>`
pub fn value_line(path: &NodePath, value: &Value) -> String {
    format!("{}: {}", path, value)
}

/// `<path>: <value> (last updated <time>)`
pub fn leaf_line(path: &NodePath, value: &Value, updated: Option<Stamp>) -> String {
    format!("{}: {} (last updated {})", path, value, format_stamp(updated))
}

/// Pretty JSON with sorted keys.
pub fn to_json(value: &Value) -> Result<String, ShellError> {
    serde_json::to_string_pretty(value).map_err(|err| ShellError::Io(err.to_string()))
}

/// One line of `events` output.
pub fn event_line(event: &BusEvent) -> String {
    match event {
        BusEvent::Record(record) => record_line(record),
        BusEvent::Gap { missed } => format!("*** {} events dropped", missed),
    }
}

fn record_line(record: &ChangeRecord) -> String {
    let time = format_time(&record.timestamp);
    match record.kind {
        ChangeKind::ValueChanged => {
            format!("{}: {}: new value: {}", time, record.path, record.new_value)
        }
        ChangeKind::Added => format!("{}: {}: new object created", time, record.path),
        ChangeKind::Removed => format!("{}: {}: object not available anymore", time, record.path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(kind: ChangeKind) -> ChangeRecord {
        ChangeRecord {
            sequence: 7,
            timestamp: Utc.with_ymd_and_hms(2026, 10, 16, 8, 30, 0).unwrap(),
            path: NodePath::from_segments(["garage", "VIN1", "odometer"]),
            kind,
            old_value: Some(Value::Integer(12345)),
            new_value: Value::Integer(12400),
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<Format>(), Ok(Format::Json));
        assert_eq!("STRING".parse::<Format>(), Ok(Format::String));
        assert!("yaml".parse::<Format>().is_err());
        assert_eq!(Format::default().to_string(), "string");
    }

    #[test]
    fn test_event_lines() {
        assert_eq!(
            event_line(&BusEvent::Record(record(ChangeKind::ValueChanged))),
            "2026-10-16 08:30:00.000000: /garage/VIN1/odometer: new value: 12400"
        );
        assert_eq!(
            event_line(&BusEvent::Record(record(ChangeKind::Added))),
            "2026-10-16 08:30:00.000000: /garage/VIN1/odometer: new object created"
        );
        assert_eq!(
            event_line(&BusEvent::Record(record(ChangeKind::Removed))),
            "2026-10-16 08:30:00.000000: /garage/VIN1/odometer: object not available anymore"
        );
        assert_eq!(event_line(&BusEvent::Gap { missed: 3 }), "*** 3 events dropped");
    }

    #[test]
    fn test_leaf_line_never_updated() {
        let path = NodePath::from_segments(["garage", "VIN1", "odometer"]);
        assert_eq!(
            leaf_line(&path, &Value::Absent, None),
            "/garage/VIN1/odometer: absent (last updated never)"
        );
    }

    #[test]
    fn test_json_keys_sorted() {
        let value = Value::from_json(serde_json::json!({"zeta": 1, "alpha": {"b": true, "a": "x"}}));
        let json = to_json(&value).unwrap();
        let alpha = json.find("alpha").unwrap();
        let zeta = json.find("zeta").unwrap();
        assert!(alpha < zeta);
        assert!(json.find("\"a\"").unwrap() < json.find("\"b\"").unwrap());
    }
}
