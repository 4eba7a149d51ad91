//! Carrier tracking payloads and event reconstruction.
//!
//! Carriers report tracking in wildly different shapes, and the API forwards
//! their JSON untouched (sometimes double-encoded as a string). This module
//! classifies a payload into one of a few explicit shapes and rebuilds an
//! ordered event list from it. Nothing here returns an error: anything that
//! cannot be understood degrades to [`EventList::NoEvents`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Keys that carriers use for an explicit event array.
const EVENT_ARRAY_KEYS: &[&str] = &[
    "events",
    "trackingEvents",
    "activities",
    "activity",
    "history",
    "checkpoints",
];

/// Keys that carry an event's timestamp.
const TIMESTAMP_KEYS: &[&str] = &[
    "timestamp",
    "dateTime",
    "datetime",
    "eventTime",
    "time",
    "date",
    "lastUpdate",
];

/// Keys that carry an event's status text.
const STATUS_KEYS: &[&str] = &["status", "currentStatus", "statusDescription", "description"];

/// Keys that carry an event's location.
const LOCATION_KEYS: &[&str] = &["location", "city", "place"];

/// Epoch values above this are milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// How an event's timestamp was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTimestamp {
    /// The carrier sent no timestamp.
    Missing,
    Parsed(DateTime<Utc>),
    /// A timestamp was sent but could not be understood.
    Invalid(String),
}

/// An event as extracted from the carrier payload, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTrackingEvent {
    pub timestamp: RawTimestamp,
    pub status: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// The recognised shape of a tracking payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingPayload {
    /// An explicit list of events.
    Events(Vec<RawTrackingEvent>),
    /// Only the latest status is known.
    CurrentStatus(RawTrackingEvent),
    /// Valid JSON that carries neither events nor a status.
    Empty,
    /// Not JSON, or JSON of a type that cannot hold tracking data.
    Unparseable,
}

/// A tracking event ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingEvent {
    /// `None` when the carrier did not say; such events sort last.
    pub time: Option<DateTime<Utc>>,
    pub status: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// What a tracking view renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "events", rename_all = "snake_case")]
pub enum EventList {
    /// Newest first.
    Events(Vec<TrackingEvent>),
    NoEvents,
}

impl EventList {
    #[must_use]
    pub fn events(&self) -> &[TrackingEvent] {
        match self {
            Self::Events(events) => events,
            Self::NoEvents => &[],
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::NoEvents)
    }
}

impl TrackingPayload {
    /// Classify a payload that may be an object, an array or a JSON string.
    #[must_use]
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                // One level of string encoding is all carriers produce.
                Ok(Value::String(_)) | Err(_) => Self::Unparseable,
                Ok(inner) => Self::parse(&inner),
            },
            Value::Array(items) => Self::Events(items.iter().filter_map(raw_event).collect()),
            Value::Object(map) => Self::parse_object(map),
            Value::Null => Self::Empty,
            Value::Bool(_) | Value::Number(_) => Self::Unparseable,
        }
    }

    fn parse_object(map: &Map<String, Value>) -> Self {
        if let Some(items) = find_event_array(map) {
            return Self::Events(items.iter().filter_map(raw_event).collect());
        }
        match raw_event(&Value::Object(map.clone())) {
            Some(event) => Self::CurrentStatus(event),
            None => Self::Empty,
        }
    }
}

/// Rebuild the event list for a shipment.
///
/// Explicit event arrays win, then a single current-status event, then a
/// synthesised "accepted" event at `created_at`. Events whose timestamp is
/// present but unparseable are dropped; events without a timestamp are kept
/// and sort after every dated event.
#[must_use]
pub fn reconstruct_events(payload: Option<&Value>, created_at: DateTime<Utc>) -> EventList {
    let Some(value) = payload else {
        return EventList::NoEvents;
    };

    let raw = match TrackingPayload::parse(value) {
        TrackingPayload::Events(events) => events,
        TrackingPayload::CurrentStatus(event) => vec![event],
        TrackingPayload::Empty => {
            return EventList::Events(vec![TrackingEvent {
                time: Some(created_at),
                status: "accepted".to_string(),
                location: None,
                description: Some("Shipment accepted".to_string()),
            }]);
        }
        TrackingPayload::Unparseable => return EventList::NoEvents,
    };

    let mut events: Vec<TrackingEvent> = raw
        .into_iter()
        .filter_map(|event| {
            let time = match event.timestamp {
                RawTimestamp::Parsed(t) => Some(t),
                RawTimestamp::Missing => None,
                RawTimestamp::Invalid(_) => return None,
            };
            Some(TrackingEvent {
                time,
                status: event.status,
                location: event.location,
                description: event.description,
            })
        })
        .collect();

    // Stable: equal timestamps keep carrier order.
    events.sort_by(|a, b| match (a.time, b.time) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    if events.is_empty() {
        EventList::NoEvents
    } else {
        EventList::Events(events)
    }
}

fn find_event_array(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    for key in EVENT_ARRAY_KEYS {
        if let Some(Value::Array(items)) = map.get(*key) {
            return Some(items);
        }
    }
    // DHL style: {"shipments": [{"events": [...]}]}
    if let Some(Value::Array(shipments)) = map.get("shipments")
        && let Some(Value::Object(first)) = shipments.first()
    {
        return find_event_array(first);
    }
    None
}

fn raw_event(value: &Value) -> Option<RawTrackingEvent> {
    let map = value.as_object()?;
    let status = first_text(map, STATUS_KEYS)?;
    let description = map
        .get("description")
        .and_then(text_of)
        .filter(|d| *d != status);

    Some(RawTrackingEvent {
        timestamp: raw_timestamp(map),
        status,
        location: first_text(map, LOCATION_KEYS),
        description,
    })
}

fn raw_timestamp(map: &Map<String, Value>) -> RawTimestamp {
    for key in TIMESTAMP_KEYS {
        match map.get(*key) {
            None | Some(Value::Null) => {}
            Some(value) => {
                return parse_timestamp(value)
                    .map_or_else(|| RawTimestamp::Invalid(value.to_string()), RawTimestamp::Parsed);
            }
        }
    }
    RawTimestamp::Missing
}

/// Text from a string value, or from `{"description": ..}` / `{"address": {"addressLocality": ..}}`
/// style nested objects.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(inner) => ["description", "status", "name"]
            .iter()
            .find_map(|k| inner.get(*k).and_then(text_of))
            .or_else(|| {
                inner
                    .get("address")
                    .and_then(|a| a.get("addressLocality"))
                    .and_then(text_of)
            }),
        _ => None,
    }
}

fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| map.get(*k).and_then(text_of))
}

/// Parse the timestamp formats carriers are known to send.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw >= EPOCH_MILLIS_THRESHOLD {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%d.%m.%Y %H:%M",
        "%Y%m%d%H%M%S",
    ] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(t.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y", "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_bad_date_filtered_to_no_events() {
        let payload = json!({"events": [{"timestamp": "bad-date", "status": "X"}]});
        assert_eq!(
            reconstruct_events(Some(&payload), created()),
            EventList::NoEvents
        );
    }

    #[test]
    fn test_string_payload_is_decoded() {
        let payload = Value::String(
            r#"{"events":[{"timestamp":"2026-03-02T08:00:00Z","status":"Picked up"}]}"#
                .to_string(),
        );
        let list = reconstruct_events(Some(&payload), created());
        assert_eq!(list.events().len(), 1);
        assert_eq!(list.events()[0].status, "Picked up");
    }

    #[test]
    fn test_malformed_string_payload() {
        let payload = Value::String("{not json".to_string());
        assert_eq!(
            TrackingPayload::parse(&payload),
            TrackingPayload::Unparseable
        );
        assert!(reconstruct_events(Some(&payload), created()).is_empty());
    }

    #[test]
    fn test_events_sorted_newest_first_undated_last() {
        let payload = json!({"events": [
            {"timestamp": "2026-03-02 08:00:00", "status": "Picked up"},
            {"status": "Label created"},
            {"timestamp": "2026-03-04T12:30:00+03:00", "status": "Delivered", "location": "Austin"},
            {"timestamp": 1_772_700_000_000_i64, "status": "In transit"}
        ]});
        let list = reconstruct_events(Some(&payload), created());
        let statuses: Vec<&str> = list.events().iter().map(|e| e.status.as_str()).collect();
        assert_eq!(
            statuses,
            vec!["In transit", "Delivered", "Picked up", "Label created"]
        );
        assert_eq!(list.events()[1].location.as_deref(), Some("Austin"));
        assert!(list.events()[3].time.is_none());
    }

    #[test]
    fn test_current_status_fallback() {
        let payload = json!({"currentStatus": "Out for delivery", "lastUpdate": "2026-03-05"});
        let list = reconstruct_events(Some(&payload), created());
        assert_eq!(list.events().len(), 1);
        assert_eq!(list.events()[0].status, "Out for delivery");
    }

    #[test]
    fn test_accepted_fallback_uses_creation_time() {
        let payload = json!({"carrier": "UPS"});
        let list = reconstruct_events(Some(&payload), created());
        assert_eq!(list.events().len(), 1);
        assert_eq!(list.events()[0].status, "accepted");
        assert_eq!(list.events()[0].time, Some(created()));
    }

    #[test]
    fn test_dhl_nested_shape() {
        let payload = json!({"shipments": [{"events": [
            {"timestamp": "2026-03-03T09:00:00", "status": {"description": "Processed"},
             "location": {"address": {"addressLocality": "Leipzig"}}}
        ]}]});
        let list = reconstruct_events(Some(&payload), created());
        assert_eq!(list.events()[0].status, "Processed");
        assert_eq!(list.events()[0].location.as_deref(), Some("Leipzig"));
    }

    #[test]
    fn test_absent_and_scalar_payloads() {
        assert!(reconstruct_events(None, created()).is_empty());
        assert!(reconstruct_events(Some(&json!(42)), created()).is_empty());
    }
}
