//! Purpose: Define a stable, structured schema for non-fatal stderr notices.
//! Exports: `Notice`, `notice_json`, `leak_notice`, `notice_time_now`.
//! Role: Shared contract helper for bridge diagnostics (non-error events such as leaked handles).
//! Invariants: Notices are non-fatal and never alter protocol output on stdout.
//! Invariants: JSON schema is stable once published; fields are additive-only.
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value, json};

use crate::core::registry::TeardownReport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: String,
    pub time: String,
    pub cmd: String,
    pub message: String,
    pub details: Map<String, Value>,
}

pub fn notice_json(notice: &Notice) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(notice.kind));
    inner.insert("time".to_string(), json!(notice.time));
    inner.insert("cmd".to_string(), json!(notice.cmd));
    inner.insert("message".to_string(), json!(notice.message));
    inner.insert("details".to_string(), Value::Object(notice.details.clone()));

    let mut outer = Map::new();
    outer.insert("notice".to_string(), Value::Object(inner));
    Value::Object(outer)
}

/// Builds the notice emitted when teardown had to free handles the host never deleted.
pub fn leak_notice(cmd: &str, time: String, report: &TeardownReport) -> Notice {
    let mut details = Map::new();
    details.insert("released_count".to_string(), json!(report.released));
    let by_type = report
        .by_type
        .iter()
        .map(|(name, count)| (name.to_string(), json!(count)))
        .collect::<Map<_, _>>();
    details.insert("by_type".to_string(), Value::Object(by_type));
    Notice {
        kind: "leak".to_string(),
        time,
        cmd: cmd.to_string(),
        message: format!("released {} handle(s) never deleted by the host", report.released),
        details,
    }
}

pub fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::{leak_notice, notice_json, notice_time_now};
    use crate::core::registry::TeardownReport;

    #[test]
    fn leak_notice_has_required_fields() {
        let mut report = TeardownReport {
            released: 3,
            ..TeardownReport::default()
        };
        report.by_type.insert("Complex", 3);

        let notice = leak_notice("stdio", "2026-02-01T00:00:00Z".to_string(), &report);
        let value = notice_json(&notice);
        let obj = value
            .get("notice")
            .and_then(|v| v.as_object())
            .expect("notice object");

        assert_eq!(obj.get("kind").and_then(|v| v.as_str()), Some("leak"));
        assert_eq!(
            obj.get("time").and_then(|v| v.as_str()),
            Some("2026-02-01T00:00:00Z")
        );
        assert_eq!(obj.get("cmd").and_then(|v| v.as_str()), Some("stdio"));
        assert_eq!(
            obj.get("message").and_then(|v| v.as_str()),
            Some("released 3 handle(s) never deleted by the host")
        );
        let details = obj.get("details").and_then(|v| v.as_object()).expect("details");
        assert_eq!(details["released_count"], 3);
        assert_eq!(details["by_type"]["Complex"], 3);
    }

    #[test]
    fn notice_time_is_rfc3339() {
        let time = notice_time_now().expect("time");
        assert!(time.contains('T'));
        assert!(time.ends_with('Z'));
    }
}
