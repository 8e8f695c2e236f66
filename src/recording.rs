//! Call recordings as read from the call system, and the filename scheme
//! used to identify them in the case system and the work queue.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::constants::{AUDIO_EXTENSION, CALLER_SUFFIX_LEN, QUEUE_PREFIX_LEN};
use crate::error::{Result, SyncError};

/// One call recording. The caller id is truncated to its suffix on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub queue_call_id: i64,
    pub queue_name: String,
    pub started_at: DateTime<Utc>,
    pub agent_name: String,
    /// Last digits of the caller number. The full number is dropped in
    /// [`Recording::from_json`] and never reaches the work queue or the logs.
    pub caller_suffix: String,
}

/// Recording as listed by the call system API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRecording {
    queue_call_id: Option<i64>,
    queue_name: Option<String>,
    conversation_started_utc: Option<String>,
    agent_name: Option<String>,
    #[serde(default, deserialize_with = "caller_as_string")]
    caller: Option<String>,
}

/// Caller numbers arrive as strings or, for some trunks, as bare numbers
fn caller_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "unexpected caller {}",
            other
        ))),
    }
}

impl Recording {
    /// Build a recording from one element of a listing response
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let raw: RawRecording = serde_json::from_value(value)?;
        let queue_call_id = raw
            .queue_call_id
            .ok_or_else(|| SyncError::MalformedRecord("missing QueueCallId".to_string()))?;
        let missing = |field: &str| {
            SyncError::MalformedRecord(format!("recording {} missing {}", queue_call_id, field))
        };
        let queue_name = raw.queue_name.ok_or_else(|| missing("QueueName"))?;
        let started = raw
            .conversation_started_utc
            .ok_or_else(|| missing("ConversationStartedUtc"))?;
        let started_at = parse_utc(&started).ok_or_else(|| {
            SyncError::MalformedRecord(format!(
                "recording {} has unparseable ConversationStartedUtc '{}'",
                queue_call_id, started
            ))
        })?;
        let agent_name = raw.agent_name.ok_or_else(|| missing("AgentName"))?;
        let caller = raw.caller.unwrap_or_default();

        Ok(Self {
            queue_call_id,
            queue_name,
            started_at,
            agent_name,
            caller_suffix: caller_suffix(&caller),
        })
    }

    /// Filename under which the recording is uploaded and audited
    pub fn filename(&self) -> String {
        derive_filename(self)
    }
}

/// Accepts RFC 3339 timestamps and offset-less ones, which the API reports in UTC
fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn caller_suffix(caller: &str) -> String {
    let chars: Vec<char> = caller.trim().chars().collect();
    let start = chars.len().saturating_sub(CALLER_SUFFIX_LEN);
    chars[start..].iter().collect()
}

/// Queue label without whitespace and without the numeric line prefix
pub fn queue_label(queue_name: &str) -> String {
    let compact: String = queue_name.chars().filter(|c| !c.is_whitespace()).collect();
    let prefix: String = compact.chars().take(QUEUE_PREFIX_LEN).collect();
    if prefix.chars().count() == QUEUE_PREFIX_LEN && prefix.chars().all(|c| c.is_ascii_digit()) {
        compact.chars().skip(QUEUE_PREFIX_LEN).collect()
    } else {
        compact
    }
}

/// `{queue}_{YYYY-MM-DDTHH-MM-SS}_{agent}_{queue_call_id}.mp3`
pub fn derive_filename(recording: &Recording) -> String {
    let agent: String = recording
        .agent_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    format!(
        "{}_{}_{}_{}.{}",
        queue_label(&recording.queue_name),
        recording.started_at.format("%Y-%m-%dT%H-%M-%S"),
        agent,
        recording.queue_call_id,
        AUDIO_EXTENSION
    )
}

/// Recover the queue call id from a filename produced by [`derive_filename`]
pub fn extract_queue_call_id(filename: &str) -> Option<i64> {
    let stem = filename.strip_suffix(&format!(".{}", AUDIO_EXTENSION))?;
    let (_, id) = stem.rsplit_once('_')?;
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Recording {
        Recording::from_json(json!({
            "QueueCallId": 4711,
            "QueueName": "89403330 Opkrævningen P-Gap",
            "ConversationStartedUtc": "2024-03-05T09:15:42.517Z",
            "AgentName": "Anna Jensen",
            "Caller": "+4512345678"
        }))
        .unwrap()
    }

    #[test]
    fn test_from_json_truncates_caller() {
        let rec = sample();
        assert_eq!(rec.queue_call_id, 4711);
        assert_eq!(rec.caller_suffix, "5678");
        assert_eq!(
            rec.started_at,
            Utc.with_ymd_and_hms(2024, 3, 5, 9, 15, 42).unwrap()
                + chrono::Duration::milliseconds(517)
        );
    }

    #[test]
    fn test_short_or_missing_caller() {
        let rec = Recording::from_json(json!({
            "QueueCallId": 1,
            "QueueName": "Sales",
            "ConversationStartedUtc": "2024-03-05T09:15:42",
            "AgentName": "Bo"
        }))
        .unwrap();
        assert_eq!(rec.caller_suffix, "");
    }

    #[test]
    fn test_numeric_caller_is_accepted() {
        let rec = Recording::from_json(json!({
            "QueueCallId": 2,
            "QueueName": "Sales",
            "ConversationStartedUtc": "2024-03-05T09:15:42",
            "AgentName": "Bo",
            "Caller": 4512345678u64
        }))
        .unwrap();
        assert_eq!(rec.caller_suffix, "5678");

        let rec = Recording::from_json(json!({
            "QueueCallId": 3,
            "QueueName": "Sales",
            "ConversationStartedUtc": "2024-03-05T09:15:42",
            "AgentName": "Bo",
            "Caller": null
        }))
        .unwrap();
        assert_eq!(rec.caller_suffix, "");
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let err = Recording::from_json(json!({"QueueName": "Sales"})).unwrap_err();
        assert!(matches!(err, SyncError::MalformedRecord(_)));

        let err = Recording::from_json(json!({
            "QueueCallId": 9,
            "QueueName": "Sales",
            "ConversationStartedUtc": "yesterday",
            "AgentName": "Bo"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("recording 9"));
    }

    #[test]
    fn test_derive_filename() {
        assert_eq!(
            sample().filename(),
            "OpkrævningenP-Gap_2024-03-05T09-15-42_AnnaJensen_4711.mp3"
        );
    }

    #[test]
    fn test_queue_label_keeps_non_numeric_prefix() {
        assert_eq!(queue_label("  Sales  "), "Sales");
        assert_eq!(queue_label("89404130 BS - Kørekort P-GAP"), "BS-KørekortP-GAP");
        assert_eq!(queue_label("1234 Short"), "1234Short");
    }

    #[test]
    fn test_extract_inverts_derive() {
        let mut rec = sample();
        for (id, agent) in [(1, "A_B"), (987654321, "x"), (42, "")] {
            rec.queue_call_id = id;
            rec.agent_name = agent.to_string();
            assert_eq!(extract_queue_call_id(&derive_filename(&rec)), Some(id));
        }
    }

    #[test]
    fn test_extract_rejects_foreign_names() {
        assert_eq!(extract_queue_call_id("notes.txt"), None);
        assert_eq!(extract_queue_call_id("no_id_here.mp3"), None);
        assert_eq!(extract_queue_call_id("123.mp3"), None);
    }
}
