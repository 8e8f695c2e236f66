use log::warn;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::constants::SHARED_SECRET_HEADER;
use crate::error::{Result, SyncError};
use crate::recording::Recording;

/// Call system queue as listed by the API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallQueue {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
}

/// Queue ids arrive as numbers or strings depending on the API version
fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected queue id {}",
            other
        ))),
    }
}

/// A listing where malformed elements have been separated out
#[derive(Debug, Default)]
pub struct RecordingListing {
    pub recordings: Vec<Recording>,
    /// Elements that could not be turned into a [`Recording`]
    pub malformed: Vec<SyncError>,
}

/// Read side of the call system
pub trait RecordingSource {
    fn list_queues(&self) -> Result<Vec<CallQueue>>;

    /// Recordings of one queue with a queue call id above `since_id`
    fn list_recordings(&self, queue_id: &str, since_id: i64) -> Result<RecordingListing>;

    fn fetch_audio(&self, queue_call_id: i64) -> Result<Vec<u8>>;
}

/// Blocking HTTP client for the call system, authenticated by shared secret
pub struct CallSystemClient {
    client: Client,
    base_url: String,
    secret: String,
}

impl CallSystemClient {
    pub fn new(base_url: &str, secret: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Session(format!("Failed to build call system client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        })
    }

    fn get(&self, endpoint: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .get(format!("{}/{}", self.base_url, endpoint))
            .header(SHARED_SECRET_HEADER, &self.secret)
    }
}

impl RecordingSource for CallSystemClient {
    fn list_queues(&self) -> Result<Vec<CallQueue>> {
        let queues: Vec<CallQueue> = self
            .get("queues")
            .send()
            .map_err(|e| SyncError::Transfer(format!("Failed to fetch queue list: {}", e)))?
            .error_for_status()
            .map_err(|e| SyncError::Transfer(format!("Queue list request failed: {}", e)))?
            .json()
            .map_err(|e| SyncError::Transfer(format!("Failed to parse queue list: {}", e)))?;
        Ok(queues)
    }

    fn list_recordings(&self, queue_id: &str, since_id: i64) -> Result<RecordingListing> {
        let endpoint = format!(
            "queues/{}/calls/recordings",
            urlencoding::encode(queue_id)
        );
        let response = self
            .get(&endpoint)
            .query(&[("fromQueueCallId", since_id)])
            .send()
            .map_err(|e| {
                SyncError::Transfer(format!(
                    "Failed to fetch recordings for queue {}: {}",
                    queue_id, e
                ))
            })?
            .error_for_status()
            .map_err(|e| {
                SyncError::Transfer(format!("Recordings request for queue {} failed: {}", queue_id, e))
            })?;

        // The API answers an empty body or null when a queue has no new calls
        let body = response.text()?;
        if body.trim().is_empty() {
            return Ok(RecordingListing::default());
        }
        let items: Option<Vec<serde_json::Value>> = serde_json::from_str(&body).map_err(|e| {
            SyncError::Transfer(format!(
                "Failed to parse recordings for queue {}: {}",
                queue_id, e
            ))
        })?;

        let mut listing = RecordingListing::default();
        for item in items.unwrap_or_default() {
            match Recording::from_json(item) {
                Ok(recording) => listing.recordings.push(recording),
                Err(e) => {
                    warn!("[Source] Queue {}: skipping recording: {}", queue_id, e);
                    listing.malformed.push(e);
                }
            }
        }
        Ok(listing)
    }

    fn fetch_audio(&self, queue_call_id: i64) -> Result<Vec<u8>> {
        let bytes = self
            .get(&format!("queues/calls/recordings/{}", queue_call_id))
            .send()
            .map_err(|e| {
                SyncError::Transfer(format!(
                    "Failed to download recording {}: {}",
                    queue_call_id, e
                ))
            })?
            .error_for_status()
            .map_err(|e| {
                SyncError::Transfer(format!("Download of recording {} failed: {}", queue_call_id, e))
            })?
            .bytes()?;
        if bytes.is_empty() {
            return Err(SyncError::Transfer(format!(
                "Recording {} downloaded with an empty body",
                queue_call_id
            )));
        }
        Ok(bytes.to_vec())
    }
}
