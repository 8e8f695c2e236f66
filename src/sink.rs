use base64::Engine;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::constants::{CASE_TYPE_PREFIX, DOCUMENT_LIST_NAME};
use crate::error::{Result, SyncError};

/// One document to attach to a case
#[derive(Debug, Clone)]
pub struct DocumentUpload<'a> {
    pub case_id: &'a str,
    pub bytes: &'a [u8],
    pub filename: &'a str,
    /// Subfolder inside the case, normally the agent name
    pub folder_hint: &'a str,
    /// Stored as the document date metadata field
    pub document_date: DateTime<Utc>,
}

/// Case system answer to a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadReceipt {
    pub document_id: Option<i64>,
}

/// Write side of the case system
pub trait CaseSink {
    fn upload_document(&self, upload: &DocumentUpload<'_>) -> Result<UploadReceipt>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AddToCaseRequest<'a> {
    bytes: String,
    case_id: &'a str,
    site_url: String,
    list_name: &'a str,
    folder_path: &'a str,
    file_name: &'a str,
    metadata: String,
    overwrite: bool,
}

/// Authenticated case system session over a reused blocking client
pub struct CaseSystemClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl CaseSystemClient {
    /// Log in and keep the session for the rest of the run
    pub fn create_session(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Session(format!("Failed to build case system client: {}", e)))?;
        let session = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = session
            .authenticated(session.client.post(&session.base_url))
            .send()
            .map_err(|e| SyncError::Session(format!("Case system login failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(SyncError::Session(format!(
                "Case system login rejected with status {}",
                response.status()
            )));
        }
        debug!("[Case] Session established for {}", session.username);
        Ok(session)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }

    fn post_json<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<String> {
        let url = format!("{}/_goapi/{}", self.base_url, endpoint);
        let response = self
            .authenticated(self.client.post(&url))
            .json(body)
            .send()
            .map_err(|e| SyncError::Transfer(format!("Request to {} failed: {}", endpoint, e)))?;
        read_success(endpoint, response)
    }

    /// Create a case and return its case id
    pub fn create_case(&self, title: &str) -> Result<String> {
        let body = json!({
            "CaseTypePrefix": CASE_TYPE_PREFIX,
            "MetadataXml": format!(
                "<z:row xmlns:z=\"#RowsetSchema\" ows_Title=\"{}\" ows_CaseStatus=\"Åben\"/>",
                xml_escape(title)
            ),
            "ReturnWhenCaseFullyCreated": false,
        });
        let text = self.post_json("Cases/", &body)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        value
            .get("CaseID")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| SyncError::MalformedRecord(format!("No CaseID in response: {}", text)))
    }

    pub fn close_case(&self, case_id: &str) -> Result<()> {
        self.post_json("Cases/CloseCase", &json!({ "CaseId": case_id }))?;
        Ok(())
    }

    /// Mark a document as finalized (journalized)
    pub fn finalize_document(&self, document_id: i64) -> Result<()> {
        self.post_json("Documents/Finalize/ByDocumentId", &json!({ "DocID": document_id }))?;
        Ok(())
    }

    pub fn unfinalize_documents(&self, document_ids: &[i64]) -> Result<()> {
        self.post_json(
            "Documents/UnmarkFinalizedByDocumentId",
            &json!({ "DocIDs": document_ids, "OnlyUnfinalize": true }),
        )?;
        Ok(())
    }

    pub fn delete_document(&self, document_id: i64) -> Result<()> {
        let url = format!("{}/_goapi/Documents/ByDocumentId", self.base_url);
        let response = self
            .authenticated(self.client.delete(&url))
            .json(&json!({ "DocId": document_id }))
            .send()
            .map_err(|e| SyncError::Transfer(format!("Delete of document {} failed: {}", document_id, e)))?;
        read_success("Documents/ByDocumentId", response)?;
        Ok(())
    }

    /// Write a line to the case system's administration log
    pub fn log_message(&self, message: &str) -> Result<()> {
        self.post_json(
            "administration/Log",
            &json!({
                "FullClassName": env!("CARGO_PKG_NAME"),
                "FunctionName": "log_message",
                "OperationName": "sync",
                "Message": message,
                "LogLevel": "1",
            }),
        )?;
        Ok(())
    }
}

impl CaseSink for CaseSystemClient {
    fn upload_document(&self, upload: &DocumentUpload<'_>) -> Result<UploadReceipt> {
        let request = AddToCaseRequest {
            bytes: base64::engine::general_purpose::STANDARD.encode(upload.bytes),
            case_id: upload.case_id,
            site_url: format!(
                "{}/cases/{}/{}",
                self.base_url, CASE_TYPE_PREFIX, upload.case_id
            ),
            list_name: DOCUMENT_LIST_NAME,
            folder_path: upload.folder_hint,
            file_name: upload.filename,
            metadata: document_metadata(upload.document_date),
            overwrite: false,
        };
        let text = self.post_json("Documents/AddToCase", &request)?;
        Ok(parse_receipt(&text))
    }
}

fn read_success(endpoint: &str, response: Response) -> Result<String> {
    let status = response.status();
    let text = response.text().map_err(|e| {
        SyncError::Transfer(format!("Failed to read {} response body: {}", endpoint, e))
    })?;
    if !status.is_success() {
        return Err(SyncError::Transfer(format!(
            "{} returned status {}: {}",
            endpoint, status, text
        )));
    }
    Ok(text)
}

/// Document id from an AddToCase answer; absent when the body is not JSON
fn parse_receipt(text: &str) -> UploadReceipt {
    let document_id = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("DocId").and_then(|id| id.as_i64()));
    UploadReceipt { document_id }
}

/// Row XML carrying the conversation date as the document date
pub fn document_metadata(date: DateTime<Utc>) -> String {
    format!(
        "<z:row xmlns:z=\"#RowsetSchema\" ows_Dokumentdato=\"{}\" />",
        date.format("%d-%m-%Y %H:%M:%S")
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
