//! Incremental transfer of call recordings into the case system.
//!
//! A run derives its cursor from the work queue, enumerates newer recordings
//! across the configured call queues, and moves each one through
//! PENDING -> IN_PROGRESS -> {DONE, FAILED} in ascending queue call id order.

use log::{error, info, warn};

use crate::config::{ResumePolicy, SyncConfig};
use crate::credentials::CredentialProvider;
use crate::cursor::{derive_resume_point, ResumePoint};
use crate::error::{Result, SyncError};
use crate::recording::Recording;
use crate::sink::{CaseSink, CaseSystemClient, DocumentUpload};
use crate::source::{CallQueue, CallSystemClient, RecordingSource};
use crate::work_queue::{acquire_run_lock, QueueStatus, SqliteWorkQueue, WorkQueue};

/// Run parameters taken from the configuration
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub target_queues: Vec<String>,
    pub queue_name: String,
    pub case_id: String,
    pub default_cursor: i64,
    pub resume_policy: ResumePolicy,
    pub max_failures: Option<u32>,
    pub fail_run_on_too_many_errors: bool,
}

impl From<&SyncConfig> for PipelineOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            target_queues: config.target_queues.clone(),
            queue_name: config.queue_name().to_string(),
            case_id: config.case_id.clone(),
            default_cursor: config.default_cursor(),
            resume_policy: config.resume_policy,
            max_failures: config.max_failures,
            fail_run_on_too_many_errors: config.fail_run_on_too_many_errors(),
        }
    }
}

/// Outcome of one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub cursor: i64,
    /// (configured name, source queue id)
    pub resolved_queues: Vec<(String, String)>,
    pub skipped_queues: Vec<String>,
    pub malformed: usize,
    /// Queue call ids marked DONE, in processing order
    pub uploaded: Vec<i64>,
    /// (queue call id, error message)
    pub failed: Vec<(i64, String)>,
    /// True when the failure budget stopped the run before the last item
    pub stopped_early: bool,
}

/// Recordings found above the cursor, in global processing order
#[derive(Debug, Default)]
pub struct Enumeration {
    pub recordings: Vec<Recording>,
    pub resolved_queues: Vec<(String, String)>,
    pub skipped_queues: Vec<String>,
    pub malformed: usize,
}

/// Match configured names against source queues by trimmed, exact name
pub fn resolve_queue_ids(
    targets: &[String],
    queues: &[CallQueue],
) -> (Vec<(String, String)>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut skipped = Vec::new();
    for target in targets {
        let wanted = target.trim();
        match queues.iter().find(|q| q.name.trim() == wanted) {
            Some(queue) => resolved.push((wanted.to_string(), queue.id.clone())),
            None => {
                warn!("[Sync] Queue '{}' not found on call system, skipping", wanted);
                skipped.push(wanted.to_string());
            }
        }
    }
    (resolved, skipped)
}

/// Collect recordings newer than `cursor` from every resolved queue,
/// sorted ascending by queue call id with duplicates removed.
pub fn enumerate_recordings<S: RecordingSource>(
    source: &S,
    targets: &[String],
    cursor: i64,
) -> Result<Enumeration> {
    let queues = source.list_queues()?;
    let (resolved_queues, skipped_queues) = resolve_queue_ids(targets, &queues);

    let mut recordings = Vec::new();
    let mut malformed = 0;
    for (name, queue_id) in &resolved_queues {
        let listing = source.list_recordings(queue_id, cursor)?;
        info!(
            "[Sync] Queue '{}' ({}): {} new recording(s)",
            name,
            queue_id,
            listing.recordings.len()
        );
        malformed += listing.malformed.len();
        recordings.extend(listing.recordings);
    }

    recordings.retain(|r| r.queue_call_id > cursor);
    recordings.sort_by_key(|r| r.queue_call_id);
    recordings.dedup_by_key(|r| r.queue_call_id);

    Ok(Enumeration {
        recordings,
        resolved_queues,
        skipped_queues,
        malformed,
    })
}

/// Snapshot the work queue and compute where this run starts
pub fn resume_point<Q: WorkQueue>(queue: &Q, options: &PipelineOptions) -> Result<ResumePoint> {
    let mut entries = queue.get_entries(&options.queue_name, QueueStatus::Done)?;
    if options.resume_policy == ResumePolicy::RetryFailed {
        for status in [
            QueueStatus::Failed,
            QueueStatus::InProgress,
            QueueStatus::Pending,
        ] {
            entries.extend(queue.get_entries(&options.queue_name, status)?);
        }
    }
    Ok(derive_resume_point(
        &entries,
        options.default_cursor,
        options.resume_policy,
    ))
}

enum ItemOutcome {
    Done,
    Failed(String),
}

/// Move one recording through the entry lifecycle. Per-item transfer errors
/// are recorded on the entry; work queue errors abort the run.
fn transfer_recording<S, C, Q>(
    source: &S,
    sink: &C,
    queue: &Q,
    options: &PipelineOptions,
    recording: &Recording,
) -> Result<ItemOutcome>
where
    S: RecordingSource,
    C: CaseSink,
    Q: WorkQueue,
{
    let id = recording.queue_call_id;
    let filename = recording.filename();

    let entry_id = queue.create_entry(&options.queue_name, &id.to_string(), &filename)?;
    queue.set_status(entry_id, QueueStatus::InProgress)?;

    let transfer = source.fetch_audio(id).and_then(|bytes| {
        sink.upload_document(&DocumentUpload {
            case_id: &options.case_id,
            bytes: &bytes,
            filename: &filename,
            folder_hint: &recording.agent_name,
            document_date: recording.started_at,
        })
    });

    match transfer {
        Ok(receipt) => {
            queue.set_status(entry_id, QueueStatus::Done)?;
            info!(
                "[{}] ✓ Uploaded {}{}",
                id,
                filename,
                receipt
                    .document_id
                    .map(|d| format!(" (document {})", d))
                    .unwrap_or_default()
            );
            Ok(ItemOutcome::Done)
        }
        Err(e) if !e.is_fatal() => {
            error!("[{}] Failed to transfer {}: {}", id, filename, e);
            let message = e.to_string();
            queue.set_failed(entry_id, &message)?;
            Ok(ItemOutcome::Failed(message))
        }
        Err(e) => Err(e),
    }
}

/// One sync run against already-established collaborators
pub fn run_sync<S, C, Q>(
    source: &S,
    sink: &C,
    queue: &Q,
    options: &PipelineOptions,
) -> Result<RunReport>
where
    S: RecordingSource,
    C: CaseSink,
    Q: WorkQueue,
{
    let resume = resume_point(queue, options)?;
    info!(
        "[Sync] Resuming after queue call id {} ({} completed)",
        resume.cursor,
        resume.done_ids.len()
    );

    let enumeration = enumerate_recordings(source, &options.target_queues, resume.cursor)?;
    let mut report = RunReport {
        cursor: resume.cursor,
        resolved_queues: enumeration.resolved_queues,
        skipped_queues: enumeration.skipped_queues,
        malformed: enumeration.malformed,
        ..Default::default()
    };

    let pending: Vec<&Recording> = enumeration
        .recordings
        .iter()
        .filter(|r| !resume.is_done(r.queue_call_id))
        .collect();
    info!("[Sync] {} recording(s) to transfer", pending.len());

    for (idx, recording) in pending.iter().enumerate() {
        match transfer_recording(source, sink, queue, options, recording)? {
            ItemOutcome::Done => report.uploaded.push(recording.queue_call_id),
            ItemOutcome::Failed(message) => {
                report.failed.push((recording.queue_call_id, message));
                let failed = report.failed.len() as u32;
                if let Some(limit) = options.max_failures {
                    if failed >= limit {
                        let remaining = pending.len() - idx - 1;
                        warn!(
                            "[Sync] {} failure(s) reached the limit of {}, leaving {} recording(s) for the next run",
                            failed, limit, remaining
                        );
                        report.stopped_early = remaining > 0;
                        log_summary(&report);
                        if options.fail_run_on_too_many_errors {
                            return Err(SyncError::TooManyFailures { failed, limit });
                        }
                        break;
                    }
                }
            }
        }
    }

    log_summary(&report);
    Ok(report)
}

fn log_summary(report: &RunReport) {
    info!(
        "[Sync] Run finished: {} uploaded, {} failed, {} malformed, {} queue(s) skipped",
        report.uploaded.len(),
        report.failed.len(),
        report.malformed,
        report.skipped_queues.len()
    );
    for (id, message) in &report.failed {
        warn!("[Sync]   failed {}: {}", id, message);
    }
}

/// Full run from configuration: credentials, sessions, lock, work queue.
/// Setup failures are returned before any entry is written.
pub fn sync_recordings<P: CredentialProvider>(
    config: &SyncConfig,
    credentials: &P,
) -> Result<RunReport> {
    let shared_key = credentials.get_credential(&config.call_system.credential_profile)?;
    let login = credentials.get_credential(&config.case_system.credential_profile)?;

    let _lock = acquire_run_lock(&config.work_queue.database_path)?;
    let queue = SqliteWorkQueue::open(&config.work_queue.database_path)?;

    let source = CallSystemClient::new(
        &config.call_system.base_url,
        &shared_key.password,
        config.call_system_timeout(),
    )?;
    let sink = CaseSystemClient::create_session(
        &config.case_system.base_url,
        &login.username,
        &login.password,
        config.case_system_timeout(),
    )?;

    info!(
        "[Sync] Starting run for {} target queue(s) into case {}",
        config.target_queues.len(),
        config.case_id
    );
    run_sync(&source, &sink, &queue, &PipelineOptions::from(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(id: &str, name: &str) -> CallQueue {
        CallQueue {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_resolve_trims_configured_names() {
        let queues = vec![queue("7", "Sales"), queue("8", "Support")];
        let (resolved, skipped) = resolve_queue_ids(&["  Sales  ".to_string()], &queues);
        assert_eq!(resolved, vec![("Sales".to_string(), "7".to_string())]);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_resolve_skips_unknown_and_partial_matches() {
        let queues = vec![queue("7", "Sales Denmark")];
        let (resolved, skipped) =
            resolve_queue_ids(&["Sales".to_string(), "Billing".to_string()], &queues);
        assert!(resolved.is_empty());
        assert_eq!(skipped, vec!["Sales", "Billing"]);
    }
}
