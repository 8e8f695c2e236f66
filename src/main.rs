use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use recording_sync::config::SyncConfig;
use recording_sync::credentials::{CredentialProvider, FileCredentialProvider};
use recording_sync::cursor::entry_queue_call_id;
use recording_sync::pipeline::{resume_point, sync_recordings, PipelineOptions};
use recording_sync::sink::CaseSystemClient;
use recording_sync::work_queue::{QueueStatus, SqliteWorkQueue, WorkQueue};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Transfer new call recordings into the case system, resuming where the last run stopped"
)]
struct Args {
    /// Path to config file (TOML format)
    #[arg(short, long, global = true, default_value = "recording_sync.toml")]
    config: PathBuf,

    /// Credentials file (default: ~/.config/recording_sync/credentials.toml)
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one incremental sync
    Sync {
        /// JSON blob overriding target queues, e.g. '{"target_queues":["89402000 Sales"]}'
        #[arg(long)]
        process_arguments: Option<String>,
    },
    /// Show the cursor the next run would start from
    Cursor,
    /// List work queue entries
    Entries {
        /// Only entries with this status (pending, in_progress, done, failed)
        #[arg(short, long)]
        status: Option<QueueStatus>,
    },
    /// Case maintenance
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },
    /// Document maintenance
    Document {
        #[command(subcommand)]
        action: DocumentAction,
    },
    /// Write a message to the case system log
    Log { message: String },
}

#[derive(Subcommand, Debug)]
enum CaseAction {
    /// Create a case and print its id
    Create {
        #[arg(long)]
        title: String,
    },
    /// Close a case
    Close { case_id: String },
}

#[derive(Subcommand, Debug)]
enum DocumentAction {
    /// Finalize (journalize) a document
    Finalize { document_id: i64 },
    /// Undo finalization for one or more documents
    Unfinalize {
        #[arg(required = true)]
        document_ids: Vec<i64>,
    },
    /// Delete a document
    Delete { document_id: i64 },
}

fn load_credentials(path: Option<&Path>) -> recording_sync::Result<FileCredentialProvider> {
    match path {
        Some(path) => FileCredentialProvider::load(path),
        None => FileCredentialProvider::load_default(),
    }
}

fn open_case_session(
    config: &SyncConfig,
    credentials: &FileCredentialProvider,
) -> recording_sync::Result<CaseSystemClient> {
    let login = credentials.get_credential(&config.case_system.credential_profile)?;
    CaseSystemClient::create_session(
        &config.case_system.base_url,
        &login.username,
        &login.password,
        config.case_system_timeout(),
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = SyncConfig::load(&args.config)?;
    let credentials = || load_credentials(args.credentials.as_deref());

    match args.command {
        Command::Sync { process_arguments } => {
            if let Some(blob) = process_arguments {
                config.apply_process_arguments(&blob)?;
            }
            let report = sync_recordings(&config, &credentials()?)?;
            println!(
                "Uploaded {} recording(s), {} failed (cursor was {})",
                report.uploaded.len(),
                report.failed.len(),
                report.cursor
            );
        }
        Command::Cursor => {
            let queue = SqliteWorkQueue::open(&config.work_queue.database_path)?;
            let point = resume_point(&queue, &PipelineOptions::from(&config))?;
            println!("{}", point.cursor);
        }
        Command::Entries { status } => {
            let queue = SqliteWorkQueue::open(&config.work_queue.database_path)?;
            let entries = match status {
                Some(status) => queue.get_entries(config.queue_name(), status)?,
                None => queue.all_entries(config.queue_name())?,
            };
            for entry in entries {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.id,
                    entry.status,
                    entry_queue_call_id(&entry)
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "?".to_string()),
                    entry.data,
                    entry.message.unwrap_or_default()
                );
            }
        }
        Command::Case { action } => {
            let session = open_case_session(&config, &credentials()?)?;
            match action {
                CaseAction::Create { title } => {
                    let case_id = session.create_case(&title)?;
                    info!("Created case {}", case_id);
                    println!("{}", case_id);
                }
                CaseAction::Close { case_id } => {
                    session.close_case(&case_id)?;
                    info!("Closed case {}", case_id);
                }
            }
        }
        Command::Document { action } => {
            let session = open_case_session(&config, &credentials()?)?;
            match action {
                DocumentAction::Finalize { document_id } => {
                    session.finalize_document(document_id)?
                }
                DocumentAction::Unfinalize { document_ids } => {
                    session.unfinalize_documents(&document_ids)?
                }
                DocumentAction::Delete { document_id } => session.delete_document(document_id)?,
            }
        }
        Command::Log { message } => {
            let session = open_case_session(&config, &credentials()?)?;
            session.log_message(&message)?;
        }
    }

    Ok(())
}
