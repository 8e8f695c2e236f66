use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_CALL_SYSTEM_TIMEOUT_SECS, DEFAULT_CASE_SYSTEM_TIMEOUT_SECS, DEFAULT_QUEUE_NAME,
};
use crate::error::{Result, SyncError};

/// How the resume cursor treats items that failed in earlier runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Resume after the highest DONE id; earlier failures below it are not retried
    #[default]
    MaxDone,
    /// Resume just below the lowest unresolved id so failed items are retried
    RetryFailed,
}

/// Call system (recording source) connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct CallSystemConfig {
    /// Base URL including the customer path, e.g. https://webrequest.example.online/mot/12986
    pub base_url: String,
    /// Credential profile holding the shared secret
    pub credential_profile: String,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: Option<u64>,
}

/// Case system (document sink) connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct CaseSystemConfig {
    /// Base URL of the case system API
    pub base_url: String,
    /// Credential profile holding username and password
    pub credential_profile: String,
    /// Request timeout in seconds (default: 600)
    pub timeout_secs: Option<u64>,
}

/// Work queue storage settings
#[derive(Debug, Clone, Deserialize)]
pub struct WorkQueueConfig {
    /// SQLite database file holding queue entries
    pub database_path: PathBuf,
}

/// Sync configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Call system queue names to pull recordings from
    pub target_queues: Vec<String>,
    /// Case that uploaded recordings are attached to
    pub case_id: String,
    /// Work queue name (default: "Miralix Nedhentning")
    pub queue_name: Option<String>,
    /// Cursor used when no entry has been completed yet (default: 0)
    pub default_cursor: Option<i64>,
    /// Resume policy (default: max_done)
    #[serde(default)]
    pub resume_policy: ResumePolicy,
    /// Number of failed items after which the run stops (default: unlimited)
    pub max_failures: Option<u32>,
    /// Whether exhausting max_failures fails the run (default: true)
    pub fail_run_on_too_many_errors: Option<bool>,
    pub call_system: CallSystemConfig,
    pub case_system: CaseSystemConfig,
    pub work_queue: WorkQueueConfig,
}

/// Process arguments blob accepted on the command line
#[derive(Debug, Deserialize)]
pub struct ProcessArguments {
    pub target_queues: Vec<String>,
}

impl SyncConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: SyncConfig = toml::from_str(&content)?;
        config.validate().map_err(SyncError::Config)?;
        Ok(config)
    }

    /// Replace target queues with the ones given in a JSON process-arguments blob
    pub fn apply_process_arguments(&mut self, blob: &str) -> Result<()> {
        let args: ProcessArguments = serde_json::from_str(blob)
            .map_err(|e| SyncError::Config(format!("Invalid process arguments: {}", e)))?;
        self.target_queues = args.target_queues;
        self.validate().map_err(SyncError::Config)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.target_queues.iter().all(|q| q.trim().is_empty()) {
            return Err("target_queues must contain at least one queue name".to_string());
        }
        if self.case_id.trim().is_empty() {
            return Err("case_id must not be empty".to_string());
        }
        for (section, base_url) in [
            ("call_system", &self.call_system.base_url),
            ("case_system", &self.case_system.base_url),
        ] {
            url::Url::parse(base_url)
                .map_err(|e| format!("[{}] base_url '{}' is invalid: {}", section, base_url, e))?;
        }
        if self.call_system.timeout_secs == Some(0) || self.case_system.timeout_secs == Some(0) {
            return Err("timeout_secs must be greater than zero".to_string());
        }
        if self.max_failures == Some(0) {
            return Err("max_failures must be greater than zero when set".to_string());
        }
        Ok(())
    }

    pub fn queue_name(&self) -> &str {
        self.queue_name.as_deref().unwrap_or(DEFAULT_QUEUE_NAME)
    }

    pub fn default_cursor(&self) -> i64 {
        self.default_cursor.unwrap_or(0)
    }

    pub fn fail_run_on_too_many_errors(&self) -> bool {
        self.fail_run_on_too_many_errors.unwrap_or(true)
    }

    pub fn call_system_timeout(&self) -> Duration {
        Duration::from_secs(
            self.call_system
                .timeout_secs
                .unwrap_or(DEFAULT_CALL_SYSTEM_TIMEOUT_SECS),
        )
    }

    pub fn case_system_timeout(&self) -> Duration {
        Duration::from_secs(
            self.case_system
                .timeout_secs
                .unwrap_or(DEFAULT_CASE_SYSTEM_TIMEOUT_SECS),
        )
    }
}
