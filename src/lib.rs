// Library interface for the sync binary and integration tests

pub mod config;
pub mod constants;
pub mod credentials;
pub mod cursor;
pub mod error;
pub mod pipeline;
pub mod queries;
pub mod recording;
pub mod schema;
pub mod sink;
pub mod source;
pub mod work_queue;

pub use error::{Result, SyncError};
pub use pipeline::{run_sync, sync_recordings, PipelineOptions, RunReport};
