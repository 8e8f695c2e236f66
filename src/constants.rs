/// Default work queue name for recording transfers
pub const DEFAULT_QUEUE_NAME: &str = "Miralix Nedhentning";

/// Default timeout for call system requests (metadata and audio download)
pub const DEFAULT_CALL_SYSTEM_TIMEOUT_SECS: u64 = 60;

/// Default timeout for case system requests (audio uploads are large)
pub const DEFAULT_CASE_SYSTEM_TIMEOUT_SECS: u64 = 600;

/// Header carrying the call system shared secret
pub const SHARED_SECRET_HEADER: &str = "X-Miralix-Shared-Secret";

/// Extension of uploaded recordings
pub const AUDIO_EXTENSION: &str = "mp3";

/// Length of the numeric line prefix on call system queue names ("89403330 Sales")
pub const QUEUE_PREFIX_LEN: usize = 8;

/// Number of trailing caller characters kept downstream
pub const CALLER_SUFFIX_LEN: usize = 4;

/// Case type prefix used in case system site URLs
pub const CASE_TYPE_PREFIX: &str = "EMN";

/// Document library that uploads land in
pub const DOCUMENT_LIST_NAME: &str = "Dokumenter";

/// Credentials file location relative to $HOME
pub const CREDENTIALS_DIR: &str = ".config/recording_sync";
