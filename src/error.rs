use thiserror::Error;

/// Longest slice of an upstream body that is ever logged or echoed back.
pub const MAX_UPSTREAM_SNIPPET: usize = 300;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("URL is not allowed: {reason}")]
    UnsafeUrl { reason: String },

    #[error("Unsupported URL. Supported sources: {supported}")]
    UnsupportedPlatform { supported: String },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Scraping timed out after {timeout_secs}s, please try again later")]
    BrokerTimeout { timeout_secs: u64 },

    #[error("Scraper quota exhausted: {message}")]
    BrokerQuotaExhausted { message: String },

    #[error("Scraper likely blocked or rate-limited (received {content_type} instead of JSON)")]
    BrokerBlockedOrRateLimited { content_type: String },

    #[error("Scraper request failed{}: {message}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    BrokerGenericFailure { status: Option<u16>, message: String },

    #[error("Fetching the event page timed out after {timeout_secs}s")]
    PageFetchTimeout { timeout_secs: u64 },

    #[error("Fetching the event page failed{}: {message}", .status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    PageFetchFailed { status: Option<u16>, message: String },

    #[error("No event data found at {url}")]
    NoDataFound { url: String },

    #[error("Event data rejected: {reason}")]
    NormalizationRejected { reason: String },

    #[error("Event already imported: {source_url}")]
    DuplicateSource { source_url: String },

    #[error("Failed to save event: {message}")]
    PersistenceFailure { message: String },

    #[error("Import cancelled before completion")]
    Cancelled,
}

impl ImportError {
    /// HTTP status the web layer answers with for this error class.
    pub fn status_code(&self) -> u16 {
        match self {
            ImportError::UnsafeUrl { .. } | ImportError::UnsupportedPlatform { .. } => 400,
            ImportError::Unauthenticated => 401,
            ImportError::NoDataFound { .. } | ImportError::NormalizationRejected { .. } => 404,
            ImportError::DuplicateSource { .. } => 409,
            ImportError::BrokerQuotaExhausted { .. }
            | ImportError::BrokerBlockedOrRateLimited { .. }
            | ImportError::BrokerGenericFailure { .. }
            | ImportError::PageFetchFailed { .. } => 502,
            ImportError::BrokerTimeout { .. } | ImportError::PageFetchTimeout { .. } => 504,
            ImportError::PersistenceFailure { .. } | ImportError::Cancelled => 500,
        }
    }

    /// Stable machine-readable code, used in logs and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::UnsafeUrl { .. } => "unsafe_url",
            ImportError::UnsupportedPlatform { .. } => "unsupported_platform",
            ImportError::Unauthenticated => "unauthenticated",
            ImportError::BrokerTimeout { .. } => "broker_timeout",
            ImportError::BrokerQuotaExhausted { .. } => "broker_quota_exhausted",
            ImportError::BrokerBlockedOrRateLimited { .. } => "broker_blocked",
            ImportError::BrokerGenericFailure { .. } => "broker_failure",
            ImportError::PageFetchTimeout { .. } => "page_fetch_timeout",
            ImportError::PageFetchFailed { .. } => "page_fetch_failed",
            ImportError::NoDataFound { .. } => "no_data_found",
            ImportError::NormalizationRejected { .. } => "normalization_rejected",
            ImportError::DuplicateSource { .. } => "duplicate_source",
            ImportError::PersistenceFailure { .. } => "persistence_failure",
            ImportError::Cancelled => "cancelled",
        }
    }
}

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;

/// Cuts an upstream body down to a loggable snippet on a char boundary.
pub fn truncate_for_log(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
