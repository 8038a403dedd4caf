use thiserror::Error;

/// Convenience result type used across sitesmith.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for design analysis, response recovery and build runs.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input shape, rejected before any side effect.
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote API asked us to slow down.
    #[error("rate limited, retry after {retry_after_secs}s{}", tier_suffix(.plan_tier, .limit_type))]
    RateLimit {
        retry_after_secs: u64,
        plan_tier: Option<String>,
        limit_type: Option<String>,
    },

    /// Pre-flight gate failure; aborts the build before any phase runs.
    #[error("target not ready: {0}")]
    NotReady(String),

    /// A single build phase failed. Only surfaced through the build summary.
    #[error("phase {phase} failed: {message}")]
    Phase { phase: String, message: String },

    /// No structured response could be recovered from model text.
    #[error("no structured response found")]
    ParseFailure,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }
}

fn tier_suffix(plan_tier: &Option<String>, limit_type: &Option<String>) -> String {
    match (plan_tier, limit_type) {
        (Some(tier), Some(kind)) => format!(" (plan {}, {} limit)", tier, kind),
        (Some(tier), None) => format!(" (plan {})", tier),
        (None, Some(kind)) => format!(" ({} limit)", kind),
        (None, None) => String::new(),
    }
}
