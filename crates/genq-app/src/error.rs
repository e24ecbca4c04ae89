use genq_core::GenerationType;
use thiserror::Error;

/// Terminal failure of a job. The `Display` text is what lands in `Job::error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("{0}")]
    Provider(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("generation timed out")]
    TimedOut,
    #[error("poller task ended unexpectedly: {0}")]
    Aborted(String),
}

impl JobError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("malformed provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<ProviderError> for JobError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Http { status, body } if body.trim().is_empty() => {
                JobError::Provider(format!("provider returned HTTP {status}"))
            }
            ProviderError::Http { body, .. } => JobError::Provider(body),
            ProviderError::Decode(msg) => JobError::Provider(format!("malformed provider response: {msg}")),
            ProviderError::Transport(msg) => JobError::Transport(msg),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("job {0} already exists")]
    DuplicateJob(String),
}

/// Why a panel refused or lost a submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a {0} generation is already running")]
    AlreadyActive(GenerationType),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Job(#[from] JobError),
}

impl SubmitError {
    /// Precondition failures are rejected before any job exists
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::AlreadyActive(_) | Self::MissingField(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}
