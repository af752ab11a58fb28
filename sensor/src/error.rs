use plexrec_core::ApiError;

/// Errors that block setting up the integration.
///
/// Once setup succeeds nothing is raised to the host any more: list fetch
/// failures become entity attributes and roster poll failures are logged
/// and retried on the next tick.
#[derive(thiserror::Error, Debug)]
pub enum SetupError {
    #[error("Cannot connect to API: {0}")]
    CannotConnect(String),

    #[error("Invalid API key")]
    InvalidAuth,

    #[error("Unexpected response from API: {0}")]
    Unknown(String),

    /// The first roster poll failed; the host should retry setup later.
    #[error("API not ready: {0}")]
    NotReady(#[source] ApiError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SetupError {
    /// Short code shown next to the setup form field.
    pub fn code(&self) -> &'static str {
        match self {
            SetupError::CannotConnect(_) | SetupError::NotReady(_) => "cannot_connect",
            SetupError::InvalidAuth => "invalid_auth",
            SetupError::Config(_) => "invalid_config",
            SetupError::Unknown(_) => "unknown",
        }
    }
}

impl From<ApiError> for SetupError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidAuth => SetupError::InvalidAuth,
            ApiError::CannotConnect(msg) => SetupError::CannotConnect(msg),
            ApiError::NotFound | ApiError::Upstream { .. } => SetupError::CannotConnect(err.to_string()),
            ApiError::MalformedResponse(msg) => SetupError::Unknown(msg),
        }
    }
}
