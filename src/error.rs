use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Failed to fetch {url}: {message}")]
    #[diagnostic(
        code(cruisecal::fetch),
        help("The schedule page could not be retrieved; the previous calendar was left untouched")
    )]
    Fetch { url: String, message: String },

    #[error("Schedule parse error: {0}")]
    #[diagnostic(
        code(cruisecal::parse),
        help("The page structure probably changed; no events could be extracted")
    )]
    Parse(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(cruisecal::environment))]
    Environment(String),

    #[error("Calendar generation error: {0}")]
    #[diagnostic(code(cruisecal::calendar))]
    Calendar(String),

    #[error("Notification error: {0}")]
    #[diagnostic(code(cruisecal::notify))]
    Notify(String),

    #[error("State lock error: {0}")]
    #[diagnostic(
        code(cruisecal::lock),
        help("Another run is probably still in progress")
    )]
    Lock(String),

    #[error(transparent)]
    #[diagnostic(code(cruisecal::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(cruisecal::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(cruisecal::other))]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type SyncResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str, problem: &str) -> Error {
    Error::Environment(format!("{}: {}", var, problem))
}

/// Helper to create fetch errors
pub fn fetch_error(url: &str, message: impl Into<String>) -> Error {
    Error::Fetch {
        url: url.to_string(),
        message: message.into(),
    }
}

/// Helper to create parse errors
pub fn parse_error(message: &str) -> Error {
    Error::Parse(message.to_string())
}

/// Helper to create notification errors
pub fn notify_error(message: impl Into<String>) -> Error {
    Error::Notify(message.into())
}
