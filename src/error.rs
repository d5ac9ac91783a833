//! Error types for the media downloader

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session file not found: {0}")]
    SessionNotFound(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("Unexpected Telegram response: {0}")]
    UnexpectedResponse(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Not a channel: {0}")]
    NotAChannel(String),

    #[error("Message {0} not found")]
    MessageNotFound(i32),

    #[error("Message {0} has no comments")]
    NoComments(i32),

    #[error("Message {0} has no downloadable media")]
    NoMedia(i32),

    #[error("Paid media in message {0} is not unlocked")]
    PaidMediaLocked(i32),

    #[error("Invalid message link '{link}': {reason}")]
    InvalidLink { link: String, reason: String },

    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Authorization required")]
    AuthorizationRequired,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_link(link: &str, reason: impl Into<String>) -> Self {
        Error::InvalidLink {
            link: link.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
