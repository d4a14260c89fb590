use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Subscription '{0}' not found")]
    SubscriptionNotFound(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("User '{0}' is not registered")]
    UnknownUser(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload(message.into())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
