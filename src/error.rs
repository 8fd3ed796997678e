//! Error types for each stage of the sampling pipeline.

/// A feed call that produced no usable data this cycle.
#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid feed URL: {0}")]
    Url(String),

    #[error("Feed returned status {0}: {1}")]
    Status(u16, String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Feed reported an error: {0}")]
    Reported(String),
}

impl From<quick_xml::Error> for FeedError {
    fn from(value: quick_xml::Error) -> Self {
        FeedError::Xml(value.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for FeedError {
    fn from(value: quick_xml::events::attributes::AttrError) -> Self {
        FeedError::Xml(value.to_string())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Decode error: {0} trailing bytes after record array")]
    Trailing(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("Object store error on {0}: {1}")]
    ObjectStore(String, String),

    #[error("Partition {0} is corrupt: {1}")]
    Corrupt(String, #[source] CodecError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Lookup document error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Partition {0} already exists")]
    AlreadyExists(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AuthError {
    #[error("no credentials supplied")]
    Missing,

    #[error("no authorization mechanism configured")]
    NotConfigured,

    #[error("invalid signature: {0}")]
    Signature(String),

    #[error("invalid bearer token")]
    Token,
}

pub type FeedResult<T> = Result<T, FeedError>;
pub type StoreResult<T> = Result<T, StoreError>;
