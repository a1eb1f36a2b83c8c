use std::io;
use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by panel operations
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection or timeout failure, after the transport's retries ran out
    #[error("request {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Panel answered with status >= 400
    #[error("request {url} failed: status {status}, body: {body}")]
    Remote { url: String, status: u16, body: String },

    /// Body is not valid JSON
    #[error("ret {body} from {url} invalid: {source}")]
    Decode {
        url: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// Well-formed JSON that is missing or mistypes an expected key
    #[error("parse response failed: {reason}, body: {body}")]
    Schema { reason: String, body: String },

    #[error("the number of node users is 0")]
    EmptyUserList,

    /// An operation was called before the state it depends on exists
    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    #[error("unsupported node type: {0}")]
    UnsupportedProtocol(String),

    #[error("invalid detect rule {pattern:?}: {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("error while reading rule list {}: {source}", .path.display())]
    RuleList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("request {url} cancelled")]
    Cancelled { url: String },

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Extractor failure, wrapped into [`ApiError::Schema`] together with the raw body
#[derive(Error, Debug)]
#[error("{0}")]
pub struct SchemaError(pub String);

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError(err.to_string())
    }
}

impl SchemaError {
    pub fn with_body(self, body: String) -> ApiError {
        ApiError::Schema {
            reason: self.0,
            body,
        }
    }
}
