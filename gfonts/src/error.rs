use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong between the catalog and the merged font
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure or non-success HTTP status
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The catalog response did not match the expected envelope
    #[error("unexpected catalog format: {message}")]
    Format {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The stylesheet could not be read
    #[error("failed to parse CSS at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// Subsets are corrupt, unsupported, or cannot be combined
    #[error("failed to merge fonts: {0}")]
    Merge(String),

    /// Invalid caller input
    #[error("invalid value: {0}")]
    Value(String),

    /// A background task panicked or was cancelled before reporting
    #[error("task aborted: {0}")]
    Aborted(String),
}

impl Error {
    pub(crate) fn network(message: impl Into<String>, source: reqwest::Error) -> Self {
        Error::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    pub(crate) fn status(url: &str, status: reqwest::StatusCode) -> Self {
        Error::Network {
            message: format!("GET {url} returned {status}"),
            source: None,
        }
    }

    pub(crate) fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            column,
            message: message.into(),
        }
    }
}
