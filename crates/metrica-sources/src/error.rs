//! Error types for source adapters.

/// Errors raised while pulling one metric from an upstream system.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SourceError {
    /// Connection, DNS, TLS or timeout failure
    #[error("{service}: network error: {message}")]
    Network {
        /// Upstream system name
        service: &'static str,
        /// Transport error message
        message: String,
    },

    /// Upstream answered with a non-2xx status
    #[error("{service}: HTTP {status}: {body}")]
    Api {
        /// Upstream system name
        service: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Response body did not have the expected shape
    #[error("{service}: malformed response: {message}")]
    Parse {
        /// Upstream system name
        service: &'static str,
        /// What could not be parsed
        message: String,
    },

    /// Upstream kept returning continuation cursors
    #[error("{service}: gave up after {pages} pages without reaching the end")]
    PaginationLimit {
        /// Upstream system name
        service: &'static str,
        /// Pages fetched before giving up
        pages: usize,
    },

    /// Required credentials are not set
    #[error("missing required credentials: {}", names.join(", "))]
    MissingCredentials {
        /// Names of every missing variable
        names: Vec<String>,
    },

    /// A configured base URL could not be parsed
    #[error("invalid URL {url:?}: {message}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Parser message
        message: String,
    },

    /// Error from metrica-core (configuration, validation)
    #[error(transparent)]
    Core(#[from] metrica_core::Error),
}

/// Convenience `Result` type alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Longest response body kept in an [`SourceError::Api`] message.
const MAX_ERROR_BODY: usize = 512;

impl SourceError {
    /// Returns whether retrying the same request may succeed.
    ///
    /// Network failures, rate limiting (429) and server errors (5xx) are
    /// transient; everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Network { .. } => true,
            SourceError::Api { status, .. } => *status == 429 || *status >= 500,
            SourceError::Parse { .. } => false,
            SourceError::PaginationLimit { .. } => false,
            SourceError::MissingCredentials { .. } => false,
            SourceError::InvalidUrl { .. } => false,
            SourceError::Core(_) => false,
        }
    }

    /// Creates an API error, truncating the body.
    pub fn api(service: &'static str, status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push('…');
        }
        SourceError::Api {
            service,
            status,
            body,
        }
    }

    /// Creates a parse error.
    pub fn parse(service: &'static str, message: impl Into<String>) -> Self {
        SourceError::Parse {
            service,
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(service: &'static str, message: impl Into<String>) -> Self {
        SourceError::Network {
            service,
            message: message.into(),
        }
    }
}
