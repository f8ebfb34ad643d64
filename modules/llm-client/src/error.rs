use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompletionError>;

/// Max bytes of a provider error body kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("rate limited (429)")]
    RateLimited,

    #[error("service unavailable (503)")]
    ServiceUnavailable,

    #[error("not found (404) at {url}: {body}")]
    NotFound { url: String, body: String },

    #[error("HTTP error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("no completion text in provider response")]
    EmptyResponse,
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Network(err.to_string())
        }
    }
}

/// Map a non-success response to its error class, consuming the body for
/// diagnostics. 404 keeps the request URL since it usually signals a
/// misconfigured model or endpoint.
pub(crate) async fn error_for_status(response: reqwest::Response) -> CompletionError {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    match status {
        429 => CompletionError::RateLimited,
        503 => CompletionError::ServiceUnavailable,
        404 => CompletionError::NotFound { url, body },
        _ => CompletionError::Http { status, body },
    }
}
