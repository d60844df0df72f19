use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;

/// Everything that can terminate an exchange before (or instead of) the
/// transport subprocess. Each variant maps to exactly one terminal HTTP
/// response; none of them propagate past the exchange boundary.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("access denied")]
    AccessDenied,
    #[error("malformed request path")]
    MalformedPath,
    #[error("{0}")]
    Negotiation(String),
    #[error("server running in read-only mode")]
    ReadOnly,
    #[error("transport subprocess failed: {0}")]
    Subprocess(#[from] std::io::Error),
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response<Body> {
        match self {
            // Denials carry no body: the client learns nothing beyond the code.
            ServeError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
            ServeError::MalformedPath => StatusCode::BAD_REQUEST.into_response(),
            ServeError::Negotiation(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", err)).into_response()
            }
            ServeError::ReadOnly => (
                StatusCode::FORBIDDEN,
                "server running in read-only mode\n",
            )
                .into_response(),
            ServeError::Subprocess(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to run transport subprocess\n",
            )
                .into_response(),
        }
    }
}
