//! Mapping of domain errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::agent::AgentError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::NotAuthorized => StatusCode::FORBIDDEN,
        SessionError::Storage(_)
        | SessionError::Serialization(_)
        | SessionError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ApiError> for (StatusCode, String) {
    fn from(err: ApiError) -> Self {
        let status = match &err {
            ApiError::Session(e) | ApiError::Agent(AgentError::Session(e)) => session_status(e),
            ApiError::Agent(AgentError::EmptyMessage) => StatusCode::BAD_REQUEST,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }
        (status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        <(StatusCode, String)>::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn errors_map_to_status_codes() {
        let cases = [
            (ApiError::from(SessionError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND),
            (ApiError::from(SessionError::NotAuthorized), StatusCode::FORBIDDEN),
            (
                ApiError::from(AgentError::Session(SessionError::NotAuthorized)),
                StatusCode::FORBIDDEN,
            ),
            (ApiError::from(AgentError::EmptyMessage), StatusCode::BAD_REQUEST),
            (
                ApiError::from(SessionError::Storage(rusqlite::Error::InvalidQuery)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::from(SessionError::Unavailable("task cancelled".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = <(StatusCode, String)>::from(err);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn forbidden_body_is_plain_message() {
        let (_, body) = <(StatusCode, String)>::from(ApiError::from(SessionError::NotAuthorized));
        assert_eq!(body, "Not authorized");
    }
}
