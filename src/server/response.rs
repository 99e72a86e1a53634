//! JSON response envelopes and error mapping
//!
//! Every response body is JSON with at least a `message` field. Errors map
//! to their public status here; anything persistence-shaped collapses to a
//! generic 500 while the source error goes to the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::Error;

/// Minimal `{message}` envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub message: String,
}

impl ApiResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of a successful endpoint creation.
#[derive(Debug, Serialize)]
pub struct EndpointCreatedResponse {
    pub message: String,
    pub url: EndpointUrl,
    pub sse: SseDetails,
}

#[derive(Debug, Serialize)]
pub struct EndpointUrl {
    /// Base URL the service is reachable under.
    pub fqdn: String,
    /// The endpoint's opaque reference token.
    pub reference: String,
    /// Fully assembled URL to send requests to.
    pub human_readable_endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct SseDetails {
    /// Channel to pass to the events stream.
    pub channel: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::UserNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::EndpointNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::PayloadTooLarge { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::Conflict => (StatusCode::CONFLICT, self.to_string()),
            Error::BodyRead | Error::Persistence(_) => {
                tracing::error!(error = ?self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an error occurred processing this request".to_string(),
                )
            }
        };

        (status, Json(ApiResponse::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::store::StoreError;

    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = Error::EndpointNotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_oversize_body_maps_to_400() {
        let response = Error::PayloadTooLarge { limit: 2048 }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_hides_detail() {
        let response = Error::Persistence(StoreError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
