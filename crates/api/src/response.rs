//! Success envelope shared by all JSON endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// `{success: true, message?, data?, token?}` with a status code.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status: StatusCode,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with a payload.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: Some(message.into()),
            token: None,
            data: Some(data),
        }
    }

    /// 201 with the created resource.
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }

    /// Attach a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl ApiResponse<()> {
    /// 200 with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: Some(message.into()),
            token: None,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_only_present_fields() {
        let value = serde_json::to_value(ApiResponse::message("API is running")).unwrap();
        assert_eq!(value, json!({"success": true, "message": "API is running"}));

        let value = serde_json::to_value(
            ApiResponse::created("Created", json!({"id": 1})).with_token("abc".into()),
        )
        .unwrap();
        assert_eq!(
            value,
            json!({"success": true, "message": "Created", "token": "abc", "data": {"id": 1}})
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiResponse::ok("ok", 1).into_response().status(),
            StatusCode::OK
        );
        assert_eq!(
            ApiResponse::created("made", 1).into_response().status(),
            StatusCode::CREATED
        );
    }
}
