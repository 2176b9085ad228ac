//! JSON response construction.
//!
//! Every response the server writes is JSON. Error bodies share one shape:
//!
//! ```json
//! {"code": 404, "message": "Not Found"}
//! ```

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// Fallback body when a value cannot be serialized.
const SERIALIZATION_FAILED: &str =
    r#"{"code":500,"message":"Internal Server Error","cause":"Response serialization failed"}"#;

/// Error body written for non-validation failures.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody<'a> {
    /// HTTP status code.
    pub code: u16,
    /// Canonical reason phrase.
    pub message: &'a str,
    /// Optional detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<&'a str>,
}

/// Serializes `value` as the body of a response with `status`.
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => raw_json(status, Bytes::from(body)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response body");
            raw_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(SERIALIZATION_FAILED.as_bytes()),
            )
        }
    }
}

/// Writes an already-encoded JSON body.
pub fn raw_json(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Writes `{"code", "message", "cause"?}` using the status's reason phrase.
pub fn error_response(status: StatusCode, cause: Option<&str>) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrorBody {
            code: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Error"),
            cause,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_json_response() {
        let response = json_response(StatusCode::OK, &serde_json::json!({"age": "30"}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_json(response).await, serde_json::json!({"age": "30"}));
    }

    #[tokio::test]
    async fn test_error_response_shape() {
        let response = error_response(StatusCode::NOT_FOUND, None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"code": 404, "message": "Not Found"})
        );
    }

    #[tokio::test]
    async fn test_error_response_with_cause() {
        let response = error_response(StatusCode::GATEWAY_TIMEOUT, Some("Argument resolution timed out"));
        let body = body_json(response).await;
        assert_eq!(body["message"], "Gateway Timeout");
        assert_eq!(body["cause"], "Argument resolution timed out");
    }

    #[tokio::test]
    async fn test_unserializable_value_becomes_500() {
        use std::collections::HashMap;
        // Non-string map keys cannot be encoded as JSON.
        let mut map = HashMap::new();
        map.insert(vec![1_u8], 1);
        let response = json_response(StatusCode::OK, &map);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
