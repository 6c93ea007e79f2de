use reqwest::StatusCode;

use chat_api::error::{is_quota_exhausted, parse_error_message};
use chat_api::ChatApiError;

#[test]
fn parse_error_message_uses_json_message() {
    let body = r#"{"error":{"code":"model_not_found","message":"invalid model"}}"#;
    let message = parse_error_message(StatusCode::BAD_REQUEST, body);
    assert_eq!(message, "invalid model");
}

#[test]
fn parse_error_message_falls_back_to_raw_body() {
    let body = "raw failure text";
    let message = parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, body);
    assert_eq!(message, "raw failure text");
}

#[test]
fn parse_error_message_falls_back_to_status_reason_for_empty_body() {
    let message = parse_error_message(StatusCode::SERVICE_UNAVAILABLE, "");
    assert_eq!(message, "Service Unavailable");
}

#[test]
fn quota_exhaustion_is_detected_by_code_or_type() {
    assert!(is_quota_exhausted(
        r#"{"error":{"code":"insufficient_quota","message":"no credit"}}"#
    ));
    assert!(is_quota_exhausted(
        r#"{"error":{"type":"insufficient_quota","message":"no credit"}}"#
    ));
    assert!(!is_quota_exhausted(
        r#"{"error":{"code":"rate_limit_exceeded","message":"slow down"}}"#
    ));
    assert!(!is_quota_exhausted("not json"));
}

#[test]
fn display_includes_stream_failure_code() {
    let error = ChatApiError::StreamFailed {
        code: Some("server_error".to_owned()),
        message: "boom".to_owned(),
    };
    assert_eq!(error.to_string(), "stream failed (server_error): boom");
    assert_eq!(
        ChatApiError::StreamFailed {
            code: None,
            message: "boom".to_owned()
        }
        .to_string(),
        "stream failed: boom"
    );
}
