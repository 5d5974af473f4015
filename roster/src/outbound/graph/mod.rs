//! Graph REST adapter for the directory port.
//!
//! [`TokenCache`] acquires and caches app-only bearer tokens through the
//! client-credentials grant; [`GraphDirectoryClient`] implements
//! [`crate::domain::ports::DirectoryClient`] on top of it.

mod auth;
mod dto;
mod http_client;

use reqwest::StatusCode;
use url::Url;

use crate::domain::ports::DirectoryError;

pub use auth::{ClientCredentials, GRAPH_DEFAULT_SCOPE, TokenCache};
pub use http_client::{GraphClientSettings, GraphDirectoryClient};

/// Append path segments to a base URL, percent-encoding each segment.
pub(super) fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, DirectoryError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| DirectoryError::transport(format!("endpoint {base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(super) fn map_transport_error(error: reqwest::Error) -> DirectoryError {
    DirectoryError::transport(error.to_string())
}

/// Map a non-success response onto the directory error taxonomy.
///
/// OData error envelopes are folded into the message as `code: message`;
/// anything else is carried as a compacted body preview.
pub(super) fn map_status_error(status: StatusCode, body: &[u8]) -> DirectoryError {
    let detail = odata_error_detail(body).unwrap_or_else(|| body_preview(body));
    let message = if detail.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), detail)
    };

    match status {
        StatusCode::NOT_FOUND => DirectoryError::not_found(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DirectoryError::authentication(message),
        StatusCode::TOO_MANY_REQUESTS => DirectoryError::rate_limited(message),
        _ if status.is_client_error() => DirectoryError::rejected(message),
        _ => DirectoryError::transport(message),
    }
}

fn odata_error_detail(body: &[u8]) -> Option<String> {
    let decoded: dto::ODataErrorDto = serde_json::from_slice(body).ok()?;
    let dto::ODataErrorBodyDto { code, message } = decoded.error;
    match (code.is_empty(), message.is_empty()) {
        (true, true) => None,
        (false, true) => Some(code),
        (true, false) => Some(message),
        (false, false) => Some(format!("{code}: {message}")),
    }
}

pub(super) fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for status and URL helpers.

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_found(StatusCode::NOT_FOUND, "not_found")]
    #[case::unauthorised(StatusCode::UNAUTHORIZED, "authentication")]
    #[case::forbidden(StatusCode::FORBIDDEN, "authentication")]
    #[case::throttled(StatusCode::TOO_MANY_REQUESTS, "rate_limited")]
    #[case::bad_request(StatusCode::BAD_REQUEST, "rejected")]
    #[case::server_error(StatusCode::SERVICE_UNAVAILABLE, "transport")]
    fn maps_http_statuses_to_directory_errors(#[case] status: StatusCode, #[case] kind: &str) {
        let error = map_status_error(status, b"");
        assert_eq!(error.kind(), kind);
    }

    #[test]
    fn folds_odata_error_envelope_into_message() {
        let body = br#"{"error":{"code":"Request_BadRequest","message":"Invalid value."}}"#;
        let error = map_status_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(
            error.to_string(),
            "directory rejected request: status 400: Request_BadRequest: Invalid value."
        );
    }

    #[test]
    fn falls_back_to_compacted_body_preview() {
        let body = format!("<html>\n  {}\n</html>", "x".repeat(200));
        let preview = body_preview(body.as_bytes());
        assert!(preview.starts_with("<html> xxx"));
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 163);
    }

    #[test]
    fn joins_segments_with_percent_encoding() {
        let base = Url::parse("https://graph.example.test/v1.0/").expect("base url");
        let url = join_segments(&base, &["groups", "a/b", "members", "$ref"]).expect("joined");
        assert_eq!(
            url.as_str(),
            "https://graph.example.test/v1.0/groups/a%2Fb/members/$ref"
        );
    }
}
