use serde_json::Value;

use crate::v2board::error::ApiError;
use crate::v2board::transport::RawResponse;

/// Turns a transport outcome into a JSON tree. This is the one place where
/// connection, status and body failures become typed errors.
pub fn parse_response(url: &str, result: Result<RawResponse, ApiError>) -> Result<Value, ApiError> {
    let res = result?;

    if res.status >= 400 {
        return Err(ApiError::Remote {
            url: url.to_string(),
            status: res.status,
            body: String::from_utf8_lossy(&res.body).into_owned(),
        });
    }

    serde_json::from_slice(&res.body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        body: String::from_utf8_lossy(&res.body).into_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    const URL: &str = "http://panel/api/v1/server/SkyhtV2ray/user";

    fn raw(status: u16, body: &'static str) -> Result<RawResponse, ApiError> {
        Ok(RawResponse {
            status,
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    #[test]
    fn test_success_returns_tree() {
        let tree = parse_response(URL, raw(200, r#"{"data":[]}"#)).unwrap();
        assert_eq!(tree, serde_json::json!({"data": []}));
    }

    #[test]
    fn test_status_400_is_remote_error() {
        let err = parse_response(URL, raw(400, "bad token")).unwrap_err();
        match err {
            ApiError::Remote { url, status, body } => {
                assert_eq!(url, URL);
                assert_eq!(status, 400);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_redirect_status_with_json_is_success() {
        assert!(parse_response(URL, raw(304, "{}")).is_ok());
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let err = parse_response(URL, raw(200, "<html>")).unwrap_err();
        assert!(matches!(err, ApiError::Decode { ref body, .. } if body == "<html>"));
    }

    #[test]
    fn test_transport_error_passes_through() {
        let err = parse_response(
            URL,
            Err(ApiError::Transport {
                url: URL.to_string(),
                source: "timed out".into(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }
}
