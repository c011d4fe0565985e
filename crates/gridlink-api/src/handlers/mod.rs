//! Command handlers.
//!
//! Each operation is a two-step dialogue: an empty POST returns the
//! request form, posting the filled values executes the operation.
//! The caller's bare identity is set by the fronting gateway in the
//! `X-Client-Jid` header.

pub mod get_history;
pub mod subscribe;
pub mod unsubscribe;

use actix_web::HttpRequest;

use crate::error::ApiError;
use crate::forms::FormSubmission;

pub const CLIENT_JID_HEADER: &str = "x-client-jid";

pub fn client_jid(req: &HttpRequest) -> Result<String, ApiError> {
    req.headers()
        .get(CLIENT_JID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::NotAuthorized("missing client identity".to_string()))
}

/// Second-step payload, or `None` when the client asks for the form.
pub fn parse_submission(body: &[u8]) -> Result<Option<FormSubmission>, ApiError> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::BadRequest(format!("malformed form submission: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn missing_identity_is_refused() {
        let req = TestRequest::default().to_http_request();
        assert!(client_jid(&req).is_err());

        let req = TestRequest::default()
            .insert_header((CLIENT_JID_HEADER, "alice@wonderland.lit"))
            .to_http_request();
        assert_eq!(client_jid(&req).unwrap(), "alice@wonderland.lit");
    }

    #[test]
    fn empty_body_requests_the_form() {
        assert!(parse_submission(b"").unwrap().is_none());
        let parsed = parse_submission(br#"{"values":{"identifier":"x"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.values.get("identifier").unwrap(), "x");
        assert!(parse_submission(b"not json").is_err());
    }
}
