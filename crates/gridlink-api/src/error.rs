//! Public error shape of the command surface.
//!
//! Errors keep the transport taxonomy: a condition, a type, a text,
//! and for propagated distributor faults an `upstream-error`
//! extension carrying the issuer and vendor code so clients can tell
//! `SGT570` from real faults.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use gridlink_core::CoreError;
use gridlink_db::{DbError, GuardedCallError};
use gridlink_sge::SgeError;

pub const UPSTREAM_ISSUER: &str = "enedis-sge-tiers";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A distributor fault surfaced to the client with its vendor
    /// code.
    #[error("upstream error: {0}")]
    Upstream(SgeError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct UpstreamErrorBody {
    pub issuer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub condition: &'static str,
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub text: String,
    #[serde(rename = "upstream-error", skip_serializing_if = "Option::is_none")]
    pub upstream_error: Option<UpstreamErrorBody>,
}

impl ApiError {
    fn body(&self) -> ErrorBody {
        match self {
            ApiError::NotAuthorized(text) => ErrorBody {
                condition: "not-authorized",
                error_type: "cancel",
                text: text.clone(),
                upstream_error: None,
            },
            ApiError::BadRequest(text) => ErrorBody {
                condition: "bad-request",
                error_type: "modify",
                text: text.clone(),
                upstream_error: None,
            },
            ApiError::Upstream(error) => ErrorBody {
                condition: "undefined-condition",
                error_type: "cancel",
                text: error.message.clone(),
                upstream_error: Some(UpstreamErrorBody {
                    issuer: UPSTREAM_ISSUER.to_string(),
                    code: error.code.clone(),
                }),
            },
            ApiError::Internal(text) => ErrorBody {
                condition: "undefined-condition",
                error_type: "cancel",
                text: text.clone(),
                upstream_error: None,
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if matches!(self, ApiError::Internal(_)) {
            tracing::error!(error = %self, "Internal error on command surface");
        } else {
            tracing::warn!(error = %self, "Command refused");
        }
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::BadRequest(text) => ApiError::BadRequest(text),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        if error.is_authorization_failure() {
            ApiError::NotAuthorized(error.to_string())
        } else {
            ApiError::Internal(error.to_string())
        }
    }
}

impl From<SgeError> for ApiError {
    fn from(error: SgeError) -> Self {
        ApiError::Upstream(error)
    }
}

impl From<GuardedCallError<SgeError>> for ApiError {
    fn from(error: GuardedCallError<SgeError>) -> Self {
        match error {
            GuardedCallError::NotAuthorized(text) => ApiError::NotAuthorized(text),
            GuardedCallError::Db(db) => db.into(),
            GuardedCallError::Operation(sge) => sge.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_failures_map_to_not_authorized() {
        let api: ApiError = DbError::Expired("09111642617347".to_string()).into();
        assert!(matches!(api, ApiError::NotAuthorized(_)));
        assert_eq!(api.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(api.body().condition, "not-authorized");
    }

    #[test]
    fn upstream_faults_carry_issuer_and_code() {
        let api: ApiError = SgeError::new("boom", Some("SGT470".to_string())).into();
        let body = api.body();
        assert_eq!(body.condition, "undefined-condition");
        let upstream = body.upstream_error.unwrap();
        assert_eq!(upstream.issuer, UPSTREAM_ISSUER);
        assert_eq!(upstream.code.as_deref(), Some("SGT470"));
    }

    #[test]
    fn guarded_call_errors_translate_by_stage() {
        let refused: ApiError =
            GuardedCallError::<SgeError>::NotAuthorized("rejected".to_string()).into();
        assert!(matches!(refused, ApiError::NotAuthorized(_)));

        let upstream: ApiError =
            GuardedCallError::Operation(SgeError::transport("timeout")).into();
        assert!(matches!(upstream, ApiError::Upstream(_)));
    }
}
