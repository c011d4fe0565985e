//! Guarded distributor calls.
//!
//! Every call to the distributor bus runs inside a scope that first
//! persists an intent row (status NULL) and lets the ledger
//! constraints reject unauthorized calls before the network is
//! touched, then records the terminal outcome. Both writes commit;
//! errors from the embedded operation are always re-raised.

use std::fmt::Display;
use std::future::Future;

use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use thiserror::Error;

use crate::entities::{consent, webservices_call, WebservicesCallStatus};
use crate::error::{is_integrity_violation, DbError, Result};
use crate::now_local;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Intent description for one distributor call.
#[derive(Debug, Clone)]
pub struct NewCall {
    pub webservice: String,
    pub usage_point_id: String,
    pub user_id: String,
    pub consent_id: i32,
    pub consent_begins_at: DateTimeWithTimeZone,
    pub consent_expires_at: DateTimeWithTimeZone,
    pub called_at: DateTimeWithTimeZone,
}

impl NewCall {
    pub fn new(
        webservice: &str,
        user_id: &str,
        usage_point_id: &str,
        consent: &consent::Model,
    ) -> Self {
        NewCall {
            webservice: webservice.to_string(),
            usage_point_id: usage_point_id.to_string(),
            user_id: user_id.to_string(),
            consent_id: consent.id,
            consent_begins_at: consent.begins_at,
            consent_expires_at: consent.expires_at,
            called_at: now_local(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GuardedCallError<E: Display> {
    /// The ledger refused the intent row; the operation never ran.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error(transparent)]
    Db(DbError),

    /// The embedded operation failed; the FAILED outcome has been
    /// recorded.
    #[error("{0}")]
    Operation(E),
}

/// An intent row that has been accepted by the ledger. Must be
/// completed with a terminal status exactly once.
#[derive(Debug)]
pub struct GuardedCall {
    call: webservices_call::Model,
}

impl GuardedCall {
    /// Persist the intent row. A constraint rejection means the call
    /// is not covered by the consent and maps to `NotAuthorized`.
    pub async fn record(db: &DatabaseConnection, new_call: NewCall) -> Result<Self> {
        let active = webservices_call::ActiveModel {
            webservice: Set(new_call.webservice),
            usage_point_id: Set(new_call.usage_point_id),
            user_id: Set(new_call.user_id),
            consent_id: Set(new_call.consent_id),
            consent_begins_at: Set(new_call.consent_begins_at),
            consent_expires_at: Set(new_call.consent_expires_at),
            called_at: Set(new_call.called_at),
            status: Set(None),
            error: Set(None),
            ..Default::default()
        };
        let call = active.insert(db).await.map_err(|e| {
            if is_integrity_violation(&e) {
                DbError::NotAuthorized(e.to_string())
            } else {
                DbError::Db(e)
            }
        })?;
        Ok(GuardedCall { call })
    }

    pub fn call(&self) -> &webservices_call::Model {
        &self.call
    }

    /// Record the terminal outcome and hand back the operation result
    /// unchanged.
    pub async fn complete<T, E: Display>(
        self,
        db: &DatabaseConnection,
        result: std::result::Result<T, E>,
    ) -> Result<std::result::Result<T, E>> {
        let mut active: webservices_call::ActiveModel = self.call.into();
        match &result {
            Ok(_) => {
                active.status = Set(Some(WebservicesCallStatus::Ok));
            }
            Err(error) => {
                active.status = Set(Some(WebservicesCallStatus::Failed));
                active.error = Set(Some(error.to_string()));
            }
        }
        active.update(db).await?;
        Ok(result)
    }
}

/// Run `operation` inside a guarded-call scope.
///
/// The future is not polled unless the intent row was accepted, which
/// gives the strict happens-before between the committed intent and
/// the distributor call.
pub async fn guarded_call<T, E, F>(
    db: &DatabaseConnection,
    new_call: NewCall,
    operation: F,
) -> std::result::Result<T, GuardedCallError<E>>
where
    E: Display,
    F: Future<Output = std::result::Result<T, E>>,
{
    let guard = match GuardedCall::record(db, new_call).await {
        Ok(guard) => guard,
        Err(DbError::NotAuthorized(reason)) => {
            return Err(GuardedCallError::NotAuthorized(reason));
        }
        Err(other) => return Err(GuardedCallError::Db(other)),
    };

    let result = operation.await;
    match guard.complete(db, result).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(GuardedCallError::Operation(error)),
        Err(db_error) => Err(GuardedCallError::Db(db_error)),
    }
}
