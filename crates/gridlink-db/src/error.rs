//! Database error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error("migration error: {0}")]
    Migration(String),

    /// Consent missing, out of window, or an integrity rejection from
    /// the ledger constraints.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("no consent registered for {0}")]
    NoConsent(String),

    #[error("consent registered for {0} is not valid yet")]
    NotYetValid(String),

    #[error("consent registered for {0} is no longer valid")]
    Expired(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl DbError {
    /// True for the consent-related refusals a client can recover
    /// from by obtaining (or renewing) a consent.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(
            self,
            DbError::NotAuthorized(_)
                | DbError::NoConsent(_)
                | DbError::NotYetValid(_)
                | DbError::Expired(_)
        )
    }
}

/// Whether a sea-orm error is a constraint rejection from the ledger
/// (foreign key, check or unique violation) rather than an I/O or
/// syntax failure.
pub fn is_integrity_violation(err: &sea_orm::DbErr) -> bool {
    let text = err.to_string();
    text.contains("violates foreign key constraint")
        || text.contains("violates check constraint")
        || text.contains("violates unique constraint")
        || text.contains("violates not-null constraint")
}
