//! Consent resolver.
//!
//! Given a user, a usage point and an instant, find the single
//! consent authorizing the operation. Open consents may have the
//! usage point appended to their scope on first use; this is the only
//! code path that mutates consent scope.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set,
};

use crate::entities::{consent, consent_usage_point, consent_user, usage_point};
use crate::error::{DbError, Result};
use sea_orm::prelude::DateTimeWithTimeZone;

/// Consents of `user` whose scope contains `usage_point_id`, in
/// deterministic tie-break order (created_at, then id).
async fn scoped_consents(
    db: &DatabaseConnection,
    user_id: &str,
    usage_point_id: &str,
) -> Result<Vec<consent::Model>> {
    let consents = consent::Entity::find()
        .join_rev(JoinType::InnerJoin, consent_user::Relation::Consent.def())
        .filter(consent_user::Column::UserId.eq(user_id))
        .join_rev(
            JoinType::InnerJoin,
            consent_usage_point::Relation::Consent.def(),
        )
        .filter(consent_usage_point::Column::UsagePointId.eq(usage_point_id))
        .order_by_asc(consent::Column::CreatedAt)
        .order_by_asc(consent::Column::Id)
        .all(db)
        .await?;
    Ok(consents)
}

/// First open consent of `user` valid at `at`, if any.
async fn open_consent(
    db: &DatabaseConnection,
    user_id: &str,
    at: DateTimeWithTimeZone,
) -> Result<Option<consent::Model>> {
    let consent = consent::Entity::find()
        .join_rev(JoinType::InnerJoin, consent_user::Relation::Consent.def())
        .filter(consent_user::Column::UserId.eq(user_id))
        .filter(consent::Column::IsOpen.eq(true))
        .filter(consent::Column::BeginsAt.lte(at))
        .filter(consent::Column::ExpiresAt.gt(at))
        .order_by_asc(consent::Column::CreatedAt)
        .order_by_asc(consent::Column::Id)
        .one(db)
        .await?;
    Ok(consent)
}

/// Append `usage_point_id` to the scope of `consent`, creating the
/// usage point row when missing. Idempotent on re-use.
async fn append_scope(
    db: &DatabaseConnection,
    consent: &consent::Model,
    usage_point_id: &str,
) -> Result<()> {
    if usage_point::Entity::find_by_id(usage_point_id)
        .one(db)
        .await?
        .is_none()
    {
        usage_point::ActiveModel {
            id: Set(usage_point_id.to_string()),
            segment: Set(None),
            service_level: Set(None),
        }
        .insert(db)
        .await?;
    }

    let existing = consent_usage_point::Entity::find_by_id((consent.id, usage_point_id.to_string()))
        .one(db)
        .await?;
    if existing.is_none() {
        tracing::info!(
            consent_id = consent.id,
            usage_point_id,
            "Appending usage point to open consent scope"
        );
        consent_usage_point::ActiveModel {
            consent_id: Set(consent.id),
            usage_point_id: Set(usage_point_id.to_string()),
            comment: Set(Some("added on first use".to_string())),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Resolve the consent authorizing `(user, usage_point)` at `at`.
///
/// Failure reasons are as specific as the ledger allows: no scope
/// link at all, scope exists but the window has not started, or the
/// window is over.
pub async fn resolve_consent(
    db: &DatabaseConnection,
    user_id: &str,
    usage_point_id: &str,
    at: DateTimeWithTimeZone,
) -> Result<consent::Model> {
    let scoped = scoped_consents(db, user_id, usage_point_id).await?;

    if let Some(valid) = scoped.iter().find(|c| c.is_valid_at(at)) {
        return Ok(valid.clone());
    }

    if let Some(open) = open_consent(db, user_id, at).await? {
        append_scope(db, &open, usage_point_id).await?;
        return Ok(open);
    }

    if scoped.is_empty() {
        Err(DbError::NoConsent(usage_point_id.to_string()))
    } else if scoped.iter().all(|c| at < c.begins_at) {
        Err(DbError::NotYetValid(usage_point_id.to_string()))
    } else {
        Err(DbError::Expired(usage_point_id.to_string()))
    }
}
