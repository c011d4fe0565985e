//! Subscribe command.
//!
//! Creates the client subscription and makes sure every upstream
//! order kind the series requires exists, reusing valid orders that
//! other subscriptions already paid for. The distributor's "already
//! active" fault (`SGT570`) is absorbed: the subscription stands and
//! the renewal worker will pick the order up later.

use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{debug, info};

use gridlink_core::{parse_identifier, series, SAMPLE_IDENTIFIER};
use gridlink_db::repositories::{SubscriptionRepository, UsagePointRepository, UserRepository};
use gridlink_db::{
    guarded_call, now_local, resolve_consent, subscription, NewCall, UsagePointSegment,
};
use gridlink_sge::types::TECHNICAL_DATA_SERVICE;

use crate::coordinator::{get_or_call_upstream_order, required_call_types, CoordinatorError};
use crate::error::ApiError;
use crate::forms::{CommandResult, Form};
use crate::handlers::{client_jid, parse_submission};
use crate::state::AppState;

const TITLE: &str = "Subscribe";

fn request_form() -> Form {
    Form::request(TITLE).add_field(
        "identifier",
        "Identifier",
        true,
        Some(SAMPLE_IDENTIFIER.to_string()),
        None,
    )
}

pub async fn handle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let Some(submission) = parse_submission(&body)? else {
        return Ok(HttpResponse::Ok().json(request_form()));
    };

    let jid = client_jid(&req)?;
    let identifier = submission.required("identifier")?.to_string();
    let (usage_point_id, series_name) = parse_identifier(&identifier)?;
    let series_name = series_name
        .ok_or_else(|| ApiError::BadRequest("identifier does not name a series".to_string()))?;
    if !series::is_subscribable(&series_name) {
        return Err(ApiError::BadRequest(format!(
            "Subscription to {series_name} is not supported"
        )));
    }

    let user = UserRepository::new(&state.db)
        .find(&jid)
        .await?
        .ok_or_else(|| ApiError::NotAuthorized(format!("Unknown user {jid}")))?;

    let subscriptions = SubscriptionRepository::new(&state.db);
    let existing = subscriptions
        .find(&user.bare_jid, &usage_point_id, &series_name)
        .await?;

    if let Some(existing) = existing {
        // Subscribing twice is fine; nothing to do.
        debug!(subscription_id = existing.id, "Already subscribed");
    } else {
        let consent =
            resolve_consent(&state.db, &user.bare_jid, &usage_point_id, now_local()).await?;

        let usage_points = UsagePointRepository::new(&state.db);
        let mut usage_point = usage_points.get_or_create(&usage_point_id).await?;

        if usage_point.segment.is_none() || usage_point.service_level.is_none() {
            info!(%jid, %identifier, "technical data");
            let technical_data = guarded_call(
                &state.db,
                NewCall::new(
                    TECHNICAL_DATA_SERVICE,
                    &user.bare_jid,
                    &usage_point_id,
                    &consent,
                ),
                state.sge.technical_data(&usage_point_id),
            )
            .await?;

            if let Some(segment) = technical_data
                .segment
                .as_deref()
                .and_then(UsagePointSegment::parse)
            {
                usage_point = usage_points
                    .set_technical_data(usage_point, segment, technical_data.service_level)
                    .await?;
            }
        }

        let subscription = subscriptions
            .create(&user.bare_jid, &usage_point_id, &series_name, &consent)
            .await?;

        info!(%jid, %identifier, subscription_id = subscription.id, "subscribe");
        link_required_orders(&state, &user, &usage_point, &consent, &subscription).await?;
    }

    let form = Form::result(TITLE, &format!("Subscribe to {identifier}"));
    Ok(HttpResponse::Ok().json(CommandResult::form_only(form)))
}

async fn link_required_orders(
    state: &AppState,
    user: &gridlink_db::user::Model,
    usage_point: &gridlink_db::usage_point::Model,
    consent: &gridlink_db::consent::Model,
    subscription: &subscription::Model,
) -> Result<(), ApiError> {
    let subscriptions = SubscriptionRepository::new(&state.db);

    for call_type in required_call_types(&subscription.series_name) {
        match get_or_call_upstream_order(
            &state.db,
            state.sge.as_ref(),
            user,
            usage_point,
            consent,
            *call_type,
        )
        .await
        {
            Ok(order) => subscriptions.link_order(subscription.id, order.id).await?,
            Err(CoordinatorError::Sge(error)) if error.is_already_active() => {
                // The distributor already streams this kind for the
                // usage point under an order we do not know about.
                debug!(?call_type, "Order already active upstream, absorbing");
            }
            Err(CoordinatorError::Sge(error)) => return Err(error.into()),
            Err(CoordinatorError::NotAuthorized(text)) => {
                return Err(ApiError::NotAuthorized(text))
            }
            Err(CoordinatorError::Db(error)) => return Err(error.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_form_prefills_the_sample_identifier() {
        let form = request_form();
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.fields[0].value.as_deref(), Some(SAMPLE_IDENTIFIER));
    }
}
