//! Unsubscribe command.
//!
//! Deletes all matching subscriptions of the caller for the usage
//! point and unlinks them from their upstream orders. Orders left
//! without any subscription are collected later by the coordinator.

use actix_web::{web, HttpRequest, HttpResponse};
use tracing::info;

use gridlink_core::{parse_identifier, SAMPLE_IDENTIFIER};
use gridlink_db::repositories::{SubscriptionRepository, UserRepository};

use crate::error::ApiError;
use crate::forms::{CommandResult, Form};
use crate::handlers::{client_jid, parse_submission};
use crate::state::AppState;

const TITLE: &str = "Unsubscribe";

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
    // The series is optional here: without one, every subscription on
    // the usage point goes.
    let (usage_point_id, series_name) = parse_identifier(&identifier)?;

    let user = UserRepository::new(&state.db)
        .find(&jid)
        .await?
        .ok_or_else(|| ApiError::NotAuthorized(format!("Unknown user {jid}")))?;

    let subscriptions = SubscriptionRepository::new(&state.db);
    let matching = subscriptions
        .matching(&user.bare_jid, &usage_point_id, series_name.as_deref())
        .await?;

    info!(%jid, %identifier, count = matching.len(), "unsubscribe");
    for subscription in matching {
        subscriptions.delete(subscription).await?;
    }

    let form = Form::result(TITLE, &format!("Unsubscribe from {identifier}"));
    Ok(HttpResponse::Ok().json(CommandResult::form_only(form)))
}
