//! Get-history command.
//!
//! Parse the identifier, resolve the caller's consent at the current
//! instant, and fetch the range from the distributor inside a guarded
//! call. The result payload carries the rendered `data` element.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone};
use tracing::info;

use gridlink_core::{parse_identifier, DSO_TZ, SAMPLE_IDENTIFIER};
use gridlink_db::repositories::UserRepository;
use gridlink_db::{guarded_call, now_local, resolve_consent, NewCall};
use gridlink_sge::types::{measurement_spec, DETAILED_MEASUREMENTS_SERVICE};

use crate::error::ApiError;
use crate::forms::{CommandResult, Form};
use crate::handlers::{client_jid, parse_submission};
use crate::state::AppState;

const TITLE: &str = "Get history";

fn request_form() -> Form {
    // Pre-fill yesterday's civil day in the distributor's zone.
    let today = now_local().with_timezone(&DSO_TZ).date_naive();
    let end_time = DSO_TZ
        .from_local_datetime(&today.and_time(NaiveTime::MIN))
        .earliest()
        .map(|t| t.fixed_offset())
        .unwrap_or_else(now_local);
    let start_time = end_time - Duration::days(1);

    Form::request(TITLE)
        .add_field(
            "identifier",
            "Identifier",
            true,
            Some(SAMPLE_IDENTIFIER.to_string()),
            None,
        )
        .add_field(
            "start_time",
            "Start date",
            true,
            Some(start_time.to_rfc3339()),
            Some("ISO 8601, with timezone"),
        )
        .add_field(
            "end_time",
            "End date",
            true,
            Some(end_time.to_rfc3339()),
            Some("ISO 8601, with timezone"),
        )
}

fn parse_time(field: &str, value: &str) -> Result<DateTime<FixedOffset>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| ApiError::BadRequest(format!("{field}: {e} ('{value}')")))
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
    let start_time = parse_time("start_time", submission.required("start_time")?)?;
    let end_time = parse_time("end_time", submission.required("end_time")?)?;
    if end_time < start_time {
        return Err(ApiError::BadRequest("end_time is before start_time".to_string()));
    }

    let (usage_point_id, series_name) = parse_identifier(&identifier)?;
    let series_name = series_name
        .ok_or_else(|| ApiError::BadRequest("identifier does not name a series".to_string()))?;
    if measurement_spec(&series_name).is_none() {
        return Err(ApiError::BadRequest(format!(
            "{series_name} measurement is not known"
        )));
    }

    let user = UserRepository::new(&state.db)
        .find(&jid)
        .await?
        .ok_or_else(|| ApiError::NotAuthorized(format!("Unknown user {jid}")))?;

    let consent = resolve_consent(&state.db, &user.bare_jid, &usage_point_id, now_local()).await?;

    info!(%jid, %identifier, %start_time, %end_time, "history");
    let data = guarded_call(
        &state.db,
        NewCall::new(
            DETAILED_MEASUREMENTS_SERVICE,
            &user.bare_jid,
            &usage_point_id,
            &consent,
        ),
        state
            .sge
            .history(&series_name, &usage_point_id, start_time, end_time),
    )
    .await?;

    let form = Form::result(TITLE, &format!("Get {identifier}"));
    Ok(HttpResponse::Ok().json(CommandResult::with_data(form, data.to_xml()?)))
}
