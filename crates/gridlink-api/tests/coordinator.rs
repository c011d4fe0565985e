//! Coordinator behavior against a mocked store and a fake bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, RuntimeErr};

use gridlink_api::coordinator::{get_or_call_upstream_order, CoordinatorError};
use gridlink_core::record::Data;
use gridlink_db::{
    consent, upstream_order, usage_point, user, webservices_call, ConsentIssuerType,
    SubscriptionCallType, UsagePointSegment, WebservicesCallStatus,
};
use gridlink_sge::{SgeError, SgeServices, SubscribeRequest, TechnicalData};

const ALICE: &str = "alice@wonderland.lit";
const HOMER_PRM: &str = "09111642617347";

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

/// Fake bus recording subscribe calls.
#[derive(Default)]
struct FakeSge {
    subscribe_calls: AtomicUsize,
    subscribe_result: Mutex<Option<Result<i32, SgeError>>>,
}

impl FakeSge {
    fn answering(result: Result<i32, SgeError>) -> Self {
        FakeSge {
            subscribe_calls: AtomicUsize::new(0),
            subscribe_result: Mutex::new(Some(result)),
        }
    }
}

#[async_trait]
impl SgeServices for FakeSge {
    async fn history(
        &self,
        _series_name: &str,
        _usage_point_id: &str,
        _start: DateTime<FixedOffset>,
        _end: DateTime<FixedOffset>,
    ) -> Result<Data, SgeError> {
        Err(SgeError::transport("not under test"))
    }

    async fn technical_data(&self, _usage_point_id: &str) -> Result<TechnicalData, SgeError> {
        Err(SgeError::transport("not under test"))
    }

    async fn subscribe(&self, _request: &SubscribeRequest) -> Result<i32, SgeError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribe_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(SgeError::transport("unexpected subscribe")))
    }

    async fn unsubscribe(&self, _usage_point_id: &str, _call_id: i32) -> Result<(), SgeError> {
        Ok(())
    }
}

fn alice() -> user::Model {
    user::Model {
        bare_jid: ALICE.to_string(),
    }
}

fn homer_usage_point() -> usage_point::Model {
    usage_point::Model {
        id: HOMER_PRM.to_string(),
        segment: Some(UsagePointSegment::C5),
        service_level: Some(2),
    }
}

fn homer_consent() -> consent::Model {
    consent::Model {
        id: 1,
        issuer_name: "Simpson".to_string(),
        issuer_type: ConsentIssuerType::Individual,
        is_open: false,
        begins_at: at("2020-01-01T00:00:00+01:00"),
        expires_at: at("2030-01-01T00:00:00+01:00"),
        created_at: at("2020-01-01T00:00:00+01:00"),
    }
}

fn existing_order() -> upstream_order::Model {
    upstream_order::Model {
        id: 11,
        webservices_call_id: 41,
        consent_expires_at: at("2030-01-01T00:00:00+01:00"),
        call_type: SubscriptionCallType::ConsumptionIdx,
        call_id: 990001,
        expires_at: at("2029-01-01T00:00:00+01:00"),
    }
}

fn intent_call(status: Option<WebservicesCallStatus>) -> webservices_call::Model {
    webservices_call::Model {
        id: 42,
        webservice: "CommandeCollectePublicationMesures-v3.0".to_string(),
        usage_point_id: HOMER_PRM.to_string(),
        user_id: ALICE.to_string(),
        consent_id: 1,
        consent_begins_at: at("2020-01-01T00:00:00+01:00"),
        consent_expires_at: at("2030-01-01T00:00:00+01:00"),
        called_at: at("2024-06-01T12:00:00+02:00"),
        status,
        error: None,
    }
}

#[tokio::test]
async fn a_valid_existing_order_is_reused_without_any_bus_call() {
    let db: DatabaseConnection = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![existing_order()]])
        .into_connection();
    let sge = FakeSge::default();

    let order = get_or_call_upstream_order(
        &db,
        &sge,
        &alice(),
        &homer_usage_point(),
        &homer_consent(),
        SubscriptionCallType::ConsumptionIdx,
    )
    .await
    .unwrap();

    assert_eq!(order.id, 11);
    assert_eq!(order.call_id, 990001);
    assert_eq!(sge.subscribe_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn a_new_order_is_placed_and_persisted_when_none_is_valid() {
    let created = upstream_order::Model {
        id: 12,
        webservices_call_id: 42,
        consent_expires_at: at("2030-01-01T00:00:00+01:00"),
        call_type: SubscriptionCallType::ConsumptionIdx,
        call_id: 990002,
        expires_at: at("2025-06-01T12:00:00+02:00"),
    };

    let db: DatabaseConnection = MockDatabase::new(DatabaseBackend::Postgres)
        // No reusable order.
        .append_query_results([Vec::<upstream_order::Model>::new()])
        // Intent row accepted, then marked OK.
        .append_query_results([vec![intent_call(None)]])
        .append_query_results([vec![intent_call(Some(WebservicesCallStatus::Ok))]])
        // The order row itself.
        .append_query_results([vec![created.clone()]])
        .into_connection();
    let sge = FakeSge::answering(Ok(990002));

    let order = get_or_call_upstream_order(
        &db,
        &sge,
        &alice(),
        &homer_usage_point(),
        &homer_consent(),
        SubscriptionCallType::ConsumptionIdx,
    )
    .await
    .unwrap();

    assert_eq!(order, created);
    assert_eq!(sge.subscribe_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn already_active_fault_reaches_the_caller_with_its_code() {
    let db: DatabaseConnection = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<upstream_order::Model>::new()])
        .append_query_results([vec![intent_call(None)]])
        .append_query_results([vec![intent_call(Some(WebservicesCallStatus::Failed))]])
        .into_connection();
    let sge = FakeSge::answering(Err(SgeError::new(
        "Le service demandé est déjà actif sur la période demandée.",
        Some("SGT570".to_string()),
    )));

    let result = get_or_call_upstream_order(
        &db,
        &sge,
        &alice(),
        &homer_usage_point(),
        &homer_consent(),
        SubscriptionCallType::ConsumptionCdcRaw,
    )
    .await;

    match result {
        Err(CoordinatorError::Sge(error)) => assert!(error.is_already_active()),
        other => panic!("expected an SGE error, got {other:?}"),
    }
    assert_eq!(sge.subscribe_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_refused_intent_row_never_reaches_the_bus() {
    let db: DatabaseConnection = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<upstream_order::Model>::new()])
        .append_query_errors([sea_orm::DbErr::Query(RuntimeErr::Internal(
            "insert or update on table \"webservices_calls\" violates check constraint \
             \"calls_within_consent_window\""
                .to_string(),
        ))])
        .into_connection();
    let sge = FakeSge::default();

    let result = get_or_call_upstream_order(
        &db,
        &sge,
        &alice(),
        &homer_usage_point(),
        &homer_consent(),
        SubscriptionCallType::ConsumptionIdx,
    )
    .await;

    assert!(matches!(result, Err(CoordinatorError::NotAuthorized(_))));
    assert_eq!(sge.subscribe_calls.load(Ordering::SeqCst), 0);
}
