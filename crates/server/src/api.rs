//! Tender API.
//!
//! - `GET    /api/v1/tenders`                 list, `?include_deleted=true&sort=priority`
//! - `POST   /api/v1/tenders`                 ingest a tender
//! - `GET    /api/v1/tenders/{id}`            fetch one tender
//! - `DELETE /api/v1/tenders/{id}`            soft delete, `?permanent=true` purges
//! - `POST   /api/v1/tenders/{id}/restore`    undo a soft delete
//! - `POST   /api/v1/tenders/{id}/analysis`   run the bid pipeline
//! - `GET    /api/v1/tenders/{id}/response`   rendered bid response (HTML)

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tenderdesk_agent::Orchestrator;
use tenderdesk_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use tenderdesk_core::domain::tender::{
    prioritize, PrioritizedTender, TenderId, TenderRecord, TenderStatus,
};
use tenderdesk_core::errors::{ApplicationError, InterfaceError};
use tenderdesk_core::extraction::SpecExtractor;
use tenderdesk_db::{RepositoryError, TenderRepository};
use tera::Tera;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::render::render_bid_response;

const ACTOR: &str = "api";

#[derive(Clone)]
pub struct ApiState {
    pub tenders: Arc<dyn TenderRepository>,
    pub orchestrator: Arc<Orchestrator>,
    pub audit: Arc<dyn AuditSink>,
    pub templates: Arc<Tera>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_deleted: bool,
    pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenderRequest {
    pub title: String,
    pub issued_by: String,
    pub summary: String,
    pub deadline: NaiveDate,
    pub estimated_value: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResponse {
    pub id: String,
    pub permanent: bool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/tenders", get(list_tenders).post(create_tender))
        .route("/api/v1/tenders/{id}", get(get_tender).delete(delete_tender))
        .route("/api/v1/tenders/{id}/restore", post(restore_tender))
        .route("/api/v1/tenders/{id}/analysis", post(analyze_tender))
        .route("/api/v1/tenders/{id}/response", get(bid_response_page))
        .with_state(state)
}

fn correlation_id() -> String {
    format!("req-{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn interface_error(error: InterfaceError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    (
        status_for(&error),
        Json(ApiError {
            error: error.user_message().to_string(),
            message: error.message().to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
}

fn application_error(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    interface_error(error.into_interface(correlation_id), correlation_id)
}

fn repository_error(error: RepositoryError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    match error {
        RepositoryError::Domain(domain) => bad_request(domain.to_string(), correlation_id),
        other => {
            error!(
                event_name = "api.persistence.failed",
                correlation_id,
                error = %other,
                "tender repository call failed"
            );
            application_error(ApplicationError::Persistence(other.to_string()), correlation_id)
        }
    }
}

fn not_found(id: &TenderId, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    application_error(ApplicationError::NotFound(id.0.clone()), correlation_id)
}

fn bad_request(message: impl Into<String>, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    interface_error(
        InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        },
        correlation_id,
    )
}

/// Live (not soft-deleted) tender or 404.
async fn load_live(
    state: &ApiState,
    id: &TenderId,
    correlation_id: &str,
) -> ApiResult<TenderRecord> {
    match state.tenders.find_by_id(id).await {
        Ok(Some(tender)) if !tender.deleted => Ok(tender),
        Ok(_) => Err(not_found(id, correlation_id)),
        Err(error) => Err(repository_error(error, correlation_id)),
    }
}

fn emit(state: &ApiState, id: &TenderId, correlation_id: &str, event_type: &str, outcome: AuditOutcome) {
    let context = AuditContext::new(Some(id.clone()), correlation_id, ACTOR);
    state.audit.emit(AuditEvent::from_context(&context, event_type, AuditCategory::Ingress, outcome));
}

pub async fn list_tenders(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<PrioritizedTender>>> {
    let correlation_id = correlation_id();
    let tenders = state
        .tenders
        .list(query.include_deleted)
        .await
        .map_err(|error| repository_error(error, &correlation_id))?;

    let today = Utc::now().date_naive();
    let listed = match query.sort.as_deref() {
        None | Some("deadline") => prioritize_in_place(tenders, today),
        Some("priority") => prioritize(tenders, today),
        Some(other) => {
            return Err(bad_request(
                format!("unsupported sort `{other}`; expected `deadline` or `priority`"),
                &correlation_id,
            ))
        }
    };
    Ok(Json(listed))
}

/// Annotates with priority but keeps the repository's deadline order.
fn prioritize_in_place(tenders: Vec<TenderRecord>, today: NaiveDate) -> Vec<PrioritizedTender> {
    tenders
        .into_iter()
        .map(|tender| {
            let days_until_deadline = tender.days_until_deadline(today);
            PrioritizedTender { priority: tender.priority(today), days_until_deadline, tender }
        })
        .collect()
}

pub async fn create_tender(
    State(state): State<ApiState>,
    Json(body): Json<CreateTenderRequest>,
) -> ApiResult<(StatusCode, Json<TenderRecord>)> {
    let correlation_id = correlation_id();
    if body.title.trim().is_empty() || body.summary.trim().is_empty() {
        return Err(bad_request("title and summary are required", &correlation_id));
    }
    if body.estimated_value.is_some_and(|value| value.is_sign_negative()) {
        return Err(bad_request("estimated_value must not be negative", &correlation_id));
    }

    let report = SpecExtractor.extract(&body.summary);
    let mut tender = TenderRecord::new(
        TenderId::generate(),
        body.title.trim(),
        body.issued_by.trim(),
        body.summary,
        body.deadline,
        Utc::now(),
    )
    .with_extracted_terms(report);
    tender.estimated_value = body.estimated_value;

    state
        .tenders
        .save(tender.clone())
        .await
        .map_err(|error| repository_error(error, &correlation_id))?;

    emit(&state, &tender.id, &correlation_id, "tender.created", AuditOutcome::Success);
    info!(
        event_name = "api.tender.created",
        correlation_id = %correlation_id,
        tender_id = %tender.id,
        "tender ingested"
    );
    Ok((StatusCode::CREATED, Json(tender)))
}

pub async fn get_tender(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<TenderRecord>> {
    let correlation_id = correlation_id();
    load_live(&state, &TenderId(id), &correlation_id).await.map(Json)
}

pub async fn delete_tender(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<DeleteResponse>> {
    let correlation_id = correlation_id();
    let id = TenderId(id);

    let found = if query.permanent {
        state.tenders.permanent_delete(&id).await
    } else {
        state.tenders.soft_delete(&id).await.map(|tender| tender.is_some())
    }
    .map_err(|error| repository_error(error, &correlation_id))?;
    if !found {
        return Err(not_found(&id, &correlation_id));
    }

    let event_type = if query.permanent { "tender.purged" } else { "tender.deleted" };
    emit(&state, &id, &correlation_id, event_type, AuditOutcome::Success);
    info!(
        event_name = "api.tender.deleted",
        correlation_id = %correlation_id,
        tender_id = %id,
        permanent = query.permanent,
        "tender deleted"
    );
    Ok(Json(DeleteResponse { id: id.0, permanent: query.permanent }))
}

pub async fn restore_tender(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<TenderRecord>> {
    let correlation_id = correlation_id();
    let id = TenderId(id);

    let restored = state
        .tenders
        .restore(&id)
        .await
        .map_err(|error| repository_error(error, &correlation_id))?
        .ok_or_else(|| not_found(&id, &correlation_id))?;

    emit(&state, &id, &correlation_id, "tender.restored", AuditOutcome::Success);
    Ok(Json(restored))
}

/// Runs the full pipeline; on any stage failure the tender keeps its prior status.
pub async fn analyze_tender(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Json<TenderRecord>> {
    let correlation_id = correlation_id();
    let id = TenderId(id);
    let original = load_live(&state, &id, &correlation_id).await?;

    let mut working = original.clone();
    if working.status == TenderStatus::New {
        working
            .transition_to(TenderStatus::InProgress)
            .map_err(|error| application_error(error.into(), &correlation_id))?;
        working.updated_at = Utc::now();
        state
            .tenders
            .save(working.clone())
            .await
            .map_err(|error| repository_error(error, &correlation_id))?;
    }

    let analysis = match state
        .orchestrator
        .run(&id, &working.summary, working.estimated_value, &correlation_id)
        .await
    {
        Ok(analysis) => analysis,
        Err(pipeline_error) => {
            warn!(
                event_name = "api.tender.analysis_failed",
                correlation_id = %correlation_id,
                tender_id = %id,
                error = %pipeline_error,
                "bid analysis failed; tender status restored"
            );
            if let Err(error) = state.tenders.save(original).await {
                error!(
                    event_name = "api.persistence.failed",
                    correlation_id = %correlation_id,
                    tender_id = %id,
                    error = %error,
                    "failed to restore tender status after analysis failure"
                );
            }
            let mut response = application_error(pipeline_error.into(), &correlation_id);
            if response.0 == StatusCode::BAD_REQUEST {
                response.0 = StatusCode::UNPROCESSABLE_ENTITY;
            }
            return Err(response);
        }
    };

    working
        .record_analysis(analysis, Utc::now())
        .map_err(|error| application_error(error.into(), &correlation_id))?;
    state
        .tenders
        .save(working.clone())
        .await
        .map_err(|error| repository_error(error, &correlation_id))?;

    info!(
        event_name = "api.tender.analyzed",
        correlation_id = %correlation_id,
        tender_id = %id,
        "bid analysis stored"
    );
    Ok(Json(working))
}

pub async fn bid_response_page(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Html<String>> {
    let correlation_id = correlation_id();
    let id = TenderId(id);
    let tender = load_live(&state, &id, &correlation_id).await?;

    let Some(bid) = tender.bid_response.as_ref() else {
        return Err((
            StatusCode::CONFLICT,
            Json(ApiError {
                error: "The tender has not been analysed yet.".to_string(),
                message: format!("no bid response for tender {id}"),
                correlation_id,
            }),
        ));
    };

    render_bid_response(&state.templates, &tender, bid).map(Html).map_err(|error| {
        error!(
            event_name = "api.response.render_failed",
            correlation_id = %correlation_id,
            tender_id = %id,
            error = %error,
            "bid response template failed to render"
        );
        application_error(ApplicationError::Integration(error.to_string()), &correlation_id)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        Json,
    };
    use chrono::{Duration, Utc};
    use tenderdesk_agent::{Orchestrator, RunSettings, ScriptedCompletionClient};
    use tenderdesk_core::audit::InMemoryAuditSink;
    use tenderdesk_core::catalog::InMemoryCatalog;
    use tenderdesk_core::domain::analysis::RiskLevel;
    use tenderdesk_core::domain::tender::{TenderId, TenderPriority, TenderStatus};
    use tenderdesk_core::pricing::DeterministicPricingEngine;
    use tenderdesk_db::fixtures::{seed_products, seed_tenders};
    use tenderdesk_db::repositories::InMemoryTenderRepository;
    use tenderdesk_db::TenderRepository;

    use super::*;
    use crate::render::templates;

    const FLAGSHIP: &str = "TND-DEMO-001";

    async fn state_with(replies: &[&str]) -> (ApiState, InMemoryAuditSink) {
        let repository = Arc::new(InMemoryTenderRepository::default());
        for tender in seed_tenders(Utc::now().date_naive()) {
            repository.save(tender).await.expect("seed tender");
        }

        let sink = InMemoryAuditSink::default();
        let client = Arc::new(ScriptedCompletionClient::new(replies.iter().copied()));
        let orchestrator = Orchestrator::new(
            client,
            Arc::new(InMemoryCatalog::new(seed_products(), 70)),
            Arc::new(DeterministicPricingEngine::default()),
            RunSettings::default(),
        )
        .with_audit_sink(Arc::new(sink.clone()));

        let state = ApiState {
            tenders: repository,
            orchestrator: Arc::new(orchestrator),
            audit: Arc::new(sink.clone()),
            templates: templates().expect("templates compile"),
        };
        (state, sink)
    }

    const HAPPY_REPLIES: [&str; 3] = [
        "Supply of 5,000 meters of 11kV aluminium XLPE cable.",
        r#"{"winProbability": 72, "reasoning": "Exact catalog match priced below market."}"#,
        "Bid. The product is an exact match and the price is competitive.",
    ];

    #[tokio::test]
    async fn list_defaults_to_deadline_order_and_can_sort_by_priority() {
        let (state, _) = state_with(&[]).await;

        let Json(by_deadline) =
            list_tenders(State(state.clone()), Query(ListQuery::default())).await.expect("list");
        let ids: Vec<&str> = by_deadline.iter().map(|entry| entry.tender.id.0.as_str()).collect();
        assert_eq!(ids, vec!["TND-DEMO-001", "TND-DEMO-002", "TND-DEMO-003"]);

        let Json(by_priority) = list_tenders(
            State(state),
            Query(ListQuery { include_deleted: false, sort: Some("priority".to_string()) }),
        )
        .await
        .expect("list");
        assert_eq!(by_priority[0].priority, TenderPriority::High);
        assert_eq!(by_priority[2].priority, TenderPriority::Low);
    }

    #[tokio::test]
    async fn unknown_sort_is_rejected() {
        let (state, _) = state_with(&[]).await;
        let (status, Json(body)) = list_tenders(
            State(state),
            Query(ListQuery { include_deleted: false, sort: Some("value".to_string()) }),
        )
        .await
        .expect_err("bad sort");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.message.contains("unsupported sort"));
    }

    #[tokio::test]
    async fn create_extracts_specs_from_the_summary() {
        let (state, sink) = state_with(&[]).await;
        let (status, Json(created)) = create_tender(
            State(state.clone()),
            Json(CreateTenderRequest {
                title: "22kV feeder cable".to_string(),
                issued_by: "Kerala State Electricity Board".to_string(),
                summary: "Supply of 22kV cable, size 3C x 240 sq mm. Conductor: Aluminum. \
                          Quantity: 3 km. Type tests required."
                    .to_string(),
                deadline: Utc::now().date_naive() + Duration::days(20),
                estimated_value: None,
            }),
        )
        .await
        .expect("created");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.status, TenderStatus::New);
        assert_eq!(created.specifications.voltage.as_deref(), Some("22kV"));
        assert_eq!(created.specifications.quantity, Some(3000));
        assert!(created.id.0.starts_with("TND-"));
        assert_eq!(sink.event_types(), vec!["tender.created"]);

        let Json(fetched) =
            get_tender(Path(created.id.0.clone()), State(state)).await.expect("fetch");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_requires_title_and_summary() {
        let (state, _) = state_with(&[]).await;
        let (status, _) = create_tender(
            State(state),
            Json(CreateTenderRequest {
                title: "  ".to_string(),
                issued_by: "Indian Railways".to_string(),
                summary: "Supply of cable".to_string(),
                deadline: Utc::now().date_naive(),
                estimated_value: None,
            }),
        )
        .await
        .expect_err("blank title");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analysis_persists_the_bid_and_renders_a_response() {
        let (state, _) = state_with(&HAPPY_REPLIES).await;

        let Json(analyzed) = analyze_tender(Path(FLAGSHIP.to_string()), State(state.clone()))
            .await
            .expect("analysis succeeds");
        assert_eq!(analyzed.status, TenderStatus::Completed);
        let pricing = analyzed.pricing_strategy.as_ref().expect("pricing stored");
        assert_eq!(pricing.pricing_breakdown.material_cost, Decimal::from(2_400_000));
        let bid = analyzed.bid_response.as_ref().expect("bid stored");
        assert_eq!(bid.win_probability, 72);

        let stored = state
            .tenders
            .find_by_id(&TenderId(FLAGSHIP.to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored, analyzed);

        let Html(page) = bid_response_page(Path(FLAGSHIP.to_string()), State(state))
            .await
            .expect("renders");
        assert!(page.contains("MV-11-3C-240-AL"));
        assert!(page.contains("Win probability 72%"));
    }

    #[tokio::test]
    async fn stated_estimate_survives_analysis_and_drives_risk() {
        let (state, _) = state_with(&HAPPY_REPLIES).await;
        let (_, Json(created)) = create_tender(
            State(state.clone()),
            Json(CreateTenderRequest {
                title: "11kV XLPE cable".to_string(),
                issued_by: "Maharashtra State Electricity Distribution Co. Ltd.".to_string(),
                summary: "Supply of 11kV power cable, size 3C x 240 sq mm, as per IS 7098. \
                          Conductor: Aluminum. Insulation: XLPE. Armoring: SWA. \
                          Quantity: 5,000 meters. Delivery within 90 days."
                    .to_string(),
                deadline: Utc::now().date_naive() + Duration::days(20),
                estimated_value: Some(Decimal::from(2_000_000)),
            }),
        )
        .await
        .expect("created");

        let Json(analyzed) =
            analyze_tender(Path(created.id.0), State(state)).await.expect("analysis succeeds");

        assert_eq!(analyzed.estimated_value, Some(Decimal::from(2_000_000)));
        let sales = analyzed.sales_summary.as_ref().expect("sales stored");
        assert_eq!(sales.estimated_value, Some(Decimal::from(6_000_000)));
        let pricing = analyzed.pricing_strategy.as_ref().expect("pricing stored");
        assert_eq!(pricing.recommended_price, Decimal::from(2_823_529));
        assert_eq!(pricing.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn stage_failure_is_reported_and_status_restored() {
        let (state, sink) = state_with(&["Supply of 11kV cable."]).await;

        let (status, Json(body)) =
            analyze_tender(Path(FLAGSHIP.to_string()), State(state.clone()))
                .await
                .expect_err("synthesis has no scripted reply");
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.message.starts_with("Win-Probability Synthesis failed"));

        let stored = state
            .tenders
            .find_by_id(&TenderId(FLAGSHIP.to_string()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.status, TenderStatus::New);
        assert!(stored.bid_response.is_none());
        assert!(sink.event_types().contains(&"pipeline.run.failed".to_string()));
    }

    #[tokio::test]
    async fn no_suitable_product_is_unprocessable() {
        let (state, _) = state_with(&["Supply of 66kV cable."]).await;
        let (_, Json(created)) = create_tender(
            State(state.clone()),
            Json(CreateTenderRequest {
                title: "EHV cable".to_string(),
                issued_by: "Power Grid Corporation of India Ltd.".to_string(),
                summary: "Supply of 66kV cable, size 1C x 630 sq mm to IEC 60840. \
                          Conductor: Copper. Insulation: EPR. Armoring: Unarmored. \
                          Quantity: 800 meters."
                    .to_string(),
                deadline: Utc::now().date_naive() + Duration::days(40),
                estimated_value: None,
            }),
        )
        .await
        .expect("created");

        let (status, Json(body)) = analyze_tender(Path(created.id.0), State(state))
            .await
            .expect_err("catalog cannot serve 66kV");
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.message.starts_with("Technical Agent failed: No suitable product"));
    }

    #[tokio::test]
    async fn unknown_tender_is_not_found() {
        let (state, _) = state_with(&[]).await;
        let (status, _) = analyze_tender(Path("TND-MISSING".to_string()), State(state))
            .await
            .expect_err("missing");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn response_page_requires_a_completed_analysis() {
        let (state, _) = state_with(&[]).await;
        let (status, _) = bid_response_page(Path(FLAGSHIP.to_string()), State(state))
            .await
            .expect_err("not analysed");
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn soft_delete_hides_until_restored_and_permanent_delete_purges() {
        let (state, sink) = state_with(&[]).await;

        delete_tender(
            Path(FLAGSHIP.to_string()),
            State(state.clone()),
            Query(DeleteQuery::default()),
        )
        .await
        .expect("soft delete");
        let (status, _) = get_tender(Path(FLAGSHIP.to_string()), State(state.clone()))
            .await
            .expect_err("hidden");
        assert_eq!(status, StatusCode::NOT_FOUND);

        let Json(listed) = list_tenders(
            State(state.clone()),
            Query(ListQuery { include_deleted: true, sort: None }),
        )
        .await
        .expect("list");
        assert_eq!(listed.len(), 3);

        let Json(restored) = restore_tender(Path(FLAGSHIP.to_string()), State(state.clone()))
            .await
            .expect("restore");
        assert!(!restored.deleted);

        let Json(purged) = delete_tender(
            Path(FLAGSHIP.to_string()),
            State(state.clone()),
            Query(DeleteQuery { permanent: true }),
        )
        .await
        .expect("purge");
        assert!(purged.permanent);

        let (status, _) = restore_tender(Path(FLAGSHIP.to_string()), State(state))
            .await
            .expect_err("gone for good");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            sink.event_types(),
            vec!["tender.deleted", "tender.restored", "tender.purged"]
        );
    }
}
