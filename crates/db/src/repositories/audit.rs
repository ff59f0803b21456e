use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tenderdesk_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use tenderdesk_core::domain::tender::TenderId;

use super::tender::parse_timestamp;
use super::{decode_err, AuditEventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditEventRepository {
    pool: DbPool,
}

impl SqlAuditEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_category(raw: &str) -> Result<AuditCategory, RepositoryError> {
    Ok(match raw {
        "ingress" => AuditCategory::Ingress,
        "pipeline" => AuditCategory::Pipeline,
        "pricing" => AuditCategory::Pricing,
        "completion" => AuditCategory::Completion,
        "persistence" => AuditCategory::Persistence,
        "system" => AuditCategory::System,
        other => return Err(RepositoryError::Decode(format!("unknown audit category `{other}`"))),
    })
}

fn outcome_as_str(outcome: &AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Rejected => "rejected",
        AuditOutcome::Failed => "failed",
    }
}

fn parse_outcome(raw: &str) -> Result<AuditOutcome, RepositoryError> {
    Ok(match raw {
        "success" => AuditOutcome::Success,
        "rejected" => AuditOutcome::Rejected,
        "failed" => AuditOutcome::Failed,
        other => return Err(RepositoryError::Decode(format!("unknown audit outcome `{other}`"))),
    })
}

fn row_to_event(row: &SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let tender_id: Option<String> = row.try_get("tender_id").map_err(decode_err)?;
    let category: String = row.try_get("category").map_err(decode_err)?;
    let outcome: String = row.try_get("outcome").map_err(decode_err)?;
    let metadata: String = row.try_get("metadata_json").map_err(decode_err)?;
    let occurred_at: String = row.try_get("occurred_at").map_err(decode_err)?;

    Ok(AuditEvent {
        event_id: row.try_get("id").map_err(decode_err)?,
        tender_id: tender_id.map(TenderId),
        correlation_id: row.try_get("correlation_id").map_err(decode_err)?,
        event_type: row.try_get("event_type").map_err(decode_err)?,
        category: parse_category(&category)?,
        actor: row.try_get("actor").map_err(decode_err)?,
        outcome: parse_outcome(&outcome)?,
        metadata: serde_json::from_str(&metadata).map_err(decode_err)?,
        occurred_at: parse_timestamp(&occurred_at)?,
    })
}

#[async_trait::async_trait]
impl AuditEventRepository for SqlAuditEventRepository {
    async fn append(&self, event: AuditEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO audit_event (id, tender_id, correlation_id, event_type, category,
                                      actor, outcome, metadata_json, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.tender_id.as_ref().map(|id| id.0.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(event.category.as_str())
        .bind(&event.actor)
        .bind(outcome_as_str(&event.outcome))
        .bind(serde_json::to_string(&event.metadata)?)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_tender(
        &self,
        tender_id: &TenderId,
    ) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, tender_id, correlation_id, event_type, category, actor, outcome,
                    metadata_json, occurred_at
             FROM audit_event WHERE tender_id = ?
             ORDER BY occurred_at ASC, rowid ASC",
        )
        .bind(&tender_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use tenderdesk_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
    use tenderdesk_core::domain::tender::TenderId;

    use super::SqlAuditEventRepository;
    use crate::repositories::AuditEventRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn appended_events_are_listed_per_tender_in_order() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlAuditEventRepository::new(pool);
        let tender = TenderId("TND-AUDIT".to_string());

        for (event_type, outcome) in [
            ("pipeline.transition_applied", AuditOutcome::Success),
            ("pipeline.run.failed", AuditOutcome::Failed),
        ] {
            let event = AuditEvent::new(
                Some(tender.clone()),
                "req-1",
                event_type,
                AuditCategory::Pipeline,
                "system",
                outcome,
            )
            .with_metadata("stage", "technical");
            repo.append(event).await.expect("append");
        }
        repo.append(AuditEvent::new(
            Some(TenderId("TND-OTHER".to_string())),
            "req-2",
            "pipeline.run.completed",
            AuditCategory::Pipeline,
            "system",
            AuditOutcome::Success,
        ))
        .await
        .expect("append other");

        let events = repo.list_for_tender(&tender).await.expect("list");
        let types: Vec<&str> = events.iter().map(|event| event.event_type.as_str()).collect();
        assert_eq!(types, vec!["pipeline.transition_applied", "pipeline.run.failed"]);
        assert_eq!(events[1].outcome, AuditOutcome::Failed);
        assert_eq!(events[0].metadata.get("stage").map(String::as_str), Some("technical"));
    }
}
