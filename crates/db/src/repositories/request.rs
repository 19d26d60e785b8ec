use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use hrflow_core::domain::employee::{DepartmentId, EmployeeId};
use hrflow_core::domain::request::{RequestId, RequestPayload, RequestType, WorkflowRequest};
use hrflow_core::workflow::sequence::outcome;
use hrflow_core::workflow::states::{RequestOutcome, Stage, StageStatus};

use super::{
    decode_enum, decode_timestamp, DecisionRecord, Page, PageRequest, RepositoryError,
    RequestFilter, RequestRepository,
};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, requester_id, department_id, request_type, payload_json,
    hod_status, ceo_status, admin_status, remarks, created_at, updated_at";

const FILTER_CLAUSE: &str = "(?1 IS NULL OR requester_id = ?1)
    AND (?2 IS NULL OR department_id = ?2)
    AND (?3 IS NULL OR status = ?3)
    AND (?4 IS NULL OR active_stage = ?4)
    AND (?5 IS NULL OR effective_date >= ?5)
    AND (?6 IS NULL OR effective_date <= ?6)";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn stage_column(stage: Stage) -> &'static str {
    match stage {
        Stage::Hod => "hod_status",
        Stage::Ceo => "ceo_status",
        Stage::Admin => "admin_status",
    }
}

fn insert_error(error: sqlx::Error, request_id: &RequestId) -> RepositoryError {
    if let sqlx::Error::Database(database) = &error {
        if database.is_unique_violation() {
            return RepositoryError::DuplicateRequest { request_id: request_id.clone() };
        }
    }
    RepositoryError::Database(error)
}

fn row_to_request(row: &SqliteRow) -> Result<WorkflowRequest, RepositoryError> {
    let id: String = row.try_get("id")?;
    let request_type: String = row.try_get("request_type")?;
    let request_type: RequestType = decode_enum("request_type", &request_type)?;
    let payload_json: String = row.try_get("payload_json")?;
    let payload: RequestPayload = serde_json::from_str(&payload_json)
        .map_err(|error| RepositoryError::Decode(format!("payload of `{id}`: {error}")))?;
    if payload.request_type() != request_type {
        return Err(RepositoryError::Decode(format!(
            "payload of `{id}` is {:?} but the row says {request_type:?}",
            payload.request_type()
        )));
    }

    let hod: String = row.try_get("hod_status")?;
    let ceo: String = row.try_get("ceo_status")?;
    let admin: String = row.try_get("admin_status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(WorkflowRequest {
        id: RequestId(id),
        requester_id: EmployeeId(row.try_get("requester_id")?),
        department_id: DepartmentId(row.try_get("department_id")?),
        request_type,
        payload,
        stage_status: StageStatus {
            hod: decode_enum("hod_status", &hod)?,
            ceo: decode_enum("ceo_status", &ceo)?,
            admin: decode_enum("admin_status", &admin)?,
        },
        remarks: row.try_get("remarks")?,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_decision(row: &SqliteRow) -> Result<DecisionRecord, RepositoryError> {
    let stage: String = row.try_get("stage")?;
    let decision: String = row.try_get("decision")?;
    let previous: String = row.try_get("previous_state")?;
    let applied: String = row.try_get("applied_state")?;
    let decided_at: String = row.try_get("decided_at")?;

    Ok(DecisionRecord {
        id: row.try_get("id")?,
        request_id: RequestId(row.try_get("request_id")?),
        stage: decode_enum("stage", &stage)?,
        decision: decode_enum("decision", &decision)?,
        actor_id: EmployeeId(row.try_get("actor_id")?),
        previous: decode_enum("previous_state", &previous)?,
        applied: decode_enum("applied_state", &applied)?,
        remarks: row.try_get("remarks")?,
        decided_at: decode_timestamp("decided_at", &decided_at)?,
    })
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn insert(&self, request: &WorkflowRequest) -> Result<(), RepositoryError> {
        let payload_json = serde_json::to_string(&request.payload)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let current = outcome(request);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO workflow_request (
                id, requester_id, department_id, request_type, payload_json, effective_date,
                hod_status, ceo_status, admin_status, status, active_stage, remarks,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.requester_id.0)
        .bind(&request.department_id.0)
        .bind(request.request_type.as_str())
        .bind(payload_json)
        .bind(request.payload.effective_date().format("%Y-%m-%d").to_string())
        .bind(request.stage_status.hod.as_str())
        .bind(request.stage_status.ceo.as_str())
        .bind(request.stage_status.admin.as_str())
        .bind(current.status_label())
        .bind(current.active_stage().map(|stage| stage.as_str()))
        .bind(&request.remarks)
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|error| insert_error(error, &request.id))?;

        if let Some(worked_on) = request.payload.compensated_for() {
            let taken = sqlx::query(
                "UPDATE compensatory_credit SET redeemed_by = ?
                 WHERE employee_id = ? AND worked_on = ? AND redeemed_by IS NULL",
            )
            .bind(&request.id.0)
            .bind(&request.requester_id.0)
            .bind(worked_on.format("%Y-%m-%d").to_string())
            .execute(&mut *tx)
            .await?;
            if taken.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(RepositoryError::CreditUnavailable {
                    employee_id: request.requester_id.clone(),
                    worked_on,
                });
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<WorkflowRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM workflow_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_request).transpose()
    }

    async fn list(
        &self,
        filter: &RequestFilter,
        page: PageRequest,
    ) -> Result<Page<WorkflowRequest>, RepositoryError> {
        let employee_id = filter.employee_id.as_ref().map(|id| id.0.as_str());
        let department_id = filter.department_id.as_ref().map(|id| id.0.as_str());
        let status = filter.status.map(|status| status.as_str());
        let awaiting = filter.awaiting_stage.map(|stage| stage.as_str());
        let from = filter.date_range.map(|(from, _)| from.format("%Y-%m-%d").to_string());
        let to = filter.date_range.map(|(_, to)| to.format("%Y-%m-%d").to_string());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM workflow_request WHERE {FILTER_CLAUSE}"
        ))
        .bind(employee_id)
        .bind(department_id)
        .bind(status)
        .bind(awaiting)
        .bind(&from)
        .bind(&to)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM workflow_request
             WHERE {FILTER_CLAUSE}
             ORDER BY created_at DESC, id ASC
             LIMIT ?7 OFFSET ?8"
        ))
        .bind(employee_id)
        .bind(department_id)
        .bind(status)
        .bind(awaiting)
        .bind(&from)
        .bind(&to)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items: rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()?,
            total: u64::try_from(total).unwrap_or_default(),
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn apply_update(
        &self,
        updated: &WorkflowRequest,
        record: &DecisionRecord,
    ) -> Result<(), RepositoryError> {
        let current = outcome(updated);
        let mut tx = self.pool.begin().await?;

        let written = sqlx::query(&format!(
            "UPDATE workflow_request
             SET hod_status = ?, ceo_status = ?, admin_status = ?, status = ?, active_stage = ?,
                 remarks = ?, updated_at = ?
             WHERE id = ? AND {} = 'pending'",
            stage_column(record.stage)
        ))
        .bind(updated.stage_status.hod.as_str())
        .bind(updated.stage_status.ceo.as_str())
        .bind(updated.stage_status.admin.as_str())
        .bind(current.status_label())
        .bind(current.active_stage().map(|stage| stage.as_str()))
        .bind(&updated.remarks)
        .bind(updated.updated_at.to_rfc3339())
        .bind(&updated.id.0)
        .execute(&mut *tx)
        .await?;

        if written.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM workflow_request WHERE id = ?)")
                    .bind(&updated.id.0)
                    .fetch_one(&mut *tx)
                    .await?;
            tx.rollback().await?;
            tracing::debug!(
                event_name = "db.request.stale_write",
                request_id = %updated.id.0,
                stage = ?record.stage,
                found = exists == 1,
                "request update matched no rows"
            );
            return Err(if exists == 1 {
                RepositoryError::ConcurrentModification {
                    request_id: updated.id.clone(),
                    stage: record.stage,
                }
            } else {
                RepositoryError::RequestNotFound { request_id: updated.id.clone() }
            });
        }

        sqlx::query(
            "INSERT INTO request_decision (
                id, request_id, stage, decision, actor_id, previous_state, applied_state,
                remarks, decided_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.request_id.0)
        .bind(record.stage.as_str())
        .bind(record.decision.as_str())
        .bind(&record.actor_id.0)
        .bind(record.previous.as_str())
        .bind(record.applied.as_str())
        .bind(&record.remarks)
        .bind(record.decided_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if matches!(current, RequestOutcome::Rejected { .. })
            && updated.payload.compensated_for().is_some()
        {
            sqlx::query("UPDATE compensatory_credit SET redeemed_by = NULL WHERE redeemed_by = ?")
                .bind(&updated.id.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn history(&self, id: &RequestId) -> Result<Vec<DecisionRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, stage, decision, actor_id, previous_state, applied_state,
                    remarks, decided_at
             FROM request_decision
             WHERE request_id = ?
             ORDER BY decided_at ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_decision).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;

    use hrflow_core::domain::employee::{
        Actor, DepartmentId, EmployeeId, EmployeeProfile, EmploymentStatus, Gender, Role,
    };
    use hrflow_core::domain::request::{
        LeaveDetails, LeaveKind, OvertimeDetails, PunchDirection, PunchMissedDetails, RequestId,
        RequestPayload, WorkflowRequest,
    };
    use hrflow_core::workflow::engine::WorkflowEngine;
    use hrflow_core::workflow::sequence::initial_stage_status;
    use hrflow_core::workflow::states::{Decision, Stage, StageState};

    use super::SqlRequestRepository;
    use crate::repositories::{
        DecisionRecord, IdentityProvider, PageRequest, RepositoryError, RequestFilter,
        RequestRepository, SqlEmployeeDirectory, StatusFilter,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let directory = SqlEmployeeDirectory::new(pool.clone());
        let employees = [("E-100", "ENG", vec![republic_day()]), ("E-300", "OPS", Vec::new())];
        for (id, dept, credits) in employees {
            directory
                .save(&EmployeeProfile {
                    actor: Actor {
                        user_id: EmployeeId(id.to_string()),
                        role: Role::Employee,
                        department_id: DepartmentId(dept.to_string()),
                    },
                    name: format!("Employee {id}"),
                    gender: Gender::Male,
                    employment_status: EmploymentStatus::Confirmed,
                    emergency_leave_granted: false,
                    compensatory_credits: credits,
                })
                .await
                .expect("save employee");
        }
        pool
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("date")
    }

    fn republic_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 26).expect("date")
    }

    fn request(id: &str, requester: &str, dept: &str, payload: RequestPayload) -> WorkflowRequest {
        let created_at = Utc::now();
        WorkflowRequest {
            id: RequestId(id.to_string()),
            requester_id: EmployeeId(requester.to_string()),
            department_id: DepartmentId(dept.to_string()),
            request_type: payload.request_type(),
            stage_status: initial_stage_status(payload.request_type(), Role::Employee),
            payload,
            remarks: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn leave(id: &str, from: u32) -> WorkflowRequest {
        request(
            id,
            "E-100",
            "ENG",
            RequestPayload::Leave(LeaveDetails {
                leave_kind: LeaveKind::Casual,
                from_date: date(from),
                to_date: date(from + 1),
                reason: "family function".to_string(),
                certificate_ref: None,
                compensated_for: None,
            }),
        )
    }

    fn compensatory(id: &str, from: u32) -> WorkflowRequest {
        request(
            id,
            "E-100",
            "ENG",
            RequestPayload::Leave(LeaveDetails {
                leave_kind: LeaveKind::Compensatory,
                from_date: date(from),
                to_date: date(from),
                reason: "worked the holiday".to_string(),
                certificate_ref: None,
                compensated_for: Some(republic_day()),
            }),
        )
    }

    async fn free_credits(pool: &DbPool) -> Vec<NaiveDate> {
        SqlEmployeeDirectory::new(pool.clone())
            .resolve(&EmployeeId("E-100".into()))
            .await
            .expect("resolve")
            .expect("present")
            .compensatory_credits
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_payload_and_status() {
        let repo = SqlRequestRepository::new(setup().await);
        let overtime = request(
            "OT-1",
            "E-300",
            "OPS",
            RequestPayload::Overtime(OvertimeDetails {
                date: date(2),
                hours: Decimal::new(35, 1),
                reason: "inventory count".to_string(),
            }),
        );

        repo.insert(&overtime).await.expect("insert");
        let found = repo.find_by_id(&overtime.id).await.expect("find").expect("present");

        assert_eq!(found.payload, overtime.payload);
        assert_eq!(found.stage_status, overtime.stage_status);
        assert!(repo.find_by_id(&RequestId("OT-404".into())).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn apply_update_writes_state_and_history_together() {
        let repo = SqlRequestRepository::new(setup().await);
        let original = leave("LV-1", 9);
        repo.insert(&original).await.expect("insert");

        let decided = WorkflowEngine::new()
            .apply(&original, Role::Hod, Decision::Approve, None)
            .expect("hod approves");
        let record =
            DecisionRecord::from_outcome(&decided, Decision::Approve, EmployeeId("H-1".into()));
        repo.apply_update(&decided.request, &record).await.expect("apply update");

        let stored = repo.find_by_id(&original.id).await.expect("find").expect("present");
        assert_eq!(stored.stage_status.hod, StageState::Approved);

        let history = repo.history(&original.id).await.expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].stage, Stage::Hod);
        assert_eq!(history[0].applied, StageState::Approved);
        assert_eq!(history[0].actor_id.0, "H-1");
    }

    #[tokio::test]
    async fn stale_decision_is_refused_as_concurrent_modification() {
        let repo = SqlRequestRepository::new(setup().await);
        let original = leave("LV-2", 12);
        repo.insert(&original).await.expect("insert");

        let engine = WorkflowEngine::new();
        let approve = engine.apply(&original, Role::Hod, Decision::Approve, None).expect("approve");
        let reject = engine
            .apply(&original, Role::Hod, Decision::Reject, Some("no cover"))
            .expect("reject from the same snapshot");

        let first =
            DecisionRecord::from_outcome(&approve, Decision::Approve, EmployeeId("H-1".into()));
        repo.apply_update(&approve.request, &first).await.expect("first writer wins");

        let second =
            DecisionRecord::from_outcome(&reject, Decision::Reject, EmployeeId("H-2".into()));
        let error = repo
            .apply_update(&reject.request, &second)
            .await
            .expect_err("second writer loses");
        assert!(matches!(
            error,
            RepositoryError::ConcurrentModification { stage: Stage::Hod, .. }
        ));

        let stored = repo.find_by_id(&original.id).await.expect("find").expect("present");
        assert_eq!(stored.stage_status.hod, StageState::Approved);
        assert_eq!(repo.history(&original.id).await.expect("history").len(), 1);
    }

    #[tokio::test]
    async fn apply_update_on_missing_request_reports_not_found() {
        let repo = SqlRequestRepository::new(setup().await);
        let ghost = leave("LV-404", 3);
        let decided =
            WorkflowEngine::new().apply(&ghost, Role::Hod, Decision::Approve, None).expect("apply");
        let record =
            DecisionRecord::from_outcome(&decided, Decision::Approve, EmployeeId("H-1".into()));

        let error = repo.apply_update(&decided.request, &record).await.expect_err("missing row");
        assert!(matches!(error, RepositoryError::RequestNotFound { .. }));
    }

    #[tokio::test]
    async fn list_filters_by_department_stage_status_and_date() {
        let repo = SqlRequestRepository::new(setup().await);
        let first = leave("LV-10", 5);
        let mut second = leave("LV-11", 20);
        second.created_at = first.created_at + Duration::seconds(1);
        let punch = request(
            "PM-10",
            "E-300",
            "OPS",
            RequestPayload::PunchMissed(PunchMissedDetails {
                date: date(4),
                punch: PunchDirection::In,
                claimed_time: NaiveTime::from_hms_opt(9, 0, 0).expect("time"),
                reason: "reader offline".to_string(),
            }),
        );
        for request in [&first, &second, &punch] {
            repo.insert(request).await.expect("insert");
        }

        let decided =
            WorkflowEngine::new().apply(&punch, Role::Hod, Decision::Approve, None).expect("hod");
        let record =
            DecisionRecord::from_outcome(&decided, Decision::Approve, EmployeeId("H-3".into()));
        repo.apply_update(&decided.request, &record).await.expect("update");

        let eng = repo
            .list(
                &RequestFilter {
                    department_id: Some(DepartmentId("ENG".into())),
                    ..RequestFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .expect("list eng");
        assert_eq!(eng.total, 2);
        assert_eq!(eng.items[0].id.0, "LV-11", "newest first");

        let awaiting_admin = repo
            .list(
                &RequestFilter { awaiting_stage: Some(Stage::Admin), ..RequestFilter::default() },
                PageRequest::default(),
            )
            .await
            .expect("list admin queue");
        assert_eq!(awaiting_admin.items.len(), 1);
        assert_eq!(awaiting_admin.items[0].id.0, "PM-10");

        let early_march = repo
            .list(
                &RequestFilter {
                    status: Some(StatusFilter::InProgress),
                    date_range: Some((date(1), date(10))),
                    ..RequestFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .expect("list by date");
        assert_eq!(early_march.total, 2);

        let paged = repo
            .list(&RequestFilter::default(), PageRequest::new(Some(1), Some(1)))
            .await
            .expect("paged");
        assert_eq!(paged.total, 3);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.offset, 1);
    }

    #[tokio::test]
    async fn duplicate_id_is_reported_as_duplicate_request() {
        let repo = SqlRequestRepository::new(setup().await);
        let original = leave("LV-30", 9);
        repo.insert(&original).await.expect("first insert");

        let error = repo.insert(&leave("LV-30", 16)).await.expect_err("same id");

        assert!(matches!(
            error,
            RepositoryError::DuplicateRequest { ref request_id } if request_id.0 == "LV-30"
        ));
    }

    #[tokio::test]
    async fn compensatory_leave_holds_its_credit_until_rejected() {
        let pool = setup().await;
        let repo = SqlRequestRepository::new(pool.clone());
        let first = compensatory("LV-40", 16);
        repo.insert(&first).await.expect("credit taken");
        assert!(free_credits(&pool).await.is_empty());

        let error = repo.insert(&compensatory("LV-41", 23)).await.expect_err("credit held");
        assert!(matches!(
            error,
            RepositoryError::CreditUnavailable { worked_on, .. } if worked_on == republic_day()
        ));
        assert!(
            repo.find_by_id(&RequestId("LV-41".into())).await.expect("find").is_none(),
            "refused insert leaves no row behind"
        );

        let rejected = WorkflowEngine::new()
            .apply(&first, Role::Hod, Decision::Reject, Some("release week"))
            .expect("hod rejects");
        let record =
            DecisionRecord::from_outcome(&rejected, Decision::Reject, EmployeeId("H-1".into()));
        repo.apply_update(&rejected.request, &record).await.expect("apply rejection");

        assert_eq!(free_credits(&pool).await, vec![republic_day()]);
        repo.insert(&compensatory("LV-41", 23)).await.expect("credit free again");
    }

    #[tokio::test]
    async fn approval_keeps_the_credit_held() {
        let pool = setup().await;
        let repo = SqlRequestRepository::new(pool.clone());
        let original = compensatory("LV-50", 16);
        repo.insert(&original).await.expect("insert");

        let approved = WorkflowEngine::new()
            .apply(&original, Role::Hod, Decision::Approve, None)
            .expect("hod approves");
        let record =
            DecisionRecord::from_outcome(&approved, Decision::Approve, EmployeeId("H-1".into()));
        repo.apply_update(&approved.request, &record).await.expect("apply approval");

        assert!(free_credits(&pool).await.is_empty());
    }
}
