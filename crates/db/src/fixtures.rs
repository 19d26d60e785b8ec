use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Expected state of every seeded request after a load.
const SEED_REQUESTS: &[SeedRequestContract] = &[
    SeedRequestContract {
        request_id: "LV-DEMO-001",
        request_type: "leave",
        status: "in_progress",
        active_stage: Some("hod"),
        decision_count: 0,
        description: "Casual leave awaiting the department head",
    },
    SeedRequestContract {
        request_id: "OD-DEMO-001",
        request_type: "od",
        status: "in_progress",
        active_stage: Some("ceo"),
        decision_count: 1,
        description: "On-duty request approved by the department head, awaiting the CEO",
    },
    SeedRequestContract {
        request_id: "OT-DEMO-001",
        request_type: "ot",
        status: "rejected",
        active_stage: None,
        decision_count: 1,
        description: "Overtime claim rejected at the department head with remarks",
    },
    SeedRequestContract {
        request_id: "PM-DEMO-001",
        request_type: "punch_missed",
        status: "completed",
        active_stage: None,
        decision_count: 3,
        description: "Punch correction approved by head, admin, then CEO",
    },
];

const SEED_EMPLOYEE_IDS: &[&str] = &["E-100", "E-101", "E-300", "H-ENG", "H-OPS", "C-001", "A-001"];

const SEED_AUDIT_EVENT_IDS: &[&str] = &["ae-demo-001", "ae-demo-002"];

/// Deterministic demo data: employees for every role plus one request per type.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let requests_seeded = SEED_REQUESTS
            .iter()
            .map(|seed| SeedRequestInfo {
                request_id: seed.request_id,
                request_type: seed.request_type,
                description: seed.description,
            })
            .collect();

        Ok(SeedResult { employees_seeded: SEED_EMPLOYEE_IDS.len(), requests_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let employee_list = sql_array_from_ids(SEED_EMPLOYEE_IDS);
        let employees: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM employee WHERE id IN {employee_list}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("employees", employees == SEED_EMPLOYEE_IDS.len() as i64));

        let audit_list = sql_array_from_ids(SEED_AUDIT_EVENT_IDS);
        let audits: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM audit_event WHERE id IN {audit_list}"
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("audit-events", audits == SEED_AUDIT_EVENT_IDS.len() as i64));

        for seed in SEED_REQUESTS {
            let state_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM workflow_request
                    WHERE id = ?1 AND request_type = ?2 AND status = ?3
                      AND active_stage IS ?4
                 )",
            )
            .bind(seed.request_id)
            .bind(seed.request_type)
            .bind(seed.status)
            .bind(seed.active_stage)
            .fetch_one(pool)
            .await?;
            checks.push((seed.request_id, state_ok == 1));

            let decisions: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM request_decision WHERE request_id = ?1")
                    .bind(seed.request_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((seed.history_label(), decisions == seed.decision_count));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes every seeded row, children first.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let request_ids = SEED_REQUESTS.iter().map(|seed| seed.request_id).collect::<Vec<_>>();
        let quoted_requests = sql_array_from_ids(&request_ids);
        let quoted_employees = sql_array_from_ids(SEED_EMPLOYEE_IDS);
        let quoted_audits = sql_array_from_ids(SEED_AUDIT_EVENT_IDS);

        let mut tx = pool.begin().await?;
        sqlx::query(&format!("DELETE FROM audit_event WHERE id IN {quoted_audits}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "DELETE FROM request_decision WHERE request_id IN {quoted_requests}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM workflow_request WHERE id IN {quoted_requests}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "DELETE FROM compensatory_credit WHERE employee_id IN {quoted_employees}"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!("DELETE FROM employee WHERE id IN {quoted_employees}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRequestContract {
    request_id: &'static str,
    request_type: &'static str,
    status: &'static str,
    active_stage: Option<&'static str>,
    decision_count: i64,
    description: &'static str,
}

impl SeedRequestContract {
    fn history_label(&self) -> &'static str {
        match self.request_type {
            "leave" => "leave-history",
            "od" => "od-history",
            "ot" => "ot-history",
            _ => "punch-missed-history",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRequestInfo {
    pub request_id: &'static str,
    pub request_type: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub employees_seeded: usize,
    pub requests_seeded: Vec<SeedRequestInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ");
    format!("({quoted})")
}

#[cfg(test)]
mod tests {
    use hrflow_core::domain::employee::{EmployeeId, Role};
    use hrflow_core::domain::request::RequestId;
    use hrflow_core::workflow::sequence::outcome;
    use hrflow_core::workflow::states::{RequestOutcome, Stage};

    use super::DemoDataset;
    use crate::repositories::{
        IdentityProvider, RequestRepository, SqlEmployeeDirectory, SqlRequestRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = pool().await;

        let first = DemoDataset::load(&pool).await.expect("first load");
        DemoDataset::load(&pool).await.expect("second load");

        assert_eq!(first.requests_seeded.len(), 4);
        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);
    }

    #[tokio::test]
    async fn seeded_rows_decode_through_repositories() {
        let pool = pool().await;
        DemoDataset::load(&pool).await.expect("load");

        let requests = SqlRequestRepository::new(pool.clone());
        let od = requests
            .find_by_id(&RequestId("OD-DEMO-001".into()))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(outcome(&od), RequestOutcome::InProgress { active_stage: Stage::Ceo });
        assert_eq!(requests.history(&od.id).await.expect("history").len(), 1);

        let directory = SqlEmployeeDirectory::new(pool);
        let hod = directory
            .resolve(&EmployeeId("H-ENG".into()))
            .await
            .expect("resolve")
            .expect("present");
        assert_eq!(hod.actor.role, Role::Hod);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = pool().await;
        DemoDataset::load(&pool).await.expect("load");

        DemoDataset::clean(&pool).await.expect("clean");

        let verification = DemoDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert!(verification
            .checks
            .iter()
            .filter(|(label, _)| label.contains("DEMO"))
            .all(|(_, ok)| !ok));
    }
}
