use chrono::{NaiveDate, Utc};

use hrflow_core::domain::employee::{EmployeeId, Role};
use hrflow_core::domain::request::{
    LeaveDetails, LeaveKind, RequestId, RequestPayload, WorkflowRequest,
};
use hrflow_core::workflow::engine::WorkflowEngine;
use hrflow_core::workflow::sequence::{initial_stage_status, outcome};
use hrflow_core::workflow::states::{Decision, RequestOutcome, Stage, StageState};
use hrflow_db::repositories::{
    DecisionRecord, IdentityProvider, PageRequest, RequestFilter, RequestRepository,
    SqlEmployeeDirectory, SqlRequestRepository,
};
use hrflow_db::{connect_with_settings, migrations, DemoDataset};

#[tokio::test]
async fn leave_walks_every_stage_and_records_history() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoDataset::load(&pool).await.expect("seed");

    let directory = SqlEmployeeDirectory::new(pool.clone());
    let requester = directory
        .resolve(&EmployeeId("E-100".into()))
        .await
        .expect("resolve")
        .expect("seeded employee");

    let payload = RequestPayload::Leave(LeaveDetails {
        leave_kind: LeaveKind::Casual,
        from_date: NaiveDate::from_ymd_opt(2026, 4, 6).expect("date"),
        to_date: NaiveDate::from_ymd_opt(2026, 4, 7).expect("date"),
        reason: "moving house".to_string(),
        certificate_ref: None,
        compensated_for: None,
    });
    let now = Utc::now();
    let request = WorkflowRequest {
        id: RequestId("LV-IT-001".to_string()),
        requester_id: requester.actor.user_id.clone(),
        department_id: requester.actor.department_id.clone(),
        request_type: payload.request_type(),
        stage_status: initial_stage_status(payload.request_type(), requester.actor.role),
        payload,
        remarks: None,
        created_at: now,
        updated_at: now,
    };

    let store = SqlRequestRepository::new(pool);
    store.insert(&request).await.expect("insert");

    let engine = WorkflowEngine::new();
    let mut current = request;
    for (role, actor) in [(Role::Hod, "H-ENG"), (Role::Ceo, "C-001"), (Role::Admin, "A-001")] {
        let decided = engine.apply(&current, role, Decision::Approve, None).expect("approve");
        let record =
            DecisionRecord::from_outcome(&decided, Decision::Approve, EmployeeId(actor.into()));
        store.apply_update(&decided.request, &record).await.expect("persist");
        current = store.find_by_id(&current.id).await.expect("find").expect("present");
    }

    assert_eq!(outcome(&current), RequestOutcome::Completed);
    assert_eq!(current.stage_status.admin, StageState::Approved);

    let history = store.history(&current.id).await.expect("history");
    let stages = history.iter().map(|record| record.stage).collect::<Vec<_>>();
    assert_eq!(stages, vec![Stage::Hod, Stage::Ceo, Stage::Admin]);

    let mine = store
        .list(
            &RequestFilter {
                employee_id: Some(EmployeeId("E-100".into())),
                ..RequestFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .expect("list");
    assert_eq!(mine.total, 2, "seeded leave plus the new one");
}
