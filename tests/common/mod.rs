//! Common test utilities
//!
//! Every API test gets its own in-memory store seeded with API keys, an
//! admin, two students and one verified educator teaching one subject.
//! Postgres store tests share the database named by `DATABASE_URL`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::util::ServiceExt;
use uuid::Uuid;

use tutor_market::domain::{Actor, OperationContext, Role, User, VerificationStatus};
use tutor_market::gateway::GatewayKind;
use tutor_market::handlers::{
    CreateSubjectCommand, CreateSubjectHandler, RegisterEducatorCommand, RegisterEducatorHandler,
    RegisterStudentCommand, RegisterStudentHandler, SetEducatorVerificationCommand,
    SetEducatorVerificationHandler,
};
use tutor_market::{build_router, db, AppState, InMemoryStore, SharedStore};

/// Key with every permission
pub const API_KEY: &str = "test_key_123";
/// Key for a client app without the gateway permission
pub const APP_KEY: &str = "app_key_456";
/// Key used by the payment gateway callback
pub const GATEWAY_KEY: &str = "gateway_key_789";
pub const DISABLED_KEY: &str = "disabled_key_000";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub admin_user_id: Uuid,
    pub student_user_id: Uuid,
    pub other_student_user_id: Uuid,
    pub educator_user_id: Uuid,
    pub educator_id: Uuid,
    pub subject_id: Uuid,
}

/// Pool for the migrated test database, or `None` when `DATABASE_URL` is
/// not set so database tests can be skipped.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    assert!(
        db::check_schema(&pool).await.expect("Failed to inspect schema"),
        "apply migrations/0001_initial.sql to the test database first"
    );
    Some(pool)
}

/// Build the app around a freshly seeded store
pub async fn setup(gateway: GatewayKind) -> TestApp {
    let memory = Arc::new(InMemoryStore::new());
    let store: SharedStore = memory.clone();

    memory.insert_api_key(API_KEY, "Test Key", &["admin"]).unwrap();
    memory.insert_api_key(APP_KEY, "Web App", &["read", "write"]).unwrap();
    memory.insert_api_key(GATEWAY_KEY, "Gateway", &["gateway"]).unwrap();
    let disabled = memory.insert_api_key(DISABLED_KEY, "Old Key", &["admin"]).unwrap();
    memory.disable_api_key(disabled.id).unwrap();

    let admin = User::register(
        "ops@tutor.test",
        "Ops".to_string(),
        "Team".to_string(),
        None,
        Role::Admin,
        Utc::now(),
    )
    .unwrap();
    memory.insert_admin(&admin).unwrap();
    let admin_ctx = OperationContext::new().with_actor(Actor::Admin { user_id: admin.id });

    let subject = CreateSubjectHandler::new(store.clone())
        .execute(
            CreateSubjectCommand::new("Mathematics".to_string())
                .with_description("Algebra and calculus".to_string()),
            &admin_ctx,
        )
        .await
        .unwrap();

    let students = RegisterStudentHandler::new(store.clone());
    let student = students
        .execute(
            RegisterStudentCommand::new(
                "sam@student.test".to_string(),
                "Sam".to_string(),
                "Doe".to_string(),
            ),
            &OperationContext::new(),
        )
        .await
        .unwrap();
    let other_student = students
        .execute(
            RegisterStudentCommand::new(
                "alex@student.test".to_string(),
                "Alex".to_string(),
                "Roe".to_string(),
            ),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    let educator = RegisterEducatorHandler::new(store.clone())
        .execute(
            RegisterEducatorCommand::new(
                "grace@tutor.test".to_string(),
                "Grace".to_string(),
                "Hopper".to_string(),
                "PhD Mathematics".to_string(),
                "40.00".to_string(),
            )
            .with_subjects(vec![subject.id]),
            &OperationContext::new(),
        )
        .await
        .unwrap();

    SetEducatorVerificationHandler::new(store.clone())
        .execute(
            SetEducatorVerificationCommand::new(educator.profile_id, VerificationStatus::Verified),
            &admin_ctx,
        )
        .await
        .unwrap();

    let router = build_router(AppState::new(store, gateway.build()));

    TestApp {
        router,
        store: memory,
        admin_user_id: admin.id,
        student_user_id: student.user.id,
        other_student_user_id: other_student.user.id,
        educator_user_id: educator.user.id,
        educator_id: educator.profile_id,
        subject_id: subject.id,
    }
}

impl TestApp {
    /// Send a request with the all-permissions key
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.call_with_key(API_KEY, method, uri, user_id, body).await
    }

    pub async fn call_with_key(
        &self,
        api_key: &str,
        method: &str,
        uri: &str,
        user_id: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("/api/v1{}", uri))
            .header("X-API-Key", api_key);
        if let Some(user_id) = user_id {
            builder = builder.header("X-Request-User-Id", user_id.to_string());
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    /// Send a prebuilt request and decode the JSON body, if any
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    /// Book 2030-01-07 from `start` to `end` (HH:MM) as the main student
    pub async fn book(&self, start: &str, end: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            "/sessions",
            Some(self.student_user_id),
            Some(serde_json::json!({
                "educator_id": self.educator_id,
                "subject_id": self.subject_id,
                "start_time": format!("2030-01-07T{}:00Z", start),
                "end_time": format!("2030-01-07T{}:00Z", end),
            })),
        )
        .await
    }

    /// Move a session to `status` as the educator
    pub async fn transition(&self, session_id: &str, status: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            &format!("/sessions/{}/status", session_id),
            Some(self.educator_user_id),
            Some(serde_json::json!({ "status": status })),
        )
        .await
    }
}
