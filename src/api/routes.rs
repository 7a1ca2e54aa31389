//! API Routes
//!
//! HTTP endpoint definitions. Commands go through the handlers; read-only
//! queries go straight to the store, scoped to the acting user.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditRecord;
use crate::domain::{
    Actor, DomainError, Educator, Money, OperationContext, PayoutAccount, PayoutDetails, Review,
    Session, SessionStatus, Settlement, SettlementOutcome, Student, Subject, Transaction, User,
    VerificationStatus,
};
use crate::error::AppError;
use crate::handlers::{
    require_admin, AttachReviewCommand, AttachReviewHandler, BookSessionCommand,
    BookSessionHandler, CreatePaymentCommand, CreatePaymentHandler, CreateSubjectCommand,
    CreateSubjectHandler, PaymentResult, RegisterEducatorCommand, RegisterEducatorHandler,
    RegisterStudentCommand, RegisterStudentHandler, RegistrationResult, SavePayoutAccountCommand,
    SavePayoutAccountHandler, SetEducatorVerificationCommand, SetEducatorVerificationHandler,
    SettlePaymentCommand, SettlePaymentHandler, ToggleFavoriteCommand, ToggleFavoriteHandler,
    TransitionSessionCommand, TransitionSessionHandler, UpdateEducatorProfileCommand,
    UpdateEducatorProfileHandler, UpdateProfileCommand, UpdateProfileHandler,
    VerifyPayoutAccountCommand, VerifyPayoutAccountHandler,
};
use crate::store::{SessionFilter, Store, TransactionFilter};

use super::middleware::AuthenticatedApiKey;
use super::AppState;

/// Permission a client needs to report payment outcomes
pub const GATEWAY_PERMISSION: &str = "gateway";

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterStudentRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterEducatorRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    pub degree: String,
    pub hourly_rate: String,
    #[serde(default)]
    pub subject_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEducatorProfileRequest {
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub hourly_rate: Option<String>,
}

/// Public view of an educator
#[derive(Debug, Serialize)]
pub struct EducatorResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub degree: String,
    pub hourly_rate: Decimal,
    pub verification_status: VerificationStatus,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<Student>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub educator: Option<EducatorResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_subjects: Option<Vec<Subject>>,
}

#[derive(Debug, Deserialize)]
pub struct EducatorsQuery {
    #[serde(default)]
    pub subject_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubjectDetailResponse {
    #[serde(flatten)]
    pub subject: Subject,
    pub educators: Vec<EducatorResponse>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub subject_id: Uuid,
    pub is_favorite: bool,
}

#[derive(Debug, Deserialize)]
pub struct BookSessionRequest {
    pub educator_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Session with its derived fields and review
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub duration_minutes: i64,
    /// Priced at the educator's current hourly rate; null if the session
    /// cannot be priced
    pub session_cost: Option<Money>,
    pub review: Option<Review>,
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: SessionStatus,
    #[serde(default)]
    pub meeting_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: serde_json::Number,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub session_id: Uuid,
    pub payment_method: String,
}

/// Payout account with the account number masked
#[derive(Debug, Serialize)]
pub struct PayoutAccountResponse {
    pub id: Uuid,
    pub educator_id: Uuid,
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    pub bank_code: String,
    pub is_verified: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<PayoutAccount> for PayoutAccountResponse {
    fn from(account: PayoutAccount) -> Self {
        Self {
            account_number: account.masked_account_number(),
            id: account.id,
            educator_id: account.educator_id,
            account_name: account.details.account_name,
            bank_name: account.details.bank_name,
            bank_code: account.details.bank_code,
            is_verified: account.is_verified,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub status: VerificationStatus,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Users
        .route("/users/register", post(register_student))
        .route("/users/register/educator", post(register_educator))
        .route("/users/profile", get(get_profile).patch(update_profile))
        .route("/users/profile/educator", patch(update_educator_profile))
        .route("/users/educators", get(list_educators))
        .route("/users/educators/:educator_id", get(get_educator))
        // Catalog
        .route("/subjects", get(list_subjects))
        .route("/subjects/:subject_id", get(get_subject))
        .route("/subjects/:subject_id/favorite", put(toggle_favorite))
        // Sessions
        .route("/sessions", post(book_session))
        .route("/sessions/mine", get(list_my_sessions))
        .route("/sessions/:session_id", get(get_session))
        .route("/sessions/:session_id/status", post(transition_session))
        .route("/sessions/:session_id/review", post(attach_review))
        .route("/sessions/educator/:educator_id/reviews", get(list_educator_reviews))
        // Payments
        .route("/payments", post(create_payment))
        .route("/payments/transactions", get(list_transactions))
        .route("/payments/transactions/:transaction_id", get(get_transaction))
        .route("/payments/transactions/:transaction_id/settle", post(settle_payment))
        .route(
            "/payments/payout-account",
            put(save_payout_account).get(get_payout_account),
        )
        // Trust & ops
        .route("/admin/subjects", post(create_subject))
        .route(
            "/admin/educators/:educator_id/verification",
            patch(set_educator_verification),
        )
        .route(
            "/admin/payout-accounts/:educator_id/verify",
            post(verify_payout_account),
        )
        .route("/admin/audit", get(list_audit))
}

/// Build the public view of an educator
async fn educator_response(
    store: &dyn Store,
    educator: Educator,
) -> Result<EducatorResponse, AppError> {
    let user = store
        .get_user(educator.user_id)
        .await?
        .ok_or_else(|| DomainError::not_found("user", educator.user_id))?;

    let mut subjects = Vec::new();
    for subject_id in store.educator_subject_ids(educator.id).await? {
        if let Some(subject) = store.get_subject(subject_id).await? {
            subjects.push(subject);
        }
    }
    subjects.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(EducatorResponse {
        id: educator.id,
        user_id: educator.user_id,
        first_name: user.first_name,
        last_name: user.last_name,
        bio: user.bio,
        degree: educator.degree,
        hourly_rate: educator.hourly_rate.value(),
        verification_status: educator.verification_status,
        subjects,
    })
}

/// Attach the derived fields and the review to a session
async fn session_response(store: &dyn Store, session: Session) -> Result<SessionResponse, AppError> {
    let educator = store
        .get_educator(session.educator_id)
        .await?
        .ok_or_else(|| DomainError::not_found("educator", session.educator_id))?;
    let review = store.get_review_for_session(session.id).await?;

    Ok(SessionResponse {
        duration_minutes: session.duration_minutes(),
        session_cost: session.cost(&educator.hourly_rate).ok(),
        review,
        session,
    })
}

/// Ratings must be whole numbers; anything else is an invalid rating
fn rating_value(number: &serde_json::Number) -> Result<i64, DomainError> {
    number
        .as_i64()
        .ok_or_else(|| DomainError::InvalidRating(number.to_string()))
}

// =========================================================================
// POST /users/register, POST /users/register/educator
// =========================================================================

/// Register a student
async fn register_student(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<RegisterStudentRequest>,
) -> Result<(StatusCode, Json<RegistrationResult>), AppError> {
    let handler = RegisterStudentHandler::new(state.store);

    let command = RegisterStudentCommand::new(request.email, request.first_name, request.last_name);
    let command = match request.bio {
        Some(bio) => command.with_bio(bio),
        None => command,
    };

    let result = handler.execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Register an educator. New educators await verification.
async fn register_educator(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<RegisterEducatorRequest>,
) -> Result<(StatusCode, Json<RegistrationResult>), AppError> {
    let handler = RegisterEducatorHandler::new(state.store);

    let command = RegisterEducatorCommand::new(
        request.email,
        request.first_name,
        request.last_name,
        request.degree,
        request.hourly_rate,
    )
    .with_subjects(request.subject_ids);
    let command = match request.bio {
        Some(bio) => command.with_bio(bio),
        None => command,
    };

    let result = handler.execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

// =========================================================================
// GET /users/profile, /users/educators, /users/educators/:educator_id
// =========================================================================

/// Profile of the acting user
async fn get_profile(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<ProfileResponse>, AppError> {
    let actor = *context.actor()?;
    let store = state.store.as_ref();

    let user = store
        .get_user(actor.user_id())
        .await?
        .ok_or_else(|| DomainError::not_found("user", actor.user_id()))?;

    let mut profile = ProfileResponse {
        user,
        student: None,
        educator: None,
        favorite_subjects: None,
    };

    match actor {
        Actor::Student { student_id, .. } => {
            profile.student = store.get_student(student_id).await?;
            profile.favorite_subjects = Some(store.favorite_subjects(student_id).await?);
        }
        Actor::Educator { educator_id, .. } => {
            if let Some(educator) = store.get_educator(educator_id).await? {
                profile.educator = Some(educator_response(store, educator).await?);
            }
        }
        Actor::Admin { .. } => {}
    }

    Ok(Json(profile))
}

/// Edit the acting user's names or bio
async fn update_profile(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let handler = UpdateProfileHandler::new(state.store);

    let mut command = UpdateProfileCommand::new();
    if let Some(first_name) = request.first_name {
        command = command.with_first_name(first_name);
    }
    if let Some(last_name) = request.last_name {
        command = command.with_last_name(last_name);
    }
    if let Some(bio) = request.bio {
        command = command.with_bio(bio);
    }

    Ok(Json(handler.execute(command, &context).await?))
}

/// Edit the acting educator's degree or hourly rate. A new rate prices
/// every payment made from now on.
async fn update_educator_profile(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<UpdateEducatorProfileRequest>,
) -> Result<Json<EducatorResponse>, AppError> {
    let handler = UpdateEducatorProfileHandler::new(state.store.clone());

    let mut command = UpdateEducatorProfileCommand::new();
    if let Some(degree) = request.degree {
        command = command.with_degree(degree);
    }
    if let Some(hourly_rate) = request.hourly_rate {
        command = command.with_hourly_rate(hourly_rate);
    }

    let educator = handler.execute(command, &context).await?;
    Ok(Json(educator_response(state.store.as_ref(), educator).await?))
}

/// Verified educators, optionally only those teaching a subject
async fn list_educators(
    State(state): State<AppState>,
    Query(query): Query<EducatorsQuery>,
) -> Result<Json<Vec<EducatorResponse>>, AppError> {
    let store = state.store.as_ref();
    let mut educators = Vec::new();
    for educator in store.list_verified_educators(query.subject_id).await? {
        educators.push(educator_response(store, educator).await?);
    }
    Ok(Json(educators))
}

/// Educator detail. Unverified educators are visible only to themselves
/// and admins.
async fn get_educator(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(educator_id): Path<Uuid>,
) -> Result<Json<EducatorResponse>, AppError> {
    let store = state.store.as_ref();
    let educator = store
        .get_educator(educator_id)
        .await?
        .filter(|e| {
            e.is_bookable()
                || match context.actor.as_ref() {
                    Some(Actor::Admin { .. }) => true,
                    Some(Actor::Educator { educator_id, .. }) => *educator_id == e.id,
                    _ => false,
                }
        })
        .ok_or_else(|| DomainError::not_found("educator", educator_id))?;

    Ok(Json(educator_response(store, educator).await?))
}

// =========================================================================
// Catalog
// =========================================================================

async fn list_subjects(State(state): State<AppState>) -> Result<Json<Vec<Subject>>, AppError> {
    Ok(Json(state.store.list_subjects().await?))
}

/// Subject with the verified educators teaching it
async fn get_subject(
    State(state): State<AppState>,
    Path(subject_id): Path<Uuid>,
) -> Result<Json<SubjectDetailResponse>, AppError> {
    let store = state.store.as_ref();
    let subject = store
        .get_subject(subject_id)
        .await?
        .ok_or_else(|| DomainError::not_found("subject", subject_id))?;

    let mut educators = Vec::new();
    for educator in store.list_verified_educators(Some(subject_id)).await? {
        educators.push(educator_response(store, educator).await?);
    }

    Ok(Json(SubjectDetailResponse { subject, educators }))
}

/// Toggle a favorite subject for the acting student
async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(subject_id): Path<Uuid>,
) -> Result<Json<FavoriteResponse>, AppError> {
    let handler = ToggleFavoriteHandler::new(state.store);
    let toggle = handler
        .execute(ToggleFavoriteCommand::new(subject_id), &context)
        .await?;

    Ok(Json(FavoriteResponse {
        subject_id,
        is_favorite: toggle.is_favorite(),
    }))
}

/// Admin: add a subject to the catalog
async fn create_subject(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<Subject>), AppError> {
    let handler = CreateSubjectHandler::new(state.store);

    let command = CreateSubjectCommand::new(request.name);
    let command = match request.description {
        Some(description) => command.with_description(description),
        None => command,
    };

    let subject = handler.execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

// =========================================================================
// Sessions
// =========================================================================

/// Book a session for the acting student
async fn book_session(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<BookSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let handler = BookSessionHandler::new(state.store.clone());

    let command = BookSessionCommand::new(
        request.educator_id,
        request.subject_id,
        request.start_time,
        request.end_time,
    );
    let command = match request.notes {
        Some(notes) => command.with_notes(notes),
        None => command,
    };

    let session = handler.execute(command, &context).await?;
    let response = session_response(state.store.as_ref(), session).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Sessions of the acting student or educator, newest start first
async fn list_my_sessions(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<SessionsQuery>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    let mut filter = SessionFilter {
        status: query.status,
        ..SessionFilter::default()
    };
    match context.actor()? {
        Actor::Student { student_id, .. } => filter.student_id = Some(*student_id),
        Actor::Educator { educator_id, .. } => filter.educator_id = Some(*educator_id),
        Actor::Admin { .. } => return Ok(Json(Vec::new())),
    }

    let store = state.store.as_ref();
    let mut sessions = Vec::new();
    for session in store.list_sessions(&filter).await? {
        sessions.push(session_response(store, session).await?);
    }
    Ok(Json(sessions))
}

/// One session, visible to its student, its educator and admins
async fn get_session(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let actor = context.actor()?;
    let session = state
        .store
        .get_session(session_id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", session_id))?;

    if !session.is_visible_to(actor) {
        return Err(DomainError::Forbidden("not a party to this session".to_string()).into());
    }
    Ok(Json(session_response(state.store.as_ref(), session).await?))
}

/// Educator-driven status change
async fn transition_session(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let handler = TransitionSessionHandler::new(state.store.clone());

    let command = TransitionSessionCommand::new(session_id, request.status);
    let command = match request.meeting_link {
        Some(link) => command.with_meeting_link(link),
        None => command,
    };

    let session = handler.execute(command, &context).await?;
    Ok(Json(session_response(state.store.as_ref(), session).await?))
}

/// Review a completed session
async fn attach_review(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let handler = AttachReviewHandler::new(state.store);

    let command = AttachReviewCommand::new(session_id, rating_value(&request.rating)?);
    let command = match request.comment {
        Some(comment) => command.with_comment(comment),
        None => command,
    };

    let review = handler.execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn list_educator_reviews(
    State(state): State<AppState>,
    Path(educator_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>, AppError> {
    state
        .store
        .get_educator(educator_id)
        .await?
        .ok_or_else(|| DomainError::not_found("educator", educator_id))?;

    Ok(Json(state.store.list_reviews_for_educator(educator_id).await?))
}

// =========================================================================
// Payments
// =========================================================================

/// Pay for a session of the acting student
async fn create_payment(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResult>), AppError> {
    let handler = CreatePaymentHandler::new(state.store, state.gateway);

    let result = handler
        .execute(
            CreatePaymentCommand::new(request.session_id, request.payment_method),
            &context,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Transactions of the acting student or educator; admins see all
async fn list_transactions(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let filter = match context.actor()? {
        Actor::Student { student_id, .. } => TransactionFilter {
            student_id: Some(*student_id),
            ..TransactionFilter::default()
        },
        Actor::Educator { educator_id, .. } => TransactionFilter {
            educator_id: Some(*educator_id),
            ..TransactionFilter::default()
        },
        Actor::Admin { .. } => TransactionFilter::default(),
    };

    Ok(Json(state.store.list_transactions(&filter).await?))
}

async fn get_transaction(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    let actor = context.actor()?;
    let transaction = state
        .store
        .get_transaction(transaction_id)
        .await?
        .ok_or_else(|| DomainError::not_found("transaction", transaction_id))?;

    let visible = match actor {
        Actor::Student { student_id, .. } => *student_id == transaction.student_id,
        Actor::Educator { educator_id, .. } => *educator_id == transaction.educator_id,
        Actor::Admin { .. } => true,
    };
    if !visible {
        return Err(DomainError::Forbidden("not a party to this transaction".to_string()).into());
    }
    Ok(Json(transaction))
}

/// Gateway callback reporting the outcome of a payment
async fn settle_payment(
    State(state): State<AppState>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Extension(context): Extension<OperationContext>,
    Path(transaction_id): Path<Uuid>,
    Json(outcome): Json<SettlementOutcome>,
) -> Result<Json<Settlement>, AppError> {
    if !api_key.has_permission(GATEWAY_PERMISSION) {
        tracing::warn!(api_key = %api_key.name, "Settlement attempted without gateway permission");
        return Err(AppError::PermissionDenied);
    }

    let handler = SettlePaymentHandler::new(state.store);
    let settlement = handler
        .execute(SettlePaymentCommand::new(transaction_id, outcome), &context)
        .await?;
    Ok(Json(settlement))
}

/// Create or replace the acting educator's payout account
async fn save_payout_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(details): Json<PayoutDetails>,
) -> Result<Json<PayoutAccountResponse>, AppError> {
    let handler = SavePayoutAccountHandler::new(state.store);
    let account = handler
        .execute(SavePayoutAccountCommand::new(details), &context)
        .await?;
    Ok(Json(account.into()))
}

async fn get_payout_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<PayoutAccountResponse>, AppError> {
    let educator_id = context.actor()?.educator_id()?;
    let account = state
        .store
        .get_payout_account(educator_id)
        .await?
        .ok_or_else(|| DomainError::not_found("payout account", educator_id))?;
    Ok(Json(account.into()))
}

// =========================================================================
// Trust & ops
// =========================================================================

async fn set_educator_verification(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(educator_id): Path<Uuid>,
    Json(request): Json<VerificationRequest>,
) -> Result<Json<Educator>, AppError> {
    let handler = SetEducatorVerificationHandler::new(state.store);
    let educator = handler
        .execute(
            SetEducatorVerificationCommand::new(educator_id, request.status),
            &context,
        )
        .await?;
    Ok(Json(educator))
}

async fn verify_payout_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(educator_id): Path<Uuid>,
) -> Result<Json<PayoutAccountResponse>, AppError> {
    let handler = VerifyPayoutAccountHandler::new(state.store);
    let account = handler
        .execute(VerifyPayoutAccountCommand::new(educator_id), &context)
        .await?;
    Ok(Json(account.into()))
}

/// Most recent audit records, newest first
async fn list_audit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    require_admin(&context)?;
    let limit = query.limit.clamp(1, 500);
    Ok(Json(state.store.recent_audit(limit).await?))
}
