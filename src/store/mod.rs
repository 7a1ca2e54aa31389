//! Pluggable storage for marketplace state.
//!
//! The [`Store`] trait is the single persistence seam of the crate. Every
//! method that mutates more than one row is one atomic unit: either all of
//! its writes (including the audit record) persist, or none do.
//!
//! - **Postgres** ([`postgres::PgStore`]): one `sqlx` transaction per call,
//!   row locks for read-decide-write commands, and database constraints for
//!   booking overlap and review uniqueness.
//! - **In-memory** ([`memory::InMemoryStore`]): one write lock per call.
//!   Used by tests and the `memory` storage backend.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::audit::AuditRecord;
use crate::domain::{
    DomainError, Educator, EducatorChanges, FavoriteToggle, PayoutAccount, PayoutDetails,
    ProfileChanges, Review, Session, SessionStatus, Settlement, SettlementOutcome, Student,
    Subject, Transaction, User, VerificationStatus,
};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store handle shared by the API layer and the command handlers
pub type SharedStore = Arc<dyn Store>;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness or exclusion rule enforced by storage was violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A domain rule evaluated inside an atomic store command failed
    #[error(transparent)]
    Rejected(#[from] DomainError),

    /// A stored row could not be mapped back into a domain value
    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn corrupt(table: &'static str, reason: impl ToString) -> Self {
        Self::Corrupt {
            table,
            reason: reason.to_string(),
        }
    }
}

/// Hex SHA-256 of a raw API key, the form in which keys are stored
pub fn hash_api_key(raw_key: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

/// A client application allowed to call the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
    pub is_active: bool,
}

/// Session list filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub student_id: Option<Uuid>,
    pub educator_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        self.student_id.map_or(true, |id| id == session.student_id)
            && self.educator_id.map_or(true, |id| id == session.educator_id)
            && self.status.map_or(true, |status| status == session.status)
    }
}

/// Transaction list filter. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub student_id: Option<Uuid>,
    pub educator_id: Option<Uuid>,
}

impl TransactionFilter {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.student_id.map_or(true, |id| id == transaction.student_id)
            && self.educator_id.map_or(true, |id| id == transaction.educator_id)
    }
}

/// Result of a compare-and-swap on a session's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasResult {
    Success,
    NotFound,
    StatusMismatch { actual: SessionStatus },
}

impl CasResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- API clients ---

    /// Look up an API key by the hex SHA-256 of its secret
    async fn find_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKeyRecord>>;

    // --- Identity & profiles ---

    /// Insert a user with its student profile. Duplicate email → `Conflict`.
    async fn register_student(
        &self,
        user: &User,
        student: &Student,
        audit: &AuditRecord,
    ) -> StoreResult<()>;

    /// Insert a user with its educator profile and taught subjects.
    /// Duplicate email → `Conflict`.
    async fn register_educator(
        &self,
        user: &User,
        educator: &Educator,
        subject_ids: &[Uuid],
        audit: &AuditRecord,
    ) -> StoreResult<()>;

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>>;

    async fn get_student(&self, student_id: Uuid) -> StoreResult<Option<Student>>;

    async fn get_student_by_user(&self, user_id: Uuid) -> StoreResult<Option<Student>>;

    async fn get_educator(&self, educator_id: Uuid) -> StoreResult<Option<Educator>>;

    async fn get_educator_by_user(&self, user_id: Uuid) -> StoreResult<Option<Educator>>;

    /// Verified educators, optionally only those teaching `subject_id`
    async fn list_verified_educators(&self, subject_id: Option<Uuid>)
        -> StoreResult<Vec<Educator>>;

    /// Apply a user's own profile edits (see [`User::with_profile`]).
    /// `None` if the user is unknown.
    async fn update_user_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
        audit: AuditRecord,
    ) -> StoreResult<Option<User>>;

    /// Apply an educator's own profile edits (see [`Educator::with_profile`]).
    /// `None` if the educator is unknown.
    async fn update_educator_profile(
        &self,
        educator_id: Uuid,
        changes: &EducatorChanges,
        audit: AuditRecord,
    ) -> StoreResult<Option<Educator>>;

    /// Trust/ops decision on an educator. `None` if the educator is unknown.
    async fn set_educator_verification(
        &self,
        educator_id: Uuid,
        status: VerificationStatus,
        audit: AuditRecord,
    ) -> StoreResult<Option<Educator>>;

    // --- Catalog ---

    async fn create_subject(&self, subject: &Subject, audit: &AuditRecord) -> StoreResult<()>;

    async fn get_subject(&self, subject_id: Uuid) -> StoreResult<Option<Subject>>;

    /// All subjects ordered by name
    async fn list_subjects(&self) -> StoreResult<Vec<Subject>>;

    async fn educator_subject_ids(&self, educator_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn educator_teaches(&self, educator_id: Uuid, subject_id: Uuid) -> StoreResult<bool>;

    /// Add the subject to the student's favorites, or remove it if present
    async fn toggle_favorite(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
        audit: AuditRecord,
    ) -> StoreResult<FavoriteToggle>;

    async fn favorite_subjects(&self, student_id: Uuid) -> StoreResult<Vec<Subject>>;

    // --- Sessions ---

    /// Insert a booking. If the educator already has a pending or confirmed
    /// session overlapping its interval → `Conflict`, nothing written.
    async fn insert_session(&self, session: &Session, audit: &AuditRecord) -> StoreResult<()>;

    async fn get_session(&self, session_id: Uuid) -> StoreResult<Option<Session>>;

    /// Matching sessions, newest start first
    async fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>>;

    /// Replace the session with `updated` if its stored status is still
    /// `expected`.
    async fn cas_session(
        &self,
        updated: &Session,
        expected: SessionStatus,
        audit: &AuditRecord,
    ) -> StoreResult<CasResult>;

    // --- Reviews ---

    /// Insert a review. A session that is not completed, or already has a
    /// review → `Rejected(NotEligible)`, nothing written.
    async fn insert_review(&self, review: &Review, audit: &AuditRecord) -> StoreResult<()>;

    async fn get_review_for_session(&self, session_id: Uuid) -> StoreResult<Option<Review>>;

    /// Reviews of the educator's completed sessions, newest first
    async fn list_reviews_for_educator(&self, educator_id: Uuid) -> StoreResult<Vec<Review>>;

    // --- Ledger ---

    async fn insert_transaction(
        &self,
        transaction: &Transaction,
        audit: &AuditRecord,
    ) -> StoreResult<()>;

    async fn get_transaction(&self, transaction_id: Uuid) -> StoreResult<Option<Transaction>>;

    /// Matching transactions, newest first
    async fn list_transactions(&self, filter: &TransactionFilter)
        -> StoreResult<Vec<Transaction>>;

    /// Remember the gateway's identifier for a still-pending transaction
    async fn record_gateway_reference(
        &self,
        transaction_id: Uuid,
        gateway_reference: &str,
    ) -> StoreResult<()>;

    /// Apply a gateway outcome to a transaction and reconcile its session,
    /// as one atomic unit (see [`Settlement::plan`]). The audit record's
    /// before/after states are filled in by the store.
    async fn settle_transaction(
        &self,
        transaction_id: Uuid,
        outcome: &SettlementOutcome,
        audit: AuditRecord,
    ) -> StoreResult<Settlement>;

    /// Create-or-replace the educator's payout account (see
    /// [`PayoutAccount::upsert`]).
    async fn upsert_payout_account(
        &self,
        educator_id: Uuid,
        details: &PayoutDetails,
        audit: AuditRecord,
    ) -> StoreResult<PayoutAccount>;

    async fn get_payout_account(&self, educator_id: Uuid) -> StoreResult<Option<PayoutAccount>>;

    /// Trust/ops approval of payout details. `None` if there is no account.
    async fn verify_payout_account(
        &self,
        educator_id: Uuid,
        audit: AuditRecord,
    ) -> StoreResult<Option<PayoutAccount>>;

    // --- Audit ---

    /// Most recent audit records first
    async fn recent_audit(&self, limit: i64) -> StoreResult<Vec<AuditRecord>>;
}
