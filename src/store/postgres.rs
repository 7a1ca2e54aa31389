//! PostgreSQL store
//!
//! Each mutating call runs in its own `sqlx` transaction. Read-decide-write
//! commands lock the rows they decide on (`SELECT ... FOR UPDATE`); booking
//! overlap and one-review-per-session are additionally enforced by schema
//! constraints (see `migrations/0001_initial.sql`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use uuid::Uuid;

use super::{
    ApiKeyRecord, CasResult, SessionFilter, Store, StoreError, StoreResult, TransactionFilter,
};
use crate::audit::AuditRecord;
use crate::domain::{
    DomainError, Educator, EducatorChanges, FavoriteToggle, HourlyRate, Money, PayoutAccount,
    PayoutDetails, ProfileChanges, Rating, Review, Session, SessionStatus, Settlement,
    SettlementOutcome, Student, Subject, Transaction, User, VerificationStatus,
};

/// SQLSTATE unique_violation
const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE exclusion_violation
const EXCLUSION_VIOLATION: &str = "23P01";
/// SQLSTATE string_data_right_truncation
const STRING_TOO_LONG: &str = "22001";

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, bio, user_type, is_verified, date_joined";
const EDUCATOR_COLUMNS: &str =
    "id, user_id, degree, hourly_rate, verification_status, contract_signed";
const SESSION_COLUMNS: &str = "id, student_id, educator_id, subject_id, start_time, end_time, \
     status, meeting_link, session_notes, created_at, updated_at";
const REVIEW_COLUMNS: &str = "id, session_id, rating, comment, created_at";
const TRANSACTION_COLUMNS: &str = "id, session_id, student_id, educator_id, amount, \
     transaction_type, status, gateway_reference, payment_method, created_at, updated_at";
const PAYOUT_COLUMNS: &str = "id, educator_id, account_name, account_number, bank_name, \
     bank_code, is_verified, created_at, updated_at";
const AUDIT_COLUMNS: &str = "id, action, resource_type, resource_id, actor_user_id, api_key_id, \
     correlation_id, before_state, after_state, created_at";

// =========================================================================
// Row mapping
// =========================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    bio: Option<String>,
    user_type: String,
    is_verified: bool,
    date_joined: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            bio: row.bio,
            role: row
                .user_type
                .parse()
                .map_err(|e| StoreError::corrupt("users", e))?,
            is_verified: row.is_verified,
            date_joined: row.date_joined,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EducatorRow {
    id: Uuid,
    user_id: Uuid,
    degree: String,
    hourly_rate: Decimal,
    verification_status: String,
    contract_signed: bool,
}

impl TryFrom<EducatorRow> for Educator {
    type Error = StoreError;

    fn try_from(row: EducatorRow) -> Result<Self, Self::Error> {
        Ok(Educator {
            id: row.id,
            user_id: row.user_id,
            degree: row.degree,
            hourly_rate: HourlyRate::from_stored(row.hourly_rate)
                .map_err(|e| StoreError::corrupt("educators", e))?,
            verification_status: row
                .verification_status
                .parse()
                .map_err(|e| StoreError::corrupt("educators", e))?,
            contract_signed: row.contract_signed,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    student_id: Uuid,
    educator_id: Uuid,
    subject_id: Uuid,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    meeting_link: Option<String>,
    session_notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            student_id: row.student_id,
            educator_id: row.educator_id,
            subject_id: row.subject_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::corrupt("sessions", e))?,
            meeting_link: row.meeting_link,
            session_notes: row.session_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    session_id: Uuid,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Review {
            id: row.id,
            session_id: row.session_id,
            rating: Rating::new(i64::from(row.rating))
                .map_err(|e| StoreError::corrupt("reviews", e))?,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    session_id: Uuid,
    student_id: Uuid,
    educator_id: Uuid,
    amount: Decimal,
    transaction_type: String,
    status: String,
    gateway_reference: Option<String>,
    payment_method: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            session_id: row.session_id,
            student_id: row.student_id,
            educator_id: row.educator_id,
            amount: Money::new(row.amount).map_err(|e| StoreError::corrupt("transactions", e))?,
            transaction_type: row
                .transaction_type
                .parse()
                .map_err(|e| StoreError::corrupt("transactions", e))?,
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::corrupt("transactions", e))?,
            gateway_reference: row.gateway_reference,
            payment_method: row.payment_method,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PayoutRow {
    id: Uuid,
    educator_id: Uuid,
    account_name: String,
    account_number: String,
    bank_name: String,
    bank_code: String,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PayoutRow> for PayoutAccount {
    fn from(row: PayoutRow) -> Self {
        PayoutAccount {
            id: row.id,
            educator_id: row.educator_id,
            details: PayoutDetails {
                account_name: row.account_name,
                account_number: row.account_number,
                bank_name: row.bank_name,
                bank_code: row.bank_code,
            },
            is_verified: row.is_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    action: String,
    resource_type: String,
    resource_id: Uuid,
    actor_user_id: Option<Uuid>,
    api_key_id: Option<Uuid>,
    correlation_id: Option<Uuid>,
    before_state: Option<serde_json::Value>,
    after_state: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditRecord {
    fn from(row: AuditRow) -> Self {
        AuditRecord {
            id: row.id,
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            actor_user_id: row.actor_user_id,
            api_key_id: row.api_key_id,
            correlation_id: row.correlation_id,
            before_state: row.before_state,
            after_state: row.after_state,
            created_at: row.created_at,
        }
    }
}

fn collect<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Turn constraint violations into `Conflict` and oversize text into
/// `InvalidRequest`, keep everything else as a database error.
fn map_constraint(err: sqlx::Error, conflict: impl FnOnce() -> String) -> StoreError {
    match &err {
        sqlx::Error::Database(db)
            if matches!(
                db.code().as_deref(),
                Some(UNIQUE_VIOLATION) | Some(EXCLUSION_VIOLATION)
            ) =>
        {
            StoreError::Conflict(conflict())
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some(STRING_TOO_LONG) => {
            StoreError::Rejected(DomainError::InvalidRequest(db.message().to_string()))
        }
        _ => StoreError::Database(err),
    }
}

async fn insert_audit(
    tx: &mut PgTransaction<'_, Postgres>,
    record: &AuditRecord,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (
            id, action, resource_type, resource_id, actor_user_id,
            api_key_id, correlation_id, before_state, after_state, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(record.id)
    .bind(&record.action)
    .bind(&record.resource_type)
    .bind(record.resource_id)
    .bind(record.actor_user_id)
    .bind(record.api_key_id)
    .bind(record.correlation_id)
    .bind(&record.before_state)
    .bind(&record.after_state)
    .bind(record.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_user(tx: &mut PgTransaction<'_, Postgres>, user: &User) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, first_name, last_name, bio, user_type, is_verified, date_joined)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.bio)
    .bind(user.role.as_str())
    .bind(user.is_verified)
    .bind(user.date_joined)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_constraint(e, || format!("email {} is already registered", user.email)))?;

    Ok(())
}

// =========================================================================
// PgStore
// =========================================================================

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_session(
        tx: &mut PgTransaction<'_, Postgres>,
        session_id: Uuid,
    ) -> StoreResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn lock_transaction(
        tx: &mut PgTransaction<'_, Postgres>,
        transaction_id: Uuid,
    ) -> StoreResult<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(transaction_id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn lock_payout_account(
        tx: &mut PgTransaction<'_, Postgres>,
        educator_id: Uuid,
    ) -> StoreResult<Option<PayoutAccount>> {
        let row: Option<PayoutRow> = sqlx::query_as(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payout_accounts WHERE educator_id = $1 FOR UPDATE"
        ))
        .bind(educator_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(PayoutAccount::from))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKeyRecord>> {
        let record: Option<(Uuid, String, Vec<String>, bool)> = sqlx::query_as(
            r#"
            SELECT id, name, permissions, is_active
            FROM api_keys
            WHERE key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(|(id, name, permissions, is_active)| ApiKeyRecord {
            id,
            name,
            permissions,
            is_active,
        }))
    }

    // =========================================================================
    // Identity & profiles
    // =========================================================================

    async fn register_student(
        &self,
        user: &User,
        student: &Student,
        audit: &AuditRecord,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        insert_user(&mut tx, user).await?;
        sqlx::query("INSERT INTO students (id, user_id) VALUES ($1, $2)")
            .bind(student.id)
            .bind(student.user_id)
            .execute(&mut *tx)
            .await?;
        insert_audit(&mut tx, audit).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn register_educator(
        &self,
        user: &User,
        educator: &Educator,
        subject_ids: &[Uuid],
        audit: &AuditRecord,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let known: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM subjects WHERE id = ANY($1)")
            .bind(subject_ids)
            .fetch_all(&mut *tx)
            .await?;
        if let Some(missing) = subject_ids.iter().find(|id| !known.contains(*id)) {
            return Err(DomainError::not_found("subject", missing).into());
        }

        insert_user(&mut tx, user).await?;
        sqlx::query(
            r#"
            INSERT INTO educators (id, user_id, degree, hourly_rate, verification_status, contract_signed)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(educator.id)
        .bind(educator.user_id)
        .bind(&educator.degree)
        .bind(educator.hourly_rate.value())
        .bind(educator.verification_status.as_str())
        .bind(educator.contract_signed)
        .execute(&mut *tx)
        .await?;

        for subject_id in subject_ids {
            sqlx::query(
                r#"
                INSERT INTO educator_subjects (educator_id, subject_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(educator.id)
            .bind(subject_id)
            .execute(&mut *tx)
            .await?;
        }
        insert_audit(&mut tx, audit).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_student(&self, student_id: Uuid) -> StoreResult<Option<Student>> {
        let row: Option<(Uuid, Uuid)> =
            sqlx::query_as("SELECT id, user_id FROM students WHERE id = $1")
                .bind(student_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, user_id)| Student { id, user_id }))
    }

    async fn get_student_by_user(&self, user_id: Uuid) -> StoreResult<Option<Student>> {
        let row: Option<(Uuid, Uuid)> =
            sqlx::query_as("SELECT id, user_id FROM students WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, user_id)| Student { id, user_id }))
    }

    async fn get_educator(&self, educator_id: Uuid) -> StoreResult<Option<Educator>> {
        let row: Option<EducatorRow> =
            sqlx::query_as(&format!("SELECT {EDUCATOR_COLUMNS} FROM educators WHERE id = $1"))
                .bind(educator_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Educator::try_from).transpose()
    }

    async fn get_educator_by_user(&self, user_id: Uuid) -> StoreResult<Option<Educator>> {
        let row: Option<EducatorRow> = sqlx::query_as(&format!(
            "SELECT {EDUCATOR_COLUMNS} FROM educators WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Educator::try_from).transpose()
    }

    async fn list_verified_educators(
        &self,
        subject_id: Option<Uuid>,
    ) -> StoreResult<Vec<Educator>> {
        let rows: Vec<EducatorRow> = sqlx::query_as(&format!(
            r#"
            SELECT {EDUCATOR_COLUMNS}
            FROM educators e
            WHERE verification_status = 'verified'
              AND ($1::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM educator_subjects es
                    WHERE es.educator_id = e.id AND es.subject_id = $1
                  ))
            ORDER BY id
            "#
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
        audit: AuditRecord,
    ) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = row.map(User::try_from).transpose()? else {
            return Ok(None);
        };

        let updated = current.with_profile(changes)?;
        sqlx::query("UPDATE users SET first_name = $2, last_name = $3, bio = $4 WHERE id = $1")
            .bind(user_id)
            .bind(&updated.first_name)
            .bind(&updated.last_name)
            .bind(&updated.bio)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint(e, String::new))?;
        insert_audit(&mut tx, &audit.before(&current).after(&updated)).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn update_educator_profile(
        &self,
        educator_id: Uuid,
        changes: &EducatorChanges,
        audit: AuditRecord,
    ) -> StoreResult<Option<Educator>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<EducatorRow> = sqlx::query_as(&format!(
            "SELECT {EDUCATOR_COLUMNS} FROM educators WHERE id = $1 FOR UPDATE"
        ))
        .bind(educator_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = row.map(Educator::try_from).transpose()? else {
            return Ok(None);
        };

        let updated = current.with_profile(changes)?;
        sqlx::query("UPDATE educators SET degree = $2, hourly_rate = $3 WHERE id = $1")
            .bind(educator_id)
            .bind(&updated.degree)
            .bind(updated.hourly_rate.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint(e, String::new))?;
        insert_audit(&mut tx, &audit.before(&current).after(&updated)).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn set_educator_verification(
        &self,
        educator_id: Uuid,
        status: VerificationStatus,
        audit: AuditRecord,
    ) -> StoreResult<Option<Educator>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<EducatorRow> = sqlx::query_as(&format!(
            "SELECT {EDUCATOR_COLUMNS} FROM educators WHERE id = $1 FOR UPDATE"
        ))
        .bind(educator_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(current) = row.map(Educator::try_from).transpose()? else {
            return Ok(None);
        };

        sqlx::query("UPDATE educators SET verification_status = $2 WHERE id = $1")
            .bind(educator_id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;

        let updated = Educator {
            verification_status: status,
            ..current.clone()
        };
        insert_audit(&mut tx, &audit.before(&current).after(&updated)).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn create_subject(&self, subject: &Subject, audit: &AuditRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO subjects (id, name, description) VALUES ($1, $2, $3)")
            .bind(subject.id)
            .bind(&subject.name)
            .bind(&subject.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint(e, || format!("subject {} already exists", subject.name)))?;
        insert_audit(&mut tx, audit).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_subject(&self, subject_id: Uuid) -> StoreResult<Option<Subject>> {
        let row: Option<(Uuid, String, String)> =
            sqlx::query_as("SELECT id, name, description FROM subjects WHERE id = $1")
                .bind(subject_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, name, description)| Subject {
            id,
            name,
            description,
        }))
    }

    async fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        let rows: Vec<(Uuid, String, String)> =
            sqlx::query_as("SELECT id, name, description FROM subjects ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, description)| Subject {
                id,
                name,
                description,
            })
            .collect())
    }

    async fn educator_subject_ids(&self, educator_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT subject_id FROM educator_subjects WHERE educator_id = $1 ORDER BY subject_id",
        )
        .bind(educator_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn educator_teaches(&self, educator_id: Uuid, subject_id: Uuid) -> StoreResult<bool> {
        let teaches: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM educator_subjects
                WHERE educator_id = $1 AND subject_id = $2
            )
            "#,
        )
        .bind(educator_id)
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(teaches)
    }

    async fn toggle_favorite(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
        audit: AuditRecord,
    ) -> StoreResult<FavoriteToggle> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subjects WHERE id = $1)")
            .bind(subject_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(DomainError::not_found("subject", subject_id).into());
        }

        let removed = sqlx::query(
            "DELETE FROM student_favorite_subjects WHERE student_id = $1 AND subject_id = $2",
        )
        .bind(student_id)
        .bind(subject_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let toggle = if removed > 0 {
            FavoriteToggle::Removed
        } else {
            sqlx::query(
                r#"
                INSERT INTO student_favorite_subjects (student_id, subject_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(student_id)
            .bind(subject_id)
            .execute(&mut *tx)
            .await?;
            FavoriteToggle::Added
        };

        let audit = audit.after(&serde_json::json!({
            "student_id": student_id,
            "subject_id": subject_id,
            "favorite": toggle.is_favorite(),
        }));
        insert_audit(&mut tx, &audit).await?;

        tx.commit().await?;
        Ok(toggle)
    }

    async fn favorite_subjects(&self, student_id: Uuid) -> StoreResult<Vec<Subject>> {
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
            r#"
            SELECT s.id, s.name, s.description
            FROM subjects s
            JOIN student_favorite_subjects f ON f.subject_id = s.id
            WHERE f.student_id = $1
            ORDER BY s.name
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, description)| Subject {
                id,
                name,
                description,
            })
            .collect())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    async fn insert_session(&self, session: &Session, audit: &AuditRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, student_id, educator_id, subject_id, start_time, end_time,
                status, meeting_link, session_notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.id)
        .bind(session.student_id)
        .bind(session.educator_id)
        .bind(session.subject_id)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.status.as_str())
        .bind(&session.meeting_link)
        .bind(&session.session_notes)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_constraint(e, || {
                format!(
                    "educator already has a session between {} and {}",
                    session.start_time, session.end_time
                )
            })
        })?;
        insert_audit(&mut tx, audit).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> StoreResult<Option<Session>> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"))
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Session::try_from).transpose()
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM sessions
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::uuid IS NULL OR educator_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY start_time DESC
            "#
        ))
        .bind(filter.student_id)
        .bind(filter.educator_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    async fn cas_session(
        &self,
        updated: &Session,
        expected: SessionStatus,
        audit: &AuditRecord,
    ) -> StoreResult<CasResult> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            r#"
            UPDATE sessions
            SET status = $2, meeting_link = $3, updated_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(updated.id)
        .bind(updated.status.as_str())
        .bind(&updated.meeting_link)
        .bind(updated.updated_at)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            let actual: Option<String> =
                sqlx::query_scalar("SELECT status FROM sessions WHERE id = $1")
                    .bind(updated.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return match actual {
                None => Ok(CasResult::NotFound),
                Some(status) => Ok(CasResult::StatusMismatch {
                    actual: status
                        .parse()
                        .map_err(|e| StoreError::corrupt("sessions", e))?,
                }),
            };
        }

        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;
        Ok(CasResult::Success)
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    async fn insert_review(&self, review: &Review, audit: &AuditRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let session = Self::lock_session(&mut tx, review.session_id)
            .await?
            .ok_or_else(|| DomainError::not_found("session", review.session_id))?;
        if session.status != SessionStatus::Completed {
            return Err(DomainError::NotEligible(format!(
                "only completed sessions can be reviewed (session is {})",
                session.status
            ))
            .into());
        }

        sqlx::query(
            r#"
            INSERT INTO reviews (id, session_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(review.id)
        .bind(review.session_id)
        .bind(i16::from(review.rating.value()))
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_constraint(e, String::new) {
            StoreError::Conflict(_) => StoreError::Rejected(DomainError::NotEligible(
                "this session has already been reviewed".to_string(),
            )),
            other => other,
        })?;
        insert_audit(&mut tx, audit).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_review_for_session(&self, session_id: Uuid) -> StoreResult<Option<Review>> {
        let row: Option<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Review::try_from).transpose()
    }

    async fn list_reviews_for_educator(&self, educator_id: Uuid) -> StoreResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.session_id, r.rating, r.comment, r.created_at
            FROM reviews r
            JOIN sessions s ON s.id = r.session_id
            WHERE s.educator_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(educator_id)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    async fn insert_transaction(
        &self,
        transaction: &Transaction,
        audit: &AuditRecord,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, session_id, student_id, educator_id, amount, transaction_type,
                status, gateway_reference, payment_method, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.session_id)
        .bind(transaction.student_id)
        .bind(transaction.educator_id)
        .bind(transaction.amount.value())
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.status.as_str())
        .bind(&transaction.gateway_reference)
        .bind(&transaction.payment_method)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, || format!("transaction {} already exists", transaction.id)))?;
        insert_audit(&mut tx, audit).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: Uuid) -> StoreResult<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> StoreResult<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::uuid IS NULL OR educator_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(filter.student_id)
        .bind(filter.educator_id)
        .fetch_all(&self.pool)
        .await?;

        collect(rows)
    }

    async fn record_gateway_reference(
        &self,
        transaction_id: Uuid,
        gateway_reference: &str,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let transaction = Self::lock_transaction(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| DomainError::not_found("transaction", transaction_id))?;
        if transaction.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "transaction {} is already {}",
                transaction_id, transaction.status
            )));
        }

        sqlx::query(
            "UPDATE transactions SET gateway_reference = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(transaction_id)
        .bind(gateway_reference)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn settle_transaction(
        &self,
        transaction_id: Uuid,
        outcome: &SettlementOutcome,
        audit: AuditRecord,
    ) -> StoreResult<Settlement> {
        let mut tx = self.pool.begin().await?;

        let transaction = Self::lock_transaction(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| DomainError::not_found("transaction", transaction_id))?;
        let session = Self::lock_session(&mut tx, transaction.session_id)
            .await?
            .ok_or_else(|| StoreError::corrupt("transactions", "session row missing"))?;

        let settlement = Settlement::plan(&transaction, &session, outcome, Utc::now())?;
        if !settlement.transaction_changed {
            tx.rollback().await?;
            return Ok(settlement);
        }

        sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, gateway_reference = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .bind(settlement.transaction.status.as_str())
        .bind(&settlement.transaction.gateway_reference)
        .bind(settlement.transaction.updated_at)
        .execute(&mut *tx)
        .await?;

        if settlement.session_advanced {
            sqlx::query("UPDATE sessions SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(settlement.session.id)
                .bind(settlement.session.status.as_str())
                .bind(settlement.session.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        insert_audit(&mut tx, &audit.before(&transaction).after(&settlement)).await?;

        tx.commit().await?;
        Ok(settlement)
    }

    async fn upsert_payout_account(
        &self,
        educator_id: Uuid,
        details: &PayoutDetails,
        audit: AuditRecord,
    ) -> StoreResult<PayoutAccount> {
        let mut tx = self.pool.begin().await?;

        let existing = Self::lock_payout_account(&mut tx, educator_id).await?;
        let proposed =
            PayoutAccount::upsert(existing.as_ref(), educator_id, details.clone(), Utc::now());

        // Concurrent first saves race on the educator_id unique key; the
        // loser updates the winner's row.
        let row: PayoutRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO payout_accounts (
                id, educator_id, account_name, account_number, bank_name,
                bank_code, is_verified, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (educator_id) DO UPDATE SET
                account_name = EXCLUDED.account_name,
                account_number = EXCLUDED.account_number,
                bank_name = EXCLUDED.bank_name,
                bank_code = EXCLUDED.bank_code,
                updated_at = EXCLUDED.updated_at
            RETURNING {PAYOUT_COLUMNS}
            "#
        ))
        .bind(proposed.id)
        .bind(proposed.educator_id)
        .bind(&proposed.details.account_name)
        .bind(&proposed.details.account_number)
        .bind(&proposed.details.bank_name)
        .bind(&proposed.details.bank_code)
        .bind(proposed.is_verified)
        .bind(proposed.created_at)
        .bind(proposed.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, String::new))?;
        let account = PayoutAccount::from(row);

        let audit = match &existing {
            Some(previous) => audit.before(previous),
            None => audit,
        }
        .after(&account);
        insert_audit(&mut tx, &audit).await?;

        tx.commit().await?;
        Ok(account)
    }

    async fn get_payout_account(&self, educator_id: Uuid) -> StoreResult<Option<PayoutAccount>> {
        let row: Option<PayoutRow> = sqlx::query_as(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payout_accounts WHERE educator_id = $1"
        ))
        .bind(educator_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PayoutAccount::from))
    }

    async fn verify_payout_account(
        &self,
        educator_id: Uuid,
        audit: AuditRecord,
    ) -> StoreResult<Option<PayoutAccount>> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = Self::lock_payout_account(&mut tx, educator_id).await? else {
            return Ok(None);
        };

        let row: PayoutRow = sqlx::query_as(&format!(
            r#"
            UPDATE payout_accounts
            SET is_verified = TRUE, updated_at = NOW()
            WHERE educator_id = $1
            RETURNING {PAYOUT_COLUMNS}
            "#
        ))
        .bind(educator_id)
        .fetch_one(&mut *tx)
        .await?;
        let verified = PayoutAccount::from(row);

        insert_audit(&mut tx, &audit.before(&current).after(&verified)).await?;

        tx.commit().await?;
        Ok(Some(verified))
    }

    // =========================================================================
    // Audit
    // =========================================================================

    async fn recent_audit(&self, limit: i64) -> StoreResult<Vec<AuditRecord>> {
        let rows: Vec<AuditRow> = sqlx::query_as(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AuditRecord::from).collect())
    }
}
