//! In-memory store implementation.
//!
//! [`InMemoryStore`] keeps every table in one `RwLock`-guarded struct, so a
//! store call that takes the write lock is atomic with respect to every other
//! call. Used by the test suites and by the `memory` storage backend.
//!
//! ## Limitations
//!
//! - No durability: all state is lost when the process exits
//! - Single-process only

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    hash_api_key, ApiKeyRecord, CasResult, SessionFilter, Store, StoreError, StoreResult,
    TransactionFilter,
};
use crate::audit::AuditRecord;
use crate::domain::{
    DomainError, Educator, EducatorChanges, FavoriteToggle, PayoutAccount, PayoutDetails,
    ProfileChanges, Review, Session, SessionStatus, Settlement, SettlementOutcome, Student,
    Subject, Transaction, User, VerificationStatus,
};

#[derive(Debug, Default)]
struct Tables {
    api_keys: HashMap<String, ApiKeyRecord>,
    users: HashMap<Uuid, User>,
    students: HashMap<Uuid, Student>,
    educators: HashMap<Uuid, Educator>,
    educator_subjects: HashMap<Uuid, BTreeSet<Uuid>>,
    favorites: HashMap<Uuid, BTreeSet<Uuid>>,
    subjects: HashMap<Uuid, Subject>,
    sessions: HashMap<Uuid, Session>,
    /// Keyed by session id
    reviews: HashMap<Uuid, Review>,
    transactions: HashMap<Uuid, Transaction>,
    /// Keyed by educator id
    payout_accounts: HashMap<Uuid, PayoutAccount>,
    audit: Vec<AuditRecord>,
}

impl Tables {
    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn subjects_sorted<'a>(&self, ids: impl Iterator<Item = &'a Uuid>) -> Vec<Subject> {
        let mut subjects: Vec<Subject> =
            ids.filter_map(|id| self.subjects.get(id).cloned()).collect();
        subjects.sort_by(|a, b| a.name.cmp(&b.name));
        subjects
    }
}

/// In-memory store for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client application and return its record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_api_key(
        &self,
        raw_key: &str,
        name: &str,
        permissions: &[&str],
    ) -> StoreResult<ApiKeyRecord> {
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            is_active: true,
        };
        {
            let mut tables = self.tables.write().map_err(poison_err)?;
            tables.api_keys.insert(hash_api_key(raw_key), record.clone());
        }
        Ok(record)
    }

    /// Revoke a client application without deleting its record.
    ///
    /// Returns false if no key has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn disable_api_key(&self, api_key_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let record = tables.api_keys.values_mut().find(|k| k.id == api_key_id);
        Ok(match record {
            Some(record) => {
                record.is_active = false;
                true
            }
            None => false,
        })
    }

    /// Insert an admin user directly. Admins are provisioned out of band.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the email is taken, or an error if the lock is
    /// poisoned.
    pub fn insert_admin(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if tables.email_taken(&user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    /// Number of audit records written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn audit_count(&self) -> StoreResult<usize> {
        let count = {
            let tables = self.tables.read().map_err(poison_err)?;
            tables.audit.len()
        };
        Ok(count)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_api_key(&self, key_hash: &str) -> StoreResult<Option<ApiKeyRecord>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.api_keys.get(key_hash).cloned())
    }

    async fn register_student(
        &self,
        user: &User,
        student: &Student,
        audit: &AuditRecord,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if tables.email_taken(&user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }

        tables.users.insert(user.id, user.clone());
        tables.students.insert(student.id, student.clone());
        tables.audit.push(audit.clone());
        Ok(())
    }

    async fn register_educator(
        &self,
        user: &User,
        educator: &Educator,
        subject_ids: &[Uuid],
        audit: &AuditRecord,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if tables.email_taken(&user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        if let Some(missing) = subject_ids.iter().find(|id| !tables.subjects.contains_key(*id)) {
            return Err(DomainError::not_found("subject", missing).into());
        }

        tables.users.insert(user.id, user.clone());
        tables.educators.insert(educator.id, educator.clone());
        tables
            .educator_subjects
            .insert(educator.id, subject_ids.iter().copied().collect());
        tables.audit.push(audit.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.users.get(&user_id).cloned())
    }

    async fn get_student(&self, student_id: Uuid) -> StoreResult<Option<Student>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.students.get(&student_id).cloned())
    }

    async fn get_student_by_user(&self, user_id: Uuid) -> StoreResult<Option<Student>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.students.values().find(|s| s.user_id == user_id).cloned())
    }

    async fn get_educator(&self, educator_id: Uuid) -> StoreResult<Option<Educator>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.educators.get(&educator_id).cloned())
    }

    async fn get_educator_by_user(&self, user_id: Uuid) -> StoreResult<Option<Educator>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.educators.values().find(|e| e.user_id == user_id).cloned())
    }

    async fn list_verified_educators(
        &self,
        subject_id: Option<Uuid>,
    ) -> StoreResult<Vec<Educator>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut educators: Vec<Educator> = tables
            .educators
            .values()
            .filter(|e| e.is_bookable())
            .filter(|e| {
                subject_id.map_or(true, |subject| {
                    tables
                        .educator_subjects
                        .get(&e.id)
                        .is_some_and(|subjects| subjects.contains(&subject))
                })
            })
            .cloned()
            .collect();
        educators.sort_by_key(|e| e.id);
        Ok(educators)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
        audit: AuditRecord,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let Some(current) = tables.users.get(&user_id).cloned() else {
            return Ok(None);
        };

        let updated = current.with_profile(changes)?;
        tables.users.insert(user_id, updated.clone());
        tables.audit.push(audit.before(&current).after(&updated));
        Ok(Some(updated))
    }

    async fn update_educator_profile(
        &self,
        educator_id: Uuid,
        changes: &EducatorChanges,
        audit: AuditRecord,
    ) -> StoreResult<Option<Educator>> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let Some(current) = tables.educators.get(&educator_id).cloned() else {
            return Ok(None);
        };

        let updated = current.with_profile(changes)?;
        tables.educators.insert(educator_id, updated.clone());
        tables.audit.push(audit.before(&current).after(&updated));
        Ok(Some(updated))
    }

    async fn set_educator_verification(
        &self,
        educator_id: Uuid,
        status: VerificationStatus,
        audit: AuditRecord,
    ) -> StoreResult<Option<Educator>> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let Some(current) = tables.educators.get(&educator_id).cloned() else {
            return Ok(None);
        };

        let updated = Educator {
            verification_status: status,
            ..current.clone()
        };
        tables.educators.insert(educator_id, updated.clone());
        tables.audit.push(audit.before(&current).after(&updated));
        Ok(Some(updated))
    }

    async fn create_subject(&self, subject: &Subject, audit: &AuditRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if tables.subjects.values().any(|s| s.name == subject.name) {
            return Err(StoreError::Conflict(format!(
                "subject {} already exists",
                subject.name
            )));
        }
        tables.subjects.insert(subject.id, subject.clone());
        tables.audit.push(audit.clone());
        Ok(())
    }

    async fn get_subject(&self, subject_id: Uuid) -> StoreResult<Option<Subject>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.subjects.get(&subject_id).cloned())
    }

    async fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.subjects_sorted(tables.subjects.keys()))
    }

    async fn educator_subject_ids(&self, educator_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .educator_subjects
            .get(&educator_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn educator_teaches(&self, educator_id: Uuid, subject_id: Uuid) -> StoreResult<bool> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .educator_subjects
            .get(&educator_id)
            .is_some_and(|ids| ids.contains(&subject_id)))
    }

    async fn toggle_favorite(
        &self,
        student_id: Uuid,
        subject_id: Uuid,
        audit: AuditRecord,
    ) -> StoreResult<FavoriteToggle> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        if !tables.subjects.contains_key(&subject_id) {
            return Err(DomainError::not_found("subject", subject_id).into());
        }

        let favorites = tables.favorites.entry(student_id).or_default();
        let toggle = if favorites.remove(&subject_id) {
            FavoriteToggle::Removed
        } else {
            favorites.insert(subject_id);
            FavoriteToggle::Added
        };

        tables.audit.push(audit.after(&serde_json::json!({
            "student_id": student_id,
            "subject_id": subject_id,
            "favorite": toggle.is_favorite(),
        })));
        Ok(toggle)
    }

    async fn favorite_subjects(&self, student_id: Uuid) -> StoreResult<Vec<Subject>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .favorites
            .get(&student_id)
            .map(|ids| tables.subjects_sorted(ids.iter()))
            .unwrap_or_default())
    }

    async fn insert_session(&self, session: &Session, audit: &AuditRecord) -> StoreResult<()> {
        let slot = session.slot()?;
        let mut tables = self.tables.write().map_err(poison_err)?;

        let clash = tables.sessions.values().find(|other| {
            other.educator_id == session.educator_id
                && other.status.holds_slot()
                && other.slot().is_ok_and(|s| s.overlaps(&slot))
        });
        if let Some(other) = clash {
            return Err(StoreError::Conflict(format!(
                "educator already has session {} between {} and {}",
                other.id, other.start_time, other.end_time
            )));
        }

        tables.sessions.insert(session.id, session.clone());
        tables.audit.push(audit.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> StoreResult<Option<Session>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.sessions.get(&session_id).cloned())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }

    async fn cas_session(
        &self,
        updated: &Session,
        expected: SessionStatus,
        audit: &AuditRecord,
    ) -> StoreResult<CasResult> {
        let mut tables = self.tables.write().map_err(poison_err)?;

        let Some(current) = tables.sessions.get(&updated.id) else {
            return Ok(CasResult::NotFound);
        };
        if current.status != expected {
            return Ok(CasResult::StatusMismatch {
                actual: current.status,
            });
        }

        tables.sessions.insert(updated.id, updated.clone());
        tables.audit.push(audit.clone());
        Ok(CasResult::Success)
    }

    async fn insert_review(&self, review: &Review, audit: &AuditRecord) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;

        let session = tables
            .sessions
            .get(&review.session_id)
            .ok_or_else(|| DomainError::not_found("session", review.session_id))?;
        if session.status != SessionStatus::Completed {
            return Err(DomainError::NotEligible(format!(
                "only completed sessions can be reviewed (session is {})",
                session.status
            ))
            .into());
        }
        if tables.reviews.contains_key(&review.session_id) {
            return Err(DomainError::NotEligible(
                "this session has already been reviewed".to_string(),
            )
            .into());
        }

        tables.reviews.insert(review.session_id, review.clone());
        tables.audit.push(audit.clone());
        Ok(())
    }

    async fn get_review_for_session(&self, session_id: Uuid) -> StoreResult<Option<Review>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.reviews.get(&session_id).cloned())
    }

    async fn list_reviews_for_educator(&self, educator_id: Uuid) -> StoreResult<Vec<Review>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| {
                tables
                    .sessions
                    .get(&r.session_id)
                    .is_some_and(|s| s.educator_id == educator_id)
            })
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn insert_transaction(
        &self,
        transaction: &Transaction,
        audit: &AuditRecord,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;

        let session = tables
            .sessions
            .get(&transaction.session_id)
            .ok_or_else(|| DomainError::not_found("session", transaction.session_id))?;
        if !transaction.matches_session(session) {
            return Err(DomainError::InvalidRequest(format!(
                "transaction parties do not match session {}",
                session.id
            ))
            .into());
        }

        tables.transactions.insert(transaction.id, transaction.clone());
        tables.audit.push(audit.clone());
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: Uuid) -> StoreResult<Option<Transaction>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.transactions.get(&transaction_id).cloned())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> StoreResult<Vec<Transaction>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut transactions: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    async fn record_gateway_reference(
        &self,
        transaction_id: Uuid,
        gateway_reference: &str,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let transaction = tables
            .transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| DomainError::not_found("transaction", transaction_id))?;

        if transaction.status.is_terminal() {
            return Err(StoreError::Conflict(format!(
                "transaction {} is already {}",
                transaction_id, transaction.status
            )));
        }
        transaction.gateway_reference = Some(gateway_reference.to_string());
        transaction.updated_at = Utc::now();
        Ok(())
    }

    async fn settle_transaction(
        &self,
        transaction_id: Uuid,
        outcome: &SettlementOutcome,
        audit: AuditRecord,
    ) -> StoreResult<Settlement> {
        let mut tables = self.tables.write().map_err(poison_err)?;

        let transaction = tables
            .transactions
            .get(&transaction_id)
            .ok_or_else(|| DomainError::not_found("transaction", transaction_id))?;
        let session = tables
            .sessions
            .get(&transaction.session_id)
            .ok_or_else(|| StoreError::corrupt("transactions", "session row missing"))?;

        let settlement = Settlement::plan(transaction, session, outcome, Utc::now())?;
        if !settlement.transaction_changed {
            return Ok(settlement);
        }

        let audit = audit.before(transaction).after(&settlement);
        tables
            .transactions
            .insert(transaction_id, settlement.transaction.clone());
        if settlement.session_advanced {
            tables
                .sessions
                .insert(settlement.session.id, settlement.session.clone());
        }
        tables.audit.push(audit);
        Ok(settlement)
    }

    async fn upsert_payout_account(
        &self,
        educator_id: Uuid,
        details: &PayoutDetails,
        audit: AuditRecord,
    ) -> StoreResult<PayoutAccount> {
        let mut tables = self.tables.write().map_err(poison_err)?;

        let existing = tables.payout_accounts.get(&educator_id);
        let account = PayoutAccount::upsert(existing, educator_id, details.clone(), Utc::now());
        let audit = match existing {
            Some(previous) => audit.before(previous),
            None => audit,
        }
        .after(&account);

        tables.payout_accounts.insert(educator_id, account.clone());
        tables.audit.push(audit);
        Ok(account)
    }

    async fn get_payout_account(&self, educator_id: Uuid) -> StoreResult<Option<PayoutAccount>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables.payout_accounts.get(&educator_id).cloned())
    }

    async fn verify_payout_account(
        &self,
        educator_id: Uuid,
        audit: AuditRecord,
    ) -> StoreResult<Option<PayoutAccount>> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let Some(current) = tables.payout_accounts.get(&educator_id).cloned() else {
            return Ok(None);
        };

        let verified = PayoutAccount {
            is_verified: true,
            updated_at: Utc::now(),
            ..current.clone()
        };
        tables.payout_accounts.insert(educator_id, verified.clone());
        tables.audit.push(audit.before(&current).after(&verified));
        Ok(Some(verified))
    }

    async fn recent_audit(&self, limit: i64) -> StoreResult<Vec<AuditRecord>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(0);
        Ok(tables.audit.iter().rev().take(limit).cloned().collect())
    }
}
