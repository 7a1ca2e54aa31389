//! Integration tests for the Postgres store
//!
//! Need a migrated database in `DATABASE_URL`; skipped otherwise. Every test
//! seeds its own student, educator and subject, so tests can share one
//! database and run in parallel.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use tutor_market::audit::{AuditAction, AuditRecord};
use tutor_market::domain::{
    DomainError, Educator, EducatorChanges, HourlyRate, OperationContext, PayoutDetails, Rating,
    Review, Role, Session, SessionStatus, SettlementOutcome, Student, Subject, TimeSlot,
    Transaction, TransactionStatus, User,
};
use tutor_market::store::CasResult;
use tutor_market::{PgStore, Store, StoreError};

mod common;

struct Seeded {
    store: PgStore,
    student: Student,
    educator: Educator,
    subject: Subject,
}

fn audit(action: AuditAction, resource_id: Uuid) -> AuditRecord {
    AuditRecord::new(action, "test", resource_id, &OperationContext::new())
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, hour, minute, 0).unwrap()
}

fn email(domain: &str) -> String {
    format!("{}@{}", Uuid::new_v4().simple(), domain)
}

async fn seed() -> Option<Seeded> {
    let pool = common::setup_test_db().await?;
    let store = PgStore::new(pool);

    let subject = Subject::new(&format!("Subject {}", Uuid::new_v4().simple()), None).unwrap();
    store
        .create_subject(&subject, &audit(AuditAction::SubjectCreated, subject.id))
        .await
        .unwrap();

    let student_user = User::register(
        &email("student.test"),
        "Sam".to_string(),
        "Doe".to_string(),
        None,
        Role::Student,
        Utc::now(),
    )
    .unwrap();
    let student = Student::for_user(&student_user);
    store
        .register_student(
            &student_user,
            &student,
            &audit(AuditAction::UserRegistered, student_user.id),
        )
        .await
        .unwrap();

    let educator_user = User::register(
        &email("tutor.test"),
        "Grace".to_string(),
        "Hopper".to_string(),
        None,
        Role::Educator,
        Utc::now(),
    )
    .unwrap();
    let educator = Educator::for_user(
        &educator_user,
        "PhD Mathematics".to_string(),
        HourlyRate::new(dec!(40.00)).unwrap(),
    )
    .unwrap();
    store
        .register_educator(
            &educator_user,
            &educator,
            &[subject.id],
            &audit(AuditAction::UserRegistered, educator_user.id),
        )
        .await
        .unwrap();

    Some(Seeded {
        store,
        student,
        educator,
        subject,
    })
}

impl Seeded {
    fn booking(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
        Session::book(
            self.student.id,
            self.educator.id,
            self.subject.id,
            TimeSlot::new(start, end).unwrap(),
            None,
            Utc::now(),
        )
    }

    async fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.store
            .insert_session(session, &audit(AuditAction::SessionBooked, session.id))
            .await
    }

    async fn move_to(&self, session: &Session, status: SessionStatus) -> Session {
        let next = session
            .transition_by_educator(self.educator.id, status, None, Utc::now())
            .unwrap();
        let cas = self
            .store
            .cas_session(
                &next,
                session.status,
                &audit(AuditAction::SessionStatusChanged, session.id),
            )
            .await
            .unwrap();
        assert_eq!(cas, CasResult::Success);
        next
    }

    async fn audit_rows(&self, resource_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE resource_id = $1")
            .bind(resource_id)
            .fetch_one(self.store.pool())
            .await
            .unwrap()
    }
}

fn details(bank_name: &str) -> PayoutDetails {
    PayoutDetails {
        account_name: "Grace Hopper".to_string(),
        account_number: "0012345678".to_string(),
        bank_name: bank_name.to_string(),
        bank_code: "044".to_string(),
    }
}

// =========================================================================
// Sessions
// =========================================================================

#[tokio::test]
async fn test_overlapping_booking_is_conflict() {
    let Some(s) = seed().await else { return };

    let first = s.booking(at(10, 0), at(11, 0));
    s.insert(&first).await.unwrap();

    let clash = s.booking(at(10, 30), at(11, 30));
    let result = s.insert(&clash).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))), "{:?}", result);
    assert!(s.store.get_session(clash.id).await.unwrap().is_none());
    assert_eq!(s.audit_rows(clash.id).await, 0);

    // Half-open intervals: back to back is fine
    s.insert(&s.booking(at(11, 0), at(12, 0))).await.unwrap();

    // A canceled session no longer holds its slot
    s.move_to(&first, SessionStatus::Canceled).await;
    s.insert(&s.booking(at(10, 0), at(11, 0))).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_overlapping_bookings_one_wins() {
    let Some(s) = seed().await else { return };

    let a = s.booking(at(14, 0), at(15, 0));
    let b = s.booking(at(14, 30), at(15, 30));
    let (first, second) = tokio::join!(s.insert(&a), s.insert(&b));

    assert_eq!(
        [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "{:?} / {:?}",
        first,
        second
    );
}

#[tokio::test]
async fn test_cas_session_reports_actual_status() {
    let Some(s) = seed().await else { return };

    let session = s.booking(at(9, 0), at(10, 0));
    s.insert(&session).await.unwrap();
    let confirmed = s.move_to(&session, SessionStatus::Confirmed).await;

    // A writer that still believes the session is pending loses
    let stale = session
        .transition_by_educator(s.educator.id, SessionStatus::Canceled, None, Utc::now())
        .unwrap();
    let cas = s
        .store
        .cas_session(
            &stale,
            SessionStatus::Pending,
            &audit(AuditAction::SessionStatusChanged, session.id),
        )
        .await
        .unwrap();
    assert_eq!(
        cas,
        CasResult::StatusMismatch {
            actual: SessionStatus::Confirmed
        }
    );

    let stored = s.store.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, confirmed.status);
    // booked + confirmed, nothing for the lost write
    assert_eq!(s.audit_rows(session.id).await, 2);

    let ghost = s.booking(at(20, 0), at(21, 0));
    let cas = s
        .store
        .cas_session(
            &ghost,
            SessionStatus::Pending,
            &audit(AuditAction::SessionStatusChanged, ghost.id),
        )
        .await
        .unwrap();
    assert_eq!(cas, CasResult::NotFound);
}

// =========================================================================
// Reviews
// =========================================================================

#[tokio::test]
async fn test_second_review_is_not_eligible() {
    let Some(s) = seed().await else { return };

    let session = s.booking(at(8, 0), at(9, 0));
    s.insert(&session).await.unwrap();

    let early = Review::attach(
        &Session {
            status: SessionStatus::Completed,
            ..session.clone()
        },
        s.student.id,
        Rating::new(5).unwrap(),
        None,
        false,
        Utc::now(),
    )
    .unwrap();
    let result = s
        .store
        .insert_review(&early, &audit(AuditAction::ReviewAttached, session.id))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::Rejected(DomainError::NotEligible(_)))
    ));

    let confirmed = s.move_to(&session, SessionStatus::Confirmed).await;
    let completed = s.move_to(&confirmed, SessionStatus::Completed).await;

    let review = |rating: i64| {
        Review::attach(
            &completed,
            s.student.id,
            Rating::new(rating).unwrap(),
            Some("Clear explanations".to_string()),
            false,
            Utc::now(),
        )
        .unwrap()
    };

    s.store
        .insert_review(&review(4), &audit(AuditAction::ReviewAttached, session.id))
        .await
        .unwrap();

    // Skips the eligibility pre-check, so only the unique key can stop it
    let result = s
        .store
        .insert_review(&review(1), &audit(AuditAction::ReviewAttached, session.id))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::Rejected(DomainError::NotEligible(_)))
    ));

    let stored = s.store.get_review_for_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.rating.value(), 4);
}

// =========================================================================
// Ledger
// =========================================================================

#[tokio::test]
async fn test_settlement_updates_transaction_and_session_once() {
    let Some(s) = seed().await else { return };

    let session = s.booking(at(10, 0), at(11, 30));
    s.insert(&session).await.unwrap();

    let payment = Transaction::payment_for(
        &session,
        s.student.id,
        &s.educator.hourly_rate,
        "card",
        Utc::now(),
    )
    .unwrap();
    assert_eq!(payment.amount.value(), dec!(60.00));
    s.store
        .insert_transaction(&payment, &audit(AuditAction::PaymentCreated, payment.id))
        .await
        .unwrap();

    let outcome = SettlementOutcome::Succeeded {
        gateway_reference: Some("gw_pg_1".to_string()),
    };
    let settlement = s
        .store
        .settle_transaction(payment.id, &outcome, audit(AuditAction::PaymentSettled, payment.id))
        .await
        .unwrap();
    assert!(settlement.transaction_changed);
    assert!(settlement.session_advanced);

    let stored = s.store.get_transaction(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
    assert_eq!(stored.gateway_reference.as_deref(), Some("gw_pg_1"));
    assert_eq!(stored.amount.value(), dec!(60.00));
    let stored = s.store.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Confirmed);
    assert_eq!(s.audit_rows(payment.id).await, 2);

    // Gateway retry: nothing written
    let replay = s
        .store
        .settle_transaction(payment.id, &outcome, audit(AuditAction::PaymentSettled, payment.id))
        .await
        .unwrap();
    assert!(!replay.transaction_changed);
    assert!(!replay.session_advanced);
    assert_eq!(s.audit_rows(payment.id).await, 2);

    let contradicting = SettlementOutcome::Failed {
        gateway_reference: None,
        reason: Some("chargeback".to_string()),
    };
    let result = s
        .store
        .settle_transaction(
            payment.id,
            &contradicting,
            audit(AuditAction::PaymentSettled, payment.id),
        )
        .await;
    assert!(matches!(
        result,
        Err(StoreError::Rejected(DomainError::InvalidTransition { .. }))
    ));
    let stored = s.store.get_transaction(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_failed_settlement_leaves_session_pending() {
    let Some(s) = seed().await else { return };

    let session = s.booking(at(16, 0), at(17, 0));
    s.insert(&session).await.unwrap();
    let payment = Transaction::payment_for(
        &session,
        s.student.id,
        &s.educator.hourly_rate,
        "card",
        Utc::now(),
    )
    .unwrap();
    s.store
        .insert_transaction(&payment, &audit(AuditAction::PaymentCreated, payment.id))
        .await
        .unwrap();

    let outcome = SettlementOutcome::Failed {
        gateway_reference: Some("gw_pg_2".to_string()),
        reason: Some("insufficient funds".to_string()),
    };
    let settlement = s
        .store
        .settle_transaction(payment.id, &outcome, audit(AuditAction::PaymentSettled, payment.id))
        .await
        .unwrap();
    assert_eq!(settlement.transaction.status, TransactionStatus::Failed);
    assert!(!settlement.session_advanced);

    let stored = s.store.get_session(session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Pending);
}

// =========================================================================
// Profiles & payouts
// =========================================================================

#[tokio::test]
async fn test_rate_update_is_persisted() {
    let Some(s) = seed().await else { return };

    let changes = EducatorChanges {
        degree: None,
        hourly_rate: Some(HourlyRate::new(dec!(55.50)).unwrap()),
    };
    let updated = s
        .store
        .update_educator_profile(
            s.educator.id,
            &changes,
            audit(AuditAction::EducatorProfileUpdated, s.educator.id),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.hourly_rate.value(), dec!(55.50));

    let stored = s.store.get_educator(s.educator.id).await.unwrap().unwrap();
    assert_eq!(stored.hourly_rate.value(), dec!(55.50));
    assert_eq!(stored.degree, "PhD Mathematics");
}

#[tokio::test]
async fn test_payout_upsert_keeps_identity_and_verification() {
    let Some(s) = seed().await else { return };
    let educator_id = s.educator.id;

    let opened = s
        .store
        .upsert_payout_account(
            educator_id,
            &details("First Bank"),
            audit(AuditAction::PayoutAccountSaved, educator_id),
        )
        .await
        .unwrap();
    assert!(!opened.is_verified);

    let verified = s
        .store
        .verify_payout_account(educator_id, audit(AuditAction::PayoutAccountVerified, educator_id))
        .await
        .unwrap()
        .unwrap();
    assert!(verified.is_verified);

    let replaced = s
        .store
        .upsert_payout_account(
            educator_id,
            &details("Second Bank"),
            audit(AuditAction::PayoutAccountSaved, educator_id),
        )
        .await
        .unwrap();
    assert_eq!(replaced.id, opened.id);
    assert!(replaced.is_verified);
    assert_eq!(replaced.details.bank_name, "Second Bank");

    // Oversize text that skipped validation comes back typed, not as a
    // database error
    let result = s
        .store
        .upsert_payout_account(
            educator_id,
            &details(&"B".repeat(101)),
            audit(AuditAction::PayoutAccountSaved, educator_id),
        )
        .await;
    assert!(matches!(
        result,
        Err(StoreError::Rejected(DomainError::InvalidRequest(_)))
    ));
}

#[tokio::test]
async fn test_concurrent_first_payout_saves_share_one_row() {
    let Some(s) = seed().await else { return };
    let educator_id = s.educator.id;

    let first_details = details("First Bank");
    let second_details = details("Second Bank");
    let (first, second) = tokio::join!(
        s.store.upsert_payout_account(
            educator_id,
            &first_details,
            audit(AuditAction::PayoutAccountSaved, educator_id),
        ),
        s.store.upsert_payout_account(
            educator_id,
            &second_details,
            audit(AuditAction::PayoutAccountSaved, educator_id),
        ),
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.id, second.id);

    let stored = s.store.get_payout_account(educator_id).await.unwrap().unwrap();
    assert_eq!(stored.id, first.id);
}
