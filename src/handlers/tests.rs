//! Scenario tests for handlers
//!
//! Run every command against the in-memory store, so no database is needed.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    use crate::domain::{
        Actor, DomainError, FavoriteToggle, OperationContext, PayoutDetails, Role, SessionStatus,
        SettlementOutcome, Subject, TransactionStatus, User, VerificationStatus,
    };
    use crate::error::AppError;
    use crate::gateway::{DeferredGateway, PaymentGateway, SimulatedGateway, SIMULATED_DECLINE_METHOD};
    use crate::handlers::*;
    use crate::store::{InMemoryStore, SharedStore, Store, TransactionFilter};

    struct Fixture {
        memory: Arc<InMemoryStore>,
        store: SharedStore,
        subject: Subject,
        educator_id: Uuid,
        admin: OperationContext,
        educator: OperationContext,
        student: OperationContext,
        other_student: OperationContext,
    }

    fn ctx(actor: Actor) -> OperationContext {
        OperationContext::new()
            .with_actor(actor)
            .with_correlation_id(Uuid::new_v4())
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 7, hour, minute, 0).unwrap()
    }

    async fn register_student(store: &SharedStore, email: &str) -> OperationContext {
        let result = RegisterStudentHandler::new(store.clone())
            .execute(
                RegisterStudentCommand::new(email.to_string(), "Sam".to_string(), "Doe".to_string()),
                &OperationContext::new(),
            )
            .await
            .unwrap();
        ctx(Actor::Student {
            user_id: result.user.id,
            student_id: result.profile_id,
        })
    }

    async fn fixture() -> Fixture {
        let memory = Arc::new(InMemoryStore::new());
        let store: SharedStore = memory.clone();

        let admin_user = User::register(
            "ops@tutor.example",
            "Ops".to_string(),
            "Team".to_string(),
            None,
            Role::Admin,
            Utc::now(),
        )
        .unwrap();
        memory.insert_admin(&admin_user).unwrap();
        let admin = ctx(Actor::Admin {
            user_id: admin_user.id,
        });

        let subject = CreateSubjectHandler::new(store.clone())
            .execute(
                CreateSubjectCommand::new("Mathematics".to_string()),
                &admin,
            )
            .await
            .unwrap();

        let registered = RegisterEducatorHandler::new(store.clone())
            .execute(
                RegisterEducatorCommand::new(
                    "grace@tutor.example".to_string(),
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
        let educator_id = registered.profile_id;

        SetEducatorVerificationHandler::new(store.clone())
            .execute(
                SetEducatorVerificationCommand::new(educator_id, VerificationStatus::Verified),
                &admin,
            )
            .await
            .unwrap();

        let educator = ctx(Actor::Educator {
            user_id: registered.user.id,
            educator_id,
        });
        let student = register_student(&store, "sam@student.example").await;
        let other_student = register_student(&store, "alex@student.example").await;

        Fixture {
            memory,
            store,
            subject,
            educator_id,
            admin,
            educator,
            student,
            other_student,
        }
    }

    impl Fixture {
        async fn book(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<crate::domain::Session, AppError> {
            BookSessionHandler::new(self.store.clone())
                .execute(
                    BookSessionCommand::new(self.educator_id, self.subject.id, start, end),
                    &self.student,
                )
                .await
        }

        async fn transition(
            &self,
            session_id: Uuid,
            status: SessionStatus,
        ) -> Result<crate::domain::Session, AppError> {
            TransitionSessionHandler::new(self.store.clone())
                .execute(TransitionSessionCommand::new(session_id, status), &self.educator)
                .await
        }

        fn payments(&self, gateway: Arc<dyn PaymentGateway>) -> CreatePaymentHandler {
            CreatePaymentHandler::new(self.store.clone(), gateway)
        }
    }

    fn domain_err(err: AppError) -> DomainError {
        match err {
            AppError::Domain(e) => e,
            other => panic!("expected domain error, got {:?}", other),
        }
    }

    // =========================================================================
    // Booking
    // =========================================================================

    #[tokio::test]
    async fn test_book_session_pending() {
        let f = fixture().await;

        let session = assert_ok!(f.book(at(10, 0), at(11, 30)).await);
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.meeting_link, None);
        assert_eq!(session.duration_minutes(), 90);
    }

    #[tokio::test]
    async fn test_overlapping_booking_conflicts() {
        let f = fixture().await;

        assert_ok!(f.book(at(10, 0), at(11, 0)).await);
        let err = assert_err!(f.book(at(10, 30), at(11, 30)).await);
        assert!(matches!(domain_err(err), DomainError::Conflict(_)));

        // Adjacent slots do not overlap
        assert_ok!(f.book(at(11, 0), at(12, 0)).await);
    }

    #[tokio::test]
    async fn test_canceled_session_releases_slot() {
        let f = fixture().await;

        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();
        f.transition(session.id, SessionStatus::Canceled).await.unwrap();

        assert_ok!(f.book(at(10, 0), at(11, 0)).await);
    }

    #[tokio::test]
    async fn test_book_rejects_inverted_interval() {
        let f = fixture().await;

        let err = assert_err!(f.book(at(11, 0), at(10, 0)).await);
        assert!(matches!(domain_err(err), DomainError::InvalidSession(_)));
        let err = assert_err!(f.book(at(10, 0), at(10, 0)).await);
        assert!(matches!(domain_err(err), DomainError::InvalidSession(_)));
    }

    #[tokio::test]
    async fn test_book_requires_verified_educator() {
        let f = fixture().await;
        SetEducatorVerificationHandler::new(f.store.clone())
            .execute(
                SetEducatorVerificationCommand::new(f.educator_id, VerificationStatus::Rejected),
                &f.admin,
            )
            .await
            .unwrap();

        let err = assert_err!(f.book(at(10, 0), at(11, 0)).await);
        assert!(matches!(domain_err(err), DomainError::NotEligible(_)));
    }

    #[tokio::test]
    async fn test_book_requires_taught_subject() {
        let f = fixture().await;
        let history = CreateSubjectHandler::new(f.store.clone())
            .execute(CreateSubjectCommand::new("History".to_string()), &f.admin)
            .await
            .unwrap();

        let err = assert_err!(
            BookSessionHandler::new(f.store.clone())
                .execute(
                    BookSessionCommand::new(f.educator_id, history.id, at(10, 0), at(11, 0)),
                    &f.student,
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::NotEligible(_)));
    }

    #[tokio::test]
    async fn test_book_unknown_educator_not_found() {
        let f = fixture().await;

        let err = assert_err!(
            BookSessionHandler::new(f.store.clone())
                .execute(
                    BookSessionCommand::new(Uuid::new_v4(), f.subject.id, at(10, 0), at(11, 0)),
                    &f.student,
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::NotFound { entity: "educator", .. }));
    }

    #[tokio::test]
    async fn test_only_students_book() {
        let f = fixture().await;

        let err = assert_err!(
            BookSessionHandler::new(f.store.clone())
                .execute(
                    BookSessionCommand::new(f.educator_id, f.subject.id, at(10, 0), at(11, 0)),
                    &f.educator,
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[tokio::test]
    async fn test_full_lifecycle() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();

        let confirmed = TransitionSessionHandler::new(f.store.clone())
            .execute(
                TransitionSessionCommand::new(session.id, SessionStatus::Confirmed)
                    .with_meeting_link("https://meet.example/abc".to_string()),
                &f.educator,
            )
            .await
            .unwrap();
        assert_eq!(confirmed.status, SessionStatus::Confirmed);
        assert_eq!(confirmed.meeting_link.as_deref(), Some("https://meet.example/abc"));

        let completed = f.transition(session.id, SessionStatus::Completed).await.unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);

        let err = assert_err!(f.transition(session.id, SessionStatus::Canceled).await);
        assert!(matches!(domain_err(err), DomainError::InvalidTransition { .. }));

        let stored = f.store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_transition_pending_to_completed_rejected() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();

        let err = assert_err!(f.transition(session.id, SessionStatus::Completed).await);
        assert!(matches!(domain_err(err), DomainError::InvalidTransition { .. }));

        let err = assert_err!(f.transition(session.id, SessionStatus::Pending).await);
        assert!(matches!(domain_err(err), DomainError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_transition_requires_session_educator() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();

        let stranger = ctx(Actor::Educator {
            user_id: Uuid::new_v4(),
            educator_id: Uuid::new_v4(),
        });
        let err = assert_err!(
            TransitionSessionHandler::new(f.store.clone())
                .execute(
                    TransitionSessionCommand::new(session.id, SessionStatus::Confirmed),
                    &stranger,
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));

        let err = assert_err!(
            TransitionSessionHandler::new(f.store.clone())
                .execute(
                    TransitionSessionCommand::new(session.id, SessionStatus::Canceled),
                    &f.student,
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_transition_unknown_session() {
        let f = fixture().await;
        let err = assert_err!(f.transition(Uuid::new_v4(), SessionStatus::Confirmed).await);
        assert!(matches!(domain_err(err), DomainError::NotFound { .. }));
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    #[tokio::test]
    async fn test_review_flow() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();
        let reviews = AttachReviewHandler::new(f.store.clone());

        let err = assert_err!(
            reviews
                .execute(AttachReviewCommand::new(session.id, 5), &f.student)
                .await
        );
        assert!(matches!(domain_err(err), DomainError::NotEligible(_)));

        f.transition(session.id, SessionStatus::Confirmed).await.unwrap();
        f.transition(session.id, SessionStatus::Completed).await.unwrap();

        let err = assert_err!(
            reviews
                .execute(AttachReviewCommand::new(session.id, 6), &f.student)
                .await
        );
        assert_eq!(domain_err(err), DomainError::InvalidRating("6".to_string()));

        let err = assert_err!(
            reviews
                .execute(AttachReviewCommand::new(session.id, 4), &f.other_student)
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));

        let review = assert_ok!(
            reviews
                .execute(
                    AttachReviewCommand::new(session.id, 5).with_comment("Clear and patient".to_string()),
                    &f.student,
                )
                .await
        );
        assert_eq!(review.rating.value(), 5);

        let err = assert_err!(
            reviews
                .execute(AttachReviewCommand::new(session.id, 3), &f.student)
                .await
        );
        assert!(matches!(domain_err(err), DomainError::NotEligible(_)));

        let listed = f.store.list_reviews_for_educator(f.educator_id).await.unwrap();
        assert_eq!(listed, vec![review]);
    }

    // =========================================================================
    // Payments
    // =========================================================================

    #[tokio::test]
    async fn test_simulated_payment_confirms_session() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 30)).await.unwrap();

        let result = assert_ok!(
            f.payments(Arc::new(SimulatedGateway))
                .execute(
                    CreatePaymentCommand::new(session.id, "card".to_string()),
                    &f.student,
                )
                .await
        );

        assert_eq!(result.transaction.amount.value(), dec!(60.00));
        assert_eq!(result.transaction.status, TransactionStatus::Completed);
        assert!(result.transaction.gateway_reference.is_some());
        assert_eq!(result.session.status, SessionStatus::Confirmed);

        let stored = f.store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_payment_by_other_student_forbidden() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();

        let err = assert_err!(
            f.payments(Arc::new(SimulatedGateway))
                .execute(
                    CreatePaymentCommand::new(session.id, "card".to_string()),
                    &f.other_student,
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));

        let rows = f
            .store
            .list_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_declined_payment_leaves_session_pending() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();

        let result = f
            .payments(Arc::new(SimulatedGateway))
            .execute(
                CreatePaymentCommand::new(session.id, SIMULATED_DECLINE_METHOD.to_string()),
                &f.student,
            )
            .await
            .unwrap();

        assert_eq!(result.transaction.status, TransactionStatus::Failed);
        assert_eq!(result.session.status, SessionStatus::Pending);
    }

    #[tokio::test]
    async fn test_deferred_payment_settled_by_callback() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();

        let created = f
            .payments(Arc::new(DeferredGateway))
            .execute(
                CreatePaymentCommand::new(session.id, "card".to_string()),
                &f.student,
            )
            .await
            .unwrap();
        assert_eq!(created.transaction.status, TransactionStatus::Pending);
        assert_eq!(created.session.status, SessionStatus::Pending);
        assert!(created.transaction.gateway_reference.is_some());

        let settle = SettlePaymentHandler::new(f.store.clone());
        let succeeded = SettlementOutcome::Succeeded {
            gateway_reference: Some("gw_42".to_string()),
        };

        let settlement = settle
            .execute(
                SettlePaymentCommand::new(created.transaction.id, succeeded.clone()),
                &OperationContext::new(),
            )
            .await
            .unwrap();
        assert!(settlement.transaction_changed);
        assert!(settlement.session_advanced);
        assert_eq!(settlement.transaction.gateway_reference.as_deref(), Some("gw_42"));
        assert_eq!(settlement.session.status, SessionStatus::Confirmed);

        let replay = settle
            .execute(
                SettlePaymentCommand::new(created.transaction.id, succeeded),
                &OperationContext::new(),
            )
            .await
            .unwrap();
        assert!(!replay.transaction_changed);
        assert!(!replay.session_advanced);

        let err = assert_err!(
            settle
                .execute(
                    SettlePaymentCommand::new(
                        created.transaction.id,
                        SettlementOutcome::Failed {
                            gateway_reference: None,
                            reason: Some("chargeback".to_string()),
                        },
                    ),
                    &OperationContext::new(),
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::InvalidTransition { .. }));

        let stored = f
            .store
            .get_transaction(created.transaction.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_payment_after_completion_leaves_session() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();
        f.transition(session.id, SessionStatus::Confirmed).await.unwrap();
        f.transition(session.id, SessionStatus::Completed).await.unwrap();

        let result = f
            .payments(Arc::new(SimulatedGateway))
            .execute(
                CreatePaymentCommand::new(session.id, "card".to_string()),
                &f.student,
            )
            .await
            .unwrap();
        assert_eq!(result.transaction.status, TransactionStatus::Completed);
        assert_eq!(result.session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_settle_unknown_transaction() {
        let f = fixture().await;
        let err = assert_err!(
            SettlePaymentHandler::new(f.store.clone())
                .execute(
                    SettlePaymentCommand::new(
                        Uuid::new_v4(),
                        SettlementOutcome::Succeeded {
                            gateway_reference: None
                        },
                    ),
                    &OperationContext::new(),
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::NotFound { .. }));
    }

    // =========================================================================
    // Payout accounts
    // =========================================================================

    fn bank_details(bank: &str) -> PayoutDetails {
        PayoutDetails {
            account_name: "Grace Hopper".to_string(),
            account_number: "0012345678".to_string(),
            bank_name: bank.to_string(),
            bank_code: "044".to_string(),
        }
    }

    #[tokio::test]
    async fn test_payout_account_upsert_keeps_verification() {
        let f = fixture().await;
        let payouts = SavePayoutAccountHandler::new(f.store.clone());

        let created = payouts
            .execute(SavePayoutAccountCommand::new(bank_details("First Bank")), &f.educator)
            .await
            .unwrap();
        assert!(!created.is_verified);

        let verified = VerifyPayoutAccountHandler::new(f.store.clone())
            .execute(VerifyPayoutAccountCommand::new(f.educator_id), &f.admin)
            .await
            .unwrap();
        assert!(verified.is_verified);

        let replaced = payouts
            .execute(SavePayoutAccountCommand::new(bank_details("Second Bank")), &f.educator)
            .await
            .unwrap();
        assert_eq!(replaced.id, created.id);
        assert!(replaced.is_verified);
        assert_eq!(replaced.details.bank_name, "Second Bank");
    }

    #[tokio::test]
    async fn test_payout_account_requires_educator() {
        let f = fixture().await;
        let err = assert_err!(
            SavePayoutAccountHandler::new(f.store.clone())
                .execute(SavePayoutAccountCommand::new(bank_details("First Bank")), &f.student)
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));

        let err = assert_err!(
            VerifyPayoutAccountHandler::new(f.store.clone())
                .execute(VerifyPayoutAccountCommand::new(f.educator_id), &f.educator)
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));
    }

    // =========================================================================
    // Registration, catalog, audit
    // =========================================================================

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let f = fixture().await;
        let err = assert_err!(
            RegisterStudentHandler::new(f.store.clone())
                .execute(
                    RegisterStudentCommand::new(
                        "sam@STUDENT.example".to_string(),
                        "Sam".to_string(),
                        "Again".to_string(),
                    ),
                    &OperationContext::new(),
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_educator_rejects_negative_rate() {
        let f = fixture().await;
        let err = assert_err!(
            RegisterEducatorHandler::new(f.store.clone())
                .execute(
                    RegisterEducatorCommand::new(
                        "neg@tutor.example".to_string(),
                        "Neg".to_string(),
                        "Rate".to_string(),
                        "BSc".to_string(),
                        "-5".to_string(),
                    ),
                    &OperationContext::new(),
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::InvalidRate(_)));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let f = fixture().await;
        let profiles = UpdateProfileHandler::new(f.store.clone());

        let user = assert_ok!(
            profiles
                .execute(
                    UpdateProfileCommand::new()
                        .with_last_name("Dee".to_string())
                        .with_bio("Second year physics".to_string()),
                    &f.student,
                )
                .await
        );
        assert_eq!(user.first_name, "Sam");
        assert_eq!(user.last_name, "Dee");
        assert_eq!(user.bio.as_deref(), Some("Second year physics"));

        let latest = f.store.recent_audit(1).await.unwrap().remove(0);
        assert_eq!(latest.action, "user.profile_updated");
        assert_eq!(latest.before_state.unwrap()["last_name"], "Doe");

        let err = assert_err!(profiles.execute(UpdateProfileCommand::new(), &f.student).await);
        assert!(matches!(domain_err(err), DomainError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_update_educator_profile() {
        let f = fixture().await;
        let profiles = UpdateEducatorProfileHandler::new(f.store.clone());

        let educator = assert_ok!(
            profiles
                .execute(
                    UpdateEducatorProfileCommand::new().with_hourly_rate("55.00".to_string()),
                    &f.educator,
                )
                .await
        );
        assert_eq!(educator.hourly_rate.value(), dec!(55.00));
        assert_eq!(educator.degree, "PhD Mathematics");
        assert_eq!(educator.verification_status, VerificationStatus::Verified);

        let err = assert_err!(
            profiles
                .execute(
                    UpdateEducatorProfileCommand::new().with_hourly_rate("12.345".to_string()),
                    &f.educator,
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::InvalidRate(_)));

        let err = assert_err!(
            profiles
                .execute(
                    UpdateEducatorProfileCommand::new().with_degree("MSc".to_string()),
                    &f.student,
                )
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_payment_uses_rate_at_payment_time() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 30)).await.unwrap();

        UpdateEducatorProfileHandler::new(f.store.clone())
            .execute(
                UpdateEducatorProfileCommand::new().with_hourly_rate("50.00".to_string()),
                &f.educator,
            )
            .await
            .unwrap();

        let result = assert_ok!(
            f.payments(Arc::new(SimulatedGateway))
                .execute(
                    CreatePaymentCommand::new(session.id, "card".to_string()),
                    &f.student,
                )
                .await
        );
        assert_eq!(result.transaction.amount.value(), dec!(75.00));
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let f = fixture().await;
        let favorites = ToggleFavoriteHandler::new(f.store.clone());

        let first = favorites
            .execute(ToggleFavoriteCommand::new(f.subject.id), &f.student)
            .await
            .unwrap();
        assert_eq!(first, FavoriteToggle::Added);

        let second = favorites
            .execute(ToggleFavoriteCommand::new(f.subject.id), &f.student)
            .await
            .unwrap();
        assert_eq!(second, FavoriteToggle::Removed);

        let err = assert_err!(
            favorites
                .execute(ToggleFavoriteCommand::new(Uuid::new_v4()), &f.student)
                .await
        );
        assert!(matches!(domain_err(err), DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_subject_admin_only() {
        let f = fixture().await;
        let err = assert_err!(
            CreateSubjectHandler::new(f.store.clone())
                .execute(CreateSubjectCommand::new("Physics".to_string()), &f.student)
                .await
        );
        assert!(matches!(domain_err(err), DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_audit_trail_records_transition() {
        let f = fixture().await;
        let session = f.book(at(10, 0), at(11, 0)).await.unwrap();
        let before = f.memory.audit_count().unwrap();

        f.transition(session.id, SessionStatus::Confirmed).await.unwrap();
        assert_eq!(f.memory.audit_count().unwrap(), before + 1);

        let latest = f.store.recent_audit(1).await.unwrap().remove(0);
        assert_eq!(latest.action, "session.status_changed");
        assert_eq!(latest.resource_id, session.id);
        assert_eq!(latest.correlation_id, f.educator.correlation_id);
        assert_eq!(latest.before_state.unwrap()["status"], "pending");
        assert_eq!(latest.after_state.unwrap()["status"], "confirmed");

        // Rejected commands leave no trace
        let _ = f.transition(session.id, SessionStatus::Pending).await;
        assert_eq!(f.memory.audit_count().unwrap(), before + 1);
    }
}
