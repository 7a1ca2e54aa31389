//! Payment Ledger
//!
//! Transactions recorded against sessions, the settlement rule that couples
//! a successful payment to its session, and educator payout accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::ensure_max_chars;
use super::{DomainError, HourlyRate, Money, Session};

const MAX_PAYMENT_METHOD_LEN: usize = 50;
const MAX_GATEWAY_REFERENCE_LEN: usize = 100;
const MAX_ACCOUNT_NAME_LEN: usize = 100;
const MAX_ACCOUNT_NUMBER_LEN: usize = 50;
const MAX_BANK_NAME_LEN: usize = 100;
const MAX_BANK_CODE_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    Payout,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Payout => "payout",
            TransactionType::Refund => "refund",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(TransactionType::Payment),
            "payout" => Ok(TransactionType::Payout),
            "refund" => Ok(TransactionType::Refund),
            other => Err(DomainError::InvalidRequest(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "refunded" => Ok(TransactionStatus::Refunded),
            other => Err(DomainError::InvalidRequest(format!(
                "unknown transaction status '{}'",
                other
            ))),
        }
    }
}

/// One financial event against a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub educator_id: Uuid,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    /// Identifier assigned by the payment gateway
    pub gateway_reference: Option<String>,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Open a pending payment for `session` on behalf of its student.
    ///
    /// The amount is priced with `current_rate`, i.e. the educator's rate at
    /// the moment of payment, not the rate in force when the session was
    /// booked.
    pub fn payment_for(
        session: &Session,
        actor_student_id: Uuid,
        current_rate: &HourlyRate,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if session.student_id != actor_student_id {
            return Err(DomainError::Forbidden(
                "you can only pay for your own sessions".to_string(),
            ));
        }

        let payment_method = payment_method.trim();
        if payment_method.is_empty() {
            return Err(DomainError::InvalidRequest(
                "payment_method is required".to_string(),
            ));
        }
        ensure_max_chars("payment_method", payment_method, MAX_PAYMENT_METHOD_LEN)?;

        let amount = session.cost(current_rate)?;

        Ok(Self {
            id: Uuid::new_v4(),
            session_id: session.id,
            student_id: session.student_id,
            educator_id: session.educator_id,
            amount,
            transaction_type: TransactionType::Payment,
            status: TransactionStatus::Pending,
            gateway_reference: None,
            payment_method: payment_method.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// The transaction's parties must be those of its session
    pub fn matches_session(&self, session: &Session) -> bool {
        self.session_id == session.id
            && self.student_id == session.student_id
            && self.educator_id == session.educator_id
    }
}

/// Final answer reported by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Succeeded {
        #[serde(default)]
        gateway_reference: Option<String>,
    },
    Failed {
        #[serde(default)]
        gateway_reference: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl SettlementOutcome {
    pub fn target_status(&self) -> TransactionStatus {
        match self {
            SettlementOutcome::Succeeded { .. } => TransactionStatus::Completed,
            SettlementOutcome::Failed { .. } => TransactionStatus::Failed,
        }
    }

    pub fn gateway_reference(&self) -> Option<&str> {
        match self {
            SettlementOutcome::Succeeded { gateway_reference }
            | SettlementOutcome::Failed { gateway_reference, .. } => gateway_reference.as_deref(),
        }
    }

    /// Reject a reference too long to be recorded
    pub fn validate(&self) -> Result<(), DomainError> {
        match self.gateway_reference() {
            Some(reference) => {
                ensure_max_chars("gateway_reference", reference, MAX_GATEWAY_REFERENCE_LEN)
            }
            None => Ok(()),
        }
    }
}

/// Resulting state of a payment settlement and its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub transaction: Transaction,
    pub session: Session,
    /// False when the same outcome had already been recorded
    pub transaction_changed: bool,
    /// True when the session moved from pending to confirmed
    pub session_advanced: bool,
}

impl Settlement {
    /// Decide what settling `transaction` with `outcome` does to it and to
    /// its session.
    ///
    /// - pending payment + success: completed, session confirmed if pending
    /// - pending payment + failure: failed, session untouched
    /// - already carrying the same final status: nothing changes
    /// - any other final status: `InvalidTransition`
    pub fn plan(
        transaction: &Transaction,
        session: &Session,
        outcome: &SettlementOutcome,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        outcome.validate()?;
        if transaction.transaction_type != TransactionType::Payment {
            return Err(DomainError::NotEligible(format!(
                "only payments can be settled (transaction is a {})",
                transaction.transaction_type
            )));
        }
        if !transaction.matches_session(session) {
            return Err(DomainError::InvalidRequest(format!(
                "transaction {} does not belong to session {}",
                transaction.id, session.id
            )));
        }

        let target = outcome.target_status();

        if transaction.status == target {
            return Ok(Self {
                transaction: transaction.clone(),
                session: session.clone(),
                transaction_changed: false,
                session_advanced: false,
            });
        }
        if transaction.status.is_terminal() {
            return Err(DomainError::invalid_transition(
                "transaction",
                transaction.status,
                target,
            ));
        }

        let settled = Transaction {
            status: target,
            gateway_reference: outcome
                .gateway_reference()
                .map(str::to_string)
                .or_else(|| transaction.gateway_reference.clone()),
            updated_at: now,
            ..transaction.clone()
        };

        let advanced = match outcome {
            SettlementOutcome::Succeeded { .. } => session.reconcile_after_payment(now),
            SettlementOutcome::Failed { .. } => None,
        };

        Ok(Self {
            transaction: settled,
            session_advanced: advanced.is_some(),
            session: advanced.unwrap_or_else(|| session.clone()),
            transaction_changed: true,
        })
    }
}

/// Bank details submitted by an educator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDetails {
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    #[serde(default)]
    pub bank_code: String,
}

impl PayoutDetails {
    pub fn validate(self) -> Result<Self, DomainError> {
        let trimmed = Self {
            account_name: self.account_name.trim().to_string(),
            account_number: self.account_number.trim().to_string(),
            bank_name: self.bank_name.trim().to_string(),
            bank_code: self.bank_code.trim().to_string(),
        };

        let missing: Vec<&str> = [
            ("account_name", &trimmed.account_name),
            ("account_number", &trimmed.account_number),
            ("bank_name", &trimmed.bank_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(DomainError::InvalidRequest(format!(
                "missing payout fields: {}",
                missing.join(", ")
            )));
        }
        ensure_max_chars("account_name", &trimmed.account_name, MAX_ACCOUNT_NAME_LEN)?;
        ensure_max_chars("account_number", &trimmed.account_number, MAX_ACCOUNT_NUMBER_LEN)?;
        ensure_max_chars("bank_name", &trimmed.bank_name, MAX_BANK_NAME_LEN)?;
        ensure_max_chars("bank_code", &trimmed.bank_code, MAX_BANK_CODE_LEN)?;

        Ok(trimmed)
    }
}

/// Where an educator's earnings are paid out.
///
/// `is_verified` is controlled by the trust/ops process only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutAccount {
    pub id: Uuid,
    pub educator_id: Uuid,
    #[serde(flatten)]
    pub details: PayoutDetails,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutAccount {
    pub fn open(educator_id: Uuid, details: PayoutDetails, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            educator_id,
            details,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the bank details, keeping identity and verification flag
    pub fn with_details(&self, details: PayoutDetails, now: DateTime<Utc>) -> Self {
        Self {
            details,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Create-or-replace keyed by educator
    pub fn upsert(
        existing: Option<&PayoutAccount>,
        educator_id: Uuid,
        details: PayoutDetails,
        now: DateTime<Utc>,
    ) -> Self {
        match existing {
            Some(account) => account.with_details(details, now),
            None => Self::open(educator_id, details, now),
        }
    }

    /// Account number with all but the last four characters hidden
    pub fn masked_account_number(&self) -> String {
        let number = &self.details.account_number;
        let visible = number.chars().count().saturating_sub(4);
        number
            .chars()
            .enumerate()
            .map(|(i, c)| if i < visible { '*' } else { c })
            .collect()
    }
}
