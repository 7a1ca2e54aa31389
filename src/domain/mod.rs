//! Domain module
//!
//! Marketplace entities and the rules that govern them. Nothing in here
//! touches storage or HTTP.

pub mod catalog;
pub mod context;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod money;
pub mod review;
pub mod session;

pub use catalog::{FavoriteToggle, Subject};
pub use context::OperationContext;
pub use error::DomainError;
pub use identity::{
    Actor, Educator, EducatorChanges, ProfileChanges, Role, Student, User, VerificationStatus,
};
pub use ledger::{
    PayoutAccount, PayoutDetails, Settlement, SettlementOutcome, Transaction, TransactionStatus,
    TransactionType,
};
pub use money::{HourlyRate, Money, MoneyError};
pub use review::{Rating, Review};
pub use session::{Session, SessionStatus, TimeSlot};
