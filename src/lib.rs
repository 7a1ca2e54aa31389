//! tutor_market Library
//!
//! Tutoring marketplace backend: session booking and lifecycle, reviews,
//! payments and educator payouts. Re-exports modules for integration
//! testing and the server binary.

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod gateway;
pub mod handlers;
pub mod store;

pub use api::{build_router, AppState};
pub use config::Config;
pub use error::{AppError, AppResult, ErrorResponse};
pub use domain::{
    Actor, DomainError, HourlyRate, Money, OperationContext, Session, SessionStatus, Transaction,
    TransactionStatus,
};
pub use store::{InMemoryStore, PgStore, SharedStore, Store, StoreError};
