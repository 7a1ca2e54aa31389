//! Payment gateway collaborator
//!
//! A created payment is submitted to a gateway, which may answer right away
//! or later through the settle callback endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Money, SettlementOutcome};

/// Payment method that [`SimulatedGateway`] always declines
pub const SIMULATED_DECLINE_METHOD: &str = "test_decline";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// What the gateway is asked to charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeRequest {
    pub transaction_id: Uuid,
    pub amount: Money,
    pub payment_method: String,
}

/// Gateway answer to a charge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    Approved { reference: String },
    Declined { reference: Option<String>, reason: String },
    /// Final answer will arrive through the settle callback
    Pending { reference: Option<String> },
}

impl GatewayResponse {
    /// Outcome to settle with, or `None` while the charge is still pending
    pub fn outcome(&self) -> Option<SettlementOutcome> {
        match self {
            GatewayResponse::Approved { reference } => Some(SettlementOutcome::Succeeded {
                gateway_reference: Some(reference.clone()),
            }),
            GatewayResponse::Declined { reference, reason } => Some(SettlementOutcome::Failed {
                gateway_reference: reference.clone(),
                reason: Some(reason.clone()),
            }),
            GatewayResponse::Pending { .. } => None,
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            GatewayResponse::Approved { reference } => Some(reference),
            GatewayResponse::Declined { reference, .. }
            | GatewayResponse::Pending { reference } => reference.as_deref(),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn submit(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError>;

    fn name(&self) -> &'static str;
}

/// Approves every charge immediately, except for
/// [`SIMULATED_DECLINE_METHOD`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn submit(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError> {
        let reference = format!("sim_{}", Uuid::new_v4().simple());

        if request.payment_method == SIMULATED_DECLINE_METHOD {
            return Ok(GatewayResponse::Declined {
                reference: Some(reference),
                reason: "card declined".to_string(),
            });
        }

        tracing::debug!(
            transaction_id = %request.transaction_id,
            amount = %request.amount,
            reference = %reference,
            "Simulated gateway approved charge"
        );
        Ok(GatewayResponse::Approved { reference })
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

/// Accepts every charge and leaves it pending; the outcome is delivered
/// later through the settle callback.
#[derive(Debug, Clone, Default)]
pub struct DeferredGateway;

#[async_trait]
impl PaymentGateway for DeferredGateway {
    async fn submit(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError> {
        Ok(GatewayResponse::Pending {
            reference: Some(format!("dfr_{}", request.transaction_id.simple())),
        })
    }

    fn name(&self) -> &'static str {
        "deferred"
    }
}

/// Gateway selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayKind {
    #[default]
    Simulated,
    Deferred,
}

impl FromStr for GatewayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simulated" => Ok(GatewayKind::Simulated),
            "deferred" => Ok(GatewayKind::Deferred),
            other => Err(format!("unknown payment gateway '{}'", other)),
        }
    }
}

impl GatewayKind {
    pub fn build(self) -> std::sync::Arc<dyn PaymentGateway> {
        match self {
            GatewayKind::Simulated => std::sync::Arc::new(SimulatedGateway),
            GatewayKind::Deferred => std::sync::Arc::new(DeferredGateway),
        }
    }
}
