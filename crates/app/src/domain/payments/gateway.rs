//! Outbound charge requests to the payment gateway.

use async_trait::async_trait;
use dashmap::DashMap;
use mockall::automock;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::domain::{checkout::CheckoutReference, common::CustomerUuid};

/// Charge for a finalized checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub reference: CheckoutReference,
    pub customer: CustomerUuid,
    /// Backend total in minor units; clients never pick the amount
    pub amount: u64,
}

/// What the gateway hands back for a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeHandle {
    /// Id the gateway will echo in its notifications
    pub correlation_id: String,
    pub checkout_url: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("payment gateway rejected the charge: {0}")]
    Rejected(String),
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a charge for `request.amount`.
    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeHandle, GatewayError>;
}

/// Gateway that records charges in memory instead of calling out. Used by
/// the `serve` command and tests.
#[derive(Debug, Default)]
pub struct ChargeOutbox {
    charges: DashMap<String, ChargeRequest>,
}

impl ChargeOutbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn charge(&self, correlation_id: &str) -> Option<ChargeRequest> {
        self.charges
            .get(correlation_id)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }
}

#[async_trait]
impl PaymentGateway for ChargeOutbox {
    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeHandle, GatewayError> {
        let correlation_id = format!("charge_{}", Uuid::now_v7().simple());

        info!(
            reference = %request.reference,
            amount = request.amount,
            %correlation_id,
            "queued charge"
        );

        self.charges.insert(correlation_id.clone(), request);

        Ok(ChargeHandle {
            correlation_id,
            checkout_url: None,
        })
    }
}
