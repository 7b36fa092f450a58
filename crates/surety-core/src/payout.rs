//! Payout delivery - the seam where funds leave the consortium
//!
//! Crediting a policy only moves value inside the ledger. Getting money to a
//! passenger's wallet goes through a [`PayoutChannel`], which can fail for
//! reasons outside the store (recipient rejects funds, channel down).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surety_types::{Amount, ParticipantId};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Proof that a transfer left the consortium
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub receipt_id: String,
    pub to: ParticipantId,
    pub amount: Amount,
    pub executed_at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("recipient {recipient} cannot accept funds")]
    Rejected { recipient: String },

    #[error("payout channel unavailable: {reason}")]
    Unavailable { reason: String },
}

#[async_trait::async_trait]
pub trait PayoutChannel: Send + Sync {
    async fn transfer(
        &self,
        to: &ParticipantId,
        amount: Amount,
    ) -> std::result::Result<TransferReceipt, TransferError>;
}

/// Channel that settles into an in-process wallet map
///
/// Recipients can be marked as rejecting to exercise the failure paths.
#[derive(Clone, Default)]
pub struct InMemoryPayoutChannel {
    wallets: Arc<RwLock<HashMap<ParticipantId, Amount>>>,
    receipts: Arc<RwLock<Vec<TransferReceipt>>>,
    rejecting: Arc<RwLock<HashSet<ParticipantId>>>,
}

impl InMemoryPayoutChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `recipient` refuse incoming transfers
    pub async fn reject(&self, recipient: &ParticipantId) {
        self.rejecting.write().await.insert(recipient.clone());
    }

    pub async fn accept(&self, recipient: &ParticipantId) {
        self.rejecting.write().await.remove(recipient);
    }

    /// Funds delivered to `recipient` so far
    pub async fn delivered(&self, recipient: &ParticipantId) -> Amount {
        self.wallets
            .read()
            .await
            .get(recipient)
            .copied()
            .unwrap_or_default()
    }

    pub async fn receipts(&self) -> Vec<TransferReceipt> {
        self.receipts.read().await.clone()
    }
}

#[async_trait::async_trait]
impl PayoutChannel for InMemoryPayoutChannel {
    async fn transfer(
        &self,
        to: &ParticipantId,
        amount: Amount,
    ) -> std::result::Result<TransferReceipt, TransferError> {
        if self.rejecting.read().await.contains(to) {
            return Err(TransferError::Rejected {
                recipient: to.to_string(),
            });
        }

        let mut wallets = self.wallets.write().await;
        let balance = wallets.entry(to.clone()).or_default();
        *balance = balance.checked_add(amount).ok_or_else(|| TransferError::Unavailable {
            reason: "wallet balance overflow".to_string(),
        })?;

        let receipt = TransferReceipt {
            receipt_id: format!("payout_{}", Uuid::new_v4()),
            to: to.clone(),
            amount,
            executed_at: Utc::now(),
        };
        self.receipts.write().await.push(receipt.clone());

        info!("Payout executed: {} to {}", amount, to);
        Ok(receipt)
    }
}
