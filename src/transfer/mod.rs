//! Balance transfer gate
//!
//! Direct user-to-user transfers unlock only after a demonstrated trading
//! history. The completed-trade count comes from one authoritative store
//! aggregate - summing rows fetched client-side is informational only and
//! never gates. The funds movement itself is a single all-or-nothing
//! ledger operation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::core_types::UserId;
use crate::error::CoreError;
use crate::ledger::{BalanceContext, LedgerStore, TransferReceipt};
use crate::money::{self, CoinAmount, format_coin};

/// Completed trades required before transfers unlock.
pub const ELIGIBILITY_THRESHOLD: u32 = 5;

/// Eligibility verdict with the concrete progress numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub completed_trades: u32,
    pub required_trades: u32,
}

pub struct TransferGate {
    store: Arc<dyn LedgerStore>,
    clock: SharedClock,
}

impl TransferGate {
    pub fn new(store: Arc<dyn LedgerStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn check_eligibility(&self, user: UserId) -> Result<Eligibility, CoreError> {
        let completed = self.store.completed_trade_count(user).await?;
        Ok(Eligibility {
            eligible: completed >= ELIGIBILITY_THRESHOLD,
            completed_trades: completed,
            required_trades: ELIGIBILITY_THRESHOLD,
        })
    }

    /// Transfer coins to another user by handle.
    ///
    /// `token` is the client-supplied idempotency key; a repeated token
    /// returns the original receipt instead of moving funds twice.
    pub async fn transfer(
        &self,
        sender: UserId,
        recipient_handle: &str,
        amount: CoinAmount,
        token: Option<&str>,
    ) -> Result<TransferReceipt, CoreError> {
        let handle = recipient_handle.trim();
        if handle.is_empty() {
            return Err(CoreError::validation("enter a recipient handle"));
        }
        let recipient = self
            .store
            .resolve_handle(handle)
            .await?
            .ok_or_else(|| {
                CoreError::validation(format!("no user found with handle \"{handle}\""))
            })?;

        if amount == 0 {
            return Err(CoreError::validation("amount must be greater than 0"));
        }
        if amount < money::MIN_TRANSFER_AMOUNT {
            return Err(CoreError::validation(format!(
                "minimum transfer amount is {} coins",
                format_coin(money::MIN_TRANSFER_AMOUNT)
            )));
        }

        let available = self
            .store
            .available_balance(sender, BalanceContext::General)
            .await?;
        if amount > available {
            return Err(CoreError::validation(format!(
                "insufficient balance: available {} coins",
                format_coin(available)
            )));
        }

        let eligibility = self.check_eligibility(sender).await?;
        if !eligibility.eligible {
            return Err(CoreError::validation(format!(
                "complete at least {} trades before transferring ({}/{} completed)",
                eligibility.required_trades,
                eligibility.completed_trades,
                eligibility.required_trades
            )));
        }

        let receipt = self
            .store
            .transfer_balance_atomic(sender, recipient, amount, token, self.clock.now())
            .await?;

        tracing::info!(
            transfer_id = %receipt.id,
            sender,
            recipient,
            amount,
            "balance transferred"
        );
        Ok(receipt)
    }
}
