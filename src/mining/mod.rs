//! Mining claim state machine
//!
//! A per-user, cooldown-gated reward claim. Eligibility is computed by one
//! pure function used by BOTH the read-side status check and the store's
//! claim gate, so the policy cannot drift between them. The claim itself
//! is an atomic conditional update in the ledger store; the global-supply
//! decrement afterwards is advisory bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::core_types::UserId;
use crate::error::CoreError;
use crate::ledger::{ClaimOutcome, CooldownRecord, LedgerStore};

/// Mandatory wait between successive claims: 4 hours.
pub const COOLDOWN: Duration = Duration::hours(4);

/// Eligibility as computed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningStatus {
    Eligible,
    Cooling { remaining_secs: i64 },
}

impl MiningStatus {
    pub fn is_eligible(&self) -> bool {
        matches!(self, MiningStatus::Eligible)
    }

    pub fn remaining_secs(&self) -> i64 {
        match self {
            MiningStatus::Eligible => 0,
            MiningStatus::Cooling { remaining_secs } => *remaining_secs,
        }
    }
}

/// The one eligibility rule: no prior claim, or `now` has reached
/// `next_eligible_at`. Remaining time rounds up to whole seconds.
pub fn eligibility(record: Option<&CooldownRecord>, now: DateTime<Utc>) -> MiningStatus {
    match record {
        None => MiningStatus::Eligible,
        Some(rec) if now >= rec.next_eligible_at => MiningStatus::Eligible,
        Some(rec) => {
            let remaining_ms = (rec.next_eligible_at - now).num_milliseconds();
            MiningStatus::Cooling {
                remaining_secs: (remaining_ms as u64).div_ceil(1000) as i64,
            }
        }
    }
}

/// Cooldown record for a claim committed at `now`.
pub fn cooldown_after_claim(now: DateTime<Utc>) -> CooldownRecord {
    CooldownRecord {
        last_claim_at: now,
        next_eligible_at: now + COOLDOWN,
    }
}

/// Status payload for display: eligibility plus concrete numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningStatusView {
    pub eligible: bool,
    pub remaining_secs: i64,
    pub next_eligible_at: Option<DateTime<Utc>>,
}

/// Orchestrates status checks and claims against the ledger store.
pub struct MiningService {
    store: Arc<dyn LedgerStore>,
    clock: SharedClock,
}

impl MiningService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn check_status(&self, user: UserId) -> Result<MiningStatusView, CoreError> {
        let record = self.store.cooldown_record(user).await?;
        let now = self.clock.now();
        let status = eligibility(record.as_ref(), now);
        Ok(MiningStatusView {
            eligible: status.is_eligible(),
            remaining_secs: status.remaining_secs(),
            next_eligible_at: record.map(|r| r.next_eligible_at),
        })
    }

    /// Claim the reward. The cooldown is re-validated inside the store's
    /// atomic conditional update - a client-reported "eligible" state is
    /// never trusted.
    pub async fn claim(&self, user: UserId) -> Result<ClaimOutcome, CoreError> {
        let now = self.clock.now();
        let outcome = self.store.claim_mining_reward_atomic(user, now).await?;

        tracing::info!(
            user,
            amount = outcome.amount,
            next_eligible_at = %outcome.next_eligible_at,
            "mining reward claimed"
        );

        // Advisory: the claim already committed, so a supply bookkeeping
        // failure is logged and swallowed rather than rolled back.
        if let Err(e) = self.store.decrement_global_supply(outcome.amount).await {
            tracing::warn!(user, error = %e, "global supply decrement failed after claim");
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_no_prior_claim_is_eligible() {
        assert_eq!(eligibility(None, at(9, 0)), MiningStatus::Eligible);
    }

    #[test]
    fn test_cooling_reports_remaining_seconds() {
        let rec = cooldown_after_claim(at(9, 0));
        assert_eq!(rec.next_eligible_at, at(13, 0));

        match eligibility(Some(&rec), at(11, 0)) {
            MiningStatus::Cooling { remaining_secs } => assert_eq!(remaining_secs, 7200),
            other => panic!("expected Cooling, got {other:?}"),
        }
    }

    #[test]
    fn test_eligible_exactly_at_boundary() {
        let rec = cooldown_after_claim(at(9, 0));
        assert_eq!(eligibility(Some(&rec), at(13, 0)), MiningStatus::Eligible);
    }

    #[test]
    fn test_remaining_rounds_up() {
        let rec = CooldownRecord {
            last_claim_at: at(9, 0),
            next_eligible_at: at(9, 0) + Duration::milliseconds(1500),
        };
        match eligibility(Some(&rec), at(9, 0)) {
            MiningStatus::Cooling { remaining_secs } => assert_eq!(remaining_secs, 2),
            other => panic!("expected Cooling, got {other:?}"),
        }
    }
}
