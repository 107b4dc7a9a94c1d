// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Combines the bills snapshot, live ledger state and the vesting schedule
//! into a single wallet balance.

use core_types::{
    AddressError, AggregateTotals, DepositRecord, LedgerState, TonAddress, WalletBalance,
};
use dataset_cache::{DatasetCache, SharedDatasetError};
use ledger_client::{LedgerError, LedgerQueryClient};
use log::{debug, info, warn};
use num_bigint::BigInt;
use std::sync::Arc;
use thiserror::Error;
use vesting::{VestingError, VestingInfo, VestingSchedule, total_with_reward};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid address '{value}': {source}")]
    AddressInvalid {
        value: String,
        #[source]
        source: AddressError,
    },
    #[error("dataset unavailable: {0}")]
    DatasetUnavailable(#[source] SharedDatasetError),
    /// The ledger read failed on every attempt; carries the final error as-is.
    #[error(transparent)]
    LedgerQueryExhausted(LedgerError),
    #[error("inconsistent state: {detail}")]
    InconsistentState {
        detail: String,
        #[source]
        source: Option<LedgerError>,
    },
}

impl ResolveError {
    fn inconsistent(detail: String) -> Self {
        ResolveError::InconsistentState {
            detail,
            source: None,
        }
    }
}

/// Values that break the contract's own invariants are inconsistent state,
/// not an outage, even when every retry saw them.
impl From<LedgerError> for ResolveError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidTimestamp(_) | LedgerError::InvalidAmount(_) => {
                ResolveError::InconsistentState {
                    detail: format!("ledger returned {err}"),
                    source: Some(err),
                }
            }
            other => ResolveError::LedgerQueryExhausted(other),
        }
    }
}

impl From<SharedDatasetError> for ResolveError {
    fn from(err: SharedDatasetError) -> Self {
        ResolveError::DatasetUnavailable(err)
    }
}

impl From<VestingError> for ResolveError {
    fn from(err: VestingError) -> Self {
        ResolveError::inconsistent(err.to_string())
    }
}

/// Ledger and local withdrawable amounts that disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub ledger: BigInt,
    pub local: BigInt,
}

/// A balance plus the inputs it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub balance: WalletBalance,
    /// `None` when the wallet has no deposit and the ledger was not queried.
    pub ledger_state: Option<LedgerState>,
    pub divergence: Option<Divergence>,
}

impl Resolution {
    fn no_deposit() -> Self {
        Self {
            balance: WalletBalance::zero(),
            ledger_state: None,
            divergence: None,
        }
    }

    pub fn has_deposit(&self) -> bool {
        self.ledger_state.is_some()
    }
}

pub struct BalanceResolver {
    dataset: Arc<DatasetCache>,
    ledger: LedgerQueryClient,
    schedule: VestingSchedule,
}

impl BalanceResolver {
    pub fn new(dataset: Arc<DatasetCache>, ledger: LedgerQueryClient, schedule: VestingSchedule) -> Self {
        Self {
            dataset,
            ledger,
            schedule,
        }
    }

    pub fn schedule(&self) -> &VestingSchedule {
        &self.schedule
    }

    pub fn vesting_info(&self) -> VestingInfo {
        self.schedule.info()
    }

    /// Whether the wallet has any deposit in the snapshot.
    pub async fn validate(&self, user: &str) -> Result<bool, ResolveError> {
        Ok(self.dataset.validate(user).await?)
    }

    pub async fn resolve_balance(
        &self,
        locker: &str,
        user: &str,
        now: i64,
    ) -> Result<WalletBalance, ResolveError> {
        Ok(self.resolve_detailed(locker, user, now).await?.balance)
    }

    /// Resolve the balance of `user` against `locker` at `now` (epoch seconds).
    ///
    /// A wallet without a deposit yields a zero balance and no ledger calls.
    /// Once a deposit is found, any dataset or ledger failure aborts the whole
    /// resolution; no partial balance is returned.
    pub async fn resolve_detailed(
        &self,
        locker: &str,
        user: &str,
        now: i64,
    ) -> Result<Resolution, ResolveError> {
        let Some(record) = self.dataset.lookup(user).await? else {
            debug!("no deposit found for {}", user);
            return Ok(Resolution::no_deposit());
        };
        let locker = TonAddress::parse(locker).map_err(|source| ResolveError::AddressInvalid {
            value: locker.to_string(),
            source,
        })?;
        let totals = self.dataset.aggregate_totals().await?;

        let last_withdraw_time = self.ledger.get_last_withdraw_time(&record.bill_address).await?;
        let principal = &record.principal;
        let total = total_with_reward(principal, &totals.total_reward, &totals.total_coins_locked);

        let available = self
            .ledger
            .get_withdrawable_amount(&locker, now, last_withdraw_time, principal)
            .await?;

        let unlocked = self.schedule.unlocked_amount(now, &total);
        let still_locked = &total - &unlocked;

        let divergence =
            self.cross_check(&record, &totals, now, last_withdraw_time, &available, &total)?;

        info!(
            "resolved {}: available={} locked={} deposit={} with_reward={}",
            record.user_address, available, still_locked, principal, total
        );
        Ok(Resolution {
            ledger_state: Some(LedgerState {
                last_withdraw_time,
                withdrawable: available.clone(),
            }),
            balance: WalletBalance {
                available_to_withdraw: available,
                still_locked,
                total_user_deposit: record.principal.clone(),
                total_user_deposit_and_reward: total,
            },
            divergence,
        })
    }

    /// The ledger amount is authoritative; the local schedule only vets it.
    fn cross_check(
        &self,
        record: &DepositRecord,
        totals: &AggregateTotals,
        now: i64,
        last_withdraw_time: i64,
        available: &BigInt,
        total: &BigInt,
    ) -> Result<Option<Divergence>, ResolveError> {
        let local = self.schedule.amount_to_withdraw(
            now,
            last_withdraw_time,
            &record.principal,
            &totals.total_reward,
            &totals.total_coins_locked,
        )?;
        if available > total {
            return Err(ResolveError::inconsistent(format!(
                "ledger reports {available} withdrawable for {}, above total entitlement {total}",
                record.user_address
            )));
        }
        if *available == local {
            return Ok(None);
        }
        warn!(
            "withdrawable amount for {} diverges: ledger={} local={} (now={}, last_withdraw={})",
            record.user_address, available, local, now, last_withdraw_time
        );
        Ok(Some(Divergence {
            ledger: available.clone(),
            local,
        }))
    }
}
