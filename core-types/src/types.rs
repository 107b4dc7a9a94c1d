// Copyright (c) James Kassemi, SC, US. All rights reserved.

use crate::address::TonAddress;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// One depositor's entry in the published snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    /// Per-user bill contract tracking withdrawals against the locker.
    pub bill_address: TonAddress,
    pub user_address: TonAddress,
    /// Principal in nano units; fixed once published.
    pub principal: BigInt,
    /// Snapshot-time value, superseded by the live ledger read.
    pub last_withdraw_time: i64,
}

/// Snapshot-wide totals used to pro-rate the reward pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTotals {
    pub total_deposits: BigInt,
    pub total_coins_locked: BigInt,
    pub total_reward: BigInt,
}

/// Live state read from the ledger for a single request; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub last_withdraw_time: i64,
    /// The locker's own computation of what the user may withdraw now.
    pub withdrawable: BigInt,
}

/// Resolved balance for one wallet, all amounts in nano units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub available_to_withdraw: BigInt,
    pub still_locked: BigInt,
    pub total_user_deposit: BigInt,
    pub total_user_deposit_and_reward: BigInt,
}

impl WalletBalance {
    /// The "no deposit" result.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}
