// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Stepwise linear vesting arithmetic over arbitrary-precision amounts.
//!
//! Nothing unlocks before the first period boundary; after that the unlocked
//! share grows by one `1 / total_periods` step per elapsed period until the
//! schedule ends and the full amount is available.

use core_types::VestingConfig;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VestingError {
    #[error("unlock period must be positive, got {0}")]
    UnlockPeriod(i64),
    #[error("vesting duration {duration} shorter than unlock period {period}")]
    Duration { duration: i64, period: i64 },
    #[error(
        "negative withdrawal: unlocked at {now} is {current}, unlocked at last withdrawal {last} is {previous}"
    )]
    NegativeWithdrawal {
        now: i64,
        last: i64,
        current: BigInt,
        previous: BigInt,
    },
}

/// Derived schedule facts, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VestingInfo {
    pub deposits_end_time: i64,
    pub vesting_start_time: i64,
    pub vesting_total_duration: i64,
    pub unlock_period: i64,
    pub total_periods: i64,
    pub vesting_end_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VestingSchedule {
    config: VestingConfig,
}

impl VestingSchedule {
    pub fn new(config: VestingConfig) -> Result<Self, VestingError> {
        if config.unlock_period <= 0 {
            return Err(VestingError::UnlockPeriod(config.unlock_period));
        }
        if config.vesting_total_duration < config.unlock_period {
            return Err(VestingError::Duration {
                duration: config.vesting_total_duration,
                period: config.unlock_period,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &VestingConfig {
        &self.config
    }

    pub fn vesting_end_time(&self) -> i64 {
        self.config.vesting_start_time + self.config.vesting_total_duration
    }

    fn first_unlock_time(&self) -> i64 {
        self.config.vesting_start_time + self.config.unlock_period
    }

    pub fn total_periods(&self) -> i64 {
        self.config.vesting_total_duration / self.config.unlock_period
    }

    /// Portion of `total_amount` unlocked at `now`.
    pub fn unlocked_amount(&self, now: i64, total_amount: &BigInt) -> BigInt {
        if now >= self.vesting_end_time() {
            return total_amount.clone();
        }
        if now < self.first_unlock_time() {
            return BigInt::zero();
        }
        let periods_passed = (now - self.config.vesting_start_time) / self.config.unlock_period;
        // Multiply before dividing so truncation happens once.
        total_amount * BigInt::from(periods_passed) / BigInt::from(self.total_periods())
    }

    /// Amount newly unlocked between the last withdrawal and `now`.
    pub fn amount_to_withdraw(
        &self,
        now: i64,
        last_withdraw_time: i64,
        principal: &BigInt,
        total_reward: &BigInt,
        total_coins_locked: &BigInt,
    ) -> Result<BigInt, VestingError> {
        let total = total_with_reward(principal, total_reward, total_coins_locked);
        let current = self.unlocked_amount(now, &total);
        let previous = self.unlocked_amount(last_withdraw_time, &total);
        let diff = &current - &previous;
        if diff.is_negative() {
            return Err(VestingError::NegativeWithdrawal {
                now,
                last: last_withdraw_time,
                current,
                previous,
            });
        }
        Ok(diff)
    }

    pub fn is_withdraw_available(&self, now: i64) -> bool {
        now >= self.first_unlock_time()
    }

    /// Next period boundary strictly after `now`, or `None` once fully vested.
    pub fn next_unlock_time(&self, now: i64) -> Option<i64> {
        if now >= self.vesting_end_time() {
            return None;
        }
        if now < self.first_unlock_time() {
            return Some(self.first_unlock_time());
        }
        let periods_passed = (now - self.config.vesting_start_time) / self.config.unlock_period;
        let next = self.config.vesting_start_time + (periods_passed + 1) * self.config.unlock_period;
        Some(next.min(self.vesting_end_time()))
    }

    pub fn info(&self) -> VestingInfo {
        VestingInfo {
            deposits_end_time: self.config.deposits_end_time,
            vesting_start_time: self.config.vesting_start_time,
            vesting_total_duration: self.config.vesting_total_duration,
            unlock_period: self.config.unlock_period,
            total_periods: self.total_periods(),
            vesting_end_time: self.vesting_end_time(),
        }
    }
}

/// Principal plus its pro-rata share of the reward pool.
///
/// `principal + principal * total_reward / total_coins_locked`, truncating;
/// the reward term is zero when nothing is locked.
pub fn total_with_reward(
    principal: &BigInt,
    total_reward: &BigInt,
    total_coins_locked: &BigInt,
) -> BigInt {
    if !total_coins_locked.is_positive() {
        return principal.clone();
    }
    principal + principal * total_reward / total_coins_locked
}
