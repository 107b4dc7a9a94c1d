// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Read-only queries against the locker and bill contracts, under retry.

pub mod transport;

use core_types::{RetryPolicy, TonAddress};
use log::{debug, warn};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::sync::Arc;
use thiserror::Error;

pub use transport::{LedgerTransport, StackValue, TonCenterTransport};

pub const BILL_DATA_METHOD: &str = "get_locker_bill_data";
pub const AMOUNT_TO_WITHDRAW_METHOD: &str = "get_amount_to_withdraw";

/// Position of `last_withdraw_time` in the bill data tuple
/// `(locker, total_deposit, owner, last_withdraw_time)`.
const LAST_WITHDRAW_SLOT: usize = 3;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("ledger endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("ledger rpc error (code {code:?}): {message}")]
    Rpc { code: Option<i64>, message: String },
    #[error("{method} exited with code {exit_code}")]
    ExitCode { method: String, exit_code: i64 },
    #[error("malformed {method} response: {detail}")]
    MalformedResponse { method: String, detail: String },
    #[error("invalid last withdraw time: {0}")]
    InvalidTimestamp(String),
    #[error("invalid withdrawable amount: {0}")]
    InvalidAmount(String),
}

pub struct LedgerQueryClient {
    transport: Arc<dyn LedgerTransport>,
    retry: RetryPolicy,
}

impl LedgerQueryClient {
    pub fn new(transport: Arc<dyn LedgerTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default_network(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Live last-withdrawal timestamp from the user's bill contract.
    pub async fn get_last_withdraw_time(&self, bill: &TonAddress) -> Result<i64, LedgerError> {
        self.retry
            .retry_async(|attempt| async move {
                debug!("reading bill data for {} (attempt {})", bill, attempt + 1);
                let stack = self
                    .transport
                    .run_get_method(bill, BILL_DATA_METHOD, &[])
                    .await?;
                let last_withdraw_time = decode_timestamp(&stack)?;
                if last_withdraw_time == 0 {
                    warn!("bill {} reports no withdrawal yet (last_withdraw_time = 0)", bill);
                }
                Ok(last_withdraw_time)
            })
            .await
    }

    /// The locker's own computation of the amount withdrawable at `now`.
    pub async fn get_withdrawable_amount(
        &self,
        locker: &TonAddress,
        now: i64,
        last_withdraw_time: i64,
        principal: &BigInt,
    ) -> Result<BigInt, LedgerError> {
        if principal.is_zero() {
            return Ok(BigInt::zero());
        }
        let args = [
            BigInt::from(now),
            BigInt::from(last_withdraw_time),
            principal.clone(),
        ];
        self.retry
            .retry_async(|attempt| {
                let args = &args;
                async move {
                    debug!(
                        "{} on {} now={} last={} deposit={} (attempt {})",
                        AMOUNT_TO_WITHDRAW_METHOD,
                        locker,
                        now,
                        last_withdraw_time,
                        principal,
                        attempt + 1
                    );
                    let stack = self
                        .transport
                        .run_get_method(locker, AMOUNT_TO_WITHDRAW_METHOD, args)
                        .await?;
                    decode_amount(&stack)
                }
            })
            .await
    }
}

fn decode_timestamp(stack: &[StackValue]) -> Result<i64, LedgerError> {
    match stack.get(LAST_WITHDRAW_SLOT) {
        Some(StackValue::Num(value)) => value
            .to_i64()
            .filter(|ts| *ts >= 0)
            .ok_or_else(|| LedgerError::InvalidTimestamp(value.to_string())),
        Some(StackValue::Other { kind }) => Err(LedgerError::InvalidTimestamp(format!(
            "expected num, got {kind}"
        ))),
        None => Err(LedgerError::InvalidTimestamp(format!(
            "bill data has {} entries",
            stack.len()
        ))),
    }
}

fn decode_amount(stack: &[StackValue]) -> Result<BigInt, LedgerError> {
    match stack.first() {
        Some(StackValue::Num(value)) if !value.is_negative() => Ok(value.clone()),
        Some(StackValue::Num(value)) => Err(LedgerError::InvalidAmount(value.to_string())),
        Some(StackValue::Other { kind }) => {
            Err(LedgerError::InvalidAmount(format!("expected num, got {kind}")))
        }
        None => Err(LedgerError::InvalidAmount("empty stack".to_string())),
    }
}
