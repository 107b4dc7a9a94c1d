// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Bills snapshot payload and the in-memory index built from it.

use core_types::{AggregateTotals, DepositRecord, TonAddress};
use log::warn;
use num_bigint::BigInt;
use num_traits::Signed;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::DatasetError;

#[derive(Debug, Deserialize)]
struct BillsPayload {
    total_deposits: Value,
    total_coins_locked: Value,
    total_reward: Value,
    bills: Vec<BillEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BillEntry {
    bill_address: String,
    user_address: String,
    total_deposit: Value,
    last_withdraw_time: i64,
}

/// Immutable, parsed snapshot keyed by normalized owner address.
#[derive(Debug, Clone)]
pub struct Dataset {
    totals: AggregateTotals,
    by_user: HashMap<TonAddress, DepositRecord>,
}

impl Dataset {
    pub fn from_json(raw: &[u8]) -> Result<Self, DatasetError> {
        let payload: BillsPayload = serde_json::from_slice(raw)?;
        let totals = AggregateTotals {
            total_deposits: parse_amount("total_deposits", &payload.total_deposits)?,
            total_coins_locked: parse_amount("total_coins_locked", &payload.total_coins_locked)?,
            total_reward: parse_amount("total_reward", &payload.total_reward)?,
        };

        let mut by_user = HashMap::with_capacity(payload.bills.len());
        let mut duplicates = 0usize;
        for bill in payload.bills {
            let user_address =
                TonAddress::parse(&bill.user_address).map_err(|source| DatasetError::InvalidAddress {
                    value: bill.user_address.clone(),
                    source,
                })?;
            let bill_address =
                TonAddress::parse(&bill.bill_address).map_err(|source| DatasetError::InvalidAddress {
                    value: bill.bill_address.clone(),
                    source,
                })?;
            let record = DepositRecord {
                bill_address,
                user_address,
                principal: parse_amount("totalDeposit", &bill.total_deposit)?,
                last_withdraw_time: bill.last_withdraw_time,
            };
            if by_user.insert(user_address, record).is_some() {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            warn!("bills snapshot lists {duplicates} owners more than once; keeping the last entry");
        }
        Ok(Self { totals, by_user })
    }

    pub fn totals(&self) -> &AggregateTotals {
        &self.totals
    }

    pub fn get(&self, address: &TonAddress) -> Option<&DepositRecord> {
        self.by_user.get(address)
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

/// Amounts arrive as JSON integers or decimal strings; both must be non-negative.
fn parse_amount(field: &'static str, value: &Value) -> Result<BigInt, DatasetError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(DatasetError::InvalidAmount {
                field,
                value: other.to_string(),
            });
        }
    };
    let amount = text
        .parse::<BigInt>()
        .map_err(|_| DatasetError::InvalidAmount {
            field,
            value: text.clone(),
        })?;
    if amount.is_negative() {
        return Err(DatasetError::InvalidAmount { field, value: text });
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "0:1111111111111111111111111111111111111111111111111111111111111111";
    const BILL: &str = "0:2222222222222222222222222222222222222222222222222222222222222222";

    fn payload(total_deposit: &str, coins_locked: &str) -> String {
        format!(
            r#"{{
                "total_deposits": 5000,
                "total_coins_locked": {coins_locked},
                "total_reward": 250,
                "bills": [
                    {{"billAddress": "{BILL}", "userAddress": "{USER}", "totalDeposit": {total_deposit}, "lastWithdrawTime": 0}}
                ]
            }}"#
        )
    }

    #[test]
    fn indexes_bills_by_normalized_owner() {
        let ds = Dataset::from_json(payload(r#""1000""#, "4000").as_bytes()).unwrap();
        assert_eq!(ds.len(), 1);
        let owner = TonAddress::parse(USER).unwrap();
        let friendly = owner.to_friendly(false, false);
        let record = ds.get(&TonAddress::parse(&friendly).unwrap()).unwrap();
        assert_eq!(record.principal, BigInt::from(1_000));
        assert_eq!(record.bill_address, TonAddress::parse(BILL).unwrap());
        assert_eq!(ds.totals().total_coins_locked, BigInt::from(4_000));
        assert_eq!(ds.totals().total_reward, BigInt::from(250));
    }

    #[test]
    fn totals_beyond_u64_keep_full_precision() {
        let ds = Dataset::from_json(payload("1", "340282366920938463463374607431768211457").as_bytes())
            .unwrap();
        assert_eq!(
            ds.totals().total_coins_locked.to_string(),
            "340282366920938463463374607431768211457"
        );
    }

    #[test]
    fn negative_deposit_is_rejected() {
        let err = Dataset::from_json(payload(r#""-5""#, "1").as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InvalidAmount {
                field: "totalDeposit",
                ..
            }
        ));
    }

    #[test]
    fn fractional_amount_is_rejected() {
        assert!(Dataset::from_json(payload("1.5", "1").as_bytes()).is_err());
    }

    #[test]
    fn malformed_owner_fails_the_whole_snapshot() {
        let raw = payload("1", "1").replace(USER, "garbage");
        let err = Dataset::from_json(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidAddress { .. }));
    }

    #[test]
    fn missing_fields_are_payload_errors() {
        let err = Dataset::from_json(br#"{"bills": []}"#).unwrap_err();
        assert!(matches!(err, DatasetError::Payload(_)));
    }
}
