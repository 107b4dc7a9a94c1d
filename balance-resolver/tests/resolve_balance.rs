// Copyright (c) James Kassemi, SC, US. All rights reserved.
use async_compression::tokio::bufread::ZlibEncoder;
use async_trait::async_trait;
use balance_resolver::{BalanceResolver, Divergence, ResolveError};
use bytes::Bytes;
use core_types::{TonAddress, VestingConfig, WalletBalance};
use dataset_cache::{DatasetCache, DatasetError, SnapshotSource};
use ledger_client::{
    AMOUNT_TO_WITHDRAW_METHOD, BILL_DATA_METHOD, LedgerError, LedgerQueryClient, LedgerTransport,
    StackValue,
};
use num_bigint::BigInt;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tokio::time::pause;
use vesting::VestingSchedule;

const LOCKER: &str = "0:ed1691307050047117b998b561d8de82d31fbf84910ced6eb5fc92e7485ef8a7";

fn user() -> TonAddress {
    TonAddress::new(0, [0x11; 32])
}

fn bill() -> TonAddress {
    TonAddress::new(0, [0x22; 32])
}

/// Serves a zlib-compressed snapshot built from JSON, or fails.
struct StaticSource {
    payload: Option<Vec<u8>>,
}

#[async_trait]
impl SnapshotSource for StaticSource {
    async fn fetch(&self) -> Result<Bytes, DatasetError> {
        let Some(payload) = &self.payload else {
            return Err(DatasetError::Status {
                status: 404,
                url: "static".to_string(),
            });
        };
        let mut out = Vec::new();
        ZlibEncoder::new(payload.as_slice())
            .read_to_end(&mut out)
            .await
            .map_err(DatasetError::Decompress)?;
        Ok(Bytes::from(out))
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

#[derive(Default)]
struct ScriptedLedger {
    replies: Mutex<VecDeque<Result<Vec<StackValue>, LedgerError>>>,
    calls: Mutex<Vec<(TonAddress, String, Vec<BigInt>)>>,
}

impl ScriptedLedger {
    fn new(replies: Vec<Result<Vec<StackValue>, LedgerError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(TonAddress, String, Vec<BigInt>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerTransport for ScriptedLedger {
    async fn run_get_method(
        &self,
        address: &TonAddress,
        method: &str,
        args: &[BigInt],
    ) -> Result<Vec<StackValue>, LedgerError> {
        self.calls
            .lock()
            .unwrap()
            .push((*address, method.to_string(), args.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LedgerError::Status { status: 599 }))
    }
}

fn num(v: i64) -> StackValue {
    StackValue::Num(BigInt::from(v))
}

fn bill_data(last_withdraw_time: i64) -> Vec<StackValue> {
    let cell = StackValue::Other {
        kind: "cell".to_string(),
    };
    vec![cell.clone(), num(100), cell, num(last_withdraw_time)]
}

fn snapshot(total_coins_locked: i64) -> Vec<u8> {
    json!({
        "total_deposits": 1000,
        "total_coins_locked": total_coins_locked,
        "total_reward": 10,
        "bills": [{
            "billAddress": bill().to_raw_string(),
            "userAddress": user().to_friendly(false, false),
            "totalDeposit": "100",
            "lastWithdrawTime": 0
        }]
    })
    .to_string()
    .into_bytes()
}

fn schedule() -> VestingSchedule {
    VestingSchedule::new(VestingConfig {
        deposits_end_time: 500,
        vesting_start_time: 1_000,
        vesting_total_duration: 500,
        unlock_period: 100,
    })
    .unwrap()
}

fn resolver(payload: Option<Vec<u8>>, ledger: Arc<ScriptedLedger>) -> BalanceResolver {
    let dataset = Arc::new(DatasetCache::new(Arc::new(StaticSource { payload })));
    BalanceResolver::new(dataset, LedgerQueryClient::new(ledger), schedule())
}

fn big(v: i64) -> BigInt {
    BigInt::from(v)
}

#[tokio::test]
async fn unknown_wallet_gets_zero_balance_without_ledger_calls() {
    let ledger = ScriptedLedger::new(vec![]);
    let resolver = resolver(Some(snapshot(1_000)), ledger.clone());
    let stranger = TonAddress::new(0, [0x33; 32]).to_raw_string();

    let resolution = resolver.resolve_detailed(LOCKER, &stranger, 1_350).await.unwrap();

    assert_eq!(resolution.balance, WalletBalance::zero());
    assert!(!resolution.has_deposit());
    assert!(ledger.calls().is_empty());

    let garbage = resolver.resolve_balance(LOCKER, "not an address", 1_350).await.unwrap();
    assert!(garbage.is_zero());
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn unknown_wallet_gets_zero_balance_even_with_bad_locker() {
    let ledger = ScriptedLedger::new(vec![]);
    let resolver = resolver(Some(snapshot(1_000)), ledger.clone());
    let stranger = TonAddress::new(0, [0x33; 32]).to_raw_string();

    let balance = resolver.resolve_balance("bogus", &stranger, 1_350).await.unwrap();

    assert!(balance.is_zero());
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn resolves_balance_from_snapshot_and_ledger() {
    // total = 100 + 100 * 10 / 1000 = 101; at 1350 three of five periods are unlocked.
    let ledger = ScriptedLedger::new(vec![Ok(bill_data(1_150)), Ok(vec![num(40)])]);
    let resolver = resolver(Some(snapshot(1_000)), ledger.clone());

    let resolution = resolver
        .resolve_detailed(LOCKER, &user().to_raw_string(), 1_350)
        .await
        .unwrap();

    assert_eq!(
        resolution.balance,
        WalletBalance {
            available_to_withdraw: big(40),
            still_locked: big(41),
            total_user_deposit: big(100),
            total_user_deposit_and_reward: big(101),
        }
    );
    assert_eq!(resolution.divergence, None);
    assert_eq!(resolution.ledger_state.unwrap().last_withdraw_time, 1_150);

    let calls = ledger.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[0].0, calls[0].1.as_str()), (bill(), BILL_DATA_METHOD));
    assert_eq!(calls[1].0, TonAddress::parse(LOCKER).unwrap());
    assert_eq!(calls[1].1, AMOUNT_TO_WITHDRAW_METHOD);
    assert_eq!(calls[1].2, vec![big(1_350), big(1_150), big(100)]);
}

#[tokio::test]
async fn ledger_amount_wins_and_divergence_is_reported() {
    let ledger = ScriptedLedger::new(vec![Ok(bill_data(1_150)), Ok(vec![num(39)])]);
    let resolver = resolver(Some(snapshot(1_000)), ledger);

    let resolution = resolver
        .resolve_detailed(LOCKER, &user().to_raw_string(), 1_350)
        .await
        .unwrap();

    assert_eq!(resolution.balance.available_to_withdraw, big(39));
    assert_eq!(
        resolution.divergence,
        Some(Divergence {
            ledger: big(39),
            local: big(40),
        })
    );
}

#[tokio::test]
async fn zero_coins_locked_means_no_reward() {
    let ledger = ScriptedLedger::new(vec![Ok(bill_data(0)), Ok(vec![num(100)])]);
    let resolver = resolver(Some(snapshot(0)), ledger);

    let balance = resolver
        .resolve_balance(LOCKER, &user().to_raw_string(), 2_000)
        .await
        .unwrap();

    assert_eq!(balance.total_user_deposit_and_reward, big(100));
    assert_eq!(balance.still_locked, big(0));
    assert_eq!(balance.available_to_withdraw, big(100));
}

#[tokio::test]
async fn ledger_amount_above_entitlement_is_inconsistent() {
    let ledger = ScriptedLedger::new(vec![Ok(bill_data(0)), Ok(vec![num(5_000)])]);
    let resolver = resolver(Some(snapshot(1_000)), ledger);

    let err = resolver
        .resolve_balance(LOCKER, &user().to_raw_string(), 1_350)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::InconsistentState { .. }));
}

#[tokio::test]
async fn withdrawal_after_now_is_inconsistent() {
    let ledger = ScriptedLedger::new(vec![Ok(bill_data(1_400)), Ok(vec![num(0)])]);
    let resolver = resolver(Some(snapshot(1_000)), ledger);

    let err = resolver
        .resolve_balance(LOCKER, &user().to_raw_string(), 1_350)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::InconsistentState { .. }));
}

#[tokio::test]
async fn exhausted_ledger_reads_abort_resolution() {
    pause();
    let failures = (0..5)
        .map(|i| {
            Err(LedgerError::Rpc {
                code: Some(500 + i),
                message: format!("upstream failure {i}"),
            })
        })
        .collect();
    let ledger = ScriptedLedger::new(failures);
    let resolver = resolver(Some(snapshot(1_000)), ledger.clone());

    let err = resolver
        .resolve_balance(LOCKER, &user().to_raw_string(), 1_350)
        .await
        .unwrap_err();

    match err {
        ResolveError::LedgerQueryExhausted(LedgerError::Rpc { code, message }) => {
            assert_eq!(code, Some(504));
            assert_eq!(message, "upstream failure 4");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ledger.calls().len(), 5);
    assert!(ledger.calls().iter().all(|call| call.1 == BILL_DATA_METHOD));
}

#[tokio::test]
async fn corrupt_bill_timestamp_is_inconsistent_state() {
    pause();
    let cell = StackValue::Other {
        kind: "cell".to_string(),
    };
    let corrupt = vec![cell.clone(), num(100), cell.clone(), cell];
    let ledger = ScriptedLedger::new((0..5).map(|_| Ok(corrupt.clone())).collect());
    let resolver = resolver(Some(snapshot(1_000)), ledger.clone());

    let err = resolver
        .resolve_balance(LOCKER, &user().to_raw_string(), 1_350)
        .await
        .unwrap_err();

    match err {
        ResolveError::InconsistentState {
            source: Some(LedgerError::InvalidTimestamp(detail)),
            ..
        } => assert_eq!(detail, "expected num, got cell"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ledger.calls().len(), 5);
}

#[tokio::test]
async fn negative_ledger_amount_is_inconsistent_state() {
    pause();
    let mut replies = vec![Ok(bill_data(1_150))];
    replies.extend((0..5).map(|_| Ok(vec![num(-5)])));
    let ledger = ScriptedLedger::new(replies);
    let resolver = resolver(Some(snapshot(1_000)), ledger.clone());

    let err = resolver
        .resolve_balance(LOCKER, &user().to_raw_string(), 1_350)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResolveError::InconsistentState {
            source: Some(LedgerError::InvalidAmount(ref value)),
            ..
        } if value == "-5"
    ));
    assert_eq!(ledger.calls().len(), 6);
}

#[tokio::test]
async fn dataset_failure_is_surfaced() {
    let ledger = ScriptedLedger::new(vec![]);
    let resolver = resolver(None, ledger.clone());

    let err = resolver
        .resolve_balance(LOCKER, &user().to_raw_string(), 1_350)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::DatasetUnavailable(_)));
    assert!(resolver.validate(&user().to_raw_string()).await.is_err());
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn malformed_locker_is_an_address_error() {
    let ledger = ScriptedLedger::new(vec![]);
    let resolver = resolver(Some(snapshot(1_000)), ledger);

    let err = resolver
        .resolve_balance("0:nothex", &user().to_raw_string(), 1_350)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::AddressInvalid { .. }));
}
