// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Command-line balance lookup against the locker.

use std::{env, process, sync::Arc, time::Duration};

use balance_resolver::{BalanceResolver, Resolution, ResolveError};
use chrono::{DateTime, Utc};
use core_types::{AppConfig, Network, Settings, SettingsError, TonAddress};
use dataset_cache::DatasetCache;
use ledger_client::{LedgerError, LedgerQueryClient, TonCenterTransport};
use log::{error, info};
use thiserror::Error;
use vesting::{VestingError, VestingSchedule};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("locker-balance failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = CliArgs::parse(env::args().skip(1))?;
    let mut settings = Settings::load()?;
    if args.testnet {
        settings.testnet = true;
    }
    let config = AppConfig::from_settings(settings)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    runtime.block_on(serve(config, args))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    address: String,
    testnet: bool,
    watch: Option<Duration>,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, AppError> {
        let mut address = None;
        let mut testnet = false;
        let mut watch = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--testnet" => testnet = true,
                "--watch" => {
                    let secs = args
                        .next()
                        .and_then(|v| v.parse::<u64>().ok())
                        .filter(|secs| *secs > 0)
                        .ok_or(AppError::Usage)?;
                    watch = Some(Duration::from_secs(secs));
                }
                flag if flag.starts_with("--") => return Err(AppError::Usage),
                _ if address.is_none() => address = Some(arg.clone()),
                _ => return Err(AppError::Usage),
            }
        }
        Ok(Self {
            address: address.ok_or(AppError::Usage)?,
            testnet,
            watch,
        })
    }
}

async fn serve(config: AppConfig, args: CliArgs) -> Result<(), AppError> {
    let network = config.network;
    let user = TonAddress::parse(&args.address)?;
    let locker = config.endpoints.locker_address;

    let client = reqwest::Client::new();
    let dataset = Arc::new(DatasetCache::http(client.clone(), config.endpoints.dataset_url.clone()));
    let transport = TonCenterTransport::new(
        client,
        &config.endpoints.rpc_endpoint,
        config.api_key.clone(),
    )?;
    let ledger = LedgerQueryClient::new(Arc::new(transport));
    let resolver = BalanceResolver::new(dataset, ledger, VestingSchedule::new(config.vesting)?);

    println!(
        "locker {} on {}; rpc {}; snapshot {}",
        locker.to_friendly(true, network.is_testnet()),
        network.label(),
        config.endpoints.rpc_endpoint,
        config.endpoints.dataset_url
    );
    print_schedule(&resolver, now_secs());

    if !resolver.validate(&args.address).await? {
        println!(
            "No deposit found for {}",
            user.to_friendly(false, network.is_testnet())
        );
        return Ok(());
    }

    let locker_raw = locker.to_raw_string();
    let user_raw = user.to_raw_string();
    let Some(period) = args.watch else {
        let resolution = resolver.resolve_detailed(&locker_raw, &user_raw, now_secs()).await?;
        print_resolution(&user, network, &resolution);
        return Ok(());
    };

    info!("refreshing every {:?}; press Ctrl+C to stop", period);
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match resolver.resolve_detailed(&locker_raw, &user_raw, now_secs()).await {
                    Ok(resolution) => print_resolution(&user, network, &resolution),
                    Err(err) => error!("balance refresh failed: {}", err),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(AppError::Signal)?;
                println!("Shutdown signal received.");
                return Ok(());
            }
        }
    }
}

fn now_secs() -> i64 {
    Utc::now().timestamp()
}

fn print_schedule(resolver: &BalanceResolver, now: i64) {
    let info = resolver.vesting_info();
    println!(
        "Vesting: start {}, end {}, {} periods of {}s; withdrawals {}",
        format_ts(info.vesting_start_time),
        format_ts(info.vesting_end_time),
        info.total_periods,
        info.unlock_period,
        if resolver.schedule().is_withdraw_available(now) {
            "open"
        } else {
            "not yet open"
        }
    );
    if let Some(next) = resolver.schedule().next_unlock_time(now) {
        println!("Next unlock: {}", format_ts(next));
    }
}

fn print_resolution(user: &TonAddress, network: Network, resolution: &Resolution) {
    let balance = &resolution.balance;
    println!("Wallet {}", user.to_friendly(false, network.is_testnet()));
    println!("  available to withdraw: {}", balance.available_to_withdraw);
    println!("  still locked:          {}", balance.still_locked);
    println!("  total deposit:         {}", balance.total_user_deposit);
    println!("  deposit with reward:   {}", balance.total_user_deposit_and_reward);
    if let Some(state) = &resolution.ledger_state {
        println!("  last withdrawal:       {}", format_ts(state.last_withdraw_time));
    }
    if let Some(divergence) = &resolution.divergence {
        println!(
            "  warning: ledger amount {} differs from schedule amount {}",
            divergence.ledger, divergence.local
        );
    }
}

fn format_ts(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[derive(Debug, Error)]
enum AppError {
    #[error("usage: locker-balance <address> [--testnet] [--watch <secs>]")]
    Usage,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("invalid address: {0}")]
    Address(#[from] core_types::AddressError),
    #[error(transparent)]
    Vesting(#[from] VestingError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed while waiting for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}
