// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared address, configuration, retry and record types for the locker balance engine.

pub mod address;
pub mod config;
pub mod retry;
pub mod types;

pub use address::{AddressError, TonAddress};
pub use config::{AppConfig, Network, NetworkEndpoints, Settings, SettingsError, VestingConfig};
pub use retry::RetryPolicy;
pub use types::{AggregateTotals, DepositRecord, LedgerState, WalletBalance};
