// Copyright (c) James Kassemi, SC, US. All rights reserved.

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::address::{AddressError, TonAddress};

const DATASET_URL: &str = "https://locker.ton.org/bills.gz";
const MAINNET_RPC: &str = "https://toncenter.com/api/v2/jsonRPC";
const TESTNET_RPC: &str = "https://testnet.toncenter.com/api/v2/jsonRPC";
// 0:ED1691307050047117B998B561D8DE82D31FBF84910CED6EB5FC92E7485EF8A7
const MAINNET_LOCKER: TonAddress = TonAddress::new(
    0,
    [
        0xed, 0x16, 0x91, 0x30, 0x70, 0x50, 0x04, 0x71, 0x17, 0xb9, 0x98, 0xb5, 0x61, 0xd8, 0xde,
        0x82, 0xd3, 0x1f, 0xbf, 0x84, 0x91, 0x0c, 0xed, 0x6e, 0xb5, 0xfc, 0x92, 0xe7, 0x48, 0x5e,
        0xf8, 0xa7,
    ],
);
// 0:ae88502062c36412b536cb34b9c8603843228975beebdb66eb3b3f884eccbc29
const TESTNET_LOCKER: TonAddress = TonAddress::new(
    0,
    [
        0xae, 0x88, 0x50, 0x20, 0x62, 0xc3, 0x64, 0x12, 0xb5, 0x36, 0xcb, 0x34, 0xb9, 0xc8, 0x60,
        0x38, 0x43, 0x22, 0x89, 0x75, 0xbe, 0xeb, 0xdb, 0x66, 0xeb, 0x3b, 0x3f, 0x88, 0x4e, 0xcc,
        0xbc, 0x29,
    ],
);

/// Which ledger deployment to talk to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn from_testnet_flag(testnet: bool) -> Self {
        if testnet {
            Network::Testnet
        } else {
            Network::Mainnet
        }
    }

    pub fn is_testnet(self) -> bool {
        self == Network::Testnet
    }

    pub fn label(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl FromStr for Network {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(SettingsError::UnknownNetwork {
                value: other.to_string(),
            }),
        }
    }
}

/// Fixed endpoint set; mainnet and testnet differ only here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkEndpoints {
    pub dataset_url: String,
    pub rpc_endpoint: String,
    pub locker_address: TonAddress,
}

impl NetworkEndpoints {
    pub fn for_network(network: Network) -> Self {
        let (rpc, locker) = match network {
            Network::Mainnet => (MAINNET_RPC, MAINNET_LOCKER),
            Network::Testnet => (TESTNET_RPC, TESTNET_LOCKER),
        };
        Self {
            dataset_url: DATASET_URL.to_string(),
            rpc_endpoint: rpc.to_string(),
            locker_address: locker,
        }
    }
}

/// Vesting parameters as deployed in the locker contract, epoch seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingConfig {
    pub deposits_end_time: i64,
    pub vesting_start_time: i64,
    pub vesting_total_duration: i64,
    pub unlock_period: i64,
}

impl VestingConfig {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self {
                deposits_end_time: 1_698_019_200,  // 2023-10-23 00:00:00 UTC
                vesting_start_time: 1_760_227_200, // 2025-10-12 00:00:00 UTC
                vesting_total_duration: 94_608_000, // 3 years
                unlock_period: 2_592_000,           // 30 days
            },
            Network::Testnet => {
                const START: i64 = 1_755_750_831;
                const MIN: i64 = 60;
                let deposits_end_time = START + 90 * MIN;
                Self {
                    deposits_end_time,
                    vesting_start_time: deposits_end_time + 10 * MIN,
                    vesting_total_duration: 12 * 60 * MIN,
                    unlock_period: 20 * MIN,
                }
            }
        }
    }
}

/// Overrides read from `locker.toml` and `LOCKER_*` environment variables.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub testnet: bool,
    pub dataset_url: Option<String>,
    pub rpc_endpoint: Option<String>,
    pub locker_address: Option<String>,
    pub api_key: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(config::File::with_name("locker.toml").required(false))
            .add_source(config::Environment::with_prefix("LOCKER").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Immutable process configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: Network,
    pub endpoints: NetworkEndpoints,
    pub vesting: VestingConfig,
    pub api_key: Option<String>,
}

impl AppConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            endpoints: NetworkEndpoints::for_network(network),
            vesting: VestingConfig::for_network(network),
            api_key: None,
        }
    }

    pub fn load() -> Result<Self, SettingsError> {
        Self::from_settings(Settings::load()?)
    }

    pub fn from_settings(settings: Settings) -> Result<Self, SettingsError> {
        let mut config = Self::for_network(Network::from_testnet_flag(settings.testnet));
        if let Some(url) = settings.dataset_url {
            config.endpoints.dataset_url = url;
        }
        if let Some(endpoint) = settings.rpc_endpoint {
            config.endpoints.rpc_endpoint = endpoint;
        }
        if let Some(locker) = settings.locker_address {
            config.endpoints.locker_address = TonAddress::parse(&locker)?;
        }
        config.api_key = settings.api_key.filter(|key| !key.is_empty());
        Ok(config)
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown network '{value}' (expected 'mainnet' or 'testnet')")]
    UnknownNetwork { value: String },
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid locker address: {0}")]
    LockerAddress(#[from] AddressError),
}
