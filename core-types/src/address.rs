// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! TON account addresses in raw (`wc:hex`) and user-friendly (base64) forms.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use crc::{CRC_16_XMODEM, Crc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const HASH_LEN: usize = 32;
const FRIENDLY_LEN: usize = 48;
const FRIENDLY_BYTES: usize = 36;

const FLAG_BOUNCEABLE: u8 = 0x11;
const FLAG_NON_BOUNCEABLE: u8 = 0x51;
const FLAG_TEST_ONLY: u8 = 0x80;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("invalid workchain '{0}'")]
    Workchain(String),
    #[error("invalid account hash: {0}")]
    Hash(String),
    #[error("friendly address must be {FRIENDLY_LEN} characters, got {0}")]
    FriendlyLength(usize),
    #[error("friendly address is not valid base64")]
    Base64,
    #[error("unknown address flags {0:#04x}")]
    Flags(u8),
    #[error("address checksum mismatch")]
    Checksum,
}

/// A parsed account address. Equality and hashing use the workchain and
/// account hash only, so every textual spelling of one account compares equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TonAddress {
    workchain: i8,
    hash: [u8; HASH_LEN],
}

impl TonAddress {
    pub const fn new(workchain: i8, hash: [u8; HASH_LEN]) -> Self {
        Self { workchain, hash }
    }

    pub fn workchain(&self) -> i8 {
        self.workchain
    }

    pub fn hash(&self) -> &[u8; HASH_LEN] {
        &self.hash
    }

    /// Accepts either raw or user-friendly spelling.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        if trimmed.contains(':') {
            Self::parse_raw(trimmed)
        } else {
            Self::parse_friendly(trimmed)
        }
    }

    pub fn parse_raw(input: &str) -> Result<Self, AddressError> {
        let (wc, hash_hex) = input
            .split_once(':')
            .ok_or_else(|| AddressError::Workchain(input.to_string()))?;
        let workchain = wc
            .parse::<i8>()
            .map_err(|_| AddressError::Workchain(wc.to_string()))?;
        let bytes = hex::decode(hash_hex).map_err(|err| AddressError::Hash(err.to_string()))?;
        let hash: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| AddressError::Hash(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self { workchain, hash })
    }

    pub fn parse_friendly(input: &str) -> Result<Self, AddressError> {
        if input.len() != FRIENDLY_LEN {
            return Err(AddressError::FriendlyLength(input.len()));
        }
        let decoded = if input.contains('-') || input.contains('_') {
            URL_SAFE.decode(input)
        } else {
            STANDARD.decode(input)
        }
        .map_err(|_| AddressError::Base64)?;
        if decoded.len() != FRIENDLY_BYTES {
            return Err(AddressError::Base64);
        }

        let (body, checksum) = decoded.split_at(FRIENDLY_BYTES - 2);
        let expected = u16::from_be_bytes([checksum[0], checksum[1]]);
        if CRC16.checksum(body) != expected {
            return Err(AddressError::Checksum);
        }

        let flags = body[0] & !FLAG_TEST_ONLY;
        if flags != FLAG_BOUNCEABLE && flags != FLAG_NON_BOUNCEABLE {
            return Err(AddressError::Flags(body[0]));
        }
        let workchain = body[1] as i8;
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&body[2..]);
        Ok(Self { workchain, hash })
    }

    /// Canonical lowercase `wc:hex` form; the lookup key for snapshot entries.
    pub fn to_raw_string(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// URL-safe base64 form. Wallets are shown non-bounceable, contracts bounceable.
    pub fn to_friendly(&self, bounceable: bool, test_only: bool) -> String {
        let mut bytes = Vec::with_capacity(FRIENDLY_BYTES);
        let mut flags = if bounceable {
            FLAG_BOUNCEABLE
        } else {
            FLAG_NON_BOUNCEABLE
        };
        if test_only {
            flags |= FLAG_TEST_ONLY;
        }
        bytes.push(flags);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        let crc = CRC16.checksum(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());
        URL_SAFE.encode(bytes)
    }
}

impl fmt::Display for TonAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw_string())
    }
}

impl FromStr for TonAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TonAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_raw_string())
    }
}

impl<'de> Deserialize<'de> for TonAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
