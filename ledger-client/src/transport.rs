// Copyright (c) James Kassemi, SC, US. All rights reserved.
use async_trait::async_trait;
use core_types::TonAddress;
use log::debug;
use num_bigint::BigInt;
use num_traits::Num;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LedgerError;

/// One entry of a get-method result stack. Only integers are decoded; cells
/// and slices are kept as their type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackValue {
    Num(BigInt),
    Other { kind: String },
}

/// Read-only access to contract get-methods.
#[async_trait]
pub trait LedgerTransport: Send + Sync + 'static {
    async fn run_get_method(
        &self,
        address: &TonAddress,
        method: &str,
        args: &[BigInt],
    ) -> Result<Vec<StackValue>, LedgerError>;
}

/// toncenter v2 JSON-RPC `runGetMethod` client.
#[derive(Clone)]
pub struct TonCenterTransport {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl TonCenterTransport {
    pub fn new(
        client: Client,
        endpoint: &str,
        api_key: Option<String>,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            api_key,
        })
    }

    fn request(&self, body: &RpcRequest<'_>) -> RequestBuilder {
        let builder = self.client.post(self.endpoint.clone()).json(body);
        match &self.api_key {
            Some(key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    id: u64,
    jsonrpc: &'static str,
    method: &'static str,
    params: RunGetMethodParams<'a>,
}

#[derive(Debug, Serialize)]
struct RunGetMethodParams<'a> {
    address: String,
    method: &'a str,
    stack: Vec<(&'static str, String)>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    ok: bool,
    result: Option<RunResult>,
    error: Option<String>,
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    exit_code: i64,
    #[serde(default)]
    stack: Vec<Value>,
}

fn run_get_method_request<'a>(address: &TonAddress, method: &'a str, args: &[BigInt]) -> RpcRequest<'a> {
    RpcRequest {
        id: 1,
        jsonrpc: "2.0",
        method: "runGetMethod",
        params: RunGetMethodParams {
            address: address.to_raw_string(),
            method,
            stack: args.iter().map(|arg| ("num", arg.to_string())).collect(),
        },
    }
}

#[async_trait]
impl LedgerTransport for TonCenterTransport {
    async fn run_get_method(
        &self,
        address: &TonAddress,
        method: &str,
        args: &[BigInt],
    ) -> Result<Vec<StackValue>, LedgerError> {
        let request = run_get_method_request(address, method, args);
        debug!("runGetMethod {} on {} with {} args", method, address, args.len());

        let resp = self.request(&request).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        classify(method, status, &text)
    }
}

/// Map an HTTP status and raw body to a result. Rate limits come back as
/// non-2xx with a JSON `ok: false` body and are reported as `Rpc`.
fn classify(method: &str, status: StatusCode, text: &str) -> Result<Vec<StackValue>, LedgerError> {
    let body = match serde_json::from_str::<Value>(text) {
        Ok(body) => body,
        Err(_) if !status.is_success() => {
            return Err(LedgerError::Status {
                status: status.as_u16(),
            });
        }
        Err(err) => {
            return Err(LedgerError::MalformedResponse {
                method: method.to_string(),
                detail: err.to_string(),
            });
        }
    };
    if !status.is_success() && body.get("ok").is_none() {
        return Err(LedgerError::Status {
            status: status.as_u16(),
        });
    }
    parse_run_result(method, body)
}

/// Decode a `runGetMethod` response body into stack values.
pub fn parse_run_result(method: &str, body: Value) -> Result<Vec<StackValue>, LedgerError> {
    let resp: RpcResponse = serde_json::from_value(body).map_err(|err| LedgerError::MalformedResponse {
        method: method.to_string(),
        detail: err.to_string(),
    })?;
    if !resp.ok {
        return Err(LedgerError::Rpc {
            code: resp.code,
            message: resp.error.unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    let result = resp.result.ok_or_else(|| LedgerError::MalformedResponse {
        method: method.to_string(),
        detail: "missing result".to_string(),
    })?;
    if result.exit_code != 0 && result.exit_code != 1 {
        return Err(LedgerError::ExitCode {
            method: method.to_string(),
            exit_code: result.exit_code,
        });
    }
    result
        .stack
        .iter()
        .map(|entry| parse_stack_entry(method, entry))
        .collect()
}

fn parse_stack_entry(method: &str, entry: &Value) -> Result<StackValue, LedgerError> {
    let malformed = |detail: String| LedgerError::MalformedResponse {
        method: method.to_string(),
        detail,
    };
    let pair = entry
        .as_array()
        .filter(|pair| pair.len() == 2)
        .ok_or_else(|| malformed(format!("stack entry is not a pair: {entry}")))?;
    let kind = pair[0]
        .as_str()
        .ok_or_else(|| malformed(format!("stack entry has no type tag: {entry}")))?;
    if kind != "num" {
        return Ok(StackValue::Other {
            kind: kind.to_string(),
        });
    }
    let text = pair[1]
        .as_str()
        .ok_or_else(|| malformed(format!("num entry is not a string: {entry}")))?;
    parse_num(text).map(StackValue::Num).ok_or_else(|| malformed(format!("bad number '{text}'")))
}

/// toncenter renders integers as `0x…` hex, negatives as `-0x…`.
fn parse_num(text: &str) -> Option<BigInt> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => BigInt::from_str_radix(hex, 16).ok()?,
        None => BigInt::from_str_radix(digits, 10).ok()?,
    };
    Some(if negative { -value } else { value })
}
