use std::time::Duration;

use alloy::primitives::{hex, Address};
use backon::{ExponentialBuilder, Retryable};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tracing::*;

use super::{encode_invoke_code, OnChain, Param};
use crate::address::format_address;
use crate::codec::Sink;
use crate::config::Config;
use crate::error::InvocationError;

const TX_VERSION: u8 = 0;
const TX_TYPE_INVOKE_WASM: u8 = 0xd2;
/// Second `sendrawtransaction` parameter asking the node to execute the
/// transaction without committing it.
const PRE_EXEC: u8 = 1;
const EXEC_SUCCESS: u8 = 1;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Serialize an unsigned WASM invoke transaction suitable for pre-exec.
/// Gas price, gas limit and payer are left zero since nothing is committed.
pub fn build_pre_exec_tx(
    contract: &Address,
    method: &str,
    args: &[Param],
    nonce: u32,
) -> Vec<u8> {
    let mut tx = Sink::new();
    tx.write_u8(TX_VERSION)
        .write_u8(TX_TYPE_INVOKE_WASM)
        .write_u32(nonce)
        .write_u64(0)
        .write_u64(0)
        .write_address(&Address::ZERO)
        .write_var_bytes(&encode_invoke_code(contract, method, args))
        // attributes
        .write_var_uint(0)
        // signatures
        .write_var_uint(0);
    tx.into_bytes()
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    desc: String,
    error: i64,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PreExecResult {
    state: u8,
    #[serde(default)]
    gas: u64,
    #[serde(default)]
    result: Option<String>,
}

impl RpcResponse {
    fn into_bytes(self) -> Result<Vec<u8>, InvocationError> {
        let RpcResponse { desc, error, result } = self;

        if error != 0 {
            let desc = match result {
                serde_json::Value::String(detail) if !detail.is_empty() => {
                    format!("{desc}: {detail}")
                }
                _ => desc,
            };
            return Err(InvocationError::Rpc { code: error, desc });
        }

        let result: PreExecResult = serde_json::from_value(result)
            .map_err(|_| InvocationError::MissingResult)?;
        trace!("Pre-exec state={} gas={}", result.state, result.gas);

        if result.state != EXEC_SUCCESS {
            return Err(InvocationError::ExecutionFailed(result.state));
        }

        let encoded = result.result.ok_or(InvocationError::MissingResult)?;
        Ok(hex::decode(encoded)?)
    }
}

/// Pre-exec client talking to a node's JSON-RPC endpoint.
pub struct RealChain {
    http: reqwest::Client,
    rpc_url: Url,
    max_retries: usize,
}

impl RealChain {
    pub fn new(
        rpc_url: Url,
        max_retries: usize,
    ) -> Result<Self, InvocationError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, rpc_url, max_retries))
    }

    pub fn with_client(
        http: reqwest::Client,
        rpc_url: Url,
        max_retries: usize,
    ) -> Self {
        Self { http, rpc_url, max_retries }
    }

    pub fn from_config(config: &Config) -> Result<Self, InvocationError> {
        Self::new(config.json_rpc_address.clone(), config.max_retries)
    }
}

impl OnChain for RealChain {
    async fn pre_exec(
        &self,
        contract: Address,
        method: &str,
        args: &[Param],
    ) -> Result<Vec<u8>, InvocationError> {
        let tx = build_pre_exec_tx(&contract, method, args, rand::random());
        let body = json!({
            "jsonrpc": "2.0",
            "method": "sendrawtransaction",
            "params": [hex::encode(tx), PRE_EXEC],
            "id": "1",
        });

        let contract_hex = format_address(&contract);
        trace!("Pre-exec {method} on {contract_hex}");

        let send = || async {
            self.http
                .post(self.rpc_url.clone())
                .json(&body)
                .send()
                .await?
                .error_for_status()?
                .json::<RpcResponse>()
                .await
        };

        let backoff =
            ExponentialBuilder::default().with_max_times(self.max_retries);
        let response = send
            .retry(backoff)
            .notify(|err, dur| {
                warn!(
                    "Retrying {method} on {contract_hex} in {dur:?} \
                     due to {err:?}"
                );
            })
            .await?;

        response.into_bytes()
    }
}
