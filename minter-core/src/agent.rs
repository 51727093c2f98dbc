// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! The interface to a wallet agent: an EIP-1193 style provider that holds the user's
//! keys, answers JSON-RPC requests and shows its own consent prompts.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AgentError;

pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const ETH_ACCOUNTS: &str = "eth_accounts";
pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
pub const ETH_CALL: &str = "eth_call";
pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
pub const ETH_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const ETH_GET_LOGS: &str = "eth_getLogs";

/// How to talk to a wallet agent.
#[allow(async_fn_in_trait)]
#[cfg_attr(not(web), trait_variant::make(Send))]
pub trait WalletAgent {
    /// Whether an agent is present in the execution environment at all.
    fn is_present(&self) -> bool;

    /// Whether the agent identifies itself as MetaMask.
    fn is_metamask(&self) -> bool {
        false
    }

    /// Sends one JSON-RPC request. `params` is the positional parameter array.
    async fn request(&self, method: &str, params: Value) -> Result<Value, AgentError>;
}

/// Sends a request and deserializes its result.
pub(crate) async fn request_typed<A, T>(
    agent: &A,
    method: &str,
    params: Value,
) -> Result<T, AgentError>
where
    A: WalletAgent,
    T: DeserializeOwned,
{
    let value = agent.request(method, params).await?;
    tracing::trace!("{method} returned {value}");
    serde_json::from_value(value).map_err(|error| AgentError::malformed(method, error))
}

/// Parses a JSON-RPC quantity such as `0x1b4`.
pub(crate) fn parse_quantity(method: &str, quantity: &str) -> Result<u64, AgentError> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| AgentError::malformed(method, format!("`{quantity}` is not hex")))?;
    u64::from_str_radix(digits, 16).map_err(|error| AgentError::malformed(method, error))
}

/// Formats a number as a JSON-RPC quantity.
pub(crate) fn format_quantity(value: u64) -> String {
    format!("{value:#x}")
}
