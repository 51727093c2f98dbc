// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! A scriptable in-memory wallet agent for tests.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
};

use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::{SolCall as _, SolEvent as _};
use serde_json::{json, Value};

use crate::{
    agent::{self, WalletAgent},
    contract::abi::{
        getCurrentTokenIdCall, getMaxTokenSupplyCall, makeAnEpicNFTCall, NewEpicNFTMinted,
    },
    error::AgentError,
};

/// What happens to a transaction once it is sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptBehavior {
    /// The transaction is mined right away.
    Confirm,
    /// The transaction is mined right away but reverts.
    Revert,
    /// The transaction stays pending until [`MockWalletAgent::settle`] is called.
    Pending,
}

#[derive(Debug)]
struct MockState {
    chain_id: String,
    accounts: Vec<String>,
    authorizable_accounts: Vec<String>,
    reject_prompts: bool,
    current_supply: u64,
    max_supply: u64,
    receipt_behavior: ReceiptBehavior,
    block_number: u64,
    receipts: BTreeMap<TxHash, Value>,
    sent_transactions: Vec<Value>,
    logs: Vec<Value>,
    failing_methods: BTreeSet<String>,
    request_counts: BTreeMap<String, usize>,
}

/// A wallet agent whose answers are set up by the test.
#[derive(Debug)]
pub struct MockWalletAgent {
    present: bool,
    contract: Option<Address>,
    state: Mutex<MockState>,
}

impl Default for MockWalletAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWalletAgent {
    /// A present wallet on chain `0x4`, with no authorized account.
    pub fn new() -> Self {
        Self {
            present: true,
            contract: None,
            state: Mutex::new(MockState {
                chain_id: "0x4".to_string(),
                accounts: Vec::new(),
                authorizable_accounts: Vec::new(),
                reject_prompts: false,
                current_supply: 0,
                max_supply: 0,
                receipt_behavior: ReceiptBehavior::Confirm,
                block_number: 1,
                receipts: BTreeMap::new(),
                sent_transactions: Vec::new(),
                logs: Vec::new(),
                failing_methods: BTreeSet::new(),
                request_counts: BTreeMap::new(),
            }),
        }
    }

    /// An environment without any wallet agent.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    pub fn with_chain_id(self, chain_id: &str) -> Self {
        self.state.lock().unwrap().chain_id = chain_id.to_string();
        self
    }

    /// Accounts that are already authorized.
    pub fn with_accounts<const N: usize>(self, accounts: [&str; N]) -> Self {
        self.set_accounts(accounts);
        self
    }

    /// Accounts that the user will authorize when prompted.
    pub fn with_authorizable_accounts<const N: usize>(self, accounts: [&str; N]) -> Self {
        self.state.lock().unwrap().authorizable_accounts =
            accounts.iter().map(|account| account.to_string()).collect();
        self
    }

    pub fn with_supply(self, current: u64, max: u64) -> Self {
        self.set_supply(current, max);
        self
    }

    /// Only answers contract calls addressed to `contract`.
    pub fn with_contract(self, contract: Address) -> Self {
        Self {
            contract: Some(contract),
            ..self
        }
    }

    pub fn with_receipt_behavior(self, behavior: ReceiptBehavior) -> Self {
        self.state.lock().unwrap().receipt_behavior = behavior;
        self
    }

    pub fn set_accounts<const N: usize>(&self, accounts: [&str; N]) {
        self.state.lock().unwrap().accounts =
            accounts.iter().map(|account| account.to_string()).collect();
    }

    pub fn set_chain_id(&self, chain_id: &str) {
        self.state.lock().unwrap().chain_id = chain_id.to_string();
    }

    pub fn set_supply(&self, current: u64, max: u64) {
        let mut state = self.state.lock().unwrap();
        state.current_supply = current;
        state.max_supply = max;
    }

    pub fn reject_prompts(&self, reject: bool) {
        self.state.lock().unwrap().reject_prompts = reject;
    }

    /// Makes every request for `method` fail with a JSON-RPC error.
    pub fn fail_method(&self, method: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_methods
            .insert(method.to_string());
    }

    pub fn restore_method(&self, method: &str) {
        self.state.lock().unwrap().failing_methods.remove(method);
    }

    /// Mines a new block containing a `NewEpicNFTMinted` event.
    pub fn emit_mint(&self, sender: Address, token_id: u64) {
        let mut state = self.state.lock().unwrap();
        state.block_number += 1;
        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(sender.into_word().as_slice());
        data.extend_from_slice(&U256::from(token_id).to_be_bytes::<32>());
        let log = json!({
            "address": self.contract.unwrap_or_default(),
            "topics": [NewEpicNFTMinted::SIGNATURE_HASH],
            "data": Bytes::from(data),
            "blockNumber": agent::format_quantity(state.block_number),
        });
        state.logs.push(log);
    }

    /// Mines every pending transaction, successfully or not.
    pub fn settle(&self, success: bool) {
        let mut state = self.state.lock().unwrap();
        state.block_number += 1;
        let block_number = state.block_number;
        let hashes = state
            .sent_transactions
            .iter()
            .map(|transaction| transaction["hash"].clone())
            .collect::<Vec<_>>();
        for hash in hashes {
            let hash: TxHash = serde_json::from_value(hash).unwrap();
            state
                .receipts
                .entry(hash)
                .or_insert_with(|| receipt(hash, success, block_number));
        }
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .request_counts
            .get(method)
            .copied()
            .unwrap_or_default()
    }

    /// The transactions sent so far, with the hash they were given.
    pub fn sent_transactions(&self) -> Vec<Value> {
        self.state.lock().unwrap().sent_transactions.clone()
    }

    fn handle(&self, method: &str, params: &Value) -> Result<Value, AgentError> {
        let mut state = self.state.lock().unwrap();
        *state.request_counts.entry(method.to_string()).or_default() += 1;
        if state.failing_methods.contains(method) {
            return Err(AgentError::Rpc {
                code: -32603,
                message: format!("{method} failed"),
            });
        }
        match method {
            agent::ETH_CHAIN_ID => Ok(json!(state.chain_id)),
            agent::ETH_ACCOUNTS => Ok(json!(state.accounts)),
            agent::ETH_REQUEST_ACCOUNTS => {
                if state.reject_prompts {
                    return Err(user_rejection());
                }
                let mut accounts = state.authorizable_accounts.clone();
                accounts.extend(state.accounts.iter().cloned());
                accounts.dedup();
                state.accounts = accounts.clone();
                Ok(json!(accounts))
            }
            agent::ETH_CALL => {
                let call = &params[0];
                self.check_contract(call)?;
                let data: Bytes = serde_json::from_value(call["data"].clone())?;
                let current_supply_call = getCurrentTokenIdCall {}.abi_encode();
                let max_supply_call = getMaxTokenSupplyCall {}.abi_encode();
                let value = if data.as_ref() == current_supply_call.as_slice() {
                    state.current_supply
                } else if data.as_ref() == max_supply_call.as_slice() {
                    state.max_supply
                } else {
                    return Err(AgentError::Rpc {
                        code: -32000,
                        message: "execution reverted".to_string(),
                    });
                };
                let word = U256::from(value).to_be_bytes::<32>();
                Ok(json!(Bytes::from(word.to_vec())))
            }
            agent::ETH_SEND_TRANSACTION => {
                let transaction = &params[0];
                self.check_contract(transaction)?;
                let data: Bytes = serde_json::from_value(transaction["data"].clone())?;
                let mint_call = makeAnEpicNFTCall {}.abi_encode();
                if data.as_ref() != mint_call.as_slice() {
                    return Err(AgentError::Rpc {
                        code: -32000,
                        message: "unknown method".to_string(),
                    });
                }
                if state.reject_prompts {
                    return Err(user_rejection());
                }
                let index = U256::from(state.sent_transactions.len() + 1);
                let hash = B256::from(index.to_be_bytes::<32>());
                let mut sent = transaction.clone();
                sent["hash"] = json!(hash);
                state.sent_transactions.push(sent);
                match state.receipt_behavior {
                    ReceiptBehavior::Confirm | ReceiptBehavior::Revert => {
                        state.block_number += 1;
                        let success = state.receipt_behavior == ReceiptBehavior::Confirm;
                        let block_number = state.block_number;
                        state
                            .receipts
                            .insert(hash, receipt(hash, success, block_number));
                    }
                    ReceiptBehavior::Pending => (),
                }
                Ok(json!(hash))
            }
            agent::ETH_GET_TRANSACTION_RECEIPT => {
                let hash: TxHash = serde_json::from_value(params[0].clone())?;
                Ok(state.receipts.get(&hash).cloned().unwrap_or(Value::Null))
            }
            agent::ETH_BLOCK_NUMBER => Ok(json!(agent::format_quantity(state.block_number))),
            agent::ETH_GET_LOGS => {
                let filter = &params[0];
                let from = quantity(&filter["fromBlock"]);
                let to = quantity(&filter["toBlock"]);
                let logs = state
                    .logs
                    .iter()
                    .filter(|log| {
                        let block = quantity(&log["blockNumber"]);
                        from <= block && block <= to
                    })
                    .cloned()
                    .collect::<Vec<_>>();
                Ok(json!(logs))
            }
            _ => Err(AgentError::Rpc {
                code: -32601,
                message: format!("the method {method} does not exist"),
            }),
        }
    }

    fn check_contract(&self, call: &Value) -> Result<(), AgentError> {
        let Some(contract) = self.contract else {
            return Ok(());
        };
        let to: Address = serde_json::from_value(call["to"].clone())?;
        if to == contract {
            Ok(())
        } else {
            // Calls to an address without code return no data.
            Err(AgentError::Rpc {
                code: -32000,
                message: format!("no contract deployed at {to}"),
            })
        }
    }
}

impl WalletAgent for MockWalletAgent {
    fn is_present(&self) -> bool {
        self.present
    }

    fn is_metamask(&self) -> bool {
        self.present
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, AgentError> {
        if !self.present {
            return Err(AgentError::Unavailable);
        }
        self.handle(method, &params)
    }
}

fn user_rejection() -> AgentError {
    AgentError::Rpc {
        code: AgentError::USER_REJECTED_REQUEST,
        message: "User rejected the request.".to_string(),
    }
}

fn receipt(hash: TxHash, success: bool, block_number: u64) -> Value {
    json!({
        "transactionHash": hash,
        "status": if success { "0x1" } else { "0x0" },
        "blockNumber": agent::format_quantity(block_number),
    })
}

fn quantity(value: &Value) -> u64 {
    value
        .as_str()
        .and_then(|quantity| agent::parse_quantity(agent::ETH_GET_LOGS, quantity).ok())
        .unwrap_or_default()
}
