// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! Typed access to the minting contract through a wallet agent.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::{SolCall as _, SolEvent as _};
use futures::{
    stream::{self, AbortHandle, AbortRegistration, Abortable},
    Stream,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace, warn};

use crate::{
    agent::{self, WalletAgent},
    config::MinterConfig,
    data_types::{Account, MintCompleted, MintReceipt},
    error::ContractError,
    time::{self, Duration},
};

/// The contract interface the client depends on.
pub mod abi {
    alloy_sol_types::sol! {
        function getCurrentTokenId() external view returns (uint256);
        function getMaxTokenSupply() external view returns (uint256);
        function makeAnEpicNFT() external;

        event NewEpicNFTMinted(address sender, uint256 tokenId);
    }
}

use abi::{getCurrentTokenIdCall, getMaxTokenSupplyCall, makeAnEpicNFTCall, NewEpicNFTMinted};

/// The minting contract, bound to the agent that reads from it and signs for it.
///
/// Clones share the same mint completion subscription.
pub struct ContractClient<A> {
    agent: Arc<A>,
    address: Address,
    poll_interval: Duration,
    confirmation_timeout: Option<Duration>,
    subscription: Arc<Mutex<Option<AbortHandle>>>,
}

impl<A> Clone for ContractClient<A> {
    fn clone(&self) -> Self {
        Self {
            agent: self.agent.clone(),
            address: self.address,
            poll_interval: self.poll_interval,
            confirmation_timeout: self.confirmation_timeout,
            subscription: self.subscription.clone(),
        }
    }
}

impl<A: WalletAgent> ContractClient<A> {
    pub fn new(agent: Arc<A>, config: &MinterConfig) -> Self {
        Self {
            agent,
            address: config.contract_address,
            poll_interval: config.poll_interval(),
            confirmation_timeout: config.confirmation_timeout(),
            subscription: Arc::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Reads how many tokens have been minted so far.
    pub async fn read_current_supply(&self) -> Result<u64, ContractError> {
        self.read_u64("getCurrentTokenId", getCurrentTokenIdCall {}.abi_encode())
            .await
    }

    /// Reads how many tokens can be minted in total.
    pub async fn read_max_supply(&self) -> Result<u64, ContractError> {
        self.read_u64("getMaxTokenSupply", getMaxTokenSupplyCall {}.abi_encode())
            .await
    }

    async fn read_u64(&self, method: &'static str, data: Vec<u8>) -> Result<u64, ContractError> {
        let call = json!([{ "to": self.address, "data": Bytes::from(data) }, "latest"]);
        let result: Bytes = agent::request_typed(&*self.agent, agent::ETH_CALL, call).await?;
        let value = decode_word(method, &result)?;
        u64::try_from(value).map_err(|_| ContractError::Overflow { method })
    }

    /// Sends the mint transaction from `from`. Returns as soon as the wallet accepts it.
    pub async fn submit_mint(&self, from: &Account) -> Result<MintTransaction<A>, ContractError> {
        let transaction = json!([{
            "from": from,
            "to": self.address,
            "data": Bytes::from(makeAnEpicNFTCall {}.abi_encode()),
        }]);
        let hash: TxHash =
            agent::request_typed(&*self.agent, agent::ETH_SEND_TRANSACTION, transaction).await?;
        debug!("Submitted mint transaction {hash}");
        Ok(MintTransaction {
            hash,
            agent: self.agent.clone(),
            poll_interval: self.poll_interval,
            timeout: self.confirmation_timeout,
        })
    }

    /// Subscribes to `NewEpicNFTMinted` events emitted after this call.
    ///
    /// Any previous subscription of this binding is released first: its stream ends.
    pub async fn subscribe_to_mint_completion(
        &self,
    ) -> Result<impl Stream<Item = MintCompleted> + 'static, ContractError>
    where
        A: 'static,
    {
        let (handle, registration) = AbortHandle::new_pair();
        if let Some(previous) = self.subscription.lock().unwrap().replace(handle.clone()) {
            debug!("Releasing the previous mint completion subscription");
            previous.abort();
        }
        self.open_subscription(AbortOnDrop(handle), registration).await
    }

    /// Reserves the subscription slot of this binding, unless a subscription is live or
    /// already being opened. The reservation is released if it is dropped unused.
    pub fn claim_subscription(&self) -> Option<SubscriptionClaim> {
        let mut slot = self.subscription.lock().unwrap();
        if slot.as_ref().is_some_and(|handle| !handle.is_aborted()) {
            return None;
        }
        let (handle, registration) = AbortHandle::new_pair();
        *slot = Some(handle.clone());
        Some(SubscriptionClaim {
            release: AbortOnDrop(handle),
            registration,
        })
    }

    /// Opens the subscription reserved by `claim`.
    pub async fn subscribe_with_claim(
        &self,
        claim: SubscriptionClaim,
    ) -> Result<impl Stream<Item = MintCompleted> + 'static, ContractError>
    where
        A: 'static,
    {
        let SubscriptionClaim {
            release,
            registration,
        } = claim;
        self.open_subscription(release, registration).await
    }

    async fn open_subscription(
        &self,
        release: AbortOnDrop,
        registration: AbortRegistration,
    ) -> Result<impl Stream<Item = MintCompleted> + 'static, ContractError>
    where
        A: 'static,
    {
        let latest = block_number(&*self.agent).await?;
        let poller = EventPoller {
            agent: self.agent.clone(),
            address: self.address,
            poll_interval: self.poll_interval,
            next_block: latest + 1,
            pending: VecDeque::new(),
            _release: release,
        };
        Ok(Abortable::new(poller.into_stream(), registration))
    }

    /// Releases the mint completion subscription, if any.
    pub fn unsubscribe(&self) {
        if let Some(handle) = self.subscription.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Whether a subscription is live or being opened. Dropping the stream of a
    /// subscription releases it.
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_aborted())
    }
}

/// A reservation of a binding's subscription slot, see
/// [`ContractClient::claim_subscription`].
pub struct SubscriptionClaim {
    release: AbortOnDrop,
    registration: AbortRegistration,
}

/// Aborts a subscription when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A submitted mint transaction that may not be included in a block yet.
pub struct MintTransaction<A> {
    hash: TxHash,
    agent: Arc<A>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl<A: WalletAgent> MintTransaction<A> {
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// Waits until the transaction is included and checks that it succeeded.
    pub async fn await_confirmation(self) -> Result<MintReceipt, ContractError> {
        match self.timeout {
            None => self.poll_receipt().await,
            Some(limit) => time::timeout(limit, self.poll_receipt())
                .await
                .map_err(|_| ContractError::ConfirmationTimeout(self.hash))?,
        }
    }

    async fn poll_receipt(&self) -> Result<MintReceipt, ContractError> {
        loop {
            let receipt: Option<RpcReceipt> = agent::request_typed(
                &*self.agent,
                agent::ETH_GET_TRANSACTION_RECEIPT,
                json!([self.hash]),
            )
            .await?;
            if let Some(receipt) = receipt {
                return receipt.into_mint_receipt(self.hash);
            }
            trace!("Transaction {} is still pending", self.hash);
            time::sleep(self.poll_interval).await;
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

impl RpcReceipt {
    fn into_mint_receipt(self, hash: TxHash) -> Result<MintReceipt, ContractError> {
        let method = agent::ETH_GET_TRANSACTION_RECEIPT;
        // Receipts from before EIP-658 carry no status.
        if let Some(status) = &self.status {
            if agent::parse_quantity(method, status)? != 1 {
                return Err(ContractError::Reverted(hash));
            }
        }
        let block_number = self
            .block_number
            .map(|number| agent::parse_quantity(method, &number))
            .transpose()?;
        Ok(MintReceipt {
            transaction_hash: hash,
            block_number,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    topics: Vec<B256>,
    data: Bytes,
    #[serde(default)]
    block_number: Option<String>,
}

impl RpcLog {
    fn decode(self) -> Result<MintCompleted, ContractError> {
        if self.topics.first() != Some(&NewEpicNFTMinted::SIGNATURE_HASH) {
            return Err(ContractError::InvalidLog(
                "not a NewEpicNFTMinted event".to_string(),
            ));
        }
        if self.data.len() != 64 {
            return Err(ContractError::InvalidLog(format!(
                "expected 64 bytes of data, got {}",
                self.data.len()
            )));
        }
        let sender = Address::from_word(B256::from_slice(&self.data[..32]));
        let token_id = U256::from_be_slice(&self.data[32..]);
        let token_id = u64::try_from(token_id).map_err(|_| ContractError::Overflow {
            method: "NewEpicNFTMinted",
        })?;
        let block_number = self
            .block_number
            .map(|number| agent::parse_quantity(agent::ETH_GET_LOGS, &number))
            .transpose()?;
        Ok(MintCompleted {
            from: Account::from(sender),
            token_id,
            block_number,
        })
    }
}

/// Turns block polling into a stream of decoded events.
struct EventPoller<A> {
    agent: Arc<A>,
    address: Address,
    poll_interval: Duration,
    next_block: u64,
    pending: VecDeque<MintCompleted>,
    _release: AbortOnDrop,
}

impl<A: WalletAgent> EventPoller<A> {
    fn into_stream(self) -> impl Stream<Item = MintCompleted> {
        stream::unfold(self, |mut poller| async move {
            loop {
                if let Some(event) = poller.pending.pop_front() {
                    return Some((event, poller));
                }
                if let Err(error) = poller.poll_logs().await {
                    warn!("Failed to poll for minted tokens: {error}");
                }
                if poller.pending.is_empty() {
                    time::sleep(poller.poll_interval).await;
                }
            }
        })
    }

    async fn poll_logs(&mut self) -> Result<(), ContractError> {
        let latest = block_number(&*self.agent).await?;
        if latest < self.next_block {
            return Ok(());
        }
        let filter = json!([{
            "address": self.address,
            "topics": [NewEpicNFTMinted::SIGNATURE_HASH],
            "fromBlock": agent::format_quantity(self.next_block),
            "toBlock": agent::format_quantity(latest),
        }]);
        let logs: Vec<RpcLog> =
            agent::request_typed(&*self.agent, agent::ETH_GET_LOGS, filter).await?;
        for log in logs {
            match log.decode() {
                Ok(event) => self.pending.push_back(event),
                Err(error) => warn!("Skipping a log: {error}"),
            }
        }
        self.next_block = latest + 1;
        Ok(())
    }
}

async fn block_number<A: WalletAgent>(wallet: &A) -> Result<u64, ContractError> {
    let quantity: String =
        agent::request_typed(wallet, agent::ETH_BLOCK_NUMBER, json!([])).await?;
    Ok(agent::parse_quantity(agent::ETH_BLOCK_NUMBER, &quantity)?)
}

fn decode_word(method: &'static str, data: &[u8]) -> Result<U256, ContractError> {
    if data.len() != 32 {
        return Err(ContractError::ReturnData {
            method,
            len: data.len(),
        });
    }
    Ok(U256::from_be_slice(data))
}

#[cfg(test)]
#[path = "unit_tests/contract_tests.rs"]
mod tests;
