// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    agent::{self, WalletAgent},
    data_types::{Account, NetworkId},
    error::AgentError,
};

/// Account and network access through the wallet agent.
///
/// The gateway keeps no state of its own; the session caches the last known account.
pub struct WalletGateway<A> {
    agent: Arc<A>,
}

impl<A> Clone for WalletGateway<A> {
    fn clone(&self) -> Self {
        Self {
            agent: self.agent.clone(),
        }
    }
}

impl<A: WalletAgent> WalletGateway<A> {
    pub fn new(agent: Arc<A>) -> Self {
        Self { agent }
    }

    /// The agent, for binding a [`ContractClient`](crate::ContractClient) to it.
    pub fn agent(&self) -> &Arc<A> {
        &self.agent
    }

    /// Returns whether a wallet agent is present.
    pub fn detect(&self) -> bool {
        let present = self.agent.is_present();
        if present && self.agent.is_metamask() {
            debug!("Wallet agent is MetaMask");
        }
        present
    }

    /// Returns the first account the wallet has already authorized, without prompting.
    ///
    /// A missing wallet, or one that fails to answer, yields `None`.
    pub async fn current_account(&self) -> Option<Account> {
        if !self.detect() {
            info!("No wallet agent found");
            return None;
        }
        match self.accounts(agent::ETH_ACCOUNTS).await {
            Ok(account) => account,
            Err(error) => {
                warn!("Failed to read the authorized accounts: {error}");
                None
            }
        }
    }

    /// Prompts the user to authorize an account and returns the first one authorized.
    pub async fn request_account(&self) -> Result<Option<Account>, AgentError> {
        if !self.detect() {
            return Err(AgentError::Unavailable);
        }
        self.accounts(agent::ETH_REQUEST_ACCOUNTS).await
    }

    /// Returns the chain the wallet is currently on.
    pub async fn active_network(&self) -> Result<NetworkId, AgentError> {
        if !self.detect() {
            return Err(AgentError::Unavailable);
        }
        let chain_id: String =
            agent::request_typed(&*self.agent, agent::ETH_CHAIN_ID, json!([])).await?;
        Ok(NetworkId::new(chain_id))
    }

    async fn accounts(&self, method: &str) -> Result<Option<Account>, AgentError> {
        let accounts: Vec<String> = agent::request_typed(&*self.agent, method, json!([])).await?;
        let account = accounts.into_iter().next().map(Account::new);
        match &account {
            Some(account) => debug!("Found account {account}"),
            None => debug!("No authorized account found"),
        }
        Ok(account)
    }
}
