// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! The minting session: the only owner and mutator of [`MintSessionState`].

use std::sync::{Arc, Mutex};

use futures::{Future, StreamExt as _};
use tokio::sync::{mpsc::UnboundedReceiver, watch};
use tracing::{debug, info, instrument, warn};

use crate::{
    agent::WalletAgent,
    config::MinterConfig,
    contract::ContractClient,
    data_types::{Account, MintReceipt, MintSessionState, Notice, SupplyCounters},
    error::{ContractError, MintError},
    gateway::WalletGateway,
    network::NetworkGuard,
    notifier::Notifier,
};

/// What became of a mint intent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MintOutcome {
    /// Another mint was already in progress; nothing was submitted.
    Ignored,
    /// The mint transaction was included and succeeded.
    Confirmed(MintReceipt),
}

/// Drives the connect, read, mint and confirm flow against one wallet agent.
///
/// Intents take `&self`, so a presentation layer can fire them while another one is
/// still waiting on the wallet. State changes are published through
/// [`MintSession::watch_state`]; advisories and minted tokens through
/// [`MintSession::subscribe_notices`].
pub struct MintSession<A> {
    config: MinterConfig,
    gateway: WalletGateway<A>,
    guard: NetworkGuard,
    state: watch::Sender<MintSessionState>,
    notifier: Arc<Notifier<Notice>>,
    /// The contract bound to the current agent, created on first use.
    binding: Mutex<Option<ContractClient<A>>>,
}

impl<A: WalletAgent> MintSession<A> {
    pub fn new(agent: A, config: MinterConfig) -> Self {
        let (state, _) = watch::channel(MintSessionState::default());
        Self {
            gateway: WalletGateway::new(Arc::new(agent)),
            guard: NetworkGuard::new(config.required_network.clone()),
            config,
            state,
            notifier: Arc::default(),
            binding: Mutex::default(),
        }
    }

    pub fn config(&self) -> &MinterConfig {
        &self.config
    }

    pub fn gateway(&self) -> &WalletGateway<A> {
        &self.gateway
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> MintSessionState {
        self.state.borrow().clone()
    }

    /// A read-only view of the state that is updated on every change.
    pub fn watch_state(&self) -> watch::Receiver<MintSessionState> {
        self.state.subscribe()
    }

    /// Receives network mismatch warnings and mint completions from now on.
    pub fn subscribe_notices(&self) -> UnboundedReceiver<Notice> {
        self.notifier.subscribe()
    }

    /// Re-checks the wallet without prompting: on page load, and whenever the wallet
    /// reports that its accounts or network changed.
    ///
    /// Never fails. Without a wallet the session is simply disconnected.
    #[instrument(level = "debug", skip(self))]
    pub async fn on_load(&self) -> Option<Account> {
        if self.gateway.detect() {
            self.check_network().await;
        }
        let account = self.gateway.current_account().await;
        self.update_account(account.clone());
        account
    }

    /// Asks the user to authorize an account. This is the only intent that may show the
    /// wallet's permission prompt.
    #[instrument(level = "debug", skip(self))]
    pub async fn connect(&self) -> Result<Option<Account>, MintError> {
        let account = self
            .gateway
            .request_account()
            .await
            .map_err(MintError::from_authorization)
            .inspect_err(|error| info!("Connection not established: {error}"))?;
        self.update_account(account.clone());
        Ok(account)
    }

    /// Binds the contract, reads the supply counters and subscribes to minted tokens.
    ///
    /// Returns the future forwarding minted tokens to the notice channel, for the caller
    /// to spawn. Returns `None` when this binding is already listening, or about to.
    /// Dropping the forwarder releases the subscription.
    pub async fn setup_listening(
        &self,
    ) -> Result<Option<impl Future<Output = ()> + 'static>, MintError>
    where
        A: 'static,
    {
        if !self.gateway.detect() {
            info!("No wallet agent found, not listening for minted tokens");
            return Err(MintError::WalletUnavailable);
        }
        let contract = self.contract();
        let Some(claim) = contract.claim_subscription() else {
            debug!("Already listening for minted tokens");
            return Ok(None);
        };
        // An early return drops the claim, so a later call can try again.
        self.read_supply(&contract).await?;
        let completions = contract
            .subscribe_with_claim(claim)
            .await
            .map_err(MintError::from_read)
            .inspect_err(|error| warn!("{error}"))?;
        info!("Listening for minted tokens on {:?}", contract.address());

        let notifier = self.notifier.clone();
        let config = self.config.clone();
        Ok(Some(async move {
            futures::pin_mut!(completions);
            while let Some(event) = completions.next().await {
                info!("Token {} was minted by {}", event.token_id, event.from);
                notifier.notify(Notice::MintCompleted {
                    token_url: config.token_url(event.token_id),
                    from: event.from,
                    token_id: event.token_id,
                });
            }
            debug!("Stopped listening for minted tokens");
        }))
    }

    /// Reads the supply counters again.
    #[instrument(level = "debug", skip(self))]
    pub async fn refresh_supply(&self) -> Result<SupplyCounters, MintError> {
        if !self.gateway.detect() {
            return Err(MintError::WalletUnavailable);
        }
        let contract = self.contract();
        self.read_supply(&contract).await
    }

    /// Mints a token from the current account and waits for the transaction to be
    /// confirmed. Ignored while another mint is in progress.
    ///
    /// On failure only `is_minting` is reset; nothing else in the state changes.
    #[instrument(level = "debug", skip(self))]
    pub async fn mint(&self) -> Result<MintOutcome, MintError> {
        if !self.gateway.detect() {
            info!("No wallet agent found, cannot mint");
            return Err(MintError::WalletUnavailable);
        }
        let Some(account) = self.snapshot().account else {
            return Err(MintError::SubmissionFailure(ContractError::NoSender));
        };
        let Some(_minting) = MintingFlag::raise(&self.state) else {
            debug!("A mint is already in progress");
            return Ok(MintOutcome::Ignored);
        };
        match self.submit_and_confirm(&account).await {
            Ok(receipt) => {
                info!(
                    "Minted NFT, see {}",
                    self.config.transaction_url(&receipt.transaction_hash)
                );
                Ok(MintOutcome::Confirmed(receipt))
            }
            Err(error) => {
                warn!("Mint failed: {error}");
                Err(error)
            }
        }
    }

    /// Releases the current contract binding and its subscription. The next
    /// [`MintSession::setup_listening`] binds again.
    pub fn rebind(&self) {
        if let Some(contract) = self.binding.lock().unwrap().take() {
            debug!("Releasing the contract binding");
            contract.unsubscribe();
        }
    }

    async fn submit_and_confirm(&self, account: &Account) -> Result<MintReceipt, MintError> {
        let contract = self.contract();
        info!("Minting NFT from {account}");
        let transaction = contract
            .submit_mint(account)
            .await
            .map_err(MintError::from_submission)?;
        debug!(
            "Waiting for {}",
            self.config.transaction_url(&transaction.hash())
        );
        transaction
            .await_confirmation()
            .await
            .map_err(MintError::ConfirmationFailure)
    }

    async fn check_network(&self) {
        match self.gateway.active_network().await {
            Ok(network) => {
                let check = self.guard.check(&network);
                if let Some(warning) = check.warning() {
                    warn!(
                        "{}",
                        MintError::NetworkMismatch {
                            expected: check.expected,
                            actual: check.actual,
                        }
                    );
                    self.notifier.notify(warning);
                }
            }
            Err(error) => warn!("Failed to read the active network: {error}"),
        }
    }

    async fn read_supply(&self, contract: &ContractClient<A>) -> Result<SupplyCounters, MintError> {
        let result = async {
            let current = contract.read_current_supply().await?;
            let total = contract.read_max_supply().await?;
            SupplyCounters::new(current, total)
                .ok_or(ContractError::InconsistentSupply { current, total })
        }
        .await;
        let supply = result
            .map_err(MintError::from_read)
            .inspect_err(|error| warn!("{error}"))?;
        self.state.send_modify(|state| {
            state.supply = supply;
            state.supply_known = true;
        });
        debug!("Minted {}/{}", supply.current, supply.total);
        Ok(supply)
    }

    fn update_account(&self, account: Option<Account>) {
        self.state.send_if_modified(|state| {
            if state.account == account {
                return false;
            }
            match &account {
                Some(account) => info!("Connected account {account}"),
                None => info!("No account connected"),
            }
            state.account = account;
            true
        });
    }

    fn contract(&self) -> ContractClient<A> {
        self.binding
            .lock()
            .unwrap()
            .get_or_insert_with(|| {
                debug!("Binding contract {:?}", self.config.contract_address);
                ContractClient::new(self.gateway.agent().clone(), &self.config)
            })
            .clone()
    }
}

/// Holds `is_minting` up for as long as it lives, including when the mint future is
/// dropped before the transaction settles.
struct MintingFlag<'a> {
    state: &'a watch::Sender<MintSessionState>,
}

impl<'a> MintingFlag<'a> {
    /// Raises the flag, unless it is already up.
    fn raise(state: &'a watch::Sender<MintSessionState>) -> Option<Self> {
        let raised = state.send_if_modified(|state| {
            if state.is_minting {
                return false;
            }
            state.is_minting = true;
            true
        });
        raised.then_some(MintingFlag { state })
    }
}

impl Drop for MintingFlag<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|state| state.is_minting = false);
    }
}

#[cfg(test)]
#[path = "unit_tests/session_tests.rs"]
mod tests;
