// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use alloy_primitives::{address, Address};
use assert_matches::assert_matches;
use serde_json::Value;

use super::*;
use crate::{
    agent::{self, WalletAgent},
    data_types::{NetworkId, SessionPhase},
    error::AgentError,
    test_utils::{MockWalletAgent, ReceiptBehavior},
};

const ALICE: &str = "0x000000000000000000000000000000000000a11c";
const BOB: &str = "0x0000000000000000000000000000000000000b0b";
const MINTER: Address = address!("00000000000000000000000000000000000000aa");

fn make_session(wallet: MockWalletAgent) -> (MintSession<MockWalletAgent>, Arc<MockWalletAgent>) {
    let config = MinterConfig {
        poll_interval_ms: 5,
        ..MinterConfig::default()
    };
    let session = MintSession::new(wallet.with_contract(config.contract_address), config);
    let wallet = session.gateway().agent().clone();
    (session, wallet)
}

#[test_log::test(tokio::test)]
async fn test_no_wallet() {
    let (session, _) = make_session(MockWalletAgent::absent());
    let mut notices = session.subscribe_notices();

    assert_eq!(session.on_load().await, None);
    assert_eq!(session.snapshot().phase(), SessionPhase::Disconnected);
    assert_matches!(session.connect().await, Err(MintError::WalletUnavailable));
    assert_matches!(
        session.setup_listening().await.map(|forwarder| forwarder.is_some()),
        Err(MintError::WalletUnavailable)
    );
    assert_matches!(session.refresh_supply().await, Err(MintError::WalletUnavailable));
    assert_matches!(session.mint().await, Err(MintError::WalletUnavailable));

    assert_eq!(session.snapshot(), MintSessionState::default());
    assert!(notices.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn test_load_with_authorized_account() {
    let (session, wallet) = make_session(MockWalletAgent::new().with_accounts([ALICE, BOB]));
    let mut notices = session.subscribe_notices();

    assert_eq!(session.on_load().await, Some(Account::new(ALICE)));
    assert_eq!(session.snapshot().phase(), SessionPhase::Connected);
    assert_eq!(wallet.request_count(agent::ETH_REQUEST_ACCOUNTS), 0);
    // The wallet is on the required network.
    assert!(notices.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn test_load_follows_account_changes() {
    let (session, wallet) = make_session(MockWalletAgent::new().with_accounts([ALICE]));
    let mut state = session.watch_state();
    session.on_load().await;
    assert!(state.has_changed().unwrap());
    state.borrow_and_update();

    // Nothing changed in the wallet.
    session.on_load().await;
    assert!(!state.has_changed().unwrap());

    wallet.set_accounts([]);
    assert_eq!(session.on_load().await, None);
    assert!(state.has_changed().unwrap());
    assert_eq!(state.borrow_and_update().phase(), SessionPhase::Disconnected);
}

#[test_log::test(tokio::test)]
async fn test_network_mismatch_is_advisory() {
    let (session, _) = make_session(
        MockWalletAgent::new()
            .with_chain_id("0x1")
            .with_accounts([ALICE]),
    );
    let mut notices = session.subscribe_notices();

    assert_eq!(session.on_load().await, Some(Account::new(ALICE)));
    assert_eq!(
        notices.try_recv().unwrap(),
        Notice::NetworkMismatch {
            expected: NetworkId::new("0x4"),
            actual: NetworkId::new("0x1"),
        }
    );
    assert!(notices.try_recv().is_err());
    assert_eq!(session.snapshot().phase(), SessionPhase::Connected);
}

#[test_log::test(tokio::test)]
async fn test_network_ids_are_compared_numerically() {
    let (session, _) = make_session(MockWalletAgent::new().with_chain_id("4"));
    let mut notices = session.subscribe_notices();
    session.on_load().await;
    assert!(notices.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn test_connect() -> anyhow::Result<()> {
    let (session, wallet) =
        make_session(MockWalletAgent::new().with_authorizable_accounts([ALICE]));
    assert_eq!(session.on_load().await, None);

    assert_eq!(session.connect().await?, Some(Account::new(ALICE)));
    assert_eq!(session.snapshot().account, Some(Account::new(ALICE)));
    assert_eq!(wallet.request_count(agent::ETH_REQUEST_ACCOUNTS), 1);

    // The account stays authorized.
    assert_eq!(session.on_load().await, Some(Account::new(ALICE)));
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_connect_declined() {
    let (session, wallet) =
        make_session(MockWalletAgent::new().with_authorizable_accounts([ALICE]));
    wallet.reject_prompts(true);

    assert_matches!(
        session.connect().await,
        Err(MintError::AuthorizationDeclined(error)) if error.is_user_rejection()
    );
    assert_eq!(session.snapshot().account, None);
}

#[test_log::test(tokio::test)]
async fn test_setup_listening_reads_supply() -> anyhow::Result<()> {
    let (session, _) = make_session(MockWalletAgent::new().with_accounts([ALICE]).with_supply(3, 50));
    session.on_load().await;

    let forwarder = session.setup_listening().await?;
    assert!(forwarder.is_some());
    let state = session.snapshot();
    assert_eq!(state.supply, SupplyCounters { current: 3, total: 50 });
    assert_eq!(state.phase(), SessionPhase::SupplyKnown);

    // Listening twice keeps a single subscription.
    assert!(session.setup_listening().await?.is_none());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_unspawned_forwarder_releases_subscription() -> anyhow::Result<()> {
    let (session, wallet) = make_session(MockWalletAgent::new().with_supply(3, 50));

    let forwarder = session.setup_listening().await?;
    assert!(forwarder.is_some());
    drop(forwarder);

    assert!(session.setup_listening().await?.is_some());
    assert_eq!(wallet.request_count(agent::ETH_BLOCK_NUMBER), 2);
    Ok(())
}

/// Gives the scheduler a chance to run other tasks before every request.
struct YieldingAgent(MockWalletAgent);

impl WalletAgent for YieldingAgent {
    fn is_present(&self) -> bool {
        self.0.is_present()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, AgentError> {
        tokio::task::yield_now().await;
        self.0.request(method, params).await
    }
}

#[test_log::test(tokio::test)]
async fn test_overlapping_setup_listening_subscribes_once() {
    let config = MinterConfig {
        poll_interval_ms: 5,
        ..MinterConfig::default()
    };
    let wallet = MockWalletAgent::new()
        .with_contract(config.contract_address)
        .with_supply(3, 50);
    let session = MintSession::new(YieldingAgent(wallet), config);

    let (first, second) = futures::join!(session.setup_listening(), session.setup_listening());
    assert_matches!(first.map(|forwarder| forwarder.is_some()), Ok(true));
    assert_matches!(second.map(|forwarder| forwarder.is_some()), Ok(false));

    let wallet = &session.gateway().agent().0;
    assert_eq!(wallet.request_count(agent::ETH_CALL), 2);
    assert_eq!(wallet.request_count(agent::ETH_BLOCK_NUMBER), 1);
}

#[test_log::test(tokio::test)]
async fn test_inconsistent_supply_is_rejected() -> anyhow::Result<()> {
    let (session, wallet) = make_session(MockWalletAgent::new().with_supply(5, 3));

    assert_matches!(
        session.setup_listening().await.map(|forwarder| forwarder.is_some()),
        Err(MintError::ReadFailure(ContractError::InconsistentSupply { current: 5, total: 3 }))
    );
    assert!(!session.snapshot().supply_known);

    // Nothing was subscribed, so a later attempt can succeed.
    wallet.set_supply(1, 3);
    assert!(session.setup_listening().await?.is_some());
    assert_eq!(session.snapshot().supply, SupplyCounters { current: 1, total: 3 });
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_failed_refresh_keeps_counters() -> anyhow::Result<()> {
    let (session, wallet) = make_session(MockWalletAgent::new().with_supply(2, 10));
    assert_eq!(
        session.refresh_supply().await?,
        SupplyCounters { current: 2, total: 10 }
    );

    wallet.fail_method(agent::ETH_CALL);
    assert_matches!(
        session.refresh_supply().await,
        Err(MintError::ReadFailure(ContractError::Agent(AgentError::Rpc { .. })))
    );
    let state = session.snapshot();
    assert!(state.supply_known);
    assert_eq!(state.supply, SupplyCounters { current: 2, total: 10 });

    wallet.restore_method(agent::ETH_CALL);
    wallet.set_supply(3, 10);
    assert_eq!(session.refresh_supply().await?.current, 3);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_mint_completions_become_notices() -> anyhow::Result<()> {
    let (session, wallet) = make_session(MockWalletAgent::new().with_supply(0, 10));
    let mut notices = session.subscribe_notices();
    let forwarder = session.setup_listening().await?.expect("first subscription");
    let forwarding = tokio::spawn(forwarder);

    wallet.emit_mint(MINTER, 1);
    assert_eq!(
        notices.recv().await,
        Some(Notice::MintCompleted {
            from: Account::from(MINTER),
            token_id: 1,
            token_url: session.config().token_url(1),
        })
    );

    session.rebind();
    forwarding.await?;
    assert!(session.setup_listening().await?.is_some());
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_mint() -> anyhow::Result<()> {
    let (session, wallet) = make_session(MockWalletAgent::new().with_accounts([ALICE]));
    session.on_load().await;

    let receipt = assert_matches!(session.mint().await?, MintOutcome::Confirmed(receipt) => receipt);
    assert_eq!(receipt.block_number, Some(2));
    let sent = wallet.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["from"], ALICE);
    assert!(!session.snapshot().is_minting);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_mint_without_account() {
    let (session, wallet) = make_session(MockWalletAgent::new());
    session.on_load().await;

    assert_matches!(
        session.mint().await,
        Err(MintError::SubmissionFailure(ContractError::NoSender))
    );
    assert_eq!(wallet.request_count(agent::ETH_SEND_TRANSACTION), 0);
    assert!(!session.snapshot().is_minting);
}

#[test_log::test(tokio::test)]
async fn test_mint_declined() {
    let (session, wallet) = make_session(MockWalletAgent::new().with_accounts([ALICE]).with_supply(1, 5));
    session.refresh_supply().await.unwrap();
    session.on_load().await;
    let before = session.snapshot();
    wallet.reject_prompts(true);

    assert_matches!(session.mint().await, Err(MintError::AuthorizationDeclined(_)));
    assert_eq!(session.snapshot(), before);
}

#[test_log::test(tokio::test)]
async fn test_mint_reverted() -> anyhow::Result<()> {
    let (session, wallet) = make_session(
        MockWalletAgent::new()
            .with_accounts([ALICE])
            .with_supply(4, 100)
            .with_receipt_behavior(ReceiptBehavior::Revert),
    );
    session.on_load().await;
    session.refresh_supply().await?;
    let before = session.snapshot();

    assert_matches!(
        session.mint().await,
        Err(MintError::ConfirmationFailure(ContractError::Reverted(_)))
    );
    assert_eq!(wallet.request_count(agent::ETH_SEND_TRANSACTION), 1);
    assert_eq!(session.snapshot(), before);
    assert_eq!(before.supply, SupplyCounters { current: 4, total: 100 });
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_second_mint_is_ignored_while_pending() -> anyhow::Result<()> {
    let (session, wallet) = make_session(
        MockWalletAgent::new()
            .with_accounts([ALICE])
            .with_receipt_behavior(ReceiptBehavior::Pending),
    );
    session.on_load().await;

    let first = session.mint();
    futures::pin_mut!(first);
    assert!(futures::poll!(&mut first).is_pending());
    assert_eq!(session.snapshot().phase(), SessionPhase::Minting);

    assert_eq!(session.mint().await?, MintOutcome::Ignored);
    assert_eq!(wallet.request_count(agent::ETH_SEND_TRANSACTION), 1);

    wallet.settle(true);
    assert_matches!(first.await?, MintOutcome::Confirmed(_));
    assert!(!session.snapshot().is_minting);
    Ok(())
}

#[test_log::test(tokio::test)]
async fn test_dropped_mint_releases_flag() {
    let (session, _) = make_session(
        MockWalletAgent::new()
            .with_accounts([ALICE])
            .with_receipt_behavior(ReceiptBehavior::Pending),
    );
    session.on_load().await;

    let mut first = Box::pin(session.mint());
    assert!(futures::poll!(&mut first).is_pending());
    assert!(session.snapshot().is_minting);

    drop(first);
    assert!(!session.snapshot().is_minting);
}
