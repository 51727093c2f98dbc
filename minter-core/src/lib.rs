// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

//! This module defines the client-side core of the NFT minter: detecting a wallet
//! agent, reading the minting contract, submitting mints, and reconciling all of it
//! into a single session state that a presentation layer can render.

pub mod agent;
pub mod config;
pub mod contract;
pub mod data_types;
pub mod error;
pub mod gateway;
#[cfg(not(target_arch = "wasm32"))]
pub mod http_agent;
pub mod network;
pub mod notifier;
pub mod session;
#[cfg(with_testing)]
#[path = "unit_tests/test_utils.rs"]
pub mod test_utils;
pub mod time;

pub use crate::{
    agent::WalletAgent,
    config::MinterConfig,
    contract::{ContractClient, MintTransaction},
    data_types::{
        Account, MintCompleted, MintReceipt, MintSessionState, NetworkId, Notice, SessionPhase,
        SupplyCounters,
    },
    error::{AgentError, ContractError, MintError},
    gateway::WalletGateway,
    network::{NetworkCheck, NetworkGuard},
    session::{MintOutcome, MintSession},
};
