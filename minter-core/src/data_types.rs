// Copyright (c) Epic NFT Minter developers
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use alloy_primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

/// The address of a wallet account, as reported by the wallet agent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Account(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Account(format!("{:?}", address))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chain identifier reported by the wallet agent, usually a hex quantity such as `0x4`.
#[derive(Clone, Debug, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(id: impl Into<String>) -> Self {
        NetworkId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interprets the identifier as a number, accepting `0x`-prefixed hex or decimal.
    pub fn as_u64(&self) -> Option<u64> {
        let id = self.0.trim();
        match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => id.parse().ok(),
        }
    }
}

impl PartialEq for NetworkId {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_u64(), other.as_u64()) {
            (Some(left), Some(right)) => left == right,
            _ => self.0.eq_ignore_ascii_case(&other.0),
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How many tokens have been minted, and how many can be minted in total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyCounters {
    pub current: u64,
    pub total: u64,
}

impl SupplyCounters {
    /// Returns the counters if `current <= total`.
    pub fn new(current: u64, total: u64) -> Option<Self> {
        (current <= total).then_some(SupplyCounters { current, total })
    }
}

/// The coarse phase of a session, derived from [`MintSessionState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Disconnected,
    Connected,
    SupplyKnown,
    Minting,
}

/// Everything the presentation layer needs to render a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintSessionState {
    /// The active wallet account, if the wallet has authorized one.
    pub account: Option<Account>,
    /// The last successfully read supply counters.
    pub supply: SupplyCounters,
    /// Whether `supply` holds values read from the contract rather than defaults.
    pub supply_known: bool,
    /// Whether a mint transaction is outstanding.
    pub is_minting: bool,
}

impl MintSessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.is_minting {
            SessionPhase::Minting
        } else if self.account.is_none() {
            SessionPhase::Disconnected
        } else if self.supply_known {
            SessionPhase::SupplyKnown
        } else {
            SessionPhase::Connected
        }
    }
}

/// A `NewEpicNFTMinted` event emitted by the contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintCompleted {
    pub from: Account,
    pub token_id: u64,
    pub block_number: Option<u64>,
}

/// The outcome of a confirmed mint transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
}

/// Out-of-band notifications for the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
    /// The wallet is on a different network than the one the contract lives on.
    #[serde(rename_all = "camelCase")]
    NetworkMismatch {
        expected: NetworkId,
        actual: NetworkId,
    },
    /// A token was minted.
    #[serde(rename_all = "camelCase")]
    MintCompleted {
        from: Account,
        token_id: u64,
        token_url: String,
    },
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("0x4", "0x4", true; "identical")]
    #[test_case("0x4", "0x04", true; "leading zero")]
    #[test_case("0x4", "4", true; "decimal")]
    #[test_case("0xAA36A7", "0xaa36a7", true; "hex case")]
    #[test_case("0x4", "0x1", false; "different chain")]
    #[test_case("rinkeby", "RINKEBY", true; "non numeric")]
    #[test_case("rinkeby", "0x4", false; "mixed")]
    fn network_id_comparison(left: &str, right: &str, equal: bool) {
        assert_eq!(NetworkId::new(left) == NetworkId::new(right), equal);
    }

    #[test]
    fn supply_counters_reject_inverted_pair() {
        assert_eq!(
            SupplyCounters::new(4, 100),
            Some(SupplyCounters {
                current: 4,
                total: 100
            })
        );
        assert_eq!(SupplyCounters::new(100, 100).map(|s| s.current), Some(100));
        assert_eq!(SupplyCounters::new(101, 100), None);
    }

    #[test]
    fn phase_follows_state() {
        let mut state = MintSessionState::default();
        assert_eq!(state.phase(), SessionPhase::Disconnected);
        state.account = Some(Account::new("0xaaa"));
        assert_eq!(state.phase(), SessionPhase::Connected);
        state.supply_known = true;
        assert_eq!(state.phase(), SessionPhase::SupplyKnown);
        state.is_minting = true;
        assert_eq!(state.phase(), SessionPhase::Minting);
    }

    #[test]
    fn notices_are_tagged() {
        let notice = Notice::NetworkMismatch {
            expected: NetworkId::new("0x4"),
            actual: NetworkId::new("0x1"),
        };
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "networkMismatch", "expected": "0x4", "actual": "0x1" })
        );
    }
}
